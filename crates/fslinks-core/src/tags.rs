//! Tag helpers for newly added links
//!
//! Links can be tagged automatically by the kind of thing they point at,
//! and merged with the user's configured default tags.

use std::path::Path;

use crate::models::split_tags;

/// Tag given to links that point at a directory
pub const FOLDER_TAG: &str = "folder";

/// Tag given to links that point at a regular file
pub const FILE_TAG: &str = "file";

/// Generate tags describing what `path` points at
///
/// Returns `["folder"]` for directories and `["file", "<ext>"]` for files,
/// with the extension lowercased. Paths that do not exist get no tags.
pub fn generate_auto_tags(path: impl AsRef<Path>) -> Vec<String> {
    let path = path.as_ref();
    let Ok(metadata) = path.metadata() else {
        return Vec::new();
    };

    if metadata.is_dir() {
        return vec![FOLDER_TAG.to_string()];
    }

    let mut tags = vec![FILE_TAG.to_string()];
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if !ext.is_empty() {
            tags.push(ext.to_lowercase());
        }
    }
    tags
}

/// Merge comma-separated default tags with generated tags
///
/// Order is preserved and duplicates are dropped; the result is joined
/// with `", "`.
pub fn merge_tags<S: AsRef<str>>(default_tags: &str, extra: &[S]) -> String {
    let mut merged: Vec<String> = Vec::new();

    let extra = extra.iter().map(|t| t.as_ref().trim().to_string());
    for tag in split_tags(default_tags).into_iter().chain(extra) {
        if !tag.is_empty() && !merged.contains(&tag) {
            merged.push(tag);
        }
    }

    merged.join(", ")
}
