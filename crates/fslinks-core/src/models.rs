//! Data models for fslinks
//!
//! Defines the stored record (`LinkRecord`) and the value types used to
//! create and partially update it.

use serde::{Deserialize, Serialize};

/// A stored link to a file, folder or network path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkRecord {
    /// Surrogate key assigned by the store, never reused
    pub id: i64,
    /// Display label (may be empty)
    pub name: String,
    /// Filesystem path, opaque to the store
    pub path: String,
    /// Comma-separated tags
    pub tags: String,
    /// Icon override; empty means "use the default type icon"
    pub custom_icon: String,
    /// Display order
    pub position: i64,
    /// Creation timestamp (`YYYY-MM-DDTHH:MM:SS`, local time)
    pub added_at: String,
}

impl LinkRecord {
    /// Create a record from stored column values
    ///
    /// Missing tags or icon (NULL columns) are normalized to empty strings.
    pub fn new(
        id: i64,
        name: impl Into<String>,
        path: impl Into<String>,
        tags: Option<String>,
        custom_icon: Option<String>,
        position: i64,
        added_at: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            path: path.into(),
            tags: tags.unwrap_or_default(),
            custom_icon: custom_icon.unwrap_or_default(),
            position,
            added_at: added_at.into(),
        }
    }

    /// The label shown for this link
    ///
    /// Uses the name, falling back to the last path segment and then to the
    /// raw path.
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        match last_path_segment(&self.path) {
            Some(segment) => segment,
            None => &self.path,
        }
    }

    /// Two-line display text: label (with bracketed tags) and path
    pub fn display_text(&self) -> String {
        let tag_part = if self.tags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", self.tags)
        };
        format!("{}{}\n{}", self.display_name(), tag_part, self.path)
    }

    /// Tags as an ordered list of trimmed, non-empty strings
    pub fn tags_list(&self) -> Vec<String> {
        split_tags(&self.tags)
    }

    /// Whether an icon override is set
    pub fn has_custom_icon(&self) -> bool {
        !self.custom_icon.is_empty()
    }
}

/// Split a comma-separated tag string into trimmed, non-empty tags
pub fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Final non-empty segment of a `/` or `\` separated path
fn last_path_segment(path: &str) -> Option<&str> {
    path.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
}

/// Input for creating a link
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewLink {
    #[serde(default)]
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub custom_icon: String,
}

impl NewLink {
    /// Create a link input with the given path and no name, tags or icon
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    pub fn with_custom_icon(mut self, icon: impl Into<String>) -> Self {
        self.custom_icon = icon.into();
        self
    }
}

/// Partial update of a link
///
/// Only fields that are `Some` are written; an update with no fields set
/// leaves the record untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkUpdate {
    pub name: Option<String>,
    pub path: Option<String>,
    pub tags: Option<String>,
    pub custom_icon: Option<String>,
}

impl LinkUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    pub fn custom_icon(mut self, icon: impl Into<String>) -> Self {
        self.custom_icon = Some(icon.into());
        self
    }

    /// True when no field would be written
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.path.is_none()
            && self.tags.is_none()
            && self.custom_icon.is_none()
    }
}

/// A distinct tag and the number of links carrying it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagCount {
    pub name: String,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, path: &str, tags: &str) -> LinkRecord {
        LinkRecord::new(
            1,
            name,
            path,
            Some(tags.to_string()),
            None,
            0,
            "2024-01-01T10:00:00",
        )
    }

    #[test]
    fn test_display_text_uses_name() {
        let rec = record("Docs", "/home/user/docs", "");
        assert_eq!(rec.display_text(), "Docs\n/home/user/docs");
    }

    #[test]
    fn test_display_text_falls_back_to_file_name() {
        let rec = record("", "/home/user/report.pdf", "");
        assert_eq!(rec.display_text(), "report.pdf\n/home/user/report.pdf");

        let rec = record("", r"C:\work\notes.txt", "");
        assert_eq!(rec.display_name(), "notes.txt");

        let rec = record("", r"\\server\share\", "");
        assert_eq!(rec.display_name(), "share");
    }

    #[test]
    fn test_display_text_falls_back_to_raw_path() {
        let rec = record("", "/", "");
        assert_eq!(rec.display_name(), "/");
    }

    #[test]
    fn test_display_text_with_tags() {
        let rec = record("Img", "/pics/b.png", "work, urgent");
        assert_eq!(rec.display_text(), "Img  [work, urgent]\n/pics/b.png");
    }

    #[test]
    fn test_tags_list() {
        let rec = record("x", "/x", " work ,, urgent,work , ");
        assert_eq!(rec.tags_list(), vec!["work", "urgent", "work"]);

        let rec = record("x", "/x", "");
        assert!(rec.tags_list().is_empty());
    }

    #[test]
    fn test_null_columns_normalized() {
        let rec = LinkRecord::new(3, "n", "/p", None, None, 2, "2024-01-01T00:00:00");
        assert_eq!(rec.tags, "");
        assert_eq!(rec.custom_icon, "");
        assert!(!rec.has_custom_icon());
    }

    #[test]
    fn test_link_update_is_empty() {
        assert!(LinkUpdate::new().is_empty());
        assert!(!LinkUpdate::new().tags("").is_empty());
    }

    #[test]
    fn test_new_link_builder() {
        let link = NewLink::new("/docs/a.txt")
            .with_name("Doc")
            .with_tags("work")
            .with_custom_icon("📄");
        assert_eq!(link.path, "/docs/a.txt");
        assert_eq!(link.name, "Doc");
        assert_eq!(link.tags, "work");
        assert_eq!(link.custom_icon, "📄");
    }

    #[test]
    fn test_record_serialization() {
        let rec = record("Doc", "/docs/a.txt", "work");
        let json = serde_json::to_string(&rec).unwrap();
        let back: LinkRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rec, back);
    }
}
