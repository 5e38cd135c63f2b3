//! JSON import and export of links
//!
//! The interchange file is a small versioned document:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "links": [
//!     { "name": "Doc", "path": "/docs/a.txt", "tags": "work", "custom_icon": "" }
//!   ]
//! }
//! ```
//!
//! Ids, positions and timestamps are not exported; imported links are
//! appended in document order and get fresh ones.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::{LinkRecord, NewLink};
use crate::storage::error::{StoreError, StoreResult};
use crate::store::LinkStore;

/// Interchange format version written and accepted
pub const EXPORT_VERSION: &str = "1.0";

/// A versioned list of links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub version: String,
    #[serde(default)]
    pub links: Vec<NewLink>,
}

impl Default for ExportDocument {
    fn default() -> Self {
        Self {
            version: EXPORT_VERSION.to_string(),
            links: Vec::new(),
        }
    }
}

impl ExportDocument {
    /// Build a document from stored records, keeping their order
    pub fn from_records(records: &[LinkRecord]) -> Self {
        let links = records
            .iter()
            .map(|r| NewLink {
                name: r.name.clone(),
                path: r.path.clone(),
                tags: r.tags.clone(),
                custom_icon: r.custom_icon.clone(),
            })
            .collect();

        Self {
            version: EXPORT_VERSION.to_string(),
            links,
        }
    }

    /// Read a document from a JSON file
    pub fn read_from_path(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the document as pretty-printed JSON
    pub fn write_to_path(&self, path: &Path) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json + "\n").map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the version and that every entry has a path
    pub fn validate(&self) -> StoreResult<()> {
        if self.version != EXPORT_VERSION {
            return Err(StoreError::InvalidImport {
                reason: format!(
                    "unsupported version '{}' (expected '{}')",
                    self.version, EXPORT_VERSION
                ),
            });
        }

        if let Some(index) = self.links.iter().position(|l| l.path.trim().is_empty()) {
            return Err(StoreError::InvalidImport {
                reason: format!("entry {} has no path", index + 1),
            });
        }

        Ok(())
    }
}

/// Outcome of [`LinkStore::import_document`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Ids of the new links, in document order
    pub ids: Vec<i64>,
}

impl LinkStore {
    /// All links in position order as an interchange document
    pub fn export_document(&self) -> StoreResult<ExportDocument> {
        let records = self.list_links("")?;
        Ok(ExportDocument::from_records(&records))
    }

    /// Append every link of `document`
    ///
    /// All-or-nothing: an invalid document or a failed insert leaves the
    /// store unchanged.
    pub fn import_document(&mut self, document: &ExportDocument) -> StoreResult<ImportReport> {
        document.validate()?;
        let ids = self.add_many(&document.links)?;
        info!("Imported {} link(s)", ids.len());

        Ok(ImportReport {
            imported: ids.len(),
            ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populated_store() -> LinkStore {
        let mut store = LinkStore::open_in_memory().unwrap();
        store.add_link("Doc", "/docs/a.txt", "work,urgent", "").unwrap();
        store.add_link("Café", "/pics/b.png", "", "🖼").unwrap();
        store.add_link("", r"\\server\share", "net", "").unwrap();
        store.reorder(&[3, 1, 2]).unwrap();
        store
    }

    #[test]
    fn test_export_in_position_order() {
        let store = populated_store();
        let doc = store.export_document().unwrap();

        assert_eq!(doc.version, "1.0");
        let paths: Vec<&str> = doc.links.iter().map(|l| l.path.as_str()).collect();
        assert_eq!(paths, vec![r"\\server\share", "/docs/a.txt", "/pics/b.png"]);
        assert_eq!(doc.links[2].custom_icon, "🖼");
    }

    #[test]
    fn test_export_import_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("links.json");

        populated_store()
            .export_document()
            .unwrap()
            .write_to_path(&file)
            .unwrap();

        let content = std::fs::read_to_string(&file).unwrap();
        assert!(content.contains("Café"));
        assert!(content.contains("\"version\": \"1.0\""));

        let doc = ExportDocument::read_from_path(&file).unwrap();
        let mut target = LinkStore::open_in_memory().unwrap();
        target.add_link("existing", "/existing", "", "").unwrap();
        let report = target.import_document(&doc).unwrap();

        assert_eq!(report.imported, 3);
        assert_eq!(report.ids, vec![2, 3, 4]);

        let links = target.list_links("").unwrap();
        let names: Vec<&str> = links.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["existing", "", "Doc", "Café"]);
        assert_eq!(links[2].tags, "work,urgent");
    }

    #[test]
    fn test_import_defaults_missing_fields() {
        let doc: ExportDocument = serde_json::from_str(
            r#"{ "version": "1.0", "links": [ { "path": "/only/path" } ] }"#,
        )
        .unwrap();

        let mut store = LinkStore::open_in_memory().unwrap();
        store.import_document(&doc).unwrap();

        let rec = store.get_by_id(1).unwrap().unwrap();
        assert_eq!(rec.path, "/only/path");
        assert_eq!(rec.name, "");
        assert_eq!(rec.tags, "");
        assert_eq!(rec.custom_icon, "");
    }

    #[test]
    fn test_import_rejects_wrong_version() {
        let mut doc = ExportDocument::default();
        doc.version = "2.0".to_string();
        doc.links.push(NewLink::new("/a"));

        let mut store = LinkStore::open_in_memory().unwrap();
        let err = store.import_document(&doc).unwrap_err();
        assert!(matches!(err, StoreError::InvalidImport { .. }));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_import_is_all_or_nothing() {
        let doc = ExportDocument {
            version: EXPORT_VERSION.to_string(),
            links: vec![NewLink::new("/a"), NewLink::new("   "), NewLink::new("/c")],
        };

        let mut store = LinkStore::open_in_memory().unwrap();
        store.add_link("keep", "/keep", "", "").unwrap();

        let err = store.import_document(&doc).unwrap_err();
        assert!(err.to_string().contains("entry 2"));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_import_into_read_only_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("links.db");
        LinkStore::open_path(&path).unwrap().close();

        let mut store = LinkStore::open_read_only(&path).unwrap();
        let doc = ExportDocument {
            version: EXPORT_VERSION.to_string(),
            links: vec![NewLink::new("/a")],
        };
        assert!(matches!(
            store.import_document(&doc),
            Err(StoreError::ReadOnly { .. })
        ));
    }

    #[test]
    fn test_read_invalid_files() {
        let temp_dir = TempDir::new().unwrap();

        let missing = ExportDocument::read_from_path(&temp_dir.path().join("missing.json"));
        assert!(matches!(missing, Err(StoreError::Io { .. })));

        let bad = temp_dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(
            ExportDocument::read_from_path(&bad),
            Err(StoreError::Json { .. })
        ));
    }
}
