//! Import and export command handlers

use std::path::Path;

use anyhow::{Context, Result};

use fslinks_core::{ExportDocument, LinkStore};

use crate::output::Output;

/// Append links from a JSON export file
pub fn import(store: &mut LinkStore, file: &Path, output: &Output) -> Result<()> {
    let document = ExportDocument::read_from_path(file)?;
    let report = store
        .import_document(&document)
        .with_context(|| format!("Failed to import {}", file.display()))?;

    if output.is_json() {
        output.json(&report);
    } else {
        output.success(&format!(
            "Imported {} link(s) from {}",
            report.imported,
            file.display()
        ));
    }
    Ok(())
}

/// Write every link to a JSON export file
pub fn export(store: &LinkStore, file: &Path, output: &Output) -> Result<()> {
    let document = store.export_document()?;
    document
        .write_to_path(file)
        .with_context(|| format!("Failed to export to {}", file.display()))?;

    output.success(&format!(
        "Exported {} link(s) to {}",
        document.links.len(),
        file.display()
    ));
    Ok(())
}
