//! Tag command handlers

use anyhow::Result;

use fslinks_core::LinkStore;

use crate::output::Output;

/// List all tags with usage counts
pub fn list(store: &LinkStore, output: &Output) -> Result<()> {
    let tags = store.tags_with_counts()?;
    output.print_tags(&tags);
    Ok(())
}
