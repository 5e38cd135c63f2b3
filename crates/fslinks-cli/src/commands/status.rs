//! Status command handler

use anyhow::Result;

use fslinks_core::LinkStore;

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(store: &LinkStore, output: &Output) -> Result<()> {
    let links = store.count()?;
    let tags = store.tags_with_counts()?.len();
    let path = store.path().map(|p| p.display().to_string());
    let size = store
        .path()
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len());
    let mode = if store.is_read_only() {
        "read-only"
    } else {
        "read-write"
    };

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "database": path,
                    "mode": mode,
                    "database_size": size,
                    "counts": {
                        "links": links,
                        "tags": tags
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", links);
        }
        OutputFormat::Human => {
            println!("fslinks Status");
            println!("==============");
            println!();
            println!("Database:");
            println!(
                "  Location: {}",
                path.as_deref().unwrap_or("(in memory)")
            );
            println!("  Mode:     {}", mode);
            if let Some(size) = size {
                println!("  Size:     {}", human_size(size));
            }
            println!();
            println!("Contents:");
            println!("  Links: {}", links);
            println!("  Tags:  {}", tags);
        }
    }

    Ok(())
}

fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
