//! Link command handlers

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;

use fslinks_core::query::{SearchField, SearchOperator, SortDirection, SortField, TagMatch};
use fslinks_core::tags::{generate_auto_tags, merge_tags};
use fslinks_core::{split_tags, Config, LinkStore, LinkUpdate, NewLink, QueryBuilder};

use crate::output::Output;
use crate::prompt::confirm;

/// Options for `fslinks add`
#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// File, folder or network path to save
    pub path: String,
    /// Display name (defaults to the last path segment)
    #[arg(short, long)]
    pub name: Option<String>,
    /// Comma-separated tags
    #[arg(short, long)]
    pub tags: Option<String>,
    /// Icon override
    #[arg(long)]
    pub icon: Option<String>,
    /// Don't tag the link by file kind and extension
    #[arg(long)]
    pub no_auto_tag: bool,
}

/// Options for `fslinks list`
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Text to search for in name, path and tags
    pub query: Option<String>,
    /// Only links whose tags contain this text (substring, case-insensitive; repeatable)
    #[arg(short, long)]
    pub tag: Vec<String>,
    /// Match links with any of the given tags instead of all of them
    #[arg(long)]
    pub any_tag: bool,
    /// Field for an extra filter (name, path, tags, all)
    #[arg(long, requires = "value")]
    pub field: Option<SearchField>,
    /// Comparison for the extra filter (contains, equals, starts_with, ends_with)
    #[arg(long, requires = "value")]
    pub op: Option<SearchOperator>,
    /// Value for the extra filter
    #[arg(long)]
    pub value: Option<String>,
    /// Compare the extra filter case-sensitively
    #[arg(long)]
    pub case_sensitive: bool,
    /// Sort by (position, name, path, added_at, id)
    #[arg(long, default_value = "position")]
    pub sort: SortField,
    /// Sort descending
    #[arg(long)]
    pub desc: bool,
}

/// Options for `fslinks edit`
#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Link ID
    pub id: i64,
    #[arg(short, long)]
    pub name: Option<String>,
    #[arg(short, long)]
    pub path: Option<String>,
    /// Replace tags (comma-separated; empty string clears them)
    #[arg(short, long)]
    pub tags: Option<String>,
    /// Icon override (empty string clears it)
    #[arg(long)]
    pub icon: Option<String>,
}

/// Add a new link
pub fn add(store: &mut LinkStore, config: &Config, args: AddArgs, output: &Output) -> Result<()> {
    if args.path.trim().is_empty() {
        bail!("Path cannot be empty");
    }

    let mut extra = args.tags.as_deref().map(split_tags).unwrap_or_default();
    if config.auto_tag && !args.no_auto_tag {
        extra.extend(generate_auto_tags(&args.path));
    }

    let link = NewLink::new(args.path)
        .with_name(args.name.unwrap_or_default())
        .with_tags(merge_tags(&config.default_tags, &extra))
        .with_custom_icon(args.icon.unwrap_or_default());

    let id = store.add(&link).context("Failed to add link")?;
    let record = store
        .get_by_id(id)?
        .ok_or_else(|| anyhow!("Link {} missing after insert", id))?;

    output.success(&format!("Added link: {}", id));
    output.print_link(&record);

    Ok(())
}

/// List links, optionally filtered and sorted
pub fn list(store: &LinkStore, args: &ListArgs, output: &Output) -> Result<()> {
    let builder = build_query(args);
    let links = store.search_links(&builder)?;
    output.print_links(&links);
    Ok(())
}

/// Translate list options into a query
pub fn build_query(args: &ListArgs) -> QueryBuilder {
    let mut builder = QueryBuilder::new();

    if let Some(query) = &args.query {
        builder.simple_search(query);
    }

    let mode = if args.any_tag {
        TagMatch::Any
    } else {
        TagMatch::All
    };
    builder.filter_by_tags(&args.tag, mode);

    if let Some(value) = &args.value {
        builder.add_filter(
            args.field.unwrap_or(SearchField::All),
            value.as_str(),
            args.op.unwrap_or_default(),
            args.case_sensitive,
        );
    }

    let direction = if args.desc {
        SortDirection::Desc
    } else {
        SortDirection::Asc
    };
    builder.set_order(args.sort, direction);

    builder
}

/// Show a single link
pub fn show(store: &LinkStore, id: i64, output: &Output) -> Result<()> {
    let link = store
        .get_by_id(id)?
        .ok_or_else(|| anyhow!("Link not found: {}", id))?;

    output.print_link(&link);
    Ok(())
}

/// Edit fields of a link
pub fn edit(store: &mut LinkStore, args: EditArgs, output: &Output) -> Result<()> {
    let mut update = LinkUpdate::new();
    update.name = args.name;
    update.path = args.path;
    update.tags = args.tags;
    update.custom_icon = args.icon;

    if update.is_empty() {
        bail!("Nothing to change. Use --name, --path, --tags or --icon.");
    }
    if update.path.as_deref().is_some_and(|p| p.trim().is_empty()) {
        bail!("Path cannot be empty");
    }

    if !store
        .update_link(args.id, &update)
        .context("Failed to update link")?
    {
        bail!("Link not found: {}", args.id);
    }

    let link = store
        .get_by_id(args.id)?
        .ok_or_else(|| anyhow!("Link not found: {}", args.id))?;

    output.success("Link updated");
    output.print_link(&link);

    Ok(())
}

/// Delete a link
pub fn delete(store: &mut LinkStore, id: i64, yes: bool, output: &Output) -> Result<()> {
    let link = store
        .get_by_id(id)?
        .ok_or_else(|| anyhow!("Link not found: {}", id))?;

    // Confirm deletion
    if output.should_prompt() && !yes {
        println!("Delete link: {} - {}", link.id, link.display_name());
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.delete_link(id).context("Failed to delete link")?;

    output.success(&format!("Deleted link: {}", id));

    Ok(())
}

/// Set the complete display order
pub fn reorder(store: &mut LinkStore, ids: Vec<i64>, output: &Output) -> Result<()> {
    store.reorder(&ids).context("Failed to reorder links")?;
    output.success(&format!("Reordered {} link(s)", ids.len()));
    Ok(())
}

/// Move one link to a new index, keeping the others in order
pub fn move_link(store: &mut LinkStore, id: i64, index: usize, output: &Output) -> Result<()> {
    let current: Vec<i64> = store.list_links("")?.iter().map(|l| l.id).collect();
    let order = moved(&current, id, index).ok_or_else(|| anyhow!("Link not found: {}", id))?;

    store.reorder(&order).context("Failed to move link")?;
    output.success(&format!("Moved link {} to position {}", id, order_index(&order, id)));
    Ok(())
}

/// `ids` with `id` moved to `index` (clamped to the end)
fn moved(ids: &[i64], id: i64, index: usize) -> Option<Vec<i64>> {
    let from = ids.iter().position(|&i| i == id)?;
    let mut order = ids.to_vec();
    order.remove(from);
    order.insert(index.min(order.len()), id);
    Some(order)
}

fn order_index(order: &[i64], id: i64) -> usize {
    order.iter().position(|&i| i == id).unwrap_or_default()
}
