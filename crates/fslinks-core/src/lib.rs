//! fslinks core library
//!
//! This crate provides the storage layer for fslinks, an ordered and tagged
//! collection of links to files, folders and network paths.
//!
//! # Architecture
//!
//! - **SQLite**: a single `links` table is the source of truth
//! - **Query builder**: composes parameterized search queries
//!
//! Values from callers are always bound as parameters; only fixed column
//! names and keywords are ever spliced into SQL text.
//!
//! # Quick Start
//!
//! ```text
//! let mut store = LinkStore::open_with_config(&Config::load()?)?;
//!
//! // Add a link
//! let id = store.add_link("Report", "/docs/report.pdf", "work", "")?;
//!
//! // Query links
//! let hits = store.list_links("report")?;
//! ```
//!
//! # Modules
//!
//! - `store`: link store (main entry point)
//! - `query`: query builder for filtered, sorted searches
//! - `models`: link record and input types
//! - `storage`: SQLite schema and store errors
//! - `transfer`: JSON import/export
//! - `tags`: automatic tags for new links
//! - `config`: application configuration

pub mod config;
pub mod models;
pub mod query;
pub mod storage;
pub mod store;
pub mod tags;
pub mod transfer;

pub use config::Config;
pub use models::{split_tags, LinkRecord, LinkUpdate, NewLink, TagCount};
pub use query::{
    BuiltQuery, Filter, LinkColumns, QueryBuilder, QueryError, SearchField, SearchOperator,
    SortDirection, SortField, TagMatch,
};
pub use storage::{StoreError, StoreResult};
pub use store::{AccessMode, LinkStore, LinkTransaction, StoreOptions};
pub use transfer::{ExportDocument, ImportReport};
