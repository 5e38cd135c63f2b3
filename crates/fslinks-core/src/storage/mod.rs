//! Storage layer
//!
//! SQLite schema management and the error type shared by all store
//! operations.
//!
//! ## Tables
//!
//! - `links` - One row per stored link
//! - `schema_info` - Schema version tracking

pub mod error;
pub mod schema;

pub use error::{StoreError, StoreResult};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
