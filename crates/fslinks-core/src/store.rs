//! Link store
//!
//! The `LinkStore` owns the SQLite connection and is the only read/write
//! surface for link records.
//!
//! ## Lifecycle
//!
//! A store is opened read-write (creating the file and schema when absent)
//! or read-only (never creating anything). `close()` releases the
//! connection; every later call fails with [`StoreError::Closed`].
//!
//! ## Usage
//!
//! ```
//! use fslinks_core::{LinkStore, LinkUpdate};
//!
//! let mut store = LinkStore::open_in_memory()?;
//! let id = store.add_link("Doc", "/docs/a.txt", "work,urgent", "")?;
//! store.update_link(id, &LinkUpdate::new().name("Spec"))?;
//!
//! let hits = store.list_links("work")?;
//! assert_eq!(hits[0].name, "Spec");
//! # Ok::<(), fslinks_core::StoreError>(())
//! ```
//!
//! ## Writes
//!
//! Every write runs in an IMMEDIATE transaction so the database write lock
//! is held before positions are read. Multi-step work can be grouped with
//! [`LinkStore::transaction`] or [`LinkStore::with_transaction`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use rusqlite::{
    params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row, ToSql, Transaction,
    TransactionBehavior,
};
use tracing::{debug, warn};

use crate::config::{Config, DEFAULT_BUSY_TIMEOUT_MS};
use crate::models::{LinkRecord, LinkUpdate, NewLink, TagCount};
use crate::query::{register_functions, BuiltQuery, LinkColumns, QueryBuilder};
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::schema::{has_column, has_table, init_schema, needs_init};

/// Format of `added_at` (local time, seconds precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Whether a store may write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccessMode {
    #[default]
    ReadWrite,
    ReadOnly,
}

/// Options for opening a [`LinkStore`]
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Database file; `None` uses the default location under the data dir
    pub path: Option<PathBuf>,
    pub mode: AccessMode,
    /// How long a write waits for another connection's lock
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            path: None,
            mode: AccessMode::ReadWrite,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

impl StoreOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Options matching the configured database location and timeout
    pub fn from_config(config: &Config) -> Self {
        Self {
            path: Some(config.database_path()),
            mode: AccessMode::ReadWrite,
            busy_timeout: config.busy_timeout(),
        }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.mode = if read_only {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWrite
        };
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// SQLite-backed store of ordered link records
pub struct LinkStore {
    /// `None` once closed
    conn: Option<Connection>,
    /// `None` for in-memory stores
    path: Option<PathBuf>,
    mode: AccessMode,
    columns: LinkColumns,
}

impl LinkStore {
    /// Open a store with explicit options
    ///
    /// Read-write stores create the parent directory, database file and
    /// schema as needed. Read-only stores require an existing link database.
    pub fn open(options: &StoreOptions) -> StoreResult<Self> {
        let path = options
            .path
            .clone()
            .unwrap_or_else(|| Config::default().database_path());

        let conn = match options.mode {
            AccessMode::ReadWrite => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|source| {
                        StoreError::CreateDirectory {
                            path: parent.to_path_buf(),
                            source,
                        }
                    })?;
                }
                Connection::open(&path)
            }
            AccessMode::ReadOnly => Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            ),
        }
        .map_err(|source| StoreError::Init {
            path: path.clone(),
            source,
        })?;

        Self::from_connection(conn, Some(path), options.mode, options.busy_timeout)
    }

    /// Open (or create) a read-write store at `path`
    pub fn open_path(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(&StoreOptions::new(path.as_ref()))
    }

    /// Open an existing store at `path` without write access
    pub fn open_read_only(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(&StoreOptions::new(path.as_ref()).read_only(true))
    }

    /// Open the store configured by `config`
    pub fn open_with_config(config: &Config) -> StoreResult<Self> {
        Self::open(&StoreOptions::from_config(config))
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Init {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::from_connection(
            conn,
            None,
            AccessMode::ReadWrite,
            Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        )
    }

    /// Finish opening; the connection is closed again if setup fails
    fn from_connection(
        conn: Connection,
        path: Option<PathBuf>,
        mode: AccessMode,
        busy_timeout: Duration,
    ) -> StoreResult<Self> {
        match configure(&conn, mode, busy_timeout) {
            Ok(columns) => {
                debug!("Opened link store {:?} ({:?})", path, mode);
                Ok(Self {
                    conn: Some(conn),
                    path,
                    mode,
                    columns,
                })
            }
            Err(err) => {
                if let Err((_, close_err)) = conn.close() {
                    warn!("Failed to close link database after open error: {}", close_err);
                }
                let path = path.unwrap_or_else(|| PathBuf::from(":memory:"));
                Err(match err {
                    SetupError::Sqlite(source) => StoreError::Init { path, source },
                    SetupError::MissingSchema => StoreError::MissingSchema { path },
                })
            }
        }
    }

    /// Database file path (`None` for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn is_read_only(&self) -> bool {
        self.mode == AccessMode::ReadOnly
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// Close the connection
    ///
    /// Safe to call more than once; close failures are logged, not returned.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            match conn.close() {
                Ok(()) => debug!("Closed link store {:?}", self.path),
                Err((_, e)) => warn!("Failed to close link database cleanly: {}", e),
            }
        }
    }

    // ==================== Writes ====================

    /// Add a link at the end of the list, returning its id
    pub fn add_link(
        &mut self,
        name: &str,
        path: &str,
        tags: &str,
        custom_icon: &str,
    ) -> StoreResult<i64> {
        self.write("add link", |tx| {
            insert_link(tx, name, path, tags, custom_icon)
        })
    }

    /// Add a link from a [`NewLink`]
    pub fn add(&mut self, link: &NewLink) -> StoreResult<i64> {
        self.add_link(&link.name, &link.path, &link.tags, &link.custom_icon)
    }

    /// Add several links in one transaction
    ///
    /// Either every link is added or, on the first failure, none are.
    pub fn add_many(&mut self, links: &[NewLink]) -> StoreResult<Vec<i64>> {
        self.write("add links", |tx| {
            links
                .iter()
                .map(|l| insert_link(tx, &l.name, &l.path, &l.tags, &l.custom_icon))
                .collect()
        })
    }

    /// Update the supplied fields of a link
    ///
    /// Returns `false` when nothing was written: no fields were given or no
    /// link has this id.
    pub fn update_link(&mut self, id: i64, update: &LinkUpdate) -> StoreResult<bool> {
        self.writable_conn("update link")?;
        if update.is_empty() {
            return Ok(false);
        }
        self.write("update link", |tx| update_row(tx, id, update))
    }

    /// Delete a link; returns `false` if it did not exist
    ///
    /// Remaining positions are not renumbered.
    pub fn delete_link(&mut self, id: i64) -> StoreResult<bool> {
        self.write("delete link", |tx| delete_row(tx, id))
    }

    /// Assign `position = index` for each id, atomically
    ///
    /// `ordered_ids` must contain every stored id exactly once; otherwise
    /// [`StoreError::InvalidReorder`] is returned and nothing changes.
    pub fn reorder(&mut self, ordered_ids: &[i64]) -> StoreResult<()> {
        self.write("reorder links", |tx| reorder_rows(tx, ordered_ids))
    }

    /// Begin a unit of work
    ///
    /// Writes made through the returned guard become visible together on
    /// [`LinkTransaction::commit`]. Dropping the guard without committing
    /// (early return, `?`, panic) rolls every write back. The guard borrows
    /// the store mutably, so transactions cannot nest.
    pub fn transaction(&mut self) -> StoreResult<LinkTransaction<'_>> {
        let columns = self.columns;
        let conn = self.writable_conn("start a transaction")?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        debug!("Transaction started");
        Ok(LinkTransaction { tx, columns })
    }

    /// Run `f` in a unit of work: commit on `Ok`, roll back on `Err`
    pub fn with_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&LinkTransaction<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let tx = self.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ==================== Reads ====================

    /// Get a link by id
    pub fn get_by_id(&self, id: i64) -> StoreResult<Option<LinkRecord>> {
        fetch_by_id(self.conn()?, self.columns, id)
    }

    /// List links in position order, optionally filtered by free text
    ///
    /// A non-blank `search` keeps links whose name, path or tags contain
    /// it (case-insensitive).
    pub fn list_links(&self, search: &str) -> StoreResult<Vec<LinkRecord>> {
        let mut builder = QueryBuilder::new();
        builder.simple_search(search);
        self.search_links(&builder)
    }

    /// Run a caller-built query
    pub fn search_links(&self, builder: &QueryBuilder) -> StoreResult<Vec<LinkRecord>> {
        run_query(self.conn()?, &builder.build_for(self.columns))
    }

    /// Number of stored links
    pub fn count(&self) -> StoreResult<i64> {
        self.conn()?
            .query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Distinct tags with the number of links carrying each
    ///
    /// Sorted by count (descending), then name.
    pub fn tags_with_counts(&self) -> StoreResult<Vec<TagCount>> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in self.list_links("")? {
            let unique: HashSet<String> = record.tags_list().into_iter().collect();
            for tag in unique {
                *counts.entry(tag).or_default() += 1;
            }
        }

        let mut tags: Vec<TagCount> = counts
            .into_iter()
            .map(|(name, count)| TagCount { name, count })
            .collect();
        tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        Ok(tags)
    }

    // ==================== Private helpers ====================

    fn conn(&self) -> StoreResult<&Connection> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }

    fn writable_conn(&mut self, operation: &'static str) -> StoreResult<&mut Connection> {
        let conn = self.conn.as_mut().ok_or(StoreError::Closed)?;
        if self.mode == AccessMode::ReadOnly {
            return Err(StoreError::ReadOnly { operation });
        }
        Ok(conn)
    }

    /// Run `f` in its own IMMEDIATE transaction
    fn write<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let conn = self.writable_conn(operation)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// A unit of work on a [`LinkStore`]
///
/// Rolls back on drop unless [`commit`](Self::commit) was called.
pub struct LinkTransaction<'a> {
    tx: Transaction<'a>,
    columns: LinkColumns,
}

impl LinkTransaction<'_> {
    pub fn add_link(
        &self,
        name: &str,
        path: &str,
        tags: &str,
        custom_icon: &str,
    ) -> StoreResult<i64> {
        insert_link(&self.tx, name, path, tags, custom_icon)
    }

    pub fn add(&self, link: &NewLink) -> StoreResult<i64> {
        insert_link(&self.tx, &link.name, &link.path, &link.tags, &link.custom_icon)
    }

    pub fn update_link(&self, id: i64, update: &LinkUpdate) -> StoreResult<bool> {
        if update.is_empty() {
            return Ok(false);
        }
        update_row(&self.tx, id, update)
    }

    pub fn delete_link(&self, id: i64) -> StoreResult<bool> {
        delete_row(&self.tx, id)
    }

    pub fn reorder(&self, ordered_ids: &[i64]) -> StoreResult<()> {
        reorder_rows(&self.tx, ordered_ids)
    }

    /// Reads see the uncommitted writes of this transaction
    pub fn get_by_id(&self, id: i64) -> StoreResult<Option<LinkRecord>> {
        fetch_by_id(&self.tx, self.columns, id)
    }

    pub fn list_links(&self, search: &str) -> StoreResult<Vec<LinkRecord>> {
        let mut builder = QueryBuilder::new();
        builder.simple_search(search);
        run_query(&self.tx, &builder.build_for(self.columns))
    }

    /// Make all writes of this transaction visible
    pub fn commit(self) -> StoreResult<()> {
        self.tx.commit()?;
        debug!("Transaction committed");
        Ok(())
    }

    /// Discard all writes of this transaction
    pub fn rollback(self) -> StoreResult<()> {
        self.tx.rollback()?;
        debug!("Transaction rolled back");
        Ok(())
    }
}

// ==================== Setup ====================

enum SetupError {
    Sqlite(rusqlite::Error),
    MissingSchema,
}

impl From<rusqlite::Error> for SetupError {
    fn from(error: rusqlite::Error) -> Self {
        SetupError::Sqlite(error)
    }
}

/// Apply connection settings and make sure the schema is usable
fn configure(
    conn: &Connection,
    mode: AccessMode,
    busy_timeout: Duration,
) -> Result<LinkColumns, SetupError> {
    conn.busy_timeout(busy_timeout)?;
    register_functions(conn)?;

    match mode {
        AccessMode::ReadWrite => {
            let journal: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!("Journal mode: {}", journal);
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;

            if needs_init(conn) {
                init_schema(conn)?;
            }
            Ok(LinkColumns::Full)
        }
        AccessMode::ReadOnly => {
            if !has_table(conn, "links")? {
                return Err(SetupError::MissingSchema);
            }
            if has_column(conn, "links", "custom_icon")? {
                Ok(LinkColumns::Full)
            } else {
                Ok(LinkColumns::Legacy)
            }
        }
    }
}

// ==================== Statement helpers ====================

fn insert_link(
    conn: &Connection,
    name: &str,
    path: &str,
    tags: &str,
    custom_icon: &str,
) -> StoreResult<i64> {
    require_path(path)?;
    let position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM links",
        [],
        |row| row.get(0),
    )?;
    let added_at = Local::now().format(TIMESTAMP_FORMAT).to_string();

    conn.execute(
        r#"
        INSERT INTO links (name, path, tags, position, added_at, custom_icon)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![name, path, tags, position, added_at, custom_icon],
    )?;

    let id = conn.last_insert_rowid();
    debug!("Added link {} at position {}", id, position);
    Ok(id)
}

fn update_row(conn: &Connection, id: i64, update: &LinkUpdate) -> StoreResult<bool> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<&dyn ToSql> = Vec::new();

    if let Some(name) = &update.name {
        sets.push("name = ?");
        values.push(name);
    }
    if let Some(path) = &update.path {
        require_path(path)?;
        sets.push("path = ?");
        values.push(path);
    }
    if let Some(tags) = &update.tags {
        sets.push("tags = ?");
        values.push(tags);
    }
    if let Some(icon) = &update.custom_icon {
        sets.push("custom_icon = ?");
        values.push(icon);
    }
    if sets.is_empty() {
        return Ok(false);
    }
    values.push(&id);

    let sql = format!("UPDATE links SET {} WHERE id = ?", sets.join(", "));
    let changed = conn.execute(&sql, values.as_slice())?;
    debug!("Updated link {} ({} row(s))", id, changed);
    Ok(changed > 0)
}

/// Reject blank paths; migrated tables have no CHECK constraint for this
fn require_path(path: &str) -> StoreResult<()> {
    if path.trim().is_empty() {
        return Err(StoreError::EmptyPath);
    }
    Ok(())
}

fn delete_row(conn: &Connection, id: i64) -> StoreResult<bool> {
    let changed = conn.execute("DELETE FROM links WHERE id = ?1", params![id])?;
    debug!("Deleted link {} ({} row(s))", id, changed);
    Ok(changed > 0)
}

fn reorder_rows(conn: &Connection, ordered_ids: &[i64]) -> StoreResult<()> {
    let existing: HashSet<i64> = conn
        .prepare("SELECT id FROM links")?
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    let mut seen = HashSet::with_capacity(ordered_ids.len());
    for id in ordered_ids {
        if !existing.contains(id) {
            return Err(StoreError::InvalidReorder {
                reason: format!("unknown link id {}", id),
            });
        }
        if !seen.insert(*id) {
            return Err(StoreError::InvalidReorder {
                reason: format!("link id {} appears more than once", id),
            });
        }
    }
    if seen.len() != existing.len() {
        return Err(StoreError::InvalidReorder {
            reason: format!(
                "expected all {} link ids, got {}",
                existing.len(),
                seen.len()
            ),
        });
    }

    let mut stmt = conn.prepare("UPDATE links SET position = ?1 WHERE id = ?2")?;
    for (position, id) in ordered_ids.iter().enumerate() {
        stmt.execute(params![position as i64, id])?;
    }
    debug!("Reordered {} link(s)", ordered_ids.len());
    Ok(())
}

fn fetch_by_id(
    conn: &Connection,
    columns: LinkColumns,
    id: i64,
) -> StoreResult<Option<LinkRecord>> {
    let sql = format!("SELECT {} FROM links WHERE id = ?1", columns.select_list());
    conn.query_row(&sql, params![id], row_to_record)
        .optional()
        .map_err(Into::into)
}

fn run_query(conn: &Connection, query: &BuiltQuery) -> StoreResult<Vec<LinkRecord>> {
    let mut stmt = conn.prepare(&query.sql)?;
    let rows = stmt.query_map(params_from_iter(query.params.iter()), row_to_record)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Into::into)
}

/// Map a row selected with `LINK_COLUMNS` to a record
fn row_to_record(row: &Row<'_>) -> rusqlite::Result<LinkRecord> {
    Ok(LinkRecord::new(
        row.get(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get::<_, String>(6)?,
    ))
}
