//! SQLite schema for the link store
//!
//! A single `links` table holds every record. Databases created before the
//! `custom_icon` column existed are upgraded in place with an additive
//! `ALTER TABLE`.

use rusqlite::{Connection, Result};

/// Current schema version
///
/// - 1: `links` table
/// - 2: `custom_icon` column
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema and apply pending migrations
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            path TEXT NOT NULL CHECK (path <> ''),
            tags TEXT,
            position INTEGER NOT NULL,
            added_at TEXT NOT NULL,
            custom_icon TEXT
        );

        -- Listing is always ordered by position
        CREATE INDEX IF NOT EXISTS idx_links_position ON links(position);
        "#,
    )?;

    migrate(conn)?;

    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Bring an older `links` table up to the current layout
fn migrate(conn: &Connection) -> Result<()> {
    if !has_column(conn, "links", "custom_icon")? {
        tracing::info!("Migrating links table: adding custom_icon column");
        conn.execute_batch("ALTER TABLE links ADD COLUMN custom_icon TEXT;")?;
    }
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    if !has_table(conn, "schema_info")? {
        return Ok(None);
    }

    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}

/// Check whether a table exists
pub fn has_table(conn: &Connection, table: &str) -> Result<bool> {
    conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")?
        .exists([table])
}

/// Check whether a table has the given column
pub fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    conn.prepare("SELECT 1 FROM pragma_table_info(?) WHERE name = ?")?
        .exists([table, column])
}
