//! Table definitions for the record store backends
//!
//! Table names come from validated configuration and are interpolated
//! directly; every value goes through bound parameters.

/// SQLite schema for an items table
pub fn sqlite_schema(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    info TEXT
);

CREATE INDEX IF NOT EXISTS idx_{table}_info_null ON {table}(id) WHERE info IS NULL;
"#
    )
}

/// Postgres schema for an items table
pub fn postgres_schema(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id BIGSERIAL PRIMARY KEY,
    url TEXT NOT NULL UNIQUE,
    info JSONB
)
"#
    )
}

/// Initializes the SQLite schema
pub fn initialize_sqlite(conn: &rusqlite::Connection, table: &str) -> Result<(), rusqlite::Error> {
    conn.execute_batch(&sqlite_schema(table))?;
    Ok(())
}
