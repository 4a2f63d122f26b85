//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordStore trait.

use crate::storage::schema::initialize_sqlite;
use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use crate::storage::{distinct_urls, InfoFilter, Item};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Embedded file-based record store
pub struct SqliteStore {
    conn: Mutex<Connection>,
    table: String,
}

/// A row before its info text is decoded
type RawItem = (i64, String, Option<String>);

impl SqliteStore {
    /// Opens or creates a database file and the items table inside it
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `table` - Name of the items table (already validated as an identifier)
    pub fn open(path: &Path, table: &str) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_sqlite(&conn, table)?;

        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory(table: &str) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_sqlite(&conn, table)?;
        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection lock poisoned".to_string()))
    }

    /// Inserts bare URLs, then URL+info pairs, in a single transaction
    fn write_batch(&self, urls: &[String], pairs: &[(String, Value)]) -> StorageResult<u64> {
        let urls = distinct_urls(urls.iter().map(String::as_str));

        // Serialize up front so a bad payload never leaves a half-written page
        let mut rows = Vec::with_capacity(pairs.len());
        let mut seen = HashSet::new();
        for (url, info) in pairs {
            let url = url.trim();
            if url.is_empty() || !seen.insert(url) {
                continue;
            }
            rows.push((url, serde_json::to_string(info)?));
        }
        if urls.is_empty() && rows.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        if !urls.is_empty() {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR IGNORE INTO {} (url) VALUES (?1)",
                self.table
            ))?;
            for url in urls {
                inserted += stmt.execute(params![url])? as u64;
            }
        }
        if !rows.is_empty() {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR IGNORE INTO {} (url, info) VALUES (?1, ?2)",
                self.table
            ))?;
            for (url, info) in &rows {
                inserted += stmt.execute(params![url, info])? as u64;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    fn decode(raw: RawItem) -> StorageResult<Item> {
        let (id, url, info) = raw;
        let info = match info {
            Some(text) => Some(
                serde_json::from_str(&text)
                    .map_err(|source| StorageError::CorruptInfo { id, source })?,
            ),
            None => None,
        };
        Ok(Item { id, url, info })
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn upsert_urls(&self, urls: &[String]) -> StorageResult<u64> {
        self.write_batch(urls, &[])
    }

    async fn upsert_url_info_pairs(&self, pairs: &[(String, Value)]) -> StorageResult<u64> {
        self.write_batch(&[], pairs)
    }

    async fn persist_page(&self, urls: &[String], pairs: &[(String, Value)]) -> StorageResult<u64> {
        self.write_batch(urls, pairs)
    }

    async fn items_by_enrichment_state(&self, filter: InfoFilter) -> StorageResult<Vec<Item>> {
        let raw = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT id, url, info FROM {}{} ORDER BY id",
                self.table,
                filter.where_clause()
            ))?;

            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<Result<Vec<RawItem>, _>>()?;
            rows
        };

        raw.into_iter().map(Self::decode).collect()
    }

    async fn set_info(&self, id: i64, info: &Value) -> StorageResult<()> {
        let text = serde_json::to_string(info)?;
        let conn = self.lock()?;
        let updated = conn.execute(
            &format!("UPDATE {} SET info = ?1 WHERE id = ?2", self.table),
            params![text, id],
        )?;

        if updated == 0 {
            return Err(StorageError::ItemNotFound(id));
        }
        Ok(())
    }

    async fn item(&self, id: i64) -> StorageResult<Option<Item>> {
        let raw: Option<RawItem> = {
            let conn = self.lock()?;
            conn.query_row(
                &format!("SELECT id, url, info FROM {} WHERE id = ?1", self.table),
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
        };

        raw.map(Self::decode).transpose()
    }

    async fn count(&self, filter: InfoFilter) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {}{}",
                self.table,
                filter.where_clause()
            ),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    async fn clear(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let deleted = conn.execute(&format!("DELETE FROM {}", self.table), [])?;
        Ok(deleted as u64)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
