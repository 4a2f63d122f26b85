//! Postgres storage implementation
//!
//! Client-server counterpart of the SQLite store. Info is kept as JSONB.

use crate::storage::schema::postgres_schema;
use crate::storage::traits::{RecordStore, StorageResult};
use crate::storage::{distinct_urls, InfoFilter, Item, StorageError};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use std::collections::HashSet;

/// Client-server record store backed by a Postgres pool
pub struct PostgresStore {
    pool: PgPool,
    table: String,
}

impl PostgresStore {
    /// Connects to the database and creates the items table if missing
    pub async fn connect(url: &str, table: &str) -> StorageResult<Self> {
        let pool = PgPoolOptions::new().max_connections(2).connect(url).await?;
        Self::with_pool(pool, table).await
    }

    /// Wraps an existing pool
    pub async fn with_pool(pool: PgPool, table: &str) -> StorageResult<Self> {
        sqlx::query(&postgres_schema(table)).execute(&pool).await?;
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    /// Inserts bare URLs, then URL+info pairs, in a single transaction
    async fn write_batch(&self, urls: &[String], pairs: &[(String, Value)]) -> StorageResult<u64> {
        let urls = distinct_urls(urls.iter().map(String::as_str));
        let mut seen = HashSet::new();
        let rows: Vec<_> = pairs
            .iter()
            .map(|(url, info)| (url.trim(), info))
            .filter(|(url, _)| !url.is_empty() && seen.insert(*url))
            .collect();
        if urls.is_empty() && rows.is_empty() {
            return Ok(0);
        }

        let url_sql = format!(
            "INSERT INTO {} (url) VALUES ($1) ON CONFLICT (url) DO NOTHING",
            self.table
        );
        let pair_sql = format!(
            "INSERT INTO {} (url, info) VALUES ($1, $2) ON CONFLICT (url) DO NOTHING",
            self.table
        );

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for url in urls {
            inserted += sqlx::query(&url_sql)
                .bind(url)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        for (url, info) in rows {
            inserted += sqlx::query(&pair_sql)
                .bind(url)
                .bind(Json(info))
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }

    fn decode(row: PgRow) -> StorageResult<Item> {
        let info: Option<Json<Value>> = row.try_get("info")?;
        Ok(Item {
            id: row.try_get("id")?,
            url: row.try_get("url")?,
            info: info.map(|json| json.0),
        })
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn upsert_urls(&self, urls: &[String]) -> StorageResult<u64> {
        self.write_batch(urls, &[]).await
    }

    async fn upsert_url_info_pairs(&self, pairs: &[(String, Value)]) -> StorageResult<u64> {
        self.write_batch(&[], pairs).await
    }

    async fn persist_page(&self, urls: &[String], pairs: &[(String, Value)]) -> StorageResult<u64> {
        self.write_batch(urls, pairs).await
    }

    async fn items_by_enrichment_state(&self, filter: InfoFilter) -> StorageResult<Vec<Item>> {
        let sql = format!(
            "SELECT id, url, info FROM {}{} ORDER BY id",
            self.table,
            filter.where_clause()
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::decode).collect()
    }

    async fn set_info(&self, id: i64, info: &Value) -> StorageResult<()> {
        let sql = format!("UPDATE {} SET info = $1 WHERE id = $2", self.table);
        let result = sqlx::query(&sql)
            .bind(Json(info))
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ItemNotFound(id));
        }
        Ok(())
    }

    async fn item(&self, id: i64) -> StorageResult<Option<Item>> {
        let sql = format!("SELECT id, url, info FROM {} WHERE id = $1", self.table);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::decode).transpose()
    }

    async fn count(&self, filter: InfoFilter) -> StorageResult<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            self.table,
            filter.where_clause()
        );
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    async fn clear(&self) -> StorageResult<u64> {
        let sql = format!("DELETE FROM {}", self.table);
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
