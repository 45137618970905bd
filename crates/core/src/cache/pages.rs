//! Cached page CRUD operations.
//!
//! One row per page ID, value = the serialized (post-rewrite) record map.
//! `put_page` uses UPSERT semantics; there is no expiry.

use super::connection::CacheDb;
use crate::Error;
use async_trait::async_trait;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A persisted page entry.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub page_id: String,
    pub record_map: String,
    pub cached_at: String,
}

/// Abstract key/value store for serialized page snapshots.
///
/// Keys are opaque page IDs; values are serialized record maps. The
/// reconciler only depends on this seam, so tests can swap in an in-memory
/// fake.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read the serialized record map for a page, if cached.
    async fn get(&self, page_id: &str) -> Result<Option<String>, Error>;

    /// Insert or overwrite the serialized record map for a page.
    async fn put(&self, page_id: &str, record_map: &str) -> Result<(), Error>;
}

impl CacheDb {
    /// Insert or update a cached page.
    pub async fn put_page(&self, page_id: &str, record_map: &str) -> Result<(), Error> {
        let page_id = page_id.to_string();
        let record_map = record_map.to_string();
        let cached_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO pages (page_id, record_map, cached_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(page_id) DO UPDATE SET
                        record_map = excluded.record_map,
                        cached_at = excluded.cached_at",
                    params![page_id, record_map, cached_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a cached page by ID.
    ///
    /// Returns None if the page ID doesn't exist in the cache.
    pub async fn get_page(&self, page_id: &str) -> Result<Option<CachedEntry>, Error> {
        let page_id = page_id.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedEntry>, Error> {
                let result = conn.query_row(
                    "SELECT page_id, record_map, cached_at FROM pages WHERE page_id = ?1",
                    params![page_id],
                    |row| {
                        Ok(CachedEntry { page_id: row.get(0)?, record_map: row.get(1)?, cached_at: row.get(2)? })
                    },
                );

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl CacheStore for CacheDb {
    async fn get(&self, page_id: &str) -> Result<Option<String>, Error> {
        Ok(self.get_page(page_id).await?.map(|entry| entry.record_map))
    }

    async fn put(&self, page_id: &str, record_map: &str) -> Result<(), Error> {
        self.put_page(page_id, record_map).await
    }
}
