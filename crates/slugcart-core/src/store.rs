//! SQLite-backed slug cache.
//!
//! Stores serialized (optionally lz4-compressed) name maps keyed by
//! `(sha256(name), language_id)`. Entries carry an absolute expiry; expired
//! rows are deleted on observation, plus a best-effort bulk sweep callers
//! may run at startup. Multiple processes may race to populate the same key;
//! the upsert is atomic and last-writer-wins, so a race never produces a
//! duplicate row or an error.

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special
/// chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Current time as Unix seconds (for expiry stamps).
fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Hex digest identifying a cache entry independent of name length.
fn cache_id(name: &str) -> String {
    hex::encode(Sha256::digest(name.as_bytes()))
}

/// Handle to the SQLite-backed slug cache.
#[derive(Clone)]
pub struct CacheStore {
    pool: Pool<Sqlite>,
}

impl CacheStore {
    /// Open (or create) the default cache database under the XDG state
    /// directory and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("slugcart")?;
        let state_dir = xdg_dirs.get_state_home().join("slugcart");
        let db_path = state_dir.join("cache.db");

        tokio::fs::create_dir_all(&state_dir).await?;

        let uri = path_to_sqlite_uri(&db_path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;

        let store = CacheStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Open (or create) the database at a specific path. Creates parent dirs
    /// if needed. Intended for tests and the CLI.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;
        let store = CacheStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Open an in-memory store (no disk I/O).
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = CacheStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS slug_cache (
                cache_id TEXT NOT NULL,
                language_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                data BLOB NOT NULL,
                global INTEGER NOT NULL DEFAULT 0,
                compressed INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                PRIMARY KEY (cache_id, language_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Upsert a cache entry.
    ///
    /// Serializes `value`, optionally compresses it, and writes it under
    /// `(sha256(name), language_id)`. Concurrent writers to the same key are
    /// resolved by the database (last writer wins); the call never fails on
    /// a key conflict.
    pub async fn put<T: Serialize>(
        &self,
        name: &str,
        language_id: i64,
        value: &T,
        ttl: Duration,
        global: bool,
        compress: bool,
    ) -> Result<()> {
        let mut data = serde_json::to_vec(value)?;
        if compress {
            data = lz4::block::compress(&data, None, true)?;
        }

        let now = unix_timestamp();
        let expires = now + ttl.as_secs() as i64;

        sqlx::query(
            r#"
            INSERT INTO slug_cache (
                cache_id, language_id, name, data,
                global, compressed, created_at, expires_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (cache_id, language_id) DO UPDATE SET
                name = excluded.name,
                data = excluded.data,
                global = excluded.global,
                compressed = excluded.compressed,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(cache_id(name))
        .bind(language_id)
        .bind(name)
        .bind(data)
        .bind(global as i64)
        .bind(compress as i64)
        .bind(now)
        .bind(expires)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch and deserialize a cache entry.
    ///
    /// Returns `Ok(None)` on a miss, on an expired row (which is deleted),
    /// and on a corrupt payload (also deleted, with a warning). Corruption
    /// is never an error to the caller; the cache degrades to a miss.
    pub async fn get<T: DeserializeOwned>(
        &self,
        name: &str,
        language_id: i64,
    ) -> Result<Option<T>> {
        let id = cache_id(name);
        let row = sqlx::query(
            r#"
            SELECT data, compressed, expires_at
              FROM slug_cache
             WHERE cache_id = ?1 AND language_id = ?2
            "#,
        )
        .bind(&id)
        .bind(language_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at: i64 = row.get("expires_at");
        if expires_at <= unix_timestamp() {
            self.delete(&id, language_id).await?;
            return Ok(None);
        }

        let data: Vec<u8> = row.get("data");
        let compressed: i64 = row.get("compressed");
        match decode(&data, compressed != 0) {
            Some(value) => Ok(Some(value)),
            None => {
                tracing::warn!(name, language_id, "corrupt cache payload, treating as miss");
                self.delete(&id, language_id).await?;
                Ok(None)
            }
        }
    }

    /// Load every fresh global entry for a language, keyed by entry name.
    ///
    /// Used for bulk pre-warm: one query pulls all consolidated per-kind
    /// payloads. Expired and corrupt rows are skipped (and deleted).
    pub async fn load_global(&self, language_id: i64) -> Result<HashMap<String, Vec<u8>>> {
        let rows = sqlx::query(
            r#"
            SELECT cache_id, name, data, compressed, expires_at
              FROM slug_cache
             WHERE language_id = ?1 AND global = 1
            "#,
        )
        .bind(language_id)
        .fetch_all(&self.pool)
        .await?;

        let now = unix_timestamp();
        let mut entries = HashMap::new();
        for row in rows {
            let id: String = row.get("cache_id");
            let name: String = row.get("name");
            let expires_at: i64 = row.get("expires_at");
            if expires_at <= now {
                self.delete(&id, language_id).await?;
                continue;
            }
            let data: Vec<u8> = row.get("data");
            let compressed: i64 = row.get("compressed");
            match inflate(&data, compressed != 0) {
                Some(payload) => {
                    entries.insert(name, payload);
                }
                None => {
                    tracing::warn!(name, "corrupt global cache payload, skipping");
                    self.delete(&id, language_id).await?;
                }
            }
        }
        Ok(entries)
    }

    /// Delete all rows whose expiry has passed. Best-effort optimization;
    /// readers also check expiry themselves. Returns the rows removed.
    pub async fn invalidate_expired(&self) -> Result<u64> {
        let r = sqlx::query("DELETE FROM slug_cache WHERE expires_at <= ?1")
            .bind(unix_timestamp())
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    /// Unconditionally remove every stored entry (the admin "cache reset").
    pub async fn clear(&self) -> Result<u64> {
        let r = sqlx::query("DELETE FROM slug_cache")
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    async fn delete(&self, id: &str, language_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM slug_cache WHERE cache_id = ?1 AND language_id = ?2")
            .bind(id)
            .bind(language_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Decompress (when flagged) without deserializing.
fn inflate(data: &[u8], compressed: bool) -> Option<Vec<u8>> {
    if compressed {
        lz4::block::decompress(data, None).ok()
    } else {
        Some(data.to_vec())
    }
}

/// Decompress (when flagged) and deserialize; `None` means corrupt.
fn decode<T: DeserializeOwned>(data: &[u8], compressed: bool) -> Option<T> {
    let raw = inflate(data, compressed)?;
    serde_json::from_slice(&raw).ok()
}

/// Deserialize a payload returned by [`CacheStore::load_global`].
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Option<T> {
    serde_json::from_slice(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample() -> HashMap<i64, String> {
        HashMap::from([(42, "running-shoe".to_string()), (7, "sandal".to_string())])
    }

    #[tokio::test]
    async fn put_get_roundtrip_compressed_and_plain() {
        let store = CacheStore::open_memory().await.unwrap();
        let ttl = Duration::from_secs(3600);

        store.put("products", 1, &sample(), ttl, false, true).await.unwrap();
        store.put("plain", 1, &sample(), ttl, false, false).await.unwrap();

        let compressed: HashMap<i64, String> = store.get("products", 1).await.unwrap().unwrap();
        let plain: HashMap<i64, String> = store.get("plain", 1).await.unwrap().unwrap();
        assert_eq!(compressed, sample());
        assert_eq!(plain, sample());
    }

    #[tokio::test]
    async fn open_at_creates_parents_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        // Space in the directory name exercises the URI encoding.
        let path = dir.path().join("state dir").join("cache.db");

        let store = CacheStore::open_at(&path).await.unwrap();
        store
            .put("products", 1, &sample(), Duration::from_secs(3600), false, true)
            .await
            .unwrap();
        drop(store);

        let store = CacheStore::open_at(&path).await.unwrap();
        let got: HashMap<i64, String> = store.get("products", 1).await.unwrap().unwrap();
        assert_eq!(got, sample());
    }

    #[tokio::test]
    async fn miss_for_unknown_name_and_other_language() {
        let store = CacheStore::open_memory().await.unwrap();
        store
            .put("products", 1, &sample(), Duration::from_secs(60), false, true)
            .await
            .unwrap();

        let miss: Option<HashMap<i64, String>> = store.get("nothing", 1).await.unwrap();
        assert!(miss.is_none());
        let other_lang: Option<HashMap<i64, String>> = store.get("products", 2).await.unwrap();
        assert!(other_lang.is_none());
    }

    #[tokio::test]
    async fn expired_entry_is_deleted_on_read() {
        let store = CacheStore::open_memory().await.unwrap();
        store
            .put("products", 1, &sample(), Duration::from_secs(0), false, true)
            .await
            .unwrap();

        let got: Option<HashMap<i64, String>> = store.get("products", 1).await.unwrap();
        assert!(got.is_none());
        // The lazy delete already removed the row, so the sweep finds nothing.
        assert_eq!(store.invalidate_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn invalidate_expired_sweeps_only_stale_rows() {
        let store = CacheStore::open_memory().await.unwrap();
        store
            .put("old", 1, &sample(), Duration::from_secs(0), false, false)
            .await
            .unwrap();
        store
            .put("fresh", 1, &sample(), Duration::from_secs(3600), false, false)
            .await
            .unwrap();

        assert_eq!(store.invalidate_expired().await.unwrap(), 1);
        let fresh: Option<HashMap<i64, String>> = store.get("fresh", 1).await.unwrap();
        assert!(fresh.is_some());
    }

    #[tokio::test]
    async fn upsert_last_writer_wins_single_row() {
        let store = CacheStore::open_memory().await.unwrap();
        let ttl = Duration::from_secs(3600);

        let v1 = HashMap::from([(1i64, "one".to_string())]);
        let v2 = HashMap::from([(2i64, "two".to_string())]);
        let (a, b) = tokio::join!(
            store.put("products", 1, &v1, ttl, true, true),
            store.put("products", 1, &v2, ttl, true, true),
        );
        a.unwrap();
        b.unwrap();

        let got: HashMap<i64, String> = store.get("products", 1).await.unwrap().unwrap();
        assert!(got == v1 || got == v2, "must be exactly one of the written values");

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM slug_cache")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn corrupt_payload_degrades_to_miss() {
        let store = CacheStore::open_memory().await.unwrap();
        let now = unix_timestamp();
        // A row claiming compression whose payload is garbage.
        sqlx::query(
            "INSERT INTO slug_cache (cache_id, language_id, name, data, global, compressed, created_at, expires_at)
             VALUES (?1, 1, 'products', x'deadbeef', 0, 1, ?2, ?3)",
        )
        .bind(cache_id("products"))
        .bind(now)
        .bind(now + 3600)
        .execute(&store.pool)
        .await
        .unwrap();

        let got: Option<HashMap<i64, String>> = store.get("products", 1).await.unwrap();
        assert!(got.is_none());
        // The corrupt row is gone; a later put starts clean.
        store
            .put("products", 1, &sample(), Duration::from_secs(60), false, true)
            .await
            .unwrap();
        let got: Option<HashMap<i64, String>> = store.get("products", 1).await.unwrap();
        assert_eq!(got.unwrap(), sample());
    }

    #[tokio::test]
    async fn load_global_returns_only_global_rows() {
        let store = CacheStore::open_memory().await.unwrap();
        let ttl = Duration::from_secs(3600);
        store.put("products", 1, &sample(), ttl, true, true).await.unwrap();
        store.put("scratch", 1, &sample(), ttl, false, true).await.unwrap();
        store.put("stale", 1, &sample(), Duration::from_secs(0), true, true).await.unwrap();

        let entries = store.load_global(1).await.unwrap();
        assert_eq!(entries.len(), 1);
        let payload = entries.get("products").unwrap();
        let decoded: HashMap<i64, String> = decode_payload(payload).unwrap();
        assert_eq!(decoded, sample());
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let store = CacheStore::open_memory().await.unwrap();
        let ttl = Duration::from_secs(3600);
        store.put("a", 1, &sample(), ttl, false, false).await.unwrap();
        store.put("b", 2, &sample(), ttl, true, true).await.unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        let got: Option<HashMap<i64, String>> = store.get("a", 1).await.unwrap();
        assert!(got.is_none());
    }
}
