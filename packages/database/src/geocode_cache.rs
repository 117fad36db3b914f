//! Geocoding result cache stored in `DuckDB`.
//!
//! Shared across every map preview run. Only successful geocodes are
//! stored; each row maps a cache key (`geocode:v1:<lower-cased query>`)
//! to the JSON-encoded `{lat, lon}` point. Entries never expire.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use duckdb::Connection;
use fire_portal_geocoder::GeocodeCache;
use fire_portal_geography_models::GeoPoint;

use crate::DbError;

/// Geocode cache backed by a single `DuckDB` connection.
///
/// `duckdb::Connection` is `Send` but not `Sync`, so it is wrapped in a
/// `Mutex`.
pub struct DuckDbGeocodeCache {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for DuckDbGeocodeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbGeocodeCache").finish_non_exhaustive()
    }
}

impl DuckDbGeocodeCache {
    /// Opens (or creates) the geocode cache `DuckDB` at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the directory, connection, or schema creation
    /// fails.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }

        Self::from_connection(Connection::open(path)?)
    }

    /// Opens the geocode cache at the default path.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open_default() -> Result<Self, DbError> {
        Self::open(&crate::paths::geocode_cache_db_path())
    }

    /// Opens a throwaway in-memory cache.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up the cached point for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or the stored value is not a
    /// valid point.
    pub fn lookup(&self, key: &str) -> Result<Option<GeoPoint>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT value FROM geocode_cache WHERE cache_key = ?")?;
        let mut rows = stmt.query(duckdb::params![key])?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let value: String = row.get(0)?;
        let point: GeoPoint =
            serde_json::from_str(&value).map_err(|e| DbError::Conversion {
                message: format!("Invalid cached point for '{key}': {e}"),
            })?;

        Ok(Some(point))
    }

    /// Inserts or replaces the point stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if serialization or the upsert fails.
    pub fn insert(&self, key: &str, point: GeoPoint) -> Result<(), DbError> {
        let value = serde_json::to_string(&point).map_err(|e| DbError::Conversion {
            message: format!("Failed to encode point for '{key}': {e}"),
        })?;

        self.conn().execute(
            "INSERT INTO geocode_cache (cache_key, value)
             VALUES (?, ?)
             ON CONFLICT (cache_key) DO UPDATE SET
                value = excluded.value,
                created_at = CURRENT_TIMESTAMP",
            duckdb::params![key, value],
        )?;

        Ok(())
    }

    /// Number of cached entries.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn len(&self) -> Result<u64, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT COUNT(*) FROM geocode_cache")?;
        let mut rows = stmt.query([])?;

        let count: i64 = match rows.next()? {
            Some(row) => row.get(0)?,
            None => 0,
        };

        u64::try_from(count).map_err(|e| DbError::Conversion {
            message: format!("Negative cache count {count}: {e}"),
        })
    }

    /// Returns `true` if nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn is_empty(&self) -> Result<bool, DbError> {
        Ok(self.len()? == 0)
    }

    /// Removes every entry, returning how many were deleted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the delete fails.
    pub fn clear(&self) -> Result<usize, DbError> {
        let removed = self.conn().execute("DELETE FROM geocode_cache", [])?;
        log::info!("Cleared {removed} geocode cache entries");
        Ok(removed)
    }
}

impl GeocodeCache for DuckDbGeocodeCache {
    fn get(&self, key: &str) -> Option<GeoPoint> {
        self.lookup(key)
            .inspect_err(|e| log::warn!("Geocode cache read failed for '{key}': {e}"))
            .ok()
            .flatten()
    }

    fn put(&self, key: &str, point: GeoPoint) {
        if let Err(e) = self.insert(key, point) {
            log::warn!("Geocode cache write failed for '{key}': {e}");
        }
    }
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS geocode_cache (
            cache_key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        );",
    )?;
    Ok(())
}
