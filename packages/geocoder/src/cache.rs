//! Geocode cache abstraction.
//!
//! The cache maps a cache key (see [`crate::address::cache_key`]) to a
//! resolved point. Entries never expire: an address's coordinates are
//! assumed stable, so stale entries persist until the store is cleared.
//! Backends swallow their own failures (a failed read is a miss, a failed
//! write is dropped) so a broken cache never breaks geocoding.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use fire_portal_geography_models::GeoPoint;

/// A keyed point store shared across pipeline runs.
pub trait GeocodeCache: Send + Sync {
    /// Returns the cached point for `key`, if any.
    fn get(&self, key: &str) -> Option<GeoPoint>;

    /// Stores `point` under `key`, replacing any previous value.
    fn put(&self, key: &str, point: GeoPoint);
}

/// In-process cache backed by a `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemoryGeocodeCache {
    entries: Mutex<BTreeMap<String, GeoPoint>>,
}

impl MemoryGeocodeCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GeocodeCache for MemoryGeocodeCache {
    fn get(&self, key: &str) -> Option<GeoPoint> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }

    fn put(&self, key: &str, point: GeoPoint) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), point);
    }
}
