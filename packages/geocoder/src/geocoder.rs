//! Cache-fronted, cancellable geocoder.

use std::sync::Arc;

use fire_portal_geography_models::GeoPoint;
use tokio_util::sync::CancellationToken;

use crate::address::cache_key;
use crate::cache::GeocodeCache;
use crate::GeocodeProvider;

/// Outcome of a single [`Geocoder::lookup`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup {
    /// The query was blank; nothing was attempted.
    Empty,
    /// Served from the cache without a network call.
    Cached(GeoPoint),
    /// Resolved by the provider and written to the cache.
    Resolved(GeoPoint),
    /// The provider answered with no match.
    NoMatch,
    /// The request failed (network error, bad status, bad body).
    Failed,
    /// The cancellation token fired before an answer arrived.
    Cancelled,
}

impl Lookup {
    /// The resolved point, if any.
    #[must_use]
    pub const fn point(&self) -> Option<GeoPoint> {
        match self {
            Self::Cached(point) | Self::Resolved(point) => Some(*point),
            Self::Empty | Self::NoMatch | Self::Failed | Self::Cancelled => None,
        }
    }

    /// Returns `true` if the lookup sent a request to the provider and got
    /// an answer (or an error) back. Used by callers to decide whether the
    /// rate-limit pause applies.
    #[must_use]
    pub const fn reached_network(&self) -> bool {
        matches!(self, Self::Resolved(_) | Self::NoMatch | Self::Failed)
    }
}

/// Geocoder combining a provider with a shared cache.
#[derive(Clone)]
pub struct Geocoder {
    provider: Arc<dyn GeocodeProvider>,
    cache: Arc<dyn GeocodeCache>,
}

impl std::fmt::Debug for Geocoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Geocoder")
            .field("provider", &self.provider.id())
            .finish_non_exhaustive()
    }
}

impl Geocoder {
    /// Creates a geocoder over `provider`, reading and writing `cache`.
    #[must_use]
    pub fn new(provider: Arc<dyn GeocodeProvider>, cache: Arc<dyn GeocodeCache>) -> Self {
        Self { provider, cache }
    }

    /// The shared cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn GeocodeCache> {
        &self.cache
    }

    /// Resolves `query`, consulting the cache first.
    ///
    /// Cache hits never touch the network. On a miss the provider request
    /// races `cancel`; if the token fires first the request future is
    /// dropped (aborting it) and [`Lookup::Cancelled`] is returned. A
    /// successful answer is written through to the cache under the
    /// lower-cased query.
    pub async fn lookup(&self, query: &str, cancel: &CancellationToken) -> Lookup {
        let query = query.trim();
        if query.is_empty() {
            return Lookup::Empty;
        }

        if cancel.is_cancelled() {
            return Lookup::Cancelled;
        }

        let key = cache_key(query);
        if let Some(point) = self.cache.get(&key) {
            log::debug!("Geocode cache hit for '{query}'");
            return Lookup::Cached(point);
        }

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                log::debug!("Geocode request for '{query}' cancelled");
                return Lookup::Cancelled;
            }
            result = self.provider.search(query) => result,
        };

        match result {
            Ok(Some(point)) => {
                self.cache.put(&key, point);
                Lookup::Resolved(point)
            }
            Ok(None) => {
                log::debug!("{}: no match for '{query}'", self.provider.id());
                Lookup::NoMatch
            }
            Err(e) => {
                log::warn!("{} error for '{query}': {e}", self.provider.id());
                Lookup::Failed
            }
        }
    }

    /// Resolves `query` to a point, or `None` if it is blank, unmatched,
    /// failed, or cancelled.
    pub async fn geocode(&self, query: &str, cancel: &CancellationToken) -> Option<GeoPoint> {
        self.lookup(query, cancel).await.point()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::cache::MemoryGeocodeCache;
    use crate::GeocodeError;

    /// Provider answering from a fixed table and counting calls.
    struct TableProvider {
        points: BTreeMap<String, GeoPoint>,
        rate_limited: Vec<String>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl TableProvider {
        fn new(points: &[(&str, GeoPoint)]) -> Self {
            Self {
                points: points
                    .iter()
                    .map(|(q, p)| ((*q).to_string(), *p))
                    .collect(),
                rate_limited: Vec::new(),
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl GeocodeProvider for TableProvider {
        fn id(&self) -> &str {
            "table"
        }

        async fn search(&self, query: &str) -> Result<Option<GeoPoint>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.rate_limited.iter().any(|q| q == query) {
                return Err(GeocodeError::RateLimited);
            }
            Ok(self.points.get(query).copied())
        }
    }

    const MAIN_ST: &str = "123 Main St, Anytown, ST";

    fn geocoder(provider: &Arc<TableProvider>) -> Geocoder {
        Geocoder::new(provider.clone(), Arc::new(MemoryGeocodeCache::new()))
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let provider = Arc::new(TableProvider::new(&[(MAIN_ST, GeoPoint::new(40.1, -75.2))]));
        let geocoder = geocoder(&provider);
        let cancel = CancellationToken::new();

        let first = geocoder.lookup(MAIN_ST, &cancel).await;
        let second = geocoder.lookup(MAIN_ST, &cancel).await;

        assert_eq!(first, Lookup::Resolved(GeoPoint::new(40.1, -75.2)));
        assert_eq!(second, Lookup::Cached(GeoPoint::new(40.1, -75.2)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_lookup_ignores_case() {
        let provider = Arc::new(TableProvider::new(&[(MAIN_ST, GeoPoint::new(40.1, -75.2))]));
        let geocoder = geocoder(&provider);
        let cancel = CancellationToken::new();

        geocoder.geocode(MAIN_ST, &cancel).await;
        let upper = geocoder.lookup(&MAIN_ST.to_uppercase(), &cancel).await;

        assert_eq!(upper, Lookup::Cached(GeoPoint::new(40.1, -75.2)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_query_is_not_sent() {
        let provider = Arc::new(TableProvider::new(&[]));
        let geocoder = geocoder(&provider);

        let lookup = geocoder.lookup("   ", &CancellationToken::new()).await;

        assert_eq!(lookup, Lookup::Empty);
        assert!(!lookup.reached_network());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failures_are_swallowed_and_not_cached() {
        let mut table = TableProvider::new(&[(MAIN_ST, GeoPoint::new(40.1, -75.2))]);
        table.rate_limited.push(MAIN_ST.to_string());
        let provider = Arc::new(table);
        let geocoder = geocoder(&provider);
        let cancel = CancellationToken::new();

        assert_eq!(geocoder.lookup(MAIN_ST, &cancel).await, Lookup::Failed);
        assert_eq!(geocoder.lookup(MAIN_ST, &cancel).await, Lookup::Failed);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unmatched_address_yields_none() {
        let provider = Arc::new(TableProvider::new(&[]));
        let geocoder = geocoder(&provider);

        let lookup = geocoder.lookup("1 Nowhere Rd", &CancellationToken::new()).await;

        assert_eq!(lookup, Lookup::NoMatch);
        assert!(lookup.reached_network());
        assert!(lookup.point().is_none());
    }

    #[tokio::test]
    async fn already_cancelled_token_skips_request() {
        let provider = Arc::new(TableProvider::new(&[(MAIN_ST, GeoPoint::new(40.1, -75.2))]));
        let geocoder = geocoder(&provider);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(geocoder.lookup(MAIN_ST, &cancel).await, Lookup::Cancelled);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_request_is_aborted_on_cancel() {
        let mut table = TableProvider::new(&[(MAIN_ST, GeoPoint::new(40.1, -75.2))]);
        table.delay = Some(Duration::from_secs(5));
        let provider = Arc::new(table);
        let geocoder = geocoder(&provider);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let lookup = geocoder.lookup(MAIN_ST, &cancel).await;

        assert_eq!(lookup, Lookup::Cancelled);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(geocoder.cache().get(&cache_key(MAIN_ST)).is_none());
    }
}
