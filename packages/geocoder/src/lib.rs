#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address geocoding for the department map preview.
//!
//! Converts human-composed address lines to [`GeoPoint`]s through a
//! [`GeocodeProvider`] (the public Nominatim instance by default), with a
//! read-before-fetch, write-through [`GeocodeCache`] in front of it so the
//! same address never reaches the network twice.
//!
//! All failures are swallowed at the [`Geocoder`] boundary: callers get
//! `None` for anything that could not be mapped and simply skip it.
//! Rate limiting is the caller's job (see `rate_limit_ms` in
//! `services/nominatim.toml`).

pub mod address;
pub mod cache;
pub mod geocoder;
pub mod nominatim;
pub mod service_registry;

use async_trait::async_trait;
use thiserror::Error;

pub use cache::{GeocodeCache, MemoryGeocodeCache};
pub use fire_portal_geography_models::GeoPoint;
pub use geocoder::{Geocoder, Lookup};

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Geocoding service returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,
}

/// A remote address-search service.
///
/// Implementations resolve one free-text query to at most one point.
/// `Ok(None)` means the service answered but found no match.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Short identifier used in logs (e.g. `"nominatim"`).
    fn id(&self) -> &str;

    /// Resolves `query` to a point.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request fails, the service responds
    /// with a non-success status, or the body cannot be parsed.
    async fn search(&self, query: &str) -> Result<Option<GeoPoint>, GeocodeError>;
}
