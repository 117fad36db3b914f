//! Nominatim / OpenStreetMap geocoder client.
//!
//! The public instance enforces strict usage limits and degrades or blocks
//! bursty clients, so callers must serialize lookups and pause between
//! them (see `rate_limit_ms` in the service TOML configuration).
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use std::time::Duration;

use async_trait::async_trait;
use fire_portal_geography_models::GeoPoint;

use crate::service_registry::{GeocodingService, ProviderConfig};
use crate::{GeocodeError, GeocodeProvider};

/// Nominatim free-form search client.
#[derive(Debug, Clone)]
pub struct NominatimProvider {
    client: reqwest::Client,
    base_url: String,
    accept_language: String,
}

impl NominatimProvider {
    /// Creates a client for the search endpoint at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        accept_language: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            accept_language: accept_language.to_string(),
        })
    }

    /// Creates a client from a registry entry, honoring the
    /// `FIRE_PORTAL_GEOCODER_URL` override.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn from_service(service: &GeocodingService) -> Result<Self, GeocodeError> {
        let ProviderConfig::Nominatim {
            accept_language,
            user_agent,
            timeout_secs,
            ..
        } = &service.provider;

        Self::new(
            &service.resolved_base_url(),
            accept_language,
            user_agent,
            Duration::from_secs(*timeout_secs),
        )
    }

    /// The search endpoint this client queries.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl GeocodeProvider for NominatimProvider {
    fn id(&self) -> &str {
        "nominatim"
    }

    async fn search(&self, query: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("q", query), ("format", "jsonv2"), ("limit", "1")])
            .header(reqwest::header::ACCEPT_LANGUAGE, &self.accept_language)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }

        if !resp.status().is_success() {
            return Err(GeocodeError::Status {
                status: resp.status().as_u16(),
            });
        }

        let text = resp.text().await?;
        let body: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| GeocodeError::Parse {
                message: format!("Invalid Nominatim response body: {e}"),
            })?;
        parse_response(&body)
    }
}

/// Parses a Nominatim JSON response: an array whose first element carries
/// `lat`/`lon` as decimal strings.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeoPoint>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let lat = parse_coordinate(&first["lat"]).ok_or_else(|| GeocodeError::Parse {
        message: "Missing lat in Nominatim response".to_string(),
    })?;

    let lon = parse_coordinate(&first["lon"]).ok_or_else(|| GeocodeError::Parse {
        message: "Missing lon in Nominatim response".to_string(),
    })?;

    let point = GeoPoint::new(lat, lon);
    if !point.is_valid() {
        return Err(GeocodeError::Parse {
            message: format!("Out-of-range coordinates in Nominatim response: {lat}, {lon}"),
        });
    }

    Ok(Some(point))
}

/// Nominatim sends coordinates as strings; some proxies re-encode them as
/// numbers.
fn parse_coordinate(value: &serde_json::Value) -> Option<f64> {
    value
        .as_str()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .or_else(|| value.as_f64())
}
