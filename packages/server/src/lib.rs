#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the department hotspot map preview.
//!
//! The department detail page posts its incident list and active filters;
//! the server geocodes and clusters them and answers with pins, hotspots,
//! and a map view. Each department has its own pipeline runner, so a
//! filter change supersedes the page's previous, still-running request.
//! Geocodes are cached in the shared `DuckDB` cache at
//! `data/shared/geocode_cache.duckdb`.

mod handlers;
pub mod interactive;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use fire_portal_database::DuckDbGeocodeCache;
use fire_portal_geocoder::Geocoder;
use fire_portal_geocoder::nominatim::NominatimProvider;
use fire_portal_geocoder::service_registry::default_service;
use fire_portal_pipeline::{PipelineConfig, PipelineRunner};

/// Largest accepted request body (incident lists can be long).
const JSON_LIMIT_BYTES: usize = 4 * 1024 * 1024;

/// Bounds on how many department runners the server keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerLimits {
    /// Most runners held at once. Creating one past this evicts the least
    /// recently used.
    pub max_runners: usize,
    /// Idle runners untouched for this long are dropped with their result.
    pub idle_ttl: Duration,
}

impl Default for RunnerLimits {
    fn default() -> Self {
        Self {
            max_runners: 256,
            idle_ttl: Duration::from_secs(30 * 60),
        }
    }
}

struct RunnerEntry {
    runner: Arc<PipelineRunner>,
    last_used: Instant,
}

/// Shared application state.
pub struct AppState {
    /// Geocoder shared by every department's runs.
    pub geocoder: Geocoder,
    /// Limits and pacing for each run.
    pub config: PipelineConfig,
    limits: RunnerLimits,
    /// One runner per department id.
    runners: Mutex<BTreeMap<String, RunnerEntry>>,
}

impl AppState {
    /// Creates state with no runners yet and the default limits.
    #[must_use]
    pub fn new(geocoder: Geocoder, config: PipelineConfig) -> Self {
        Self::with_limits(geocoder, config, RunnerLimits::default())
    }

    /// Creates state with no runners yet.
    #[must_use]
    pub fn with_limits(geocoder: Geocoder, config: PipelineConfig, limits: RunnerLimits) -> Self {
        Self {
            geocoder,
            config,
            limits,
            runners: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock_runners(&self) -> MutexGuard<'_, BTreeMap<String, RunnerEntry>> {
        self.runners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the runner for `department_id`, creating it on first use.
    ///
    /// Creating a runner first drops idle runners past the TTL, then the
    /// least recently used one if the map is still full.
    pub fn runner(&self, department_id: &str) -> Arc<PipelineRunner> {
        let now = Instant::now();
        let mut runners = self.lock_runners();

        if let Some(entry) = runners.get_mut(department_id) {
            entry.last_used = now;
            return entry.runner.clone();
        }

        self.evict(&mut runners, now);

        let runner = Arc::new(PipelineRunner::new(self.geocoder.clone(), self.config));
        runners.insert(
            department_id.to_string(),
            RunnerEntry {
                runner: runner.clone(),
                last_used: now,
            },
        );
        drop(runners);

        runner
    }

    /// Returns the runner for `department_id` if one exists.
    pub fn existing_runner(&self, department_id: &str) -> Option<Arc<PipelineRunner>> {
        let mut runners = self.lock_runners();
        let entry = runners.get_mut(department_id)?;
        entry.last_used = Instant::now();
        Some(entry.runner.clone())
    }

    /// Number of department runners currently held.
    #[must_use]
    pub fn runner_count(&self) -> usize {
        self.lock_runners().len()
    }

    fn evict(&self, runners: &mut BTreeMap<String, RunnerEntry>, now: Instant) {
        let ttl = self.limits.idle_ttl;
        runners.retain(|id, entry| {
            let keep =
                entry.runner.is_running() || now.duration_since(entry.last_used) < ttl;
            if !keep {
                log::debug!("Dropping idle hotspot runner for department {id}");
            }
            keep
        });

        while runners.len() >= self.limits.max_runners.max(1) {
            let Some(oldest) = runners
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            log::debug!("Evicting least recently used hotspot runner for department {oldest}");
            runners.remove(&oldest);
        }
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().limit(JSON_LIMIT_BYTES))
        .service(
            web::scope("/api")
                .route("/health", web::get().to(handlers::health))
                .route("/categories", web::get().to(handlers::categories))
                .route(
                    "/departments/{id}/hotspots",
                    web::post().to(handlers::hotspots),
                )
                .route(
                    "/departments/{id}/hotspots.geojson",
                    web::get().to(handlers::hotspots_geojson),
                ),
        );
}

/// Builds the shared state: the highest-priority geocoding service in
/// front of the persistent cache.
///
/// # Errors
///
/// Returns an error if no service is enabled, the HTTP client cannot be
/// built, or the cache cannot be opened.
pub fn build_state() -> Result<AppState, Box<dyn std::error::Error + Send + Sync>> {
    let service = default_service().ok_or("No geocoding service is enabled")?;
    let provider = NominatimProvider::from_service(&service)?;
    log::info!("Geocoding via {} ({})", service.name, provider.base_url());

    log::info!("Opening geocode cache...");
    let cache = DuckDbGeocodeCache::open_default()?;

    let config = PipelineConfig {
        request_delay: service.rate_limit(),
        ..PipelineConfig::default()
    };

    Ok(AppState::new(
        Geocoder::new(Arc::new(provider), Arc::new(cache)),
        config,
    ))
}

/// Listen address for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddr {
    /// Interface to bind.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl ServerAddr {
    /// Reads `BIND_ADDR` and `PORT`, defaulting to `127.0.0.1:8080`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
        }
    }
}

/// Starts the API server on `BIND_ADDR`:`PORT`.
///
/// The caller provides the async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if setup fails or the HTTP server
/// fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    serve(ServerAddr::from_env()).await
}

/// Opens the geocode cache and serves the API on `addr`.
///
/// # Errors
///
/// Returns an `std::io::Result` error if setup fails or the HTTP server
/// fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn serve(addr: ServerAddr) -> std::io::Result<()> {
    let state = web::Data::new(build_state().map_err(std::io::Error::other)?);

    log::info!("Starting server on {}:{}", addr.host, addr.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((addr.host, addr.port))?
    .run()
    .await
}
