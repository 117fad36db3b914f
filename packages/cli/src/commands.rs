//! Command implementations shared by the flag-driven and interactive
//! front ends.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fire_portal_cli_utils::{IndicatifProgress, MultiProgress};
use fire_portal_database::{DbError, DuckDbGeocodeCache};
use fire_portal_geocoder::nominatim::NominatimProvider;
use fire_portal_geocoder::service_registry::default_service;
use fire_portal_geocoder::{GeocodeCache, GeocodeError, Geocoder, Lookup, MemoryGeocodeCache};
use fire_portal_hotspots::HotspotCluster;
use fire_portal_hotspots::overlay::to_feature_collection;
use fire_portal_incident_models::{IncidentFilter, IncidentRecord};
use fire_portal_pipeline::{HotspotReport, HotspotRequest, PipelineConfig, PipelineOutcome};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors surfaced to the CLI user.
#[derive(Debug, Error)]
pub enum CliError {
    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The incidents file is not a JSON array of incident records.
    #[error("Invalid incidents file {}: {source}", path.display())]
    Incidents {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The geocoding client could not be built.
    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    /// The persistent cache failed.
    #[error(transparent)]
    Database(#[from] DbError),

    /// Every geocoding service is disabled.
    #[error("No geocoding service is enabled")]
    NoGeocoder,
}

/// Options for a hotspot preview run.
#[derive(Debug, Clone)]
pub struct HotspotOptions {
    /// JSON file holding an array of incident records.
    pub incidents: PathBuf,
    /// Department address used to center the map.
    pub department_address: Option<String>,
    /// Filters applied before geocoding.
    pub filter: IncidentFilter,
    /// Run limits and clustering parameters.
    pub config: PipelineConfig,
    /// Where to write the `GeoJSON` overlay, if anywhere.
    pub geojson: Option<PathBuf>,
    /// Use a throwaway in-memory cache instead of the persistent one.
    pub no_cache: bool,
}

/// Builds a geocoder over the highest-priority enabled service.
///
/// Returns the geocoder together with the service's courtesy delay.
///
/// # Errors
///
/// Returns [`CliError`] if no service is enabled, the HTTP client cannot be
/// built, or the persistent cache cannot be opened.
pub fn build_geocoder(no_cache: bool) -> Result<(Geocoder, std::time::Duration), CliError> {
    let service = default_service().ok_or(CliError::NoGeocoder)?;
    let provider = NominatimProvider::from_service(&service)?;
    log::debug!("Geocoding via {} ({})", service.name, provider.base_url());

    let cache: Arc<dyn GeocodeCache> = if no_cache {
        Arc::new(MemoryGeocodeCache::new())
    } else {
        Arc::new(DuckDbGeocodeCache::open_default()?)
    };

    Ok((Geocoder::new(Arc::new(provider), cache), service.rate_limit()))
}

/// Reads a JSON array of incident records.
///
/// # Errors
///
/// Returns [`CliError`] if the file cannot be read or parsed.
pub fn load_incidents(path: &Path) -> Result<Vec<IncidentRecord>, CliError> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| CliError::Incidents {
        path: path.to_path_buf(),
        source,
    })
}

/// Runs the hotspot pipeline once, printing the result. Ctrl-C cancels the
/// run.
///
/// # Errors
///
/// Returns [`CliError`] if setup fails or the overlay cannot be written.
pub async fn hotspots(options: HotspotOptions, multi: &MultiProgress) -> Result<(), CliError> {
    let records = load_incidents(&options.incidents)?;
    let (geocoder, rate_limit) = build_geocoder(options.no_cache)?;
    let config = PipelineConfig {
        request_delay: options.config.request_delay.max(rate_limit),
        ..options.config
    };

    let request = HotspotRequest::filtered(
        options.department_address.clone(),
        &records,
        options.filter,
        chrono::Utc::now(),
    );
    log::info!(
        "{} of {} incidents match the filters",
        request.incidents.len(),
        records.len()
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling run");
            interrupt.cancel();
        }
    });

    let progress = IndicatifProgress::geocode_bar(multi, "Geocoding incidents");
    let outcome =
        fire_portal_pipeline::run(&geocoder, &config, &request, &cancel, progress.as_ref()).await;
    watcher.abort();

    let report = match outcome {
        PipelineOutcome::Completed(report) => report,
        PipelineOutcome::Cancelled => {
            println!("Cancelled.");
            return Ok(());
        }
        PipelineOutcome::Unavailable => HotspotReport::unavailable(),
    };

    print_report(&report);

    if let Some(path) = &options.geojson {
        let collection = to_feature_collection(&report.pins, &report.clusters);
        std::fs::write(path, serde_json::to_string_pretty(&collection)?)?;
        println!("Wrote overlay to {}", path.display());
    }

    Ok(())
}

fn print_report(report: &HotspotReport) {
    println!("{}", report.status);

    if report.clusters.is_empty() {
        return;
    }

    println!();
    println!("{:<4} {:>5} {:>8}  {:<12} CENTER", "#", "COUNT", "RADIUS", "CATEGORY");
    println!("{}", "-".repeat(60));
    for (i, cluster) in report.clusters.iter().enumerate() {
        println!("{}", cluster_row(i + 1, cluster));
    }

    if let Some(view) = report.view {
        println!();
        println!(
            "View: {:.5}, {:.5} @ zoom {}",
            view.center.lat, view.center.lon, view.zoom
        );
    }
}

fn cluster_row(rank: usize, cluster: &HotspotCluster) -> String {
    format!(
        "{:<4} {:>5} {:>7.0}m  {:<12} {:.5}, {:.5}",
        rank,
        cluster.count,
        cluster.radius_meters,
        cluster.dominant_category.label(),
        cluster.center.lat,
        cluster.center.lon
    )
}

/// Geocodes a single address and prints the result.
///
/// # Errors
///
/// Returns [`CliError`] if the geocoder cannot be built.
pub async fn geocode(address: &str, no_cache: bool) -> Result<(), CliError> {
    let (geocoder, _) = build_geocoder(no_cache)?;

    match geocoder.lookup(address, &CancellationToken::new()).await {
        Lookup::Cached(point) => println!("{:.6}, {:.6} (cached)", point.lat, point.lon),
        Lookup::Resolved(point) => println!("{:.6}, {:.6}", point.lat, point.lon),
        Lookup::Empty => println!("Nothing to geocode."),
        Lookup::NoMatch | Lookup::Failed | Lookup::Cancelled => {
            println!("No match for '{address}'.");
        }
    }

    Ok(())
}

/// Prints the persistent cache location and size.
///
/// # Errors
///
/// Returns [`CliError`] if the cache cannot be opened or queried.
pub fn cache_stats() -> Result<(), CliError> {
    let cache = DuckDbGeocodeCache::open_default()?;
    println!(
        "{}: {} cached addresses",
        fire_portal_database::paths::geocode_cache_db_path().display(),
        cache.len()?
    );
    Ok(())
}

/// Empties the persistent cache.
///
/// # Errors
///
/// Returns [`CliError`] if the cache cannot be opened or cleared.
pub fn cache_clear() -> Result<(), CliError> {
    let cache = DuckDbGeocodeCache::open_default()?;
    let removed = cache.clear()?;
    println!("Removed {removed} cached addresses.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use fire_portal_geography_models::GeoPoint;
    use fire_portal_incident_models::IncidentCategory;

    use super::*;

    #[test]
    fn incidents_file_parses_camel_case_records() {
        let path = std::env::temp_dir().join(format!(
            "fire_portal_incidents_{}.json",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"[
                {"id": "A-1", "street": "1 Elm St", "city": "Springfield", "state": "IL",
                 "occurredAt": "2026-01-02T03:04:05Z", "category": "111"},
                {"id": "A-2"}
            ]"#,
        )
        .unwrap();

        let records = load_incidents(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].category(), IncidentCategory::Fire);
        assert!(records[0].occurred_at.is_some());
        assert!(records[1].street.is_empty());
    }

    #[test]
    fn malformed_incidents_file_names_the_path() {
        let path = std::env::temp_dir().join(format!(
            "fire_portal_bad_incidents_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "{not json").unwrap();

        let err = load_incidents(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(err, CliError::Incidents { .. }));
        assert!(err.to_string().contains("fire_portal_bad_incidents"));
    }

    #[test]
    fn cluster_rows_align() {
        let cluster = HotspotCluster {
            id: "hotspot-1-3-40.0000_-75.0000".to_string(),
            center: GeoPoint::new(40.0, -75.0),
            radius_meters: 212.4,
            count: 3,
            dominant_category: IncidentCategory::Ems,
            pins: Vec::new(),
        };

        assert_eq!(
            cluster_row(1, &cluster),
            "1        3     212m  EMS          40.00000, -75.00000"
        );
    }
}
