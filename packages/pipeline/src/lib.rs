#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Department map preview pipeline.
//!
//! Geocodes a department's address and its (already filtered) incidents
//! one at a time, pausing between network requests, then clusters the
//! resulting pins into hotspots. A run is cancellable at every suspension
//! point and never fails outright: unmappable incidents are skipped and
//! unexpected failures downgrade to an "unavailable" status.
//!
//! [`run`] performs a single pass. [`runner::PipelineRunner`] wraps it for
//! callers that re-trigger runs as filters change.

pub mod progress;
pub mod runner;
pub mod status;

use std::time::Duration;

use chrono::{DateTime, Utc};
use fire_portal_geocoder::address::compose_address_line;
use fire_portal_geocoder::{Geocoder, Lookup};
use fire_portal_geography_models::{GeoPoint, MapView};
use fire_portal_hotspots::view::fit_view;
use fire_portal_hotspots::{ClusterConfig, HotspotCluster, IncidentPin, cluster_pins};
use fire_portal_incident_models::{CategoryFilter, IncidentFilter, IncidentRecord, TimeWindow};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub use progress::{NullProgress, ProgressCallback, null_progress};
pub use runner::{PipelineRunner, ProgressFactory, RunHandle, RunResult};

/// Limits and pacing for a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// Maximum number of incidents geocoded per run.
    pub max_incidents: usize,
    /// Pause after each lookup that reached the geocoding service.
    pub request_delay: Duration,
    /// Clustering parameters.
    pub cluster: ClusterConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_incidents: 40,
            request_delay: Duration::from_millis(100),
            cluster: ClusterConfig::default(),
        }
    }
}

/// Input to one run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HotspotRequest {
    /// The department's own address, used to center the map.
    pub department_address: Option<String>,
    /// Incidents that passed the active filters, in display order.
    pub incidents: Vec<IncidentRecord>,
    /// Active time window (reported in the status line).
    pub window: TimeWindow,
    /// Active category filter (reported in the status line).
    pub category: CategoryFilter,
}

impl HotspotRequest {
    /// Builds a request by applying `filter` to `records` as of `now`.
    #[must_use]
    pub fn filtered(
        department_address: Option<String>,
        records: &[IncidentRecord],
        filter: IncidentFilter,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            department_address,
            incidents: filter.apply(records, now).into_iter().cloned().collect(),
            window: filter.window,
            category: filter.category,
        }
    }
}

/// Everything the map preview renders for one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotReport {
    /// Resolved department location, if its address geocoded.
    pub department: Option<GeoPoint>,
    /// Geocoded incidents, in input order.
    pub pins: Vec<IncidentPin>,
    /// Hotspots, largest first.
    pub clusters: Vec<HotspotCluster>,
    /// Center/zoom directive, absent when there is nothing to show.
    pub view: Option<MapView>,
    /// Status line.
    pub status: String,
    /// Incidents that passed the filters.
    pub total_incidents: usize,
    /// Incidents actually looked up after the cap.
    pub attempted_incidents: usize,
}

impl HotspotReport {
    /// The empty report shown when a run fails unexpectedly.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            department: None,
            pins: Vec::new(),
            clusters: Vec::new(),
            view: None,
            status: status::UNAVAILABLE.to_string(),
            total_incidents: 0,
            attempted_incidents: 0,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// The run finished and produced a report.
    Completed(HotspotReport),
    /// The run was cancelled and produced nothing.
    Cancelled,
    /// The run failed unexpectedly.
    Unavailable,
}

impl PipelineOutcome {
    /// The report to render: the completed one, or the empty
    /// "unavailable" report. `None` for cancelled runs.
    #[must_use]
    pub fn into_report(self) -> Option<HotspotReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Unavailable => Some(HotspotReport::unavailable()),
            Self::Cancelled => None,
        }
    }
}

/// Runs one geocode-and-cluster pass.
///
/// Lookups are strictly sequential: the department address first, then
/// each incident in order up to [`PipelineConfig::max_incidents`].
/// Incidents whose address is blank or does not resolve are skipped.
/// After any lookup that reached the geocoding service the run pauses for
/// [`PipelineConfig::request_delay`] before the next one; cache hits do
/// not pause.
///
/// `cancel` is checked before every lookup and raced against every
/// request and pause. Once it fires the run returns
/// [`PipelineOutcome::Cancelled`] without producing partial results.
pub async fn run(
    geocoder: &Geocoder,
    config: &PipelineConfig,
    request: &HotspotRequest,
    cancel: &CancellationToken,
    progress: &dyn ProgressCallback,
) -> PipelineOutcome {
    let total = request.incidents.len();
    let capped = &request.incidents[..total.min(config.max_incidents)];

    if capped.len() < total {
        log::info!(
            "Capping map preview at {} of {total} incidents",
            config.max_incidents
        );
    }

    let department_lookups = usize::from(request.department_address.is_some());
    progress.set_total((capped.len() + department_lookups) as u64);

    let mut pace = Pacer::new(config.request_delay);

    let department = match &request.department_address {
        Some(address) => {
            progress.set_message(format!("Locating department: {address}"));
            let Some(lookup) = pace.lookup(geocoder, address, cancel).await else {
                return cancelled(progress);
            };
            progress.inc(1);
            lookup.point()
        }
        None => None,
    };

    let mut pins = Vec::with_capacity(capped.len());

    for record in capped {
        let address = compose_address_line(
            &record.street,
            &record.city,
            &record.state,
            record.zip.as_deref(),
        );
        progress.set_message(format!("Geocoding incident {}", record.id));

        let Some(lookup) = pace.lookup(geocoder, &address, cancel).await else {
            return cancelled(progress);
        };
        progress.inc(1);

        let Some(point) = lookup.point() else {
            log::debug!("Skipping incident {}: address not mappable", record.id);
            continue;
        };

        pins.push(IncidentPin {
            id: record.id.clone(),
            label: record.display_label(),
            address,
            occurred_at: record.occurred_at,
            point,
            category: record.category(),
        });
    }

    if cancel.is_cancelled() {
        return cancelled(progress);
    }

    let clusters = cluster_pins(&pins, &config.cluster);
    let view = fit_view(department, &pins);
    let status = status::summary(
        pins.len(),
        total,
        config.max_incidents,
        request.window,
        request.category,
    );

    log::info!("{status}");
    progress.finish(status.clone());

    PipelineOutcome::Completed(HotspotReport {
        department,
        pins,
        clusters,
        view,
        status,
        total_incidents: total,
        attempted_incidents: capped.len(),
    })
}

fn cancelled(progress: &dyn ProgressCallback) -> PipelineOutcome {
    log::debug!("Map preview run cancelled");
    progress.finish_and_clear();
    PipelineOutcome::Cancelled
}

/// Serializes lookups and inserts the courtesy pause between network
/// requests.
struct Pacer {
    delay: Duration,
    owed: bool,
}

impl Pacer {
    const fn new(delay: Duration) -> Self {
        Self { delay, owed: false }
    }

    /// Pays any pause owed by the previous lookup, then performs this one.
    /// Returns `None` if `cancel` fired at any point.
    async fn lookup(
        &mut self,
        geocoder: &Geocoder,
        query: &str,
        cancel: &CancellationToken,
    ) -> Option<Lookup> {
        if cancel.is_cancelled() {
            return None;
        }

        if self.owed && !self.delay.is_zero() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                () = tokio::time::sleep(self.delay) => {}
            }
        }

        let lookup = geocoder.lookup(query, cancel).await;
        if lookup == Lookup::Cancelled {
            return None;
        }

        self.owed = lookup.reached_network();
        Some(lookup)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use fire_portal_geocoder::{GeocodeError, GeocodeProvider};
    use fire_portal_geography_models::GeoPoint;
    use fire_portal_incident_models::IncidentRecord;

    /// Scripted geocoding service recording every query it receives.
    #[derive(Default)]
    pub struct ScriptedProvider {
        pub points: BTreeMap<String, GeoPoint>,
        pub rate_limited: Vec<String>,
        pub panics_on: Vec<String>,
        pub delay: Option<Duration>,
        pub queries: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        pub fn with_points(points: &[(&str, GeoPoint)]) -> Self {
            Self {
                points: points
                    .iter()
                    .map(|(q, p)| ((*q).to_string(), *p))
                    .collect(),
                ..Self::default()
            }
        }

        pub fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GeocodeProvider for ScriptedProvider {
        fn id(&self) -> &str {
            "scripted"
        }

        async fn search(&self, query: &str) -> Result<Option<GeoPoint>, GeocodeError> {
            self.queries.lock().unwrap().push(query.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            assert!(
                !self.panics_on.iter().any(|q| q == query),
                "provider exploded on '{query}'"
            );
            if self.rate_limited.iter().any(|q| q == query) {
                return Err(GeocodeError::RateLimited);
            }
            Ok(self.points.get(query).copied())
        }
    }

    pub fn incident(id: &str, street: &str, category: &str) -> IncidentRecord {
        IncidentRecord {
            id: id.to_string(),
            label: None,
            street: street.to_string(),
            city: "Anytown".to_string(),
            state: "ST".to_string(),
            zip: None,
            occurred_at: None,
            category: category.to_string(),
        }
    }

    /// Address line the pipeline composes for [`incident`].
    pub fn address(street: &str) -> String {
        format!("{street}, Anytown, ST")
    }
}
