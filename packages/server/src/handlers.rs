//! HTTP handler functions for the hotspot API.

use actix_web::{HttpResponse, web};
use fire_portal_hotspots::overlay::to_feature_collection;
use fire_portal_hotspots::{HotspotCluster, reselect};
use fire_portal_incident_models::IncidentCategory;
use fire_portal_pipeline::{HotspotReport, HotspotRequest, PipelineOutcome, RunResult};
use fire_portal_server_models::{
    ApiCategory, ApiHealth, ApiHotspots, ApiStatus, HotspotRequestBody, STATUS_CANCELLED,
    STATUS_SUPERSEDED,
};

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/categories`
///
/// Returns the incident category taxonomy.
pub async fn categories() -> HttpResponse {
    let categories: Vec<ApiCategory> = IncidentCategory::all()
        .iter()
        .copied()
        .map(ApiCategory::from)
        .collect();

    HttpResponse::Ok().json(categories)
}

/// `POST /api/departments/{id}/hotspots`
///
/// Filters, geocodes, and clusters the posted incidents. A newer request
/// for the same department supersedes this one, which then answers
/// `409 Conflict`. A `selectedHotspot` from the page's previous result is
/// matched against the new clusters and echoed back when it survives.
/// If the client goes away first, dropping this handler
/// cancels the run so it never becomes the department's latest result. Unexpected failures still answer `200` with the
/// "unavailable" status and empty lists.
pub async fn hotspots(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<HotspotRequestBody>,
) -> HttpResponse {
    let department_id = path.into_inner();
    let body = body.into_inner();

    let request = HotspotRequest::filtered(
        body.department_address.clone(),
        &body.incidents,
        body.filter(),
        chrono::Utc::now(),
    );

    log::debug!(
        "Department {department_id}: {} of {} incidents pass the filters",
        request.incidents.len(),
        body.incidents.len()
    );

    let runner = state.runner(&department_id);
    let previous = body
        .selected_hotspot
        .as_deref()
        .and_then(|id| previous_selection(runner.latest(), id));

    match runner.submit(request).wait().await {
        RunResult::Finished(PipelineOutcome::Completed(report)) => {
            let selected = previous
                .as_ref()
                .and_then(|p| reselect(&report.clusters, p))
                .map(|c| c.id.clone());
            let mut api = ApiHotspots::from(report);
            api.selected_hotspot = selected;
            HttpResponse::Ok().json(api)
        }
        RunResult::Finished(PipelineOutcome::Unavailable) => {
            HttpResponse::Ok().json(ApiHotspots::from(HotspotReport::unavailable()))
        }
        RunResult::Finished(PipelineOutcome::Cancelled) => {
            HttpResponse::Conflict().json(ApiStatus {
                status: STATUS_CANCELLED.to_string(),
                message: "The hotspot run was cancelled".to_string(),
            })
        }
        RunResult::Superseded => HttpResponse::Conflict().json(ApiStatus {
            status: STATUS_SUPERSEDED.to_string(),
            message: "A newer hotspot request replaced this one".to_string(),
        }),
    }
}

/// The selected cluster as it appeared in the department's last result.
fn previous_selection(latest: Option<PipelineOutcome>, id: &str) -> Option<HotspotCluster> {
    latest?
        .into_report()?
        .clusters
        .into_iter()
        .find(|c| c.id == id)
}

/// `GET /api/departments/{id}/hotspots.geojson`
///
/// Returns the department's latest completed result as a `GeoJSON`
/// feature collection, or `404` if there is none yet.
pub async fn hotspots_geojson(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let department_id = path.into_inner();

    let report = state
        .existing_runner(&department_id)
        .and_then(|runner| runner.latest())
        .and_then(PipelineOutcome::into_report);

    match report {
        Some(report) => HttpResponse::Ok()
            .content_type("application/geo+json")
            .json(to_feature_collection(&report.pins, &report.clusters)),
        None => HttpResponse::NotFound().json(ApiStatus {
            status: "not_found".to_string(),
            message: format!("No hotspot result for department {department_id}"),
        }),
    }
}
