#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the fire portal server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the pipeline types to allow independent evolution of the API
//! contract.

use fire_portal_geography_models::{GeoPoint, MapView};
use fire_portal_hotspots::{HotspotCluster, IncidentPin};
use fire_portal_incident_models::{
    CategoryFilter, IncidentCategory, IncidentFilter, IncidentRecord, TimeWindow,
};
use fire_portal_pipeline::HotspotReport;
use serde::{Deserialize, Serialize};

/// Status value sent with `409 Conflict` when a newer request replaced
/// this one.
pub const STATUS_SUPERSEDED: &str = "superseded";

/// Status value sent with `409 Conflict` when the run was cancelled.
pub const STATUS_CANCELLED: &str = "cancelled";

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// One entry of the category taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCategory {
    /// Machine name (`fire`, `false_alarm`, ...).
    pub name: IncidentCategory,
    /// Display label.
    pub label: String,
}

impl From<IncidentCategory> for ApiCategory {
    fn from(category: IncidentCategory) -> Self {
        Self {
            name: category,
            label: category.label().to_string(),
        }
    }
}

/// Body of `POST /api/departments/{id}/hotspots`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotRequestBody {
    /// The department's own address, used to center the map.
    #[serde(default)]
    pub department_address: Option<String>,
    /// The department's incidents, unfiltered.
    #[serde(default)]
    pub incidents: Vec<IncidentRecord>,
    /// Time window filter.
    #[serde(default)]
    pub window: TimeWindow,
    /// Category filter.
    #[serde(default)]
    pub category: CategoryFilter,
    /// Hotspot id the page had selected in its previous result.
    #[serde(default)]
    pub selected_hotspot: Option<String>,
}

impl HotspotRequestBody {
    /// The filters carried by this body.
    #[must_use]
    pub const fn filter(&self) -> IncidentFilter {
        IncidentFilter {
            window: self.window,
            category: self.category,
        }
    }
}

/// Hotspot preview result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHotspots {
    /// Status line shown above the map.
    pub status: String,
    /// Resolved department location.
    pub department: Option<GeoPoint>,
    /// Center/zoom directive for the map.
    pub view: Option<MapView>,
    /// Geocoded incidents.
    pub pins: Vec<IncidentPin>,
    /// Hotspots, largest first.
    pub clusters: Vec<HotspotCluster>,
    /// Incidents that passed the filters.
    pub total_incidents: usize,
    /// Incidents looked up after the cap.
    pub attempted_incidents: usize,
    /// The requested selection carried over to this result, if it still
    /// exists.
    pub selected_hotspot: Option<String>,
}

impl From<HotspotReport> for ApiHotspots {
    fn from(report: HotspotReport) -> Self {
        Self {
            status: report.status,
            department: report.department,
            view: report.view,
            pins: report.pins,
            clusters: report.clusters,
            total_incidents: report.total_incidents,
            attempted_incidents: report.attempted_incidents,
            selected_hotspot: None,
        }
    }
}

/// Body sent with non-success responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiStatus {
    /// Machine-readable status.
    pub status: String,
    /// Human-readable detail.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_defaults_filters() {
        let body: HotspotRequestBody = serde_json::from_str(r#"{"incidents": []}"#).unwrap();

        assert!(body.department_address.is_none());
        assert_eq!(body.filter(), IncidentFilter::default());
    }

    #[test]
    fn request_body_reads_camel_case() {
        let body: HotspotRequestBody = serde_json::from_str(
            r#"{
                "departmentAddress": "1 Firehouse Way, Anytown, ST",
                "window": "last_7_days",
                "category": "ems",
                "incidents": [{"id": "7", "street": "2 Oak St", "category": "321"}]
            }"#,
        )
        .unwrap();

        assert_eq!(body.window, TimeWindow::Last7Days);
        assert_eq!(body.category, CategoryFilter::Only(IncidentCategory::Ems));
        assert_eq!(body.incidents[0].category(), IncidentCategory::Ems);
    }

    #[test]
    fn unavailable_report_maps_to_empty_response() {
        let api = ApiHotspots::from(HotspotReport::unavailable());
        let json = serde_json::to_value(&api).unwrap();

        assert_eq!(json["status"], "Map preview unavailable");
        assert_eq!(json["pins"], serde_json::json!([]));
        assert_eq!(json["clusters"], serde_json::json!([]));
        assert!(json["view"].is_null());
    }
}
