#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident hotspot clustering for the department map preview.
//!
//! Turns geocoded incidents ([`IncidentPin`]s) into density groups
//! ([`HotspotCluster`]s) using greedy single-link proximity clustering,
//! and prepares the result for the map library: a center/zoom directive
//! ([`view::fit_view`]) and a `GeoJSON` overlay
//! ([`overlay::to_feature_collection`]).
//!
//! Clusters are always recomputed wholesale from the current pin set;
//! nothing here is updated incrementally.

pub mod cluster;
pub mod distance;
pub mod overlay;
pub mod view;

use chrono::{DateTime, Utc};
use fire_portal_geography_models::GeoPoint;
use fire_portal_incident_models::IncidentCategory;
use serde::{Deserialize, Serialize};

pub use cluster::{ClusterConfig, cluster_pins, reselect};
pub use distance::haversine_meters;

/// A geocoded incident, ready for map rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentPin {
    /// Backend incident identifier.
    pub id: String,
    /// Marker label.
    pub label: String,
    /// Normalized address line that was geocoded.
    pub address: String,
    /// When the incident occurred, if known.
    pub occurred_at: Option<DateTime<Utc>>,
    /// Resolved location.
    pub point: GeoPoint,
    /// Normalized category.
    pub category: IncidentCategory,
}

/// A group of nearby pins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotCluster {
    /// Identifier derived from the seed pin, group size, and rounded
    /// center. Unique within one clustering pass only.
    pub id: String,
    /// Arithmetic mean of member coordinates.
    pub center: GeoPoint,
    /// Display radius: farthest member distance plus padding, floored at
    /// the minimum radius.
    pub radius_meters: f64,
    /// Number of member pins.
    pub count: usize,
    /// Most frequent member category (first seen wins ties).
    pub dominant_category: IncidentCategory,
    /// Member pins.
    pub pins: Vec<IncidentPin>,
}

impl HotspotCluster {
    /// Returns `true` if a pin with `pin_id` belongs to this cluster.
    #[must_use]
    pub fn contains_pin(&self, pin_id: &str) -> bool {
        self.pins.iter().any(|p| p.id == pin_id)
    }
}
