//! `GeoJSON` overlay export.
//!
//! The map library draws one marker per `kind = "pin"` feature and one
//! circle of `radiusMeters` per `kind = "hotspot"` feature.

use geo::Point;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value, feature::Id};
use serde_json::json;

use crate::{HotspotCluster, IncidentPin};

/// Builds the overlay for `pins` and `clusters`. Pins come first, in input
/// order, followed by clusters in their given order.
#[must_use]
pub fn to_feature_collection(pins: &[IncidentPin], clusters: &[HotspotCluster]) -> FeatureCollection {
    let features = pins
        .iter()
        .map(pin_feature)
        .chain(clusters.iter().map(cluster_feature))
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn pin_feature(pin: &IncidentPin) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("kind".to_string(), json!("pin"));
    properties.insert("id".to_string(), json!(pin.id));
    properties.insert("label".to_string(), json!(pin.label));
    properties.insert("category".to_string(), json!(pin.category));
    properties.insert("address".to_string(), json!(pin.address));
    properties.insert(
        "occurredAt".to_string(),
        json!(pin.occurred_at.map(|t| t.to_rfc3339())),
    );

    point_feature(&pin.id, Point::new(pin.point.lon, pin.point.lat), properties)
}

fn cluster_feature(cluster: &HotspotCluster) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("kind".to_string(), json!("hotspot"));
    properties.insert("id".to_string(), json!(cluster.id));
    properties.insert("count".to_string(), json!(cluster.count));
    properties.insert("radiusMeters".to_string(), json!(cluster.radius_meters));
    properties.insert(
        "dominantCategory".to_string(),
        json!(cluster.dominant_category),
    );

    point_feature(
        &cluster.id,
        Point::new(cluster.center.lon, cluster.center.lat),
        properties,
    )
}

fn point_feature(id: &str, point: Point<f64>, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::from(&point))),
        id: Some(Id::String(id.to_string())),
        properties: Some(properties),
        foreign_members: None,
    }
}
