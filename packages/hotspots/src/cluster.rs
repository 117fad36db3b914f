//! Greedy single-link proximity clustering.
//!
//! Starting from the first unassigned pin, a group repeatedly absorbs every
//! remaining pin within the threshold of *any* current member until a pass
//! absorbs nothing (so groups chain-link through intermediate pins). The
//! result partitions the input: every pin lands in exactly one cluster.
//!
//! The algorithm is O(n²) per pass and order-dependent. It is meant for
//! the few dozen pins a map preview renders, not for bulk data.

use fire_portal_geography_models::GeoPoint;
use fire_portal_incident_models::IncidentCategory;

use crate::distance::haversine_meters;
use crate::{HotspotCluster, IncidentPin};

/// Clustering parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterConfig {
    /// Maximum distance between a pin and some group member for the pin to
    /// join the group.
    pub threshold_meters: f64,
    /// Smallest radius a cluster is drawn with.
    pub min_radius_meters: f64,
    /// Added to the farthest member distance when sizing the radius.
    pub radius_padding_meters: f64,
    /// Sort pins by id before clustering so the partition does not depend
    /// on input order.
    pub stable_order: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            threshold_meters: 250.0,
            min_radius_meters: 120.0,
            radius_padding_meters: 80.0,
            stable_order: false,
        }
    }
}

/// Partitions `pins` into hotspot clusters, largest first.
///
/// Clusters with equal counts keep the order their seeds were visited in.
#[must_use]
pub fn cluster_pins(pins: &[IncidentPin], config: &ClusterConfig) -> Vec<HotspotCluster> {
    let mut remaining: Vec<IncidentPin> = pins.to_vec();
    if config.stable_order {
        remaining.sort_by(|a, b| a.id.cmp(&b.id));
    }

    let mut clusters = Vec::new();

    while !remaining.is_empty() {
        let seed = remaining.remove(0);
        let mut group = vec![seed];

        loop {
            let (absorbed, rest): (Vec<IncidentPin>, Vec<IncidentPin>) =
                std::mem::take(&mut remaining).into_iter().partition(|candidate| {
                    group.iter().any(|member| {
                        haversine_meters(member.point, candidate.point) <= config.threshold_meters
                    })
                });
            remaining = rest;

            if absorbed.is_empty() {
                break;
            }
            group.extend(absorbed);
        }

        clusters.push(finalize(group, config));
    }

    clusters.sort_by(|a, b| b.count.cmp(&a.count));

    log::debug!(
        "Clustered {} pins into {} hotspots (threshold {}m)",
        pins.len(),
        clusters.len(),
        config.threshold_meters
    );

    clusters
}

#[allow(clippy::cast_precision_loss)]
fn finalize(pins: Vec<IncidentPin>, config: &ClusterConfig) -> HotspotCluster {
    let count = pins.len();
    let n = count as f64;

    let (lat_sum, lon_sum) = pins
        .iter()
        .fold((0.0, 0.0), |(lat, lon), p| (lat + p.point.lat, lon + p.point.lon));
    let center = GeoPoint::new(lat_sum / n, lon_sum / n);

    let max_distance = pins
        .iter()
        .map(|p| haversine_meters(center, p.point))
        .fold(0.0_f64, f64::max);
    let radius_meters = (max_distance + config.radius_padding_meters).max(config.min_radius_meters);

    let dominant_category = dominant_category(&pins);
    let seed_id = pins.first().map_or("", |p| p.id.as_str());
    let id = format!(
        "hotspot-{seed_id}-{count}-{:.4}_{:.4}",
        center.lat, center.lon
    );

    HotspotCluster {
        id,
        center,
        radius_meters,
        count,
        dominant_category,
        pins,
    }
}

/// Most frequent category; on ties the category encountered first wins.
fn dominant_category(pins: &[IncidentPin]) -> IncidentCategory {
    let mut counts: Vec<(IncidentCategory, usize)> = Vec::new();
    for pin in pins {
        match counts.iter_mut().find(|(category, _)| *category == pin.category) {
            Some((_, n)) => *n += 1,
            None => counts.push((pin.category, 1)),
        }
    }

    let mut best: Option<(IncidentCategory, usize)> = None;
    for (category, n) in counts {
        match best {
            Some((_, best_n)) if n <= best_n => {}
            _ => best = Some((category, n)),
        }
    }

    best.map_or(IncidentCategory::Other, |(category, _)| category)
}

/// Finds the cluster matching a selection made against an earlier
/// clustering pass.
///
/// Prefers an identical id; otherwise picks the cluster now holding the
/// previous selection's seed pin. Returns `None` when the selection no
/// longer exists and should be cleared.
#[must_use]
pub fn reselect<'a>(
    clusters: &'a [HotspotCluster],
    previous: &HotspotCluster,
) -> Option<&'a HotspotCluster> {
    clusters
        .iter()
        .find(|c| c.id == previous.id)
        .or_else(|| {
            let seed = previous.pins.first()?;
            clusters.iter().find(|c| c.contains_pin(&seed.id))
        })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    /// Meters per degree of latitude for the 6,371 km sphere.
    const M_PER_DEG_LAT: f64 = 111_194.926_644_558_7;

    const BASE: GeoPoint = GeoPoint::new(39.95, -75.16);

    fn north_of(origin: GeoPoint, meters: f64) -> GeoPoint {
        GeoPoint::new(origin.lat + meters / M_PER_DEG_LAT, origin.lon)
    }

    fn pin(id: &str, point: GeoPoint, category: IncidentCategory) -> IncidentPin {
        IncidentPin {
            id: id.to_string(),
            label: format!("Incident {id}"),
            address: format!("{id} Main St"),
            occurred_at: None,
            point,
            category,
        }
    }

    fn ids(cluster: &HotspotCluster) -> Vec<&str> {
        cluster.pins.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        assert!(cluster_pins(&[], &ClusterConfig::default()).is_empty());
    }

    #[test]
    fn near_pair_and_far_single() {
        let pins = vec![
            pin("a", BASE, IncidentCategory::Fire),
            pin("b", north_of(BASE, 50.0), IncidentCategory::Fire),
            pin("c", north_of(BASE, 5_000.0), IncidentCategory::Ems),
        ];

        let clusters = cluster_pins(&pins, &ClusterConfig::default());

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].count, 2);
        assert_eq!(ids(&clusters[0]), vec!["a", "b"]);
        assert_eq!(clusters[0].dominant_category, IncidentCategory::Fire);
        assert_eq!(clusters[1].count, 1);
        assert_eq!(clusters[1].dominant_category, IncidentCategory::Ems);
    }

    #[test]
    fn singleton_radius_floors_at_minimum() {
        let clusters = cluster_pins(
            &[pin("solo", BASE, IncidentCategory::Service)],
            &ClusterConfig::default(),
        );

        assert_eq!(clusters.len(), 1);
        assert!((clusters[0].radius_meters - 120.0).abs() < 1e-9);
        assert_eq!(clusters[0].center, BASE);
    }

    #[test]
    fn chains_through_intermediate_pins() {
        // a..b and b..c are 200m apart, a..c is 400m: single-link joins all.
        let pins = vec![
            pin("a", BASE, IncidentCategory::Fire),
            pin("c", north_of(BASE, 400.0), IncidentCategory::Fire),
            pin("b", north_of(BASE, 200.0), IncidentCategory::Fire),
        ];

        let clusters = cluster_pins(&pins, &ClusterConfig::default());

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].count, 3);
        assert_eq!(ids(&clusters[0]), vec!["a", "b", "c"]);
    }

    #[test]
    fn radius_covers_farthest_member_plus_padding() {
        let pins = vec![
            pin("a", BASE, IncidentCategory::Fire),
            pin("b", north_of(BASE, 240.0), IncidentCategory::Fire),
        ];

        let cluster = &cluster_pins(&pins, &ClusterConfig::default())[0];

        // Center sits halfway, so the farthest member is ~120m away.
        assert!((cluster.radius_meters - 200.0).abs() < 0.01, "got {}", cluster.radius_meters);
    }

    #[test]
    fn dominant_category_prefers_majority_then_first_seen() {
        let majority = vec![
            pin("a", BASE, IncidentCategory::Ems),
            pin("b", north_of(BASE, 10.0), IncidentCategory::Fire),
            pin("c", north_of(BASE, 20.0), IncidentCategory::Fire),
        ];
        assert_eq!(
            cluster_pins(&majority, &ClusterConfig::default())[0].dominant_category,
            IncidentCategory::Fire
        );

        let tie = vec![
            pin("a", BASE, IncidentCategory::Hazmat),
            pin("b", north_of(BASE, 10.0), IncidentCategory::Fire),
        ];
        assert_eq!(
            cluster_pins(&tie, &ClusterConfig::default())[0].dominant_category,
            IncidentCategory::Hazmat
        );
    }

    #[test]
    fn clusters_sorted_by_descending_count() {
        let far = north_of(BASE, 10_000.0);
        let pins = vec![
            pin("lonely", north_of(BASE, -10_000.0), IncidentCategory::Other),
            pin("f1", far, IncidentCategory::Fire),
            pin("f2", north_of(far, 30.0), IncidentCategory::Fire),
            pin("f3", north_of(far, 60.0), IncidentCategory::Fire),
            pin("n1", BASE, IncidentCategory::Ems),
            pin("n2", north_of(BASE, 30.0), IncidentCategory::Ems),
        ];

        let counts: Vec<usize> = cluster_pins(&pins, &ClusterConfig::default())
            .iter()
            .map(|c| c.count)
            .collect();

        assert_eq!(counts, vec![3, 2, 1]);
    }

    #[test]
    fn cluster_id_encodes_seed_size_and_center() {
        let pins = vec![
            pin("17", BASE, IncidentCategory::Fire),
            pin("18", BASE, IncidentCategory::Fire),
        ];
        let cluster = &cluster_pins(&pins, &ClusterConfig::default())[0];
        assert_eq!(cluster.id, "hotspot-17-2-39.9500_-75.1600");
    }

    #[test]
    fn stable_order_ignores_input_order() {
        let config = ClusterConfig {
            stable_order: true,
            ..ClusterConfig::default()
        };
        let a = pin("a", BASE, IncidentCategory::Fire);
        let b = pin("b", north_of(BASE, 100.0), IncidentCategory::Ems);

        let forward = cluster_pins(&[a.clone(), b.clone()], &config);
        let backward = cluster_pins(&[b, a], &config);

        assert_eq!(forward, backward);
        assert_eq!(forward[0].dominant_category, IncidentCategory::Fire);
    }

    /// Deterministic scatter of pins over a few city blocks.
    #[allow(clippy::cast_precision_loss)]
    fn scatter(n: usize) -> Vec<IncidentPin> {
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 11) as f64 / (1_u64 << 53) as f64
        };

        (0..n)
            .map(|i| {
                let point = GeoPoint::new(BASE.lat + next() * 0.03, BASE.lon + next() * 0.03);
                let category = IncidentCategory::all()[i % IncidentCategory::all().len()];
                pin(&format!("p{i}"), point, category)
            })
            .collect()
    }

    #[test]
    fn clusters_partition_the_input() {
        let pins = scatter(60);
        let clusters = cluster_pins(&pins, &ClusterConfig::default());

        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        for cluster in &clusters {
            assert_eq!(cluster.count, cluster.pins.len());
            for p in &cluster.pins {
                *seen.entry(p.id.as_str()).or_default() += 1;
            }
        }

        assert_eq!(seen.len(), pins.len());
        assert!(seen.values().all(|&n| n == 1));
    }

    #[test]
    fn radius_invariants_hold() {
        let config = ClusterConfig::default();
        for cluster in cluster_pins(&scatter(60), &config) {
            assert!(cluster.radius_meters >= config.min_radius_meters);
            for p in &cluster.pins {
                let d = haversine_meters(cluster.center, p.point);
                assert!(
                    d <= cluster.radius_meters - config.radius_padding_meters + 1e-6,
                    "{} is {d}m from center of {}",
                    p.id,
                    cluster.id
                );
            }
        }
    }

    #[test]
    fn clustering_is_deterministic() {
        let pins = scatter(40);
        let config = ClusterConfig::default();
        assert_eq!(cluster_pins(&pins, &config), cluster_pins(&pins, &config));
    }

    #[test]
    fn reselect_matches_by_id_then_seed_pin() {
        let pins = vec![
            pin("a", BASE, IncidentCategory::Fire),
            pin("b", north_of(BASE, 50.0), IncidentCategory::Fire),
        ];
        let before = cluster_pins(&pins, &ClusterConfig::default());
        let selected = before[0].clone();

        assert_eq!(reselect(&before, &selected).map(|c| &c.id), Some(&selected.id));

        // A new pin joins the group, changing its id.
        let mut grown = pins.clone();
        grown.push(pin("c", north_of(BASE, 100.0), IncidentCategory::Ems));
        let after = cluster_pins(&grown, &ClusterConfig::default());
        let matched = reselect(&after, &selected).unwrap();
        assert_ne!(matched.id, selected.id);
        assert!(matched.contains_pin("a"));

        // The selection's pins are gone entirely.
        let other = cluster_pins(
            &[pin("z", north_of(BASE, 9_000.0), IncidentCategory::Other)],
            &ClusterConfig::default(),
        );
        assert!(reselect(&other, &selected).is_none());
    }
}
