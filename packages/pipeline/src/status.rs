//! Human-readable status lines shown above the map preview.

use fire_portal_incident_models::{CategoryFilter, TimeWindow};

/// Shown when a run fails unexpectedly.
pub const UNAVAILABLE: &str = "Map preview unavailable";

/// Summary for a completed run.
///
/// `mapped` is the number of pins produced, `total` the number of filtered
/// incidents, and `cap` the per-run lookup limit. When `total` exceeds
/// `cap` the line says so.
#[must_use]
pub fn summary(
    mapped: usize,
    total: usize,
    cap: usize,
    window: TimeWindow,
    category: CategoryFilter,
) -> String {
    let filters = format!("({}, category: {category})", window.label());

    if mapped == 0 {
        return format!("No mappable addresses: 0 incidents mapped {filters}");
    }

    let noun = if mapped == 1 { "incident" } else { "incidents" };
    let mut line = format!("Showing {mapped} mapped {noun} {filters}");

    if total > cap {
        line.push_str(&format!("; first {cap} of {total} geocoded"));
    }

    line
}
