//! Address line composition and cache key derivation.
//!
//! Incident records carry their address as separate street/city/state/ZIP
//! fields, any of which may be blank or filled with placeholder noise
//! (`"UNKNOWN"`, `"N/A"`). This module joins the usable parts into a
//! single comma-separated query line.

use regex::Regex;
use std::sync::LazyLock;

/// Namespace prefix for geocode cache keys.
pub const CACHE_KEY_PREFIX: &str = "geocode:v1:";

/// Regex to collapse runs of whitespace into a single space.
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Placeholder values that carry no location information.
static SKIP_PATTERNS: &[&str] = &[
    "UNKNOWN",
    "N/A",
    "NA",
    "NONE",
    "NULL",
    "NOT AVAILABLE",
    "UNDETERMINED",
];

/// Cleans one address component, returning `None` when nothing usable
/// remains.
fn clean_component(raw: &str) -> Option<String> {
    let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ");
    let cleaned = collapsed.trim_matches(|c: char| c == ',' || c.is_whitespace());

    if cleaned.is_empty()
        || SKIP_PATTERNS
            .iter()
            .any(|p| cleaned.eq_ignore_ascii_case(p))
    {
        return None;
    }

    Some(cleaned.to_string())
}

/// Builds a one-line address from its components.
///
/// Components are trimmed, placeholder values and empty parts are
/// dropped, and the rest are joined with `", "`. Returns an empty string
/// when no component is usable.
#[must_use]
pub fn compose_address_line(street: &str, city: &str, state: &str, zip: Option<&str>) -> String {
    [Some(street), Some(city), Some(state), zip]
        .into_iter()
        .flatten()
        .filter_map(clean_component)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Derives the cache key for a query: the lower-cased, trimmed query under
/// the [`CACHE_KEY_PREFIX`] namespace.
#[must_use]
pub fn cache_key(query: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{}", query.trim().to_lowercase())
}
