#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Fire incident records, category taxonomy, and time-window filters.
//!
//! Incident records arrive already fetched from the department backend.
//! This crate defines the closed category taxonomy every upstream code is
//! normalized into, plus the time-window and category filters that narrow
//! a department's incident list before it is mapped.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Top-level incident categories.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum IncidentCategory {
    /// Structure, vehicle, brush, and other fires
    Fire,
    /// Rescue and emergency medical calls
    Ems,
    /// Hazardous materials and hazardous conditions
    Hazmat,
    /// Public service and assistance calls
    Service,
    /// Alarms with no emergency found
    FalseAlarm,
    /// Anything not fitting the categories above
    Other,
}

impl IncidentCategory {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Fire,
            Self::Ems,
            Self::Hazmat,
            Self::Service,
            Self::FalseAlarm,
            Self::Other,
        ]
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fire => "Fire",
            Self::Ems => "EMS",
            Self::Hazmat => "Hazmat",
            Self::Service => "Service",
            Self::FalseAlarm => "False alarm",
            Self::Other => "Other",
        }
    }

    /// Normalizes a raw upstream category code.
    ///
    /// Accepts the canonical names, common synonyms, and three-digit NFIRS
    /// incident type codes (`111`, `321`, `745`, ...). Anything
    /// unrecognized maps to [`Self::Other`].
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        let normalized = code.trim().to_ascii_lowercase().replace(['-', ' '], "_");

        if normalized.len() == 3 && normalized.bytes().all(|b| b.is_ascii_digit()) {
            return match normalized.as_bytes()[0] {
                b'1' => Self::Fire,
                b'3' => Self::Ems,
                b'4' => Self::Hazmat,
                b'5' => Self::Service,
                b'7' => Self::FalseAlarm,
                _ => Self::Other,
            };
        }

        match normalized.as_str() {
            "structure_fire" | "vehicle_fire" | "brush_fire" | "wildland" | "wildland_fire" => {
                Self::Fire
            }
            "medical" | "rescue" | "rescue_ems" | "ems_call" => Self::Ems,
            "haz_mat" | "hazardous_materials" | "hazardous_condition" => Self::Hazmat,
            "service_call" | "public_service" | "public_assist" => Self::Service,
            "false_call" | "false" | "alarm" | "false_alarms" => Self::FalseAlarm,
            other => Self::from_str(other).unwrap_or(Self::Other),
        }
    }
}

/// Category filter: a single category, or the `all` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CategoryFilter {
    /// No category restriction.
    #[default]
    All,
    /// Only incidents of this category.
    Only(IncidentCategory),
}

impl CategoryFilter {
    /// Returns `true` if `category` passes this filter.
    #[must_use]
    pub fn matches(self, category: IncidentCategory) -> bool {
        match self {
            Self::All => true,
            Self::Only(only) => only == category,
        }
    }
}

impl std::fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(category) => write!(f, "{category}"),
        }
    }
}

/// Error returned when parsing an unknown filter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFilterError {
    /// The rejected input.
    pub value: String,
}

impl std::fmt::Display for InvalidFilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid filter value '{}'", self.value)
    }
}

impl std::error::Error for InvalidFilterError {}

impl FromStr for CategoryFilter {
    type Err = InvalidFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        IncidentCategory::from_str(trimmed)
            .map(Self::Only)
            .map_err(|_| InvalidFilterError {
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for CategoryFilter {
    type Error = InvalidFilterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CategoryFilter> for String {
    fn from(value: CategoryFilter) -> Self {
        value.to_string()
    }
}

/// Time window applied to incident occurrence timestamps.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum TimeWindow {
    /// The last 7 days
    #[serde(rename = "last_7_days")]
    #[strum(serialize = "last_7_days")]
    Last7Days,
    /// The last 30 days
    #[default]
    #[serde(rename = "last_30_days")]
    #[strum(serialize = "last_30_days")]
    Last30Days,
    /// The last 90 days
    #[serde(rename = "last_90_days")]
    #[strum(serialize = "last_90_days")]
    Last90Days,
    /// The last 365 days
    #[serde(rename = "last_year")]
    #[strum(serialize = "last_year")]
    LastYear,
    /// No time restriction
    #[serde(rename = "all_time")]
    #[strum(serialize = "all_time")]
    AllTime,
}

impl TimeWindow {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Last7Days,
            Self::Last30Days,
            Self::Last90Days,
            Self::LastYear,
            Self::AllTime,
        ]
    }

    /// Human-readable label used in status text.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Last7Days => "last 7 days",
            Self::Last30Days => "last 30 days",
            Self::Last90Days => "last 90 days",
            Self::LastYear => "last 12 months",
            Self::AllTime => "all time",
        }
    }

    /// Number of days covered, or `None` for [`Self::AllTime`].
    #[must_use]
    pub const fn days(self) -> Option<i64> {
        match self {
            Self::Last7Days => Some(7),
            Self::Last30Days => Some(30),
            Self::Last90Days => Some(90),
            Self::LastYear => Some(365),
            Self::AllTime => None,
        }
    }

    /// Earliest included timestamp relative to `now`.
    #[must_use]
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.days().map(|days| now - Duration::days(days))
    }

    /// Returns `true` if an incident at `occurred_at` falls in the window.
    ///
    /// Incidents without a timestamp only pass [`Self::AllTime`].
    #[must_use]
    pub fn contains(self, occurred_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match self.cutoff(now) {
            None => true,
            Some(cutoff) => occurred_at.is_some_and(|at| at >= cutoff),
        }
    }
}

/// An incident record as received from the department backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    /// Backend incident identifier.
    pub id: String,
    /// Short human-readable label (incident number, narrative title).
    #[serde(default)]
    pub label: Option<String>,
    /// Street address line.
    #[serde(default)]
    pub street: String,
    /// City name.
    #[serde(default)]
    pub city: String,
    /// State abbreviation.
    #[serde(default)]
    pub state: String,
    /// ZIP code, if known.
    #[serde(default)]
    pub zip: Option<String>,
    /// When the incident occurred.
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    /// Raw category code as stored upstream.
    #[serde(default)]
    pub category: String,
}

impl IncidentRecord {
    /// Normalized category for this record.
    #[must_use]
    pub fn category(&self) -> IncidentCategory {
        IncidentCategory::from_code(&self.category)
    }

    /// Label shown on map markers.
    #[must_use]
    pub fn display_label(&self) -> String {
        self.label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map_or_else(|| format!("Incident {}", self.id), str::to_string)
    }
}

/// Active map filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentFilter {
    /// Time window.
    #[serde(default)]
    pub window: TimeWindow,
    /// Category filter.
    #[serde(default)]
    pub category: CategoryFilter,
}

impl IncidentFilter {
    /// Returns `true` if `record` passes both filters.
    #[must_use]
    pub fn matches(&self, record: &IncidentRecord, now: DateTime<Utc>) -> bool {
        self.category.matches(record.category()) && self.window.contains(record.occurred_at, now)
    }

    /// Filters `records`, preserving input order.
    #[must_use]
    pub fn apply<'a>(
        &self,
        records: &'a [IncidentRecord],
        now: DateTime<Utc>,
    ) -> Vec<&'a IncidentRecord> {
        records.iter().filter(|r| self.matches(r, now)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn record(id: &str, category: &str, days_ago: Option<i64>, now: DateTime<Utc>) -> IncidentRecord {
        IncidentRecord {
            id: id.to_string(),
            label: None,
            street: "1 Main St".to_string(),
            city: "Anytown".to_string(),
            state: "ST".to_string(),
            zip: None,
            occurred_at: days_ago.map(|d| now - Duration::days(d)),
            category: category.to_string(),
        }
    }

    #[test]
    fn maps_category_codes() {
        assert_eq!(IncidentCategory::from_code("fire"), IncidentCategory::Fire);
        assert_eq!(IncidentCategory::from_code(" EMS "), IncidentCategory::Ems);
        assert_eq!(IncidentCategory::from_code("Haz-Mat"), IncidentCategory::Hazmat);
        assert_eq!(
            IncidentCategory::from_code("False Alarm"),
            IncidentCategory::FalseAlarm
        );
        assert_eq!(IncidentCategory::from_code("111"), IncidentCategory::Fire);
        assert_eq!(IncidentCategory::from_code("321"), IncidentCategory::Ems);
        assert_eq!(IncidentCategory::from_code("745"), IncidentCategory::FalseAlarm);
        assert_eq!(IncidentCategory::from_code("611"), IncidentCategory::Other);
        assert_eq!(IncidentCategory::from_code("parade"), IncidentCategory::Other);
        assert_eq!(IncidentCategory::from_code(""), IncidentCategory::Other);
    }

    #[test]
    fn parses_category_filter() {
        assert_eq!("all".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!(
            "false_alarm".parse::<CategoryFilter>().unwrap(),
            CategoryFilter::Only(IncidentCategory::FalseAlarm)
        );
        assert!("arson".parse::<CategoryFilter>().is_err());
        assert_eq!(CategoryFilter::Only(IncidentCategory::Ems).to_string(), "ems");
    }

    #[test]
    fn category_filter_serde_uses_plain_strings() {
        let json = serde_json::to_string(&CategoryFilter::Only(IncidentCategory::Hazmat)).unwrap();
        assert_eq!(json, "\"hazmat\"");
        let back: CategoryFilter = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(back, CategoryFilter::All);
    }

    #[test]
    fn time_window_names_round_trip_through_strum() {
        for window in TimeWindow::all() {
            let parsed: TimeWindow = window.to_string().parse().unwrap();
            assert_eq!(parsed, *window);
        }
        assert_eq!(TimeWindow::Last7Days.to_string(), "last_7_days");
    }

    #[test]
    fn filter_keeps_order_and_respects_window() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let records = vec![
            record("a", "fire", Some(3), now),
            record("b", "ems", Some(10), now),
            record("c", "fire", Some(45), now),
            record("d", "fire", None, now),
            record("e", "111", Some(1), now),
        ];

        let filter = IncidentFilter {
            window: TimeWindow::Last30Days,
            category: CategoryFilter::Only(IncidentCategory::Fire),
        };
        let ids: Vec<&str> = filter
            .apply(&records, now)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "e"]);

        let everything = IncidentFilter {
            window: TimeWindow::AllTime,
            category: CategoryFilter::All,
        };
        assert_eq!(everything.apply(&records, now).len(), records.len());
    }

    #[test]
    fn display_label_falls_back_to_id() {
        let now = Utc::now();
        let mut r = record("42", "fire", None, now);
        assert_eq!(r.display_label(), "Incident 42");
        r.label = Some("  ".to_string());
        assert_eq!(r.display_label(), "Incident 42");
        r.label = Some("Kitchen fire".to_string());
        assert_eq!(r.display_label(), "Kitchen fire");
    }
}
