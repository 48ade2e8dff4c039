//! Dashboard statistics of the active app.
//!
//! The payloads are aggregates whose fields vary with the backend version,
//! so they are kept as JSON objects with typed accessors.

use std::fmt;
use std::str::FromStr;

use otadash_query::{query_key, Query};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::scope::{app_scoped, ActiveAppStore};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DashboardStats(pub Map<String, Value>);

impl DashboardStats {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// A counter such as `total_devices`, when present and numeric.
    pub fn count(&self, field: &str) -> Option<u64> {
        self.0.get(field).and_then(Value::as_u64)
    }
}

/// Time series behind the dashboard charts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsData(pub Map<String, Value>);

impl StatsData {
    pub fn get(&self, series: &str) -> Option<&Value> {
        self.0.get(series)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsRange {
    Day,
    Week,
    #[default]
    Month,
    Year,
}

impl StatsRange {
    pub fn as_str(self) -> &'static str {
        match self {
            StatsRange::Day => "day",
            StatsRange::Week => "week",
            StatsRange::Month => "month",
            StatsRange::Year => "year",
        }
    }
}

impl fmt::Display for StatsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatsRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(StatsRange::Day),
            "week" => Ok(StatsRange::Week),
            "month" => Ok(StatsRange::Month),
            "year" => Ok(StatsRange::Year),
            other => Err(format!(
                "unknown range '{}' (expected day, week, month or year)",
                other
            )),
        }
    }
}

pub fn dashboard(active: &ActiveAppStore) -> Query<DashboardStats> {
    app_scoped(
        |app| query_key!["dashboard", "stats", app],
        active,
        "/dashboard/stats",
        vec![],
    )
}

pub fn data(active: &ActiveAppStore, range: StatsRange) -> Query<StatsData> {
    app_scoped(
        move |app| query_key!["dashboard", "stats-data", range.as_str(), app],
        active,
        "/dashboard/stats-data",
        vec![("range", Some(range.to_string()))],
    )
}
