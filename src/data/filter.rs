//! Filter Pipeline
//!
//! Date-range / equipment / granularity filtering applied to a dataset
//! snapshot before chart derivation. One `FilterSpec` maps deterministically
//! to one filtered snapshot.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::data::row::Tables;

/// Temporal bucketing selector for distribution and heatmap views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

/// The apply-filters payload. An empty equipment set means "no filter".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub equipment: BTreeSet<String>,
    #[serde(default)]
    pub granularity: Granularity,
}

impl FilterSpec {
    fn keeps_date(&self, date: Option<NaiveDate>) -> bool {
        if self.start_date.is_none() && self.end_date.is_none() {
            return true;
        }
        // An active date filter drops rows whose timestamp failed to parse.
        let Some(date) = date else { return false };
        self.start_date.is_none_or(|start| date >= start)
            && self.end_date.is_none_or(|end| date <= end)
    }

    fn keeps_timestamp(&self, ts: Option<NaiveDateTime>) -> bool {
        self.keeps_date(ts.map(|t| t.date()))
    }

    fn keeps_equipment(&self, equipment: &str) -> bool {
        self.equipment.is_empty() || self.equipment.contains(equipment)
    }
}

/// Produce a fresh snapshot holding only the rows the spec retains. Absent
/// datasets stay absent.
pub fn apply(tables: &Tables, spec: &FilterSpec) -> Tables {
    Tables {
        occupancy_failures: tables.occupancy_failures.as_ref().map(|rows| {
            rows.iter()
                .filter(|r| spec.keeps_timestamp(r.timestamp) && spec.keeps_equipment(&r.equipment))
                .cloned()
                .collect()
        }),
        release_failures: tables.release_failures.as_ref().map(|rows| {
            rows.iter()
                .filter(|r| spec.keeps_timestamp(r.timestamp) && spec.keeps_equipment(&r.equipment))
                .cloned()
                .collect()
        }),
        occupancy_counts: tables.occupancy_counts.as_ref().map(|rows| {
            rows.iter()
                .filter(|r| spec.keeps_date(r.date) && spec.keeps_equipment(&r.equipment))
                .cloned()
                .collect()
        }),
        discordances: tables.discordances.as_ref().map(|rows| {
            rows.iter()
                .filter(|r| spec.keeps_timestamp(r.timestamp) && spec.keeps_equipment(&r.equipment))
                .cloned()
                .collect()
        }),
        movements: tables.movements.as_ref().map(|rows| {
            rows.iter()
                .filter(|r| spec.keeps_date(r.date) && spec.keeps_equipment(&r.equipment))
                .cloned()
                .collect()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::row::OccupancyFailureRow;

    fn fo_row(ts: &str, equipment: &str) -> OccupancyFailureRow {
        OccupancyFailureRow {
            timestamp: NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").ok(),
            equipment: equipment.to_string(),
            station: None,
            hold_time: None,
        }
    }

    fn sample_tables() -> Tables {
        Tables {
            occupancy_failures: Some(vec![
                fo_row("2024-03-01 08:00:00", "CDV_101"),
                fo_row("2024-03-15 09:00:00", "CDV_102"),
                fo_row("2024-03-31 23:59:00", "CDV_101"),
            ]),
            ..Tables::default()
        }
    }

    #[test]
    fn date_range_is_inclusive_of_both_ends() {
        let spec = FilterSpec {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 31),
            ..FilterSpec::default()
        };
        let filtered = apply(&sample_tables(), &spec);
        assert_eq!(filtered.occupancy_failures.unwrap().len(), 3);
    }

    #[test]
    fn equipment_allowlist_restricts_rows() {
        let spec = FilterSpec {
            equipment: BTreeSet::from(["CDV_101".to_string()]),
            ..FilterSpec::default()
        };
        let filtered = apply(&sample_tables(), &spec);
        assert_eq!(filtered.occupancy_failures.unwrap().len(), 2);
    }

    #[test]
    fn empty_allowlist_keeps_everything() {
        let filtered = apply(&sample_tables(), &FilterSpec::default());
        assert_eq!(filtered, sample_tables());
    }

    #[test]
    fn null_timestamps_fall_to_an_active_date_filter() {
        let mut tables = sample_tables();
        tables
            .occupancy_failures
            .as_mut()
            .unwrap()
            .push(OccupancyFailureRow {
                timestamp: None,
                equipment: "CDV_999".to_string(),
                station: None,
                hold_time: None,
            });
        let spec = FilterSpec {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 31),
            ..FilterSpec::default()
        };
        let filtered = apply(&tables, &spec);
        assert!(filtered
            .occupancy_failures
            .unwrap()
            .iter()
            .all(|r| r.equipment != "CDV_999"));
    }

    #[test]
    fn over_restrictive_filter_yields_empty_snapshot() {
        let spec = FilterSpec {
            start_date: NaiveDate::from_ymd_opt(2030, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2030, 1, 2),
            ..FilterSpec::default()
        };
        let filtered = apply(&sample_tables(), &spec);
        assert!(filtered.is_empty());
        // Original snapshot untouched
        assert_eq!(sample_tables().row_total(), 3);
    }

    #[test]
    fn granularity_round_trips_lowercase() {
        let g: Granularity = serde_json::from_str("\"weekly\"").unwrap();
        assert_eq!(g, Granularity::Weekly);
        assert_eq!(serde_json::to_string(&Granularity::Monthly).unwrap(), "\"monthly\"");
    }
}
