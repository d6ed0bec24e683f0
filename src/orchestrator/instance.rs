//! Dashboard Instance
//!
//! One servable analytics unit: the immutable dataset snapshot, the insight
//! bundle and KPIs computed once at construction, and the synchronous
//! filter-recompute contract the HTTP layer calls into.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::analytics::{self, InsightBundle, KpiValue};
use crate::data::row::AnalysisType;
use crate::data::{filter, FilterSpec, TableStore};
use crate::figures::{self, FigureSet};
use crate::orchestrator::registry::InstanceKey;

/// Rows surfaced in the dashboard's detail table.
#[derive(Debug, Clone, Serialize)]
pub struct DetailRow {
    pub timestamp: Option<String>,
    pub equipment: String,
    /// Station (CDV) or line (ADV)
    pub context: Option<String>,
    /// Hold time to the next event, CDV occupancy failures only
    pub extra: Option<String>,
}

const DETAIL_ROW_LIMIT: usize = 50;

pub struct DashboardInstance {
    pub key: InstanceKey,
    pub port: u16,
    pub store: TableStore,
    pub insights: InsightBundle,
    pub kpis: BTreeMap<String, KpiValue>,
}

impl DashboardInstance {
    /// Runs the insight engine and KPI computation once; both stay fixed for
    /// the instance lifetime (no file re-reads, stale until relaunch).
    pub fn new(key: InstanceKey, port: u16, store: TableStore) -> Self {
        let insights = analytics::analyze(&store);
        let kpis = analytics::compute_kpis(&store);
        Self { key, port, store, insights, kpis }
    }

    /// The apply-filters contract: one spec in, four charts out. An
    /// over-restrictive filter that empties the snapshot falls back to the
    /// unfiltered tables so the dashboard never renders blank.
    pub fn recompute(&self, spec: &FilterSpec) -> FigureSet {
        let filtered = filter::apply(&self.store.tables, spec);
        let tables = if filtered.is_empty() { &self.store.tables } else { &filtered };
        figures::build_set(tables, self.store.analysis, spec.granularity)
    }

    /// Charts for the initial page load, before any filter is applied.
    pub fn initial_figures(&self) -> FigureSet {
        figures::build_set(
            &self.store.tables,
            self.store.analysis,
            crate::data::Granularity::default(),
        )
    }

    /// Distinct equipment ids across the failure/discordance datasets,
    /// sorted; feeds the dashboard's equipment filter dropdown.
    pub fn equipment_list(&self) -> Vec<String> {
        let tables = &self.store.tables;
        let mut ids: BTreeSet<&str> = BTreeSet::new();
        match self.store.analysis {
            AnalysisType::Cdv => {
                ids.extend(tables.occupancy_failures.iter().flatten().map(|r| r.equipment.as_str()));
                ids.extend(tables.release_failures.iter().flatten().map(|r| r.equipment.as_str()));
            }
            AnalysisType::Adv => {
                ids.extend(tables.discordances.iter().flatten().map(|r| r.equipment.as_str()));
            }
        }
        ids.into_iter().map(str::to_string).collect()
    }

    /// Min/max dates with data, bounding the dashboard's date picker.
    pub fn date_range(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        let dates: Vec<NaiveDate> = self
            .store
            .tables
            .primary_events(self.store.analysis)
            .iter()
            .filter_map(|e| e.timestamp.map(|ts| ts.date()))
            .collect();
        (dates.iter().min().copied(), dates.iter().max().copied())
    }

    /// First rows of the primary dataset for the detail table.
    pub fn detail_rows(&self) -> Vec<DetailRow> {
        let tables = &self.store.tables;
        match self.store.analysis {
            AnalysisType::Cdv => tables
                .occupancy_failures
                .iter()
                .flatten()
                .take(DETAIL_ROW_LIMIT)
                .map(|r| DetailRow {
                    timestamp: r.timestamp.map(|ts| ts.format("%d-%m-%Y %H:%M:%S").to_string()),
                    equipment: r.equipment.clone(),
                    context: r.station.clone(),
                    extra: r.hold_time.clone(),
                })
                .collect(),
            AnalysisType::Adv => tables
                .discordances
                .iter()
                .flatten()
                .take(DETAIL_ROW_LIMIT)
                .map(|r| DetailRow {
                    timestamp: r.timestamp.map(|ts| ts.format("%d-%m-%Y %H:%M:%S").to_string()),
                    equipment: r.equipment.clone(),
                    context: r.line.clone(),
                    extra: None,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::row::{OccupancyFailureRow, Tables};
    use chrono::NaiveDateTime;
    use std::collections::BTreeSet;

    fn instance() -> DashboardInstance {
        let rows = vec![
            OccupancyFailureRow {
                timestamp: NaiveDateTime::parse_from_str("2024-03-10 08:00:00", "%Y-%m-%d %H:%M:%S").ok(),
                equipment: "CDV_2".to_string(),
                station: Some("Tobalaba".to_string()),
                hold_time: None,
            },
            OccupancyFailureRow {
                timestamp: NaiveDateTime::parse_from_str("2024-03-20 09:00:00", "%Y-%m-%d %H:%M:%S").ok(),
                equipment: "CDV_1".to_string(),
                station: None,
                hold_time: None,
            },
        ];
        let store = TableStore {
            line: "L1".to_string(),
            analysis: AnalysisType::Cdv,
            tables: Tables { occupancy_failures: Some(rows), ..Tables::default() },
        };
        DashboardInstance::new(InstanceKey::new("L1", AnalysisType::Cdv), 8050, store)
    }

    #[test]
    fn empty_filter_result_falls_back_to_unfiltered_charts() {
        let instance = instance();
        let spec = FilterSpec {
            start_date: NaiveDate::from_ymd_opt(2030, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2030, 1, 31),
            ..FilterSpec::default()
        };
        let figures = instance.recompute(&spec);
        // Charts come from the unfiltered snapshot instead of rendering blank.
        assert!(!figures.trend.no_data);
        assert_eq!(figures.trend.values.iter().sum::<f64>(), 2.0);
    }

    #[test]
    fn recompute_is_deterministic_for_a_given_spec() {
        let instance = instance();
        let spec = FilterSpec {
            equipment: BTreeSet::from(["CDV_2".to_string()]),
            ..FilterSpec::default()
        };
        assert_eq!(instance.recompute(&spec), instance.recompute(&spec));
        // And actually filtered when the subset is non-empty.
        assert_eq!(instance.recompute(&spec).trend.values, vec![1.0]);
    }

    #[test]
    fn equipment_list_is_sorted_and_distinct() {
        assert_eq!(instance().equipment_list(), vec!["CDV_1", "CDV_2"]);
    }

    #[test]
    fn date_range_spans_the_data() {
        let (min, max) = instance().date_range();
        assert_eq!(min, NaiveDate::from_ymd_opt(2024, 3, 10));
        assert_eq!(max, NaiveDate::from_ymd_opt(2024, 3, 20));
    }
}
