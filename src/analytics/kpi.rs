//! Reliability KPIs
//!
//! Headline counters and the reliability index derived from aggregate
//! counts. The index is a percentage clamped to [0, 100]; when the
//! denominator is unavailable the sentinel "N/A" is reported instead of a
//! number.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::data::row::AnalysisType;
use crate::data::TableStore;

pub const NOT_AVAILABLE: &str = "N/A";

/// A KPI cell: numeric where computable, the sentinel text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KpiValue {
    Number(f64),
    Text(String),
}

impl KpiValue {
    fn not_available() -> Self {
        KpiValue::Text(NOT_AVAILABLE.to_string())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            KpiValue::Number(n) => Some(*n),
            KpiValue::Text(_) => None,
        }
    }
}

/// Compute the headline KPI map for one store snapshot.
pub fn compute(store: &TableStore) -> BTreeMap<String, KpiValue> {
    let mut kpis = BTreeMap::new();
    let tables = &store.tables;
    match store.analysis {
        AnalysisType::Cdv => {
            let fo_total = tables.occupancy_failures.as_deref().map_or(0, <[_]>::len);
            let fl_total = tables.release_failures.as_deref().map_or(0, <[_]>::len);
            let affected: BTreeSet<&str> = tables
                .occupancy_failures
                .iter()
                .flatten()
                .map(|r| r.equipment.as_str())
                .chain(
                    tables
                        .release_failures
                        .iter()
                        .flatten()
                        .map(|r| r.equipment.as_str()),
                )
                .collect();
            let operations: f64 = tables
                .occupancy_counts
                .iter()
                .flatten()
                .filter_map(|r| r.count)
                .sum();

            kpis.insert("fallos_ocupacion_total".into(), KpiValue::Number(fo_total as f64));
            kpis.insert("fallos_liberacion_total".into(), KpiValue::Number(fl_total as f64));
            kpis.insert("equipos_afectados".into(), KpiValue::Number(affected.len() as f64));
            kpis.insert(
                "indice_fiabilidad".into(),
                reliability((fo_total + fl_total) as f64, operations),
            );
        }
        AnalysisType::Adv => {
            let disc_total = tables.discordances.as_deref().map_or(0, <[_]>::len);
            let movements: f64 = tables
                .movements
                .iter()
                .flatten()
                .filter_map(|r| r.count)
                .sum();
            let affected: BTreeSet<&str> = tables
                .discordances
                .iter()
                .flatten()
                .map(|r| r.equipment.as_str())
                .collect();

            kpis.insert("discordancias_total".into(), KpiValue::Number(disc_total as f64));
            kpis.insert("movimientos_total".into(), KpiValue::Number(movements));
            kpis.insert("agujas_afectadas".into(), KpiValue::Number(affected.len() as f64));
            // The original pipeline reports N/A unless both totals are
            // positive, so a discordance-free month stays N/A rather than 100.
            let value = if disc_total > 0 && movements > 0.0 {
                reliability(disc_total as f64, movements)
            } else {
                KpiValue::not_available()
            };
            kpis.insert("indice_fiabilidad".into(), value);
        }
    }
    kpis
}

fn reliability(faults: f64, operations: f64) -> KpiValue {
    if operations > 0.0 {
        KpiValue::Number((100.0 * (1.0 - faults / operations)).clamp(0.0, 100.0))
    } else {
        KpiValue::not_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::row::{
        DiscordanceRow, MovementRow, OccupancyCountRow, OccupancyFailureRow, ReleaseFailureRow,
        Tables,
    };
    use chrono::NaiveDate;

    fn cdv_store(fo: usize, fl: usize, counts: &[f64]) -> TableStore {
        let tables = Tables {
            occupancy_failures: Some(
                (0..fo)
                    .map(|i| OccupancyFailureRow {
                        timestamp: None,
                        equipment: format!("CDV_{i}"),
                        station: None,
                        hold_time: None,
                    })
                    .collect(),
            ),
            release_failures: Some(
                (0..fl)
                    .map(|i| ReleaseFailureRow {
                        timestamp: None,
                        equipment: format!("CDV_{i}"),
                        station: None,
                    })
                    .collect(),
            ),
            occupancy_counts: Some(
                counts
                    .iter()
                    .map(|&c| OccupancyCountRow {
                        date: NaiveDate::from_ymd_opt(2024, 3, 1),
                        equipment: "CDV_0".to_string(),
                        count: Some(c),
                    })
                    .collect(),
            ),
            ..Tables::default()
        };
        TableStore { line: "L1".to_string(), analysis: AnalysisType::Cdv, tables }
    }

    #[test]
    fn reliability_is_clamped_to_percentage_range() {
        // More faults than operations would go negative without the clamp.
        let kpis = compute(&cdv_store(50, 50, &[10.0]));
        assert_eq!(kpis["indice_fiabilidad"], KpiValue::Number(0.0));

        let kpis = compute(&cdv_store(2, 3, &[1000.0]));
        let value = kpis["indice_fiabilidad"].as_number().unwrap();
        assert!((0.0..=100.0).contains(&value));
        assert!((value - 99.5).abs() < 1e-9);
    }

    #[test]
    fn missing_operation_counts_report_sentinel() {
        let kpis = compute(&cdv_store(5, 0, &[]));
        assert_eq!(
            kpis["indice_fiabilidad"],
            KpiValue::Text(NOT_AVAILABLE.to_string())
        );
    }

    #[test]
    fn affected_equipment_is_a_distinct_union() {
        // fo: CDV_0..CDV_4, fl: CDV_0..CDV_2, union is 5.
        let kpis = compute(&cdv_store(5, 3, &[100.0]));
        assert_eq!(kpis["equipos_afectados"], KpiValue::Number(5.0));
    }

    #[test]
    fn adv_reliability_requires_both_totals() {
        let tables = Tables {
            discordances: Some(vec![DiscordanceRow {
                timestamp: None,
                equipment: "AG_1".to_string(),
                line: None,
            }]),
            movements: Some(vec![MovementRow {
                date: NaiveDate::from_ymd_opt(2024, 3, 1),
                equipment: "AG_1".to_string(),
                count: Some(200.0),
            }]),
            ..Tables::default()
        };
        let store =
            TableStore { line: "L5".to_string(), analysis: AnalysisType::Adv, tables };
        let kpis = compute(&store);
        let value = kpis["indice_fiabilidad"].as_number().unwrap();
        assert!((value - 99.5).abs() < 1e-9);

        let empty = TableStore {
            line: "L5".to_string(),
            analysis: AnalysisType::Adv,
            tables: Tables::default(),
        };
        let kpis = compute(&empty);
        assert_eq!(
            kpis["indice_fiabilidad"],
            KpiValue::Text(NOT_AVAILABLE.to_string())
        );
    }
}
