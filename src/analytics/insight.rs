//! Insight Engine
//!
//! Turns a loaded dataset snapshot into ranked offenders, temporal patterns
//! and maintenance recommendations. Pure over the snapshot: the same store
//! always produces the same bundle, and missing datasets simply leave their
//! sections out instead of failing the whole analysis.
//!
//! Summary keys and user-facing sentences keep the operational vocabulary of
//! the signalling maintenance teams (Spanish), matching the exports.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::analytics::anomaly::{self, DEFAULT_CONTAMINATION};
use crate::data::row::{AnalysisType, DatasetKind, Tables};
use crate::data::TableStore;
use crate::utils::calendar::WEEKDAYS;

/// One outlier row flagged by the anomaly pass over a count dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyRecord {
    pub dataset: DatasetKind,
    pub equipment: String,
    pub date: Option<NaiveDate>,
    pub value: f64,
}

/// The full analysis result. Always present, possibly sparse.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InsightBundle {
    pub recommendations: Vec<String>,
    pub detected_patterns: Vec<String>,
    pub anomalies: Vec<AnomalyRecord>,
    pub summary: BTreeMap<String, Value>,
}

/// Analyze one store snapshot.
pub fn analyze(store: &TableStore) -> InsightBundle {
    let mut bundle = InsightBundle::default();
    match store.analysis {
        AnalysisType::Cdv => analyze_cdv(&store.tables, &mut bundle),
        AnalysisType::Adv => analyze_adv(&store.tables, &mut bundle),
    }
    append_static_recommendations(store.analysis, &mut bundle);
    bundle
}

fn analyze_cdv(tables: &Tables, bundle: &mut InsightBundle) {
    if let Some(rows) = tables.occupancy_failures.as_deref().filter(|r| !r.is_empty()) {
        let ranked = rank_by_count(rows.iter().map(|r| r.equipment.as_str()));
        let top5: Vec<&str> = ranked.iter().take(5).map(|(id, _)| id.as_str()).collect();
        bundle
            .summary
            .insert("top_equipos_fallos_ocupacion".into(), json!(top5));
        for equipo in top5.iter().take(3) {
            bundle.recommendations.push(format!(
                "Realizar inspección y mantenimiento prioritario del CDV: {equipo} \
                 debido a alta frecuencia de fallos de ocupación."
            ));
        }

        let peaks = peak_hours(rows.iter().filter_map(|r| r.timestamp));
        if !peaks.is_empty() {
            let listed = join_hours(&peaks);
            bundle.detected_patterns.push(format!(
                "Se detectan más fallos de ocupación durante las horas: {listed}"
            ));
            bundle.recommendations.push(format!(
                "Programar inspecciones adicionales durante las horas pico de fallos: {listed}"
            ));
        }
    }

    if let Some(rows) = tables.release_failures.as_deref().filter(|r| !r.is_empty()) {
        let ranked = rank_by_count(rows.iter().map(|r| r.equipment.as_str()));
        let top5: Vec<&str> = ranked.iter().take(5).map(|(id, _)| id.as_str()).collect();
        bundle
            .summary
            .insert("top_equipos_fallos_liberacion".into(), json!(top5));
        for equipo in top5.iter().take(3) {
            bundle.recommendations.push(format!(
                "Programar ajuste de sensibilidad para el CDV: {equipo} \
                 debido a fallos recurrentes de liberación."
            ));
        }
    }

    // Equipment failing in both categories is the strongest replacement signal.
    if let (Some(fo), Some(fl)) = (
        tables.occupancy_failures.as_deref(),
        tables.release_failures.as_deref(),
    ) {
        let fo_ids: BTreeSet<&str> = fo.iter().map(|r| r.equipment.as_str()).collect();
        let fl_ids: BTreeSet<&str> = fl.iter().map(|r| r.equipment.as_str()).collect();
        let both: Vec<&str> = fo_ids.intersection(&fl_ids).copied().collect();
        if !both.is_empty() {
            bundle
                .summary
                .insert("equipos_con_ambos_fallos".into(), json!(both));
            bundle.recommendations.push(format!(
                "Considerar reemplazo preventivo de los CDVs con ambos tipos de fallos: {}",
                both.iter().take(3).copied().collect::<Vec<_>>().join(", ")
            ));
        }
    }

    if let Some(rows) = tables.occupancy_counts.as_deref().filter(|r| !r.is_empty()) {
        if let Some(day) = busiest_weekday(rows.iter().filter_map(|r| Some((r.date?, r.count?)))) {
            bundle
                .summary
                .insert("dia_mayor_ocupacion".into(), json!(day));
            bundle
                .detected_patterns
                .push(format!("El día con mayor promedio de ocupaciones es {day}"));
        }
        score_counts(
            DatasetKind::OccupancyCounts,
            rows.iter().map(|r| (r.equipment.as_str(), r.date, r.count)),
            bundle,
        );
    }
}

fn analyze_adv(tables: &Tables, bundle: &mut InsightBundle) {
    if let Some(rows) = tables.discordances.as_deref().filter(|r| !r.is_empty()) {
        let ranked = rank_by_count(rows.iter().map(|r| r.equipment.as_str()));
        let top5: Vec<&str> = ranked.iter().take(5).map(|(id, _)| id.as_str()).collect();
        bundle
            .summary
            .insert("top_equipos_discordancias".into(), json!(top5));
        bundle.recommendations.push(format!(
            "Realizar verificación prioritaria de los mecanismos de las agujas: {}",
            top5.iter().take(3).copied().collect::<Vec<_>>().join(", ")
        ));

        let peaks = peak_hours(rows.iter().filter_map(|r| r.timestamp));
        if !peaks.is_empty() {
            let listed = join_hours(&peaks);
            bundle.detected_patterns.push(format!(
                "Se detectan más discordancias durante las horas: {listed}"
            ));
            bundle.recommendations.push(format!(
                "Programar inspecciones adicionales durante las horas pico de discordancias: {listed}"
            ));
        }
    }

    if let Some(rows) = tables.movements.as_deref().filter(|r| !r.is_empty()) {
        let ranked = rank_by_sum(rows.iter().filter_map(|r| Some((r.equipment.as_str(), r.count?))));
        if !ranked.is_empty() {
            let top5: Vec<&str> = ranked.iter().take(5).map(|(id, _)| id.as_str()).collect();
            bundle
                .summary
                .insert("top_equipos_movimientos".into(), json!(top5));
            bundle.recommendations.push(format!(
                "Programar lubricación y mantenimiento preventivo para las agujas con mayor uso: {}",
                top5.iter().take(3).copied().collect::<Vec<_>>().join(", ")
            ));
        }
        // Static maintenance policy, emitted whenever movement data exists.
        bundle.recommendations.push(
            "Implementar plan de lubricación semanal para las agujas con más de \
             100 movimientos por día"
                .to_string(),
        );
        score_counts(
            DatasetKind::Movements,
            rows.iter().map(|r| (r.equipment.as_str(), r.date, r.count)),
            bundle,
        );
    }
}

fn append_static_recommendations(analysis: AnalysisType, bundle: &mut InsightBundle) {
    match analysis {
        AnalysisType::Cdv => {
            bundle.recommendations.push(
                "Establecer un programa de inspección visual mensual para los CDVs \
                 con mayor frecuencia de fallos"
                    .to_string(),
            );
            bundle.recommendations.push(
                "Implementar un protocolo de limpieza trimestral para los circuitos \
                 de vía en estaciones con mayor tráfico"
                    .to_string(),
            );
        }
        AnalysisType::Adv => {
            bundle.recommendations.push(
                "Establecer un programa de inspección y lubricación preventiva para \
                 agujas con más de 50 movimientos diarios"
                    .to_string(),
            );
            bundle.recommendations.push(
                "Verificar mensualmente la calibración de los sistemas de detección \
                 en agujas con discordancias recurrentes"
                    .to_string(),
            );
        }
    }
}

/// Count events per equipment, descending, ties broken by id ascending.
pub fn rank_by_count<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for id in ids {
        *counts.entry(id).or_default() += 1;
    }
    let mut ranked: Vec<(String, usize)> =
        counts.into_iter().map(|(id, n)| (id.to_string(), n)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Sum a numeric column per equipment, descending, ties broken by id ascending.
fn rank_by_sum<'a>(pairs: impl Iterator<Item = (&'a str, f64)>) -> Vec<(String, f64)> {
    let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
    for (id, value) in pairs {
        *sums.entry(id).or_default() += value;
    }
    let mut ranked: Vec<(String, f64)> =
        sums.into_iter().map(|(id, s)| (id.to_string(), s)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Hours whose event count exceeds mean + one sample standard deviation of
/// the per-hour distribution, ascending. Fewer than two populated hours
/// cannot yield a meaningful deviation, so no peaks are reported.
pub fn peak_hours(timestamps: impl Iterator<Item = NaiveDateTime>) -> Vec<u32> {
    let mut by_hour: BTreeMap<u32, f64> = BTreeMap::new();
    for ts in timestamps {
        *by_hour.entry(ts.hour()).or_default() += 1.0;
    }
    if by_hour.len() < 2 {
        return Vec::new();
    }
    let counts: Vec<f64> = by_hour.values().copied().collect();
    let mean = counts.iter().sum::<f64>() / counts.len() as f64;
    let variance =
        counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / (counts.len() - 1) as f64;
    let threshold = mean + variance.sqrt();
    by_hour
        .into_iter()
        .filter(|&(_, count)| count > threshold)
        .map(|(hour, _)| hour)
        .collect()
}

/// Weekday with the highest mean count, names in English as exported.
fn busiest_weekday(rows: impl Iterator<Item = (NaiveDate, f64)>) -> Option<&'static str> {
    let mut per_day: BTreeMap<usize, (f64, usize)> = BTreeMap::new();
    for (date, count) in rows {
        let slot = per_day
            .entry(date.weekday().num_days_from_monday() as usize)
            .or_insert((0.0, 0));
        slot.0 += count;
        slot.1 += 1;
    }
    per_day
        .into_iter()
        .map(|(day, (sum, n))| (day, sum / n as f64))
        .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(day, _)| WEEKDAYS[day])
}

fn score_counts<'a>(
    dataset: DatasetKind,
    rows: impl Iterator<Item = (&'a str, Option<NaiveDate>, Option<f64>)>,
    bundle: &mut InsightBundle,
) {
    let rows: Vec<(&str, Option<NaiveDate>, Option<f64>)> = rows.collect();
    let values: Vec<Option<f64>> = rows.iter().map(|&(_, _, count)| count).collect();
    let mask = anomaly::score(&values, DEFAULT_CONTAMINATION);
    for (&(equipment, date, count), flagged) in rows.iter().zip(mask) {
        if flagged {
            bundle.anomalies.push(AnomalyRecord {
                dataset,
                equipment: equipment.to_string(),
                date,
                value: count.unwrap_or_default(),
            });
        }
    }
}

fn join_hours(hours: &[u32]) -> String {
    hours.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
}
