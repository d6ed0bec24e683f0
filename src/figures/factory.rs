//! Figure Factory
//!
//! Pure chart derivations over a dataset snapshot. Same snapshot and
//! granularity in, same specs out; a snapshot that cannot support a chart
//! yields `ComputationDegradation`, which `build_set` recovers into the
//! placeholder spec.

use chrono::{Datelike, NaiveDate, Timelike};
use std::collections::BTreeMap;

use crate::data::row::{AnalysisType, Tables};
use crate::data::Granularity;
use crate::figures::spec::{ChartKind, ComputationDegradation, FigureSet, FigureSpec};
use crate::utils::calendar::{month_name, WEEKDAYS};

const TOP_OFFENDERS: usize = 15;

/// Derive the four standard charts, degrading each independently.
pub fn build_set(tables: &Tables, analysis: AnalysisType, granularity: Granularity) -> FigureSet {
    FigureSet {
        trend: trend(tables, analysis)
            .unwrap_or_else(|_| FigureSpec::placeholder(ChartKind::Line, "tendencia temporal")),
        distribution: top_offenders(tables, analysis)
            .unwrap_or_else(|_| FigureSpec::placeholder(ChartKind::Bar, "distribución por equipo")),
        temporal: temporal(tables, analysis, granularity).unwrap_or_else(|_| {
            FigureSpec::placeholder(ChartKind::Line, "distribución temporal")
        }),
        heatmap: heatmap(tables, analysis, granularity)
            .unwrap_or_else(|_| FigureSpec::placeholder(ChartKind::Heatmap, "mapa de calor")),
    }
}

/// Event count per calendar day, ascending.
pub fn trend(
    tables: &Tables,
    analysis: AnalysisType,
) -> Result<FigureSpec, ComputationDegradation> {
    let mut per_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for event in tables.primary_events(analysis) {
        if let Some(ts) = event.timestamp {
            *per_day.entry(ts.date()).or_default() += 1.0;
        }
    }
    if per_day.is_empty() {
        return Err(ComputationDegradation("la tendencia temporal"));
    }

    let (title, y_label) = match analysis {
        AnalysisType::Cdv => ("Tendencia de Fallos de Ocupación", "Número de Fallos"),
        AnalysisType::Adv => ("Tendencia de Discordancias en Agujas", "Número de Discordancias"),
    };
    let mut spec = FigureSpec::line(title, "Fecha", y_label);
    for (date, count) in per_day {
        spec = spec.with_point(date.format("%Y-%m-%d").to_string(), count);
    }
    Ok(spec)
}

/// Count per equipment, descending, truncated to the top 15; ties broken by
/// equipment id ascending.
pub fn top_offenders(
    tables: &Tables,
    analysis: AnalysisType,
) -> Result<FigureSpec, ComputationDegradation> {
    let events = tables.primary_events(analysis);
    if events.is_empty() {
        return Err(ComputationDegradation("la distribución por equipo"));
    }
    let ranked =
        crate::analytics::insight::rank_by_count(events.iter().map(|e| e.equipment));

    let (title, x_label, y_label) = match analysis {
        AnalysisType::Cdv => (
            "Distribución de Fallos por CDV (Top 15)",
            "CDV",
            "Número de Fallos",
        ),
        AnalysisType::Adv => (
            "Distribución de Discordancias por Aguja (Top 15)",
            "Aguja",
            "Número de Discordancias",
        ),
    };
    let mut spec = FigureSpec::bar(title, x_label, y_label);
    for (equipment, count) in ranked.into_iter().take(TOP_OFFENDERS) {
        spec = spec.with_point(equipment, count as f64);
    }
    Ok(spec)
}

/// Event distribution over the granularity's bucket: hour of day, weekday in
/// Monday→Sunday order, or month in calendar order.
pub fn temporal(
    tables: &Tables,
    analysis: AnalysisType,
    granularity: Granularity,
) -> Result<FigureSpec, ComputationDegradation> {
    let events = tables.primary_events(analysis);
    let timestamps: Vec<_> = events.iter().filter_map(|e| e.timestamp).collect();
    if timestamps.is_empty() {
        return Err(ComputationDegradation("la distribución temporal"));
    }

    let noun = match analysis {
        AnalysisType::Cdv => "Fallos",
        AnalysisType::Adv => "Discordancias",
    };
    let y_label = format!("Número de {noun}");

    let (title, x_label, buckets): (String, &str, Vec<(String, f64)>) = match granularity {
        Granularity::Daily => {
            let mut per_hour: BTreeMap<u32, f64> = BTreeMap::new();
            for ts in &timestamps {
                *per_hour.entry(ts.hour()).or_default() += 1.0;
            }
            (
                format!("Distribución Horaria de {noun}"),
                "Hora del Día",
                per_hour.into_iter().map(|(h, c)| (h.to_string(), c)).collect(),
            )
        }
        Granularity::Weekly => {
            let mut per_day: BTreeMap<usize, f64> = BTreeMap::new();
            for ts in &timestamps {
                *per_day
                    .entry(ts.weekday().num_days_from_monday() as usize)
                    .or_default() += 1.0;
            }
            (
                format!("Distribución de {noun} por Día de la Semana"),
                "Día de la Semana",
                per_day
                    .into_iter()
                    .map(|(d, c)| (WEEKDAYS[d].to_string(), c))
                    .collect(),
            )
        }
        Granularity::Monthly => {
            let mut per_month: BTreeMap<u32, f64> = BTreeMap::new();
            for ts in &timestamps {
                *per_month.entry(ts.month()).or_default() += 1.0;
            }
            (
                format!("Distribución de {noun} por Mes"),
                "Mes",
                per_month
                    .into_iter()
                    .map(|(m, c)| (month_name(m).to_string(), c))
                    .collect(),
            )
        }
    };

    let mut spec = FigureSpec::line(&title, x_label, &y_label);
    for (category, count) in buckets {
        spec = spec.with_point(category, count);
    }
    Ok(spec)
}

/// Two-dimensional event pivot. Row/column dimensions follow the
/// granularity; missing combinations are zero and weekday/month axes use
/// the same canonical ordering as the temporal distribution.
pub fn heatmap(
    tables: &Tables,
    analysis: AnalysisType,
    granularity: Granularity,
) -> Result<FigureSpec, ComputationDegradation> {
    let events = tables.primary_events(analysis);
    let timestamps: Vec<_> = events.iter().filter_map(|e| e.timestamp).collect();
    if timestamps.is_empty() {
        return Err(ComputationDegradation("el mapa de calor"));
    }

    let noun = match analysis {
        AnalysisType::Cdv => "Fallos",
        AnalysisType::Adv => "Discordancias",
    };

    let (title, x_label, y_label, rows, cols, cells) = match granularity {
        Granularity::Daily => {
            // weekday × hour
            let cols: Vec<String> = (0..24).map(|h| h.to_string()).collect();
            let mut cells = vec![vec![0u64; 24]; 7];
            for ts in &timestamps {
                let row = ts.weekday().num_days_from_monday() as usize;
                cells[row][ts.hour() as usize] += 1;
            }
            (
                format!("Mapa de Calor: {noun} por Día y Hora"),
                "Hora del Día",
                "Día de la Semana",
                WEEKDAYS.iter().map(|d| d.to_string()).collect(),
                cols,
                cells,
            )
        }
        Granularity::Weekly => {
            // ISO week × weekday
            let mut weeks: Vec<u32> =
                timestamps.iter().map(|ts| ts.iso_week().week()).collect();
            weeks.sort_unstable();
            weeks.dedup();
            let index: BTreeMap<u32, usize> =
                weeks.iter().enumerate().map(|(i, &w)| (w, i)).collect();
            let mut cells = vec![vec![0u64; 7]; weeks.len()];
            for ts in &timestamps {
                let row = index[&ts.iso_week().week()];
                cells[row][ts.weekday().num_days_from_monday() as usize] += 1;
            }
            (
                format!("Mapa de Calor: {noun} por Semana y Día"),
                "Día de la Semana",
                "Semana del Año",
                weeks.iter().map(|w| w.to_string()).collect(),
                WEEKDAYS.iter().map(|d| d.to_string()).collect(),
                cells,
            )
        }
        Granularity::Monthly => {
            // month × weekday
            let mut months: Vec<u32> = timestamps.iter().map(|ts| ts.month()).collect();
            months.sort_unstable();
            months.dedup();
            let index: BTreeMap<u32, usize> =
                months.iter().enumerate().map(|(i, &m)| (m, i)).collect();
            let mut cells = vec![vec![0u64; 7]; months.len()];
            for ts in &timestamps {
                let row = index[&ts.month()];
                cells[row][ts.weekday().num_days_from_monday() as usize] += 1;
            }
            (
                format!("Mapa de Calor: {noun} por Mes y Día de la Semana"),
                "Día de la Semana",
                "Mes",
                months.iter().map(|&m| month_name(m).to_string()).collect(),
                WEEKDAYS.iter().map(|d| d.to_string()).collect(),
                cells,
            )
        }
    };

    let mut spec = FigureSpec::heatmap(&title, x_label, y_label);
    spec.rows = rows;
    spec.categories = cols;
    spec.cells = cells;
    Ok(spec)
}
