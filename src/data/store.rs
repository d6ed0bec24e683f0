//! CSV Ingestion
//!
//! Loads the monthly export files for one (line, analysis) pair into typed
//! datasets. Missing files are tolerated, unparseable timestamps degrade to
//! `None`, and only an unreadable export folder aborts the load.

use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::row::{
    AnalysisType, DatasetKind, DiscordanceRow, MovementRow, OccupancyCountRow,
    OccupancyFailureRow, ReleaseFailureRow, Tables,
};

/// Fatal load failures. Anything softer (missing file, bad row) degrades.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("export folder {path} is not readable: {source}")]
    FolderUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Day/month ordering of ambiguous date strings. The CDV processors export
/// month-first timestamps while the ADV discordance export is day-first; the
/// asymmetry comes from the upstream systems and is preserved as observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    MonthFirst,
    DayFirst,
}

/// Immutable dataset snapshot for one (line, analysis) pair.
///
/// Built once per dashboard launch; never refreshed. Stale data until
/// relaunch is accepted behavior.
#[derive(Debug, Clone)]
pub struct TableStore {
    pub line: String,
    pub analysis: AnalysisType,
    pub tables: Tables,
}

impl TableStore {
    /// Load every expected dataset kind from `folder`.
    pub fn load(line: &str, analysis: AnalysisType, folder: &Path) -> Result<Self, LoadError> {
        // Probe the folder itself; a missing or unreadable folder is the one
        // fatal case of the loader.
        std::fs::read_dir(folder).map_err(|source| LoadError::FolderUnreadable {
            path: folder.to_path_buf(),
            source,
        })?;

        let mut tables = Tables::default();
        for kind in analysis.dataset_kinds() {
            let path = folder.join(kind.file_name(line));
            if !path.exists() {
                debug!(file = %path.display(), "dataset file absent, skipping");
                continue;
            }
            match kind {
                DatasetKind::OccupancyFailures => {
                    tables.occupancy_failures = Some(read_occupancy_failures(&path));
                }
                DatasetKind::ReleaseFailures => {
                    tables.release_failures = Some(read_release_failures(&path));
                }
                DatasetKind::OccupancyCounts => {
                    tables.occupancy_counts = Some(read_occupancy_counts(&path));
                }
                DatasetKind::Discordances => {
                    tables.discordances = Some(read_discordances(&path));
                }
                DatasetKind::Movements => {
                    tables.movements = Some(read_movements(&path));
                }
            }
        }

        info!(line, analysis = %analysis, rows = tables.row_total(), "datasets loaded");
        Ok(Self { line: line.to_string(), analysis, tables })
    }
}

struct Columns {
    reader: Option<csv::Reader<std::fs::File>>,
    headers: Vec<String>,
}

impl Columns {
    /// Open a CSV file and bind its header row. A file that exists but
    /// cannot be opened degrades to an empty dataset.
    fn open(path: &Path) -> Self {
        match csv::ReaderBuilder::new().flexible(true).from_path(path) {
            Ok(mut reader) => {
                let headers = reader
                    .headers()
                    .map(|h| h.iter().map(str::to_string).collect())
                    .unwrap_or_default();
                Self { reader: Some(reader), headers }
            }
            Err(err) => {
                warn!(file = %path.display(), %err, "dataset file unreadable, treating as empty");
                Self { reader: None, headers: Vec::new() }
            }
        }
    }

    fn index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    fn records(self) -> impl Iterator<Item = csv::StringRecord> {
        self.reader
            .into_iter()
            .flat_map(|r| r.into_records())
            .filter_map(Result::ok)
    }
}

fn field(record: &csv::StringRecord, idx: Option<usize>) -> Option<&str> {
    let value = record.get(idx?)?.trim();
    (!value.is_empty()).then_some(value)
}

fn read_occupancy_failures(path: &Path) -> Vec<OccupancyFailureRow> {
    let cols = Columns::open(path);
    let (ts, equipment) = (cols.index("Fecha Hora"), cols.index("Equipo"));
    let (station, hold) = (cols.index("Estacion"), cols.index("Diff.Time_+1_row"));
    cols.records()
        .filter_map(|rec| {
            Some(OccupancyFailureRow {
                timestamp: field(&rec, ts).and_then(|v| parse_timestamp(v, DateOrder::MonthFirst)),
                equipment: field(&rec, equipment)?.to_string(),
                station: field(&rec, station).map(str::to_string),
                hold_time: field(&rec, hold).map(str::to_string),
            })
        })
        .collect()
}

fn read_release_failures(path: &Path) -> Vec<ReleaseFailureRow> {
    let cols = Columns::open(path);
    let (ts, equipment, station) =
        (cols.index("Fecha Hora"), cols.index("Equipo"), cols.index("Estacion"));
    cols.records()
        .filter_map(|rec| {
            Some(ReleaseFailureRow {
                timestamp: field(&rec, ts).and_then(|v| parse_timestamp(v, DateOrder::MonthFirst)),
                equipment: field(&rec, equipment)?.to_string(),
                station: field(&rec, station).map(str::to_string),
            })
        })
        .collect()
}

fn read_occupancy_counts(path: &Path) -> Vec<OccupancyCountRow> {
    let cols = Columns::open(path);
    let (date, equipment, count) =
        (cols.index("Fecha"), cols.index("Equipo"), cols.index("Count"));
    cols.records()
        .filter_map(|rec| {
            Some(OccupancyCountRow {
                date: field(&rec, date).and_then(|v| parse_date(v, DateOrder::MonthFirst)),
                equipment: field(&rec, equipment)?.to_string(),
                count: field(&rec, count).and_then(parse_count),
            })
        })
        .collect()
}

fn read_discordances(path: &Path) -> Vec<DiscordanceRow> {
    let cols = Columns::open(path);
    let (ts, equipment, line) =
        (cols.index("Fecha Hora"), cols.index("Equipo Estacion"), cols.index("Linea"));
    cols.records()
        .filter_map(|rec| {
            Some(DiscordanceRow {
                // Day-first: this export writes 03/02/2024 for February 3rd
                timestamp: field(&rec, ts).and_then(|v| parse_timestamp(v, DateOrder::DayFirst)),
                equipment: field(&rec, equipment)?.to_string(),
                line: field(&rec, line).map(str::to_string),
            })
        })
        .collect()
}

fn read_movements(path: &Path) -> Vec<MovementRow> {
    let cols = Columns::open(path);
    let (date, equipment, count) =
        (cols.index("Fecha"), cols.index("Equipo"), cols.index("Count"));
    cols.records()
        .filter_map(|rec| {
            Some(MovementRow {
                date: field(&rec, date).and_then(|v| parse_date(v, DateOrder::MonthFirst)),
                equipment: field(&rec, equipment)?.to_string(),
                count: field(&rec, count).and_then(parse_count),
            })
        })
        .collect()
}

const ISO_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];
const MONTH_FIRST_TIMESTAMP_FORMATS: &[&str] =
    &["%m/%d/%Y %H:%M:%S", "%m/%d/%Y %H:%M", "%m-%d-%Y %H:%M:%S", "%m-%d-%Y %H:%M"];
const DAY_FIRST_TIMESTAMP_FORMATS: &[&str] =
    &["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M", "%d-%m-%Y %H:%M:%S", "%d-%m-%Y %H:%M"];

/// Parse a timestamp, trying unambiguous ISO forms first and falling back to
/// the ordering the producing system uses. Failure is a `None`, never an error.
pub fn parse_timestamp(raw: &str, order: DateOrder) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in ISO_TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    let ambiguous = match order {
        DateOrder::MonthFirst => MONTH_FIRST_TIMESTAMP_FORMATS,
        DateOrder::DayFirst => DAY_FIRST_TIMESTAMP_FORMATS,
    };
    for fmt in ambiguous {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    None
}

/// Parse a date-only column; full timestamps are accepted and truncated.
pub fn parse_date(raw: &str, order: DateOrder) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    let ambiguous = match order {
        DateOrder::MonthFirst => ["%m/%d/%Y", "%m-%d-%Y"],
        DateOrder::DayFirst => ["%d/%m/%Y", "%d-%m-%Y"],
    };
    for fmt in ambiguous {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    parse_timestamp(raw, order).map(|ts| ts.date())
}

fn parse_count(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) {
        let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn unreadable_folder_is_fatal() {
        let missing = Path::new("/definitely/not/a/folder");
        let err = TableStore::load("L1", AnalysisType::Cdv, missing).unwrap_err();
        assert!(matches!(err, LoadError::FolderUnreadable { .. }));
    }

    #[test]
    fn missing_files_leave_datasets_absent() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "df_L1_FO_Mensual.csv",
            "Fecha Hora,Equipo,Estacion\n2024-03-01 08:15:00,CDV_101,Tobalaba\n",
        );
        let store = TableStore::load("L1", AnalysisType::Cdv, dir.path()).unwrap();
        assert_eq!(store.tables.occupancy_failures.as_ref().unwrap().len(), 1);
        assert!(store.tables.release_failures.is_none());
        assert!(store.tables.occupancy_counts.is_none());
    }

    #[test]
    fn bad_timestamps_degrade_to_none() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "df_L1_FO_Mensual.csv",
            "Fecha Hora,Equipo,Estacion\nnot-a-date,CDV_101,Tobalaba\n2024-03-01 08:15:00,CDV_102,Los Leones\n",
        );
        let store = TableStore::load("L1", AnalysisType::Cdv, dir.path()).unwrap();
        let rows = store.tables.occupancy_failures.as_ref().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].timestamp.is_none());
        assert!(rows[1].timestamp.is_some());
    }

    #[test]
    fn discordance_timestamps_parse_day_first() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "df_L5_ADV_DISC_Mensual.csv",
            "Fecha Hora,Equipo Estacion,Linea\n03/02/2024 10:00:00,AG_21 Plaza de Maipu,L5\n",
        );
        let store = TableStore::load("L5", AnalysisType::Adv, dir.path()).unwrap();
        let rows = store.tables.discordances.as_ref().unwrap();
        let ts = rows[0].timestamp.unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2024, 2, 3).unwrap());
    }

    #[test]
    fn cdv_ambiguous_timestamps_parse_month_first() {
        let ts = parse_timestamp("03/02/2024 10:00:00", DateOrder::MonthFirst).unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[test]
    fn non_numeric_counts_become_none() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "df_L1_OCUP_Mensual.csv",
            "Fecha,Equipo,Count\n2024-03-01,CDV_101,120\n2024-03-02,CDV_101,n/d\n",
        );
        let store = TableStore::load("L1", AnalysisType::Cdv, dir.path()).unwrap();
        let rows = store.tables.occupancy_counts.as_ref().unwrap();
        assert_eq!(rows[0].count, Some(120.0));
        assert_eq!(rows[1].count, None);
    }

    #[test]
    fn reordered_columns_still_bind() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "df_L2_ADV_MOV_Mensual.csv",
            "Count,Fecha,Equipo\n44,2024-03-01,AG_7\n",
        );
        let store = TableStore::load("L2", AnalysisType::Adv, dir.path()).unwrap();
        let rows = store.tables.movements.as_ref().unwrap();
        assert_eq!(rows[0].equipment, "AG_7");
        assert_eq!(rows[0].count, Some(44.0));
    }
}
