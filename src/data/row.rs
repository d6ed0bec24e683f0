//! Dataset Schemas
//!
//! One explicit row type per dataset kind. The upstream processors export a
//! fixed column set per file, so every dataset materializes into a concrete
//! struct instead of a dynamically probed table; fields the export may leave
//! blank are `Option`s.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Equipment class under analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnalysisType {
    /// Track circuits (circuitos de vía): false occupancy / false release events
    Cdv,
    /// Switches (agujas): position discordances and counted movements
    Adv,
}

impl AnalysisType {
    /// Parse the caller-facing identifier ("CDV" / "ADV", case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CDV" => Some(AnalysisType::Cdv),
            "ADV" => Some(AnalysisType::Adv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Cdv => "CDV",
            AnalysisType::Adv => "ADV",
        }
    }

    /// Dataset kinds the upstream processors export for this class.
    pub fn dataset_kinds(&self) -> &'static [DatasetKind] {
        match self {
            AnalysisType::Cdv => &[
                DatasetKind::OccupancyFailures,
                DatasetKind::ReleaseFailures,
                DatasetKind::OccupancyCounts,
            ],
            AnalysisType::Adv => &[DatasetKind::Discordances, DatasetKind::Movements],
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five monthly export files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    OccupancyFailures,
    ReleaseFailures,
    OccupancyCounts,
    Discordances,
    Movements,
}

impl DatasetKind {
    /// File name of this dataset inside the export folder.
    pub fn file_name(&self, line: &str) -> String {
        match self {
            DatasetKind::OccupancyFailures => format!("df_{line}_FO_Mensual.csv"),
            DatasetKind::ReleaseFailures => format!("df_{line}_FL_Mensual.csv"),
            DatasetKind::OccupancyCounts => format!("df_{line}_OCUP_Mensual.csv"),
            DatasetKind::Discordances => format!("df_{line}_ADV_DISC_Mensual.csv"),
            DatasetKind::Movements => format!("df_{line}_ADV_MOV_Mensual.csv"),
        }
    }
}

/// One false-occupancy event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyFailureRow {
    /// Event timestamp; `None` when the export carried an unparseable value
    pub timestamp: Option<NaiveDateTime>,
    pub equipment: String,
    pub station: Option<String>,
    /// Raw hold-time interval to the next row, kept verbatim for the detail table
    pub hold_time: Option<String>,
}

/// One false-release event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseFailureRow {
    pub timestamp: Option<NaiveDateTime>,
    pub equipment: String,
    pub station: Option<String>,
}

/// Daily occupancy count per track circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyCountRow {
    pub date: Option<NaiveDate>,
    pub equipment: String,
    /// `None` when the Count column held a non-numeric value
    pub count: Option<f64>,
}

/// One position discordance on a switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordanceRow {
    pub timestamp: Option<NaiveDateTime>,
    pub equipment: String,
    pub line: Option<String>,
}

/// Daily movement count per switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRow {
    pub date: Option<NaiveDate>,
    pub equipment: String,
    pub count: Option<f64>,
}

/// Borrowed view of one timestamped event from the primary failure dataset.
#[derive(Debug, Clone, Copy)]
pub struct EventRef<'a> {
    pub timestamp: Option<NaiveDateTime>,
    pub equipment: &'a str,
}

/// A loaded snapshot of every dataset for one (line, analysis) pair.
///
/// `None` means the file was absent from the export folder; `Some(vec![])`
/// means it existed but held no rows. Transformations never mutate a
/// snapshot in place; filtering produces a fresh `Tables`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    pub occupancy_failures: Option<Vec<OccupancyFailureRow>>,
    pub release_failures: Option<Vec<ReleaseFailureRow>>,
    pub occupancy_counts: Option<Vec<OccupancyCountRow>>,
    pub discordances: Option<Vec<DiscordanceRow>>,
    pub movements: Option<Vec<MovementRow>>,
}

impl Tables {
    /// Total row count across every present dataset.
    pub fn row_total(&self) -> usize {
        self.occupancy_failures.as_deref().map_or(0, <[_]>::len)
            + self.release_failures.as_deref().map_or(0, <[_]>::len)
            + self.occupancy_counts.as_deref().map_or(0, <[_]>::len)
            + self.discordances.as_deref().map_or(0, <[_]>::len)
            + self.movements.as_deref().map_or(0, <[_]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.row_total() == 0
    }

    /// Events of the primary failure dataset for an analysis class:
    /// occupancy failures for CDV, discordances for ADV.
    pub fn primary_events(&self, analysis: AnalysisType) -> Vec<EventRef<'_>> {
        match analysis {
            AnalysisType::Cdv => self
                .occupancy_failures
                .iter()
                .flatten()
                .map(|r| EventRef { timestamp: r.timestamp, equipment: &r.equipment })
                .collect(),
            AnalysisType::Adv => self
                .discordances
                .iter()
                .flatten()
                .map(|r| EventRef { timestamp: r.timestamp, equipment: &r.equipment })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_type_parses_case_insensitively() {
        assert_eq!(AnalysisType::parse("cdv"), Some(AnalysisType::Cdv));
        assert_eq!(AnalysisType::parse(" ADV "), Some(AnalysisType::Adv));
        assert_eq!(AnalysisType::parse("XYZ"), None);
    }

    #[test]
    fn file_names_follow_export_convention() {
        assert_eq!(
            DatasetKind::OccupancyFailures.file_name("L1"),
            "df_L1_FO_Mensual.csv"
        );
        assert_eq!(
            DatasetKind::Discordances.file_name("L4A"),
            "df_L4A_ADV_DISC_Mensual.csv"
        );
    }

    #[test]
    fn empty_snapshot_reports_empty() {
        let tables = Tables::default();
        assert!(tables.is_empty());
        assert!(tables.primary_events(AnalysisType::Cdv).is_empty());
    }
}
