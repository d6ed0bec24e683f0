//! Chart Specifications
//!
//! Declarative chart descriptions handed to the rendering layer. A spec has
//! no behavior; the dashboard page (or any other renderer) decides how to
//! draw it. The `no_data` placeholder is the designated degraded value for
//! charts that cannot be derived from the current snapshot.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised by a figure derivation that cannot form its chart; recovered by
/// substituting the placeholder spec, never surfaced to the dashboard user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("datos insuficientes para {0}")]
pub struct ComputationDegradation(pub &'static str);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    Bar,
    Heatmap,
}

/// One chart, fully described by data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Category labels along the x axis (dates, equipment ids, hours...)
    pub categories: Vec<String>,
    /// One value per category; empty for heatmaps
    pub values: Vec<f64>,
    /// Row labels for heatmaps; empty otherwise
    pub rows: Vec<String>,
    /// Heatmap cell grid, one inner vec per row, aligned with `categories`
    pub cells: Vec<Vec<u64>>,
    /// Set when the source snapshot had nothing to plot
    pub no_data: bool,
}

impl FigureSpec {
    pub fn line(title: &str, x_label: &str, y_label: &str) -> Self {
        Self::empty(ChartKind::Line, title, x_label, y_label)
    }

    pub fn bar(title: &str, x_label: &str, y_label: &str) -> Self {
        Self::empty(ChartKind::Bar, title, x_label, y_label)
    }

    pub fn heatmap(title: &str, x_label: &str, y_label: &str) -> Self {
        Self::empty(ChartKind::Heatmap, title, x_label, y_label)
    }

    fn empty(kind: ChartKind, title: &str, x_label: &str, y_label: &str) -> Self {
        Self {
            kind,
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            categories: Vec::new(),
            values: Vec::new(),
            rows: Vec::new(),
            cells: Vec::new(),
            no_data: false,
        }
    }

    /// The placeholder rendered when a chart has no data behind it.
    pub fn placeholder(kind: ChartKind, subject: &str) -> Self {
        let mut spec = Self::empty(
            kind,
            &format!("No hay datos disponibles para mostrar {subject}"),
            "",
            "",
        );
        spec.no_data = true;
        spec
    }

    pub fn with_point(mut self, category: impl Into<String>, value: f64) -> Self {
        self.categories.push(category.into());
        self.values.push(value);
        self
    }
}

/// The four charts of one dashboard view, recomputed together on every
/// apply-filters action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureSet {
    pub trend: FigureSpec,
    pub distribution: FigureSpec,
    pub temporal: FigureSpec,
    pub heatmap: FigureSpec,
}
