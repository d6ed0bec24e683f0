//! Analytics Module
//!
//! Insight generation, unsupervised outlier scoring and reliability KPIs
//! over a loaded dataset snapshot. Everything here is deterministic and
//! side-effect-free; malformed or missing data degrades to sparse output.

pub mod anomaly;
pub mod insight;
pub mod kpi;

pub use insight::{analyze, AnomalyRecord, InsightBundle};
pub use kpi::{compute as compute_kpis, KpiValue};
