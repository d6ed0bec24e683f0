//! Vigia: Signalling-Equipment Analytics
//!
//! Turns monthly CSV exports of railway signalling event logs into:
//! - ranked offenders, temporal patterns and maintenance recommendations
//! - reliability KPIs with an unsupervised outlier pass
//! - live, filterable web dashboards, one per (line, analysis) pair,
//!   each on its own port under a single orchestrator

pub mod analytics;
pub mod config;
pub mod data;
pub mod figures;
pub mod orchestrator;
pub mod server;
pub mod utils;

// Re-exports for convenience
pub use config::AppConfig;
pub use data::{AnalysisType, FilterSpec, Granularity, TableStore};
pub use figures::{FigureSet, FigureSpec};
pub use orchestrator::{DashboardOrchestrator, LaunchOutcome};
