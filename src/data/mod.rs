//! Data Layer
//!
//! Typed dataset schemas, CSV ingestion and the filter pipeline.

pub mod filter;
pub mod row;
pub mod store;

pub use filter::{FilterSpec, Granularity};
pub use row::{AnalysisType, DatasetKind, Tables};
pub use store::{LoadError, TableStore};
