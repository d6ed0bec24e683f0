//! Figures Module
//!
//! Declarative chart specifications and the pure factory that derives them
//! from a dataset snapshot.

pub mod factory;
pub mod spec;

pub use factory::build_set;
pub use spec::{ChartKind, ComputationDegradation, FigureSet, FigureSpec};
