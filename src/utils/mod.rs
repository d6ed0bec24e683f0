//! Utils Module
pub mod calendar;

pub use calendar::{month_name, weekday_name};
