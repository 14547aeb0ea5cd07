//! Metric sources, value formatting, and the full-refresh coordinator.

pub mod refresh;
pub mod sources;
pub mod values;
