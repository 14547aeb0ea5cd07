#![forbid(unsafe_code)]

//! Split-flap board (sfb): keeps a 6×22 Vestaboard showing live network
//! metrics and per-node status.
//!
//! The board state is one [`board::grid::Grid`] of flap codes owned by the
//! [`daemon::orchestrator::Orchestrator`]. Feed snapshots repaint the status
//! row, scheduled or manual refreshes repaint every metric row, and the whole
//! grid is pushed to the display only when something changed.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use splitflap_board::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use splitflap_board::board::charset::DisplayText;
//! use splitflap_board::board::grid::{BoardRow, Grid};
//! ```

pub mod prelude;

pub mod board;
pub mod core;
pub mod daemon;
pub mod display;
pub mod feed;
pub mod logger;
pub mod metrics;
