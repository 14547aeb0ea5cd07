//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use splitflap_board::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, SfbError};

// Board
pub use crate::board::charset::DisplayText;
pub use crate::board::grid::{BoardRow, COLS, Grid, ROWS};
pub use crate::board::render::{RenderPolicy, RowRenderer};
pub use crate::board::status::{StatusRender, render_status};

// Feed
pub use crate::feed::snapshot::{NodeStatus, StatusSnapshot};

// Metrics
pub use crate::metrics::refresh::{RefreshCoordinator, RefreshReport};
pub use crate::metrics::sources::{HttpMetricSource, MetricSource, PriceQuotes};
pub use crate::metrics::values::{MetricKind, MetricValue};

// Display
pub use crate::display::memory::RecordingSink;
pub use crate::display::vestaboard::VestaboardSink;
pub use crate::display::{DisplaySink, WriteReceipt};

// Orchestration
pub use crate::daemon::orchestrator::{BoardCommand, Orchestrator, Trigger, UpdateOutcome};
pub use crate::daemon::schedule::RefreshSchedule;
