//! Update orchestrator: the single owner of the board grid.
//!
//! All mutations arrive as [`BoardCommand`]s on one queue and are applied here
//! one at a time. A status snapshot identical to the previous one is dropped
//! without touching the display. A changed snapshot repaints the status row,
//! and the very first one (phase [`Phase::Idle`]) also runs a full metric
//! refresh. Scheduled and manual triggers always run a full refresh. Every
//! applied change ends in exactly one display write.

#![allow(missing_docs)]

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::board::grid::{BoardRow, Grid};
use crate::board::render::{RenderPolicy, RowRenderer};
use crate::board::status::{StatusRender, render_status};
use crate::core::config::BoardConfig;
use crate::display::{DisplaySink, WriteReceipt};
use crate::feed::snapshot::StatusSnapshot;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::metrics::refresh::{RefreshCoordinator, RefreshReport};
use crate::metrics::sources::MetricSource;
use crate::metrics::values::MetricValue;

/// Messages the board owner accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardCommand {
    /// A parsed status snapshot from the live feed.
    Snapshot(StatusSnapshot),
    /// A recurring refresh slot was reached.
    ScheduledRefresh { slot: DateTime<Utc> },
    /// Operator-requested refresh (signal or CLI).
    RefreshNow,
    Shutdown,
}

/// What caused an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Feed,
    Schedule,
    Manual,
}

impl Trigger {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::Schedule => "schedule",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the metric rows have been filled at least once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No full refresh has run yet.
    #[default]
    Idle,
    Primed,
}

/// Result of the display write that ends an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    Written(WriteReceipt),
    Failed { code: &'static str },
}

impl WriteStatus {
    #[must_use]
    pub const fn is_written(&self) -> bool {
        matches!(self, Self::Written(_))
    }
}

/// What one command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Snapshot matched the previous one; nothing changed or was written.
    Duplicate,
    /// Status row repainted and pushed.
    StatusOnly {
        status: StatusRender,
        write: WriteStatus,
    },
    /// Metrics refreshed (after repainting the status row, for a feed trigger)
    /// and pushed.
    FullRefresh {
        trigger: Trigger,
        status: Option<StatusRender>,
        report: RefreshReport,
        write: WriteStatus,
    },
}

pub struct Orchestrator {
    grid: Grid,
    phase: Phase,
    last_fingerprint: Option<String>,
    refresher: RefreshCoordinator,
    source: Box<dyn MetricSource>,
    sink: Box<dyn DisplaySink>,
    logger: ActivityLoggerHandle,
    writes: u64,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("phase", &self.phase)
            .field("last_fingerprint", &self.last_fingerprint)
            .field("sink", &self.sink.name())
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        board: &BoardConfig,
        source: Box<dyn MetricSource>,
        sink: Box<dyn DisplaySink>,
        logger: ActivityLoggerHandle,
    ) -> Self {
        let grid = if board.labels {
            Grid::with_labels()
        } else {
            Grid::blank()
        };
        let renderer = RowRenderer::new(RenderPolicy::from_clear_flag(board.clear_stale_cells));
        Self {
            grid,
            phase: Phase::Idle,
            last_fingerprint: None,
            refresher: RefreshCoordinator::new(renderer),
            source,
            sink,
            logger,
            writes: 0,
        }
    }

    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Successful display writes so far.
    #[must_use]
    pub const fn writes(&self) -> u64 {
        self.writes
    }

    /// The explicit phase agrees with the grid: the block-height row's last
    /// column is filled exactly when a full refresh has run.
    #[must_use]
    pub fn phase_matches_grid(&self) -> bool {
        (self.phase == Phase::Primed) == self.grid.has_rendered_row(BoardRow::BlockHeight)
    }

    /// Apply one command. `None` means the command was [`BoardCommand::Shutdown`].
    pub fn handle(&mut self, command: BoardCommand) -> Option<UpdateOutcome> {
        match command {
            BoardCommand::Snapshot(snapshot) => Some(self.handle_snapshot(&snapshot)),
            BoardCommand::ScheduledRefresh { .. } => Some(self.handle_refresh(Trigger::Schedule)),
            BoardCommand::RefreshNow => Some(self.handle_refresh(Trigger::Manual)),
            BoardCommand::Shutdown => None,
        }
    }

    pub fn handle_snapshot(&mut self, snapshot: &StatusSnapshot) -> UpdateOutcome {
        let fingerprint = snapshot.fingerprint();
        if self.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            return UpdateOutcome::Duplicate;
        }
        self.last_fingerprint = Some(fingerprint);

        let status = render_status(&mut self.grid, BoardRow::NodeStatus, snapshot.nodes());
        let full_refresh = self.phase == Phase::Idle;
        self.logger.send(ActivityEvent::SnapshotApplied {
            nodes: snapshot.len(),
            unknown: status.unknown,
            overflow: status.overflow,
            full_refresh,
        });

        if full_refresh {
            let report = self.refresh(Trigger::Feed);
            let write = self.push(Trigger::Feed);
            UpdateOutcome::FullRefresh {
                trigger: Trigger::Feed,
                status: Some(status),
                report,
                write,
            }
        } else {
            let write = self.push(Trigger::Feed);
            UpdateOutcome::StatusOnly { status, write }
        }
    }

    /// Full refresh and push, regardless of phase.
    pub fn handle_refresh(&mut self, trigger: Trigger) -> UpdateOutcome {
        let report = self.refresh(trigger);
        let write = self.push(trigger);
        UpdateOutcome::FullRefresh {
            trigger,
            status: None,
            report,
            write,
        }
    }

    fn refresh(&mut self, trigger: Trigger) -> RefreshReport {
        let started = Instant::now();
        let report = self.refresher.refresh_all(&mut self.grid, self.source.as_ref());
        self.phase = Phase::Primed;

        for outcome in &report.outcomes {
            let row = outcome.kind.row().index();
            if let MetricValue::Failed { details } = &outcome.value {
                self.logger.send(ActivityEvent::MetricFailed {
                    metric: outcome.kind.name().to_string(),
                    row,
                    details: details.clone(),
                });
            }
            if !outcome.replaced.is_empty() {
                self.logger.send(ActivityEvent::UnsupportedCharacters {
                    metric: outcome.kind.name().to_string(),
                    row,
                    replaced: outcome.replaced.iter().collect(),
                });
            }
        }
        let summary = report.summary();
        self.logger.send(ActivityEvent::RefreshCompleted {
            trigger: trigger.as_str().to_string(),
            ok: summary.ok,
            failed: summary.failed.iter().map(|kind| kind.name().to_string()).collect(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        });
        report
    }

    fn push(&mut self, trigger: Trigger) -> WriteStatus {
        match self.sink.push(&self.grid) {
            Ok(receipt) => {
                self.writes += 1;
                self.logger.send(ActivityEvent::DisplayWritten {
                    sink: self.sink.name().to_string(),
                    trigger: trigger.as_str().to_string(),
                    message_id: receipt.message_id.clone(),
                });
                WriteStatus::Written(receipt)
            }
            Err(err) => {
                eprintln!("[SFB-DISPLAY] write to {} failed: {err}", self.sink.name());
                self.logger.send(ActivityEvent::DisplayWriteFailed {
                    sink: self.sink.name().to_string(),
                    code: err.code().to_string(),
                    message: err.to_string(),
                });
                WriteStatus::Failed { code: err.code() }
            }
        }
    }
}
