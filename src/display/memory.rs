//! In-memory sink for dry runs and tests.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::board::grid::Grid;
use crate::core::errors::{Result, SfbError};
use crate::display::{DisplaySink, WriteReceipt};

/// Records every pushed grid. Clones share the same record, so a caller can
/// keep one handle while the orchestrator owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    writes: Arc<Mutex<Vec<Grid>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn writes(&self) -> Vec<Grid> {
        self.writes.lock().clone()
    }

    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    #[must_use]
    pub fn last(&self) -> Option<Grid> {
        self.writes.lock().last().copied()
    }

    /// Make subsequent pushes fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        *self.fail_writes.lock() = failing;
    }
}

impl DisplaySink for RecordingSink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn push(&self, grid: &Grid) -> Result<WriteReceipt> {
        if *self.fail_writes.lock() {
            return Err(SfbError::DisplayWrite {
                details: "recording sink set to fail".to_string(),
            });
        }
        let mut writes = self.writes.lock();
        writes.push(*grid);
        Ok(WriteReceipt {
            message_id: Some(format!("mem-{}", writes.len())),
        })
    }
}
