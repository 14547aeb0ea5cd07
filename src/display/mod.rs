//! Display sinks: where a finished grid goes.

#![allow(missing_docs)]

pub mod memory;
pub mod preview;
pub mod vestaboard;

use crate::board::grid::Grid;
use crate::core::errors::Result;

/// Acknowledgement from a successful write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Identifier the display assigned to the message, when it returned one.
    pub message_id: Option<String>,
}

/// Accepts complete grids. One call is one display write.
pub trait DisplaySink: Send {
    fn name(&self) -> &'static str;
    fn push(&self, grid: &Grid) -> Result<WriteReceipt>;
}
