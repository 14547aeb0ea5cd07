//! Dry-run sink that prints each grid instead of sending it.

use std::io::{self, Write};

use parking_lot::Mutex;

use crate::board::grid::Grid;
use crate::core::errors::{Result, SfbError};
use crate::display::{DisplaySink, WriteReceipt};

/// Writes a text preview of every pushed grid to the wrapped writer.
pub struct PreviewSink<W: Write + Send> {
    out: Mutex<W>,
}

impl PreviewSink<io::Stdout> {
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> PreviewSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> DisplaySink for PreviewSink<W> {
    fn name(&self) -> &'static str {
        "preview"
    }

    fn push(&self, grid: &Grid) -> Result<WriteReceipt> {
        let mut out = self.out.lock();
        out.write_all(grid.preview().as_bytes())
            .and_then(|()| out.flush())
            .map_err(|err| SfbError::DisplayWrite {
                details: format!("preview output failed: {err}"),
            })?;
        Ok(WriteReceipt::default())
    }
}
