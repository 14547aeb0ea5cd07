//! The fixed 6×22 grid of flap codes and the static row assignment.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::board::charset::{self, BLANK};

/// Rows on the board.
pub const ROWS: usize = 6;
/// Columns on the board.
pub const COLS: usize = 22;

/// Semantic meaning of each row. The index of a row never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardRow {
    BlockHeight,
    NodeStatus,
    Followers,
    ArchivedVolume,
    SecondaryPrice,
    PrimaryPrice,
}

impl BoardRow {
    /// All rows, top to bottom.
    pub const ALL: [Self; ROWS] = [
        Self::BlockHeight,
        Self::NodeStatus,
        Self::Followers,
        Self::ArchivedVolume,
        Self::SecondaryPrice,
        Self::PrimaryPrice,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::BlockHeight => 0,
            Self::NodeStatus => 1,
            Self::Followers => 2,
            Self::ArchivedVolume => 3,
            Self::SecondaryPrice => 4,
            Self::PrimaryPrice => 5,
        }
    }

    /// Left-hand caption painted into the initial grid.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::BlockHeight => "height:",
            Self::NodeStatus => "status:",
            Self::Followers => "twitter:",
            Self::ArchivedVolume => "archived:",
            Self::SecondaryPrice => "arweave:",
            Self::PrimaryPrice => "bitcoin:",
        }
    }

    /// Columns to the right of the label, where values live.
    #[must_use]
    pub fn value_field(self) -> Range<usize> {
        self.label().chars().count()..COLS
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for BoardRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BlockHeight => "block_height",
            Self::NodeStatus => "node_status",
            Self::Followers => "followers",
            Self::ArchivedVolume => "archived_volume",
            Self::SecondaryPrice => "secondary_price",
            Self::PrimaryPrice => "primary_price",
        };
        f.write_str(name)
    }
}

/// Full displayable state. Serializes as a nested array of integers, the
/// shape the display API expects under `characters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    cells: [[u8; COLS]; ROWS],
}

impl Default for Grid {
    fn default() -> Self {
        Self::blank()
    }
}

impl Grid {
    /// All flaps blank.
    #[must_use]
    pub const fn blank() -> Self {
        Self {
            cells: [[BLANK; COLS]; ROWS],
        }
    }

    /// Blank grid with each row's label at its left edge.
    #[must_use]
    pub fn with_labels() -> Self {
        let mut grid = Self::blank();
        for row in BoardRow::ALL {
            for (col, ch) in row.label().chars().enumerate() {
                grid.cells[row.index()][col] = charset::encode(ch).unwrap_or(BLANK);
            }
        }
        grid
    }

    #[must_use]
    pub const fn row(&self, row: BoardRow) -> &[u8; COLS] {
        &self.cells[row.index()]
    }

    /// Code at `(row, col)`; `None` when `col` is off the board.
    #[must_use]
    pub fn get(&self, row: BoardRow, col: usize) -> Option<u8> {
        self.cells[row.index()].get(col).copied()
    }

    #[must_use]
    pub const fn cells(&self) -> &[[u8; COLS]; ROWS] {
        &self.cells
    }

    /// Whether the last column of `row` holds anything. The block-height row
    /// stays blank there until the first metric refresh writes it.
    #[must_use]
    pub fn has_rendered_row(&self, row: BoardRow) -> bool {
        self.cells[row.index()][COLS - 1] != BLANK
    }

    /// Blank the columns in `span` (clamped to the row).
    pub fn clear_span(&mut self, row: BoardRow, span: Range<usize>) {
        let end = span.end.min(COLS);
        let start = span.start.min(end);
        self.cells[row.index()][start..end].fill(BLANK);
    }

    /// Write `cells` so the last one lands in column `COLS - 1`. A `None` cell
    /// keeps whatever code is already there. Callers guarantee `cells.len() <= COLS`.
    pub(crate) fn place_right_aligned<I>(&mut self, row: BoardRow, cells: I)
    where
        I: IntoIterator<Item = Option<u8>>,
        I::IntoIter: ExactSizeIterator,
    {
        let cells = cells.into_iter();
        let start = COLS.saturating_sub(cells.len());
        let target = &mut self.cells[row.index()];
        for (slot, cell) in target[start..].iter_mut().zip(cells) {
            if let Some(code) = cell {
                *slot = code;
            }
        }
    }

    /// Human-readable rendering: text codes as uppercase characters, status
    /// tiles as lowercase `g` (running), `y` (stalling), `r` (offline).
    #[must_use]
    pub fn preview(&self) -> String {
        let mut out = String::with_capacity(ROWS * (COLS + 3));
        for row in &self.cells {
            out.push('|');
            for &code in row {
                out.push(preview_glyph(code));
            }
            out.push_str("|\n");
        }
        out
    }
}

fn preview_glyph(code: u8) -> char {
    match code {
        66 => 'g',
        65 => 'y',
        63 => 'r',
        _ => charset::decode(code).map_or('?', |ch| ch.to_ascii_uppercase()),
    }
}
