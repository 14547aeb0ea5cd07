//! Status renderer: one colour tile per node, right-aligned in the status row.

use crate::board::grid::{BoardRow, COLS, Grid};
use crate::feed::snapshot::NodeStatus;

/// Tile code for a node that is up and producing.
pub const RUNNING_TILE: u8 = 66;
/// Tile code for a node that is up but not progressing.
pub const STALLING_TILE: u8 = 65;
/// Tile code for a node that is down.
pub const OFFLINE_TILE: u8 = 63;

/// Tile for a status, or `None` when the cell should keep its previous code.
#[must_use]
pub fn tile_for(status: &NodeStatus) -> Option<u8> {
    match status {
        NodeStatus::Running => Some(RUNNING_TILE),
        NodeStatus::Stalling => Some(STALLING_TILE),
        NodeStatus::Offline => Some(OFFLINE_TILE),
        NodeStatus::Unknown(_) => None,
    }
}

/// What a status render touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusRender {
    /// Cells that received a tile.
    pub painted: usize,
    /// Cells skipped because the state was not recognised.
    pub unknown: usize,
    /// Leading statuses that did not fit on the row.
    pub overflow: usize,
}

/// Write `statuses` into `row` so the last one lands in column `COLS - 1`.
///
/// When there are more statuses than columns only the last `COLS` are shown.
pub fn render_status(grid: &mut Grid, row: BoardRow, statuses: &[NodeStatus]) -> StatusRender {
    let overflow = statuses.len().saturating_sub(COLS);
    let visible = &statuses[overflow..];
    let unknown = visible.iter().filter(|s| tile_for(s).is_none()).count();
    grid.place_right_aligned(row, visible.iter().map(tile_for));
    StatusRender {
        painted: visible.len() - unknown,
        unknown,
        overflow,
    }
}
