//! Row renderer: right-aligned, partial-overwrite writes of text into a row.
//!
//! A value of length `n` occupies exactly columns `COLS - n .. COLS`. Under
//! [`RenderPolicy::RetainStale`] everything to the left is left alone, so a
//! shorter value written after a longer one leaves the older leading codes in
//! place (`#12345` followed by `#999` shows `#1#999`). That is how the board
//! has always behaved; [`RenderPolicy::ClearValueField`] blanks the value field
//! first instead.

use serde::{Deserialize, Serialize};

use crate::board::charset::DisplayText;
use crate::board::grid::{BoardRow, COLS, Grid};
use crate::core::errors::{Result, SfbError};

/// What happens to cells the new value does not cover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPolicy {
    /// Leave them untouched.
    #[default]
    RetainStale,
    /// Blank the columns after the row label before writing.
    ClearValueField,
}

impl RenderPolicy {
    #[must_use]
    pub const fn from_clear_flag(clear_stale_cells: bool) -> Self {
        if clear_stale_cells {
            Self::ClearValueField
        } else {
            Self::RetainStale
        }
    }
}

/// Writes text values into rows of a [`Grid`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RowRenderer {
    policy: RenderPolicy,
}

impl RowRenderer {
    #[must_use]
    pub const fn new(policy: RenderPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn policy(&self) -> RenderPolicy {
        self.policy
    }

    /// Right-align `value` in `row`.
    ///
    /// Empty values are a no-op. Values wider than the board are rejected and
    /// the row is left unchanged.
    pub fn render(&self, grid: &mut Grid, row: BoardRow, value: &DisplayText) -> Result<()> {
        if value.len() > COLS {
            return Err(SfbError::ValueTooLong {
                len: value.len(),
                max: COLS,
            });
        }
        if value.is_empty() {
            return Ok(());
        }
        if self.policy == RenderPolicy::ClearValueField {
            grid.clear_span(row, row.value_field());
        }
        grid.place_right_aligned(row, value.codes().iter().copied().map(Some));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::charset::{self, BLANK};
    use proptest::prelude::*;

    fn text(raw: &str) -> DisplayText {
        DisplayText::parse(raw).expect("test text is displayable")
    }

    #[test]
    fn height_lands_in_rightmost_columns() {
        let mut grid = Grid::with_labels();
        RowRenderer::default()
            .render(&mut grid, BoardRow::BlockHeight, &text("#12345"))
            .expect("render");
        assert_eq!(
            &grid.row(BoardRow::BlockHeight)[COLS - 6..],
            &[39, 27, 28, 29, 30, 31]
        );
        assert_eq!(grid.row(BoardRow::BlockHeight)[COLS - 7], BLANK);
    }

    #[test]
    fn shorter_value_keeps_stale_prefix_by_default() {
        let mut grid = Grid::blank();
        let renderer = RowRenderer::default();
        renderer
            .render(&mut grid, BoardRow::BlockHeight, &text("#12345"))
            .expect("render");
        renderer
            .render(&mut grid, BoardRow::BlockHeight, &text("#999"))
            .expect("render");
        let tail: String = grid.row(BoardRow::BlockHeight)[COLS - 6..]
            .iter()
            .map(|c| charset::decode(*c).expect("text code"))
            .collect();
        assert_eq!(tail, "#1#999");
    }

    #[test]
    fn clear_policy_blanks_value_field_but_keeps_label() {
        let mut grid = Grid::with_labels();
        let renderer = RowRenderer::new(RenderPolicy::ClearValueField);
        renderer
            .render(&mut grid, BoardRow::BlockHeight, &text("#12345"))
            .expect("render");
        renderer
            .render(&mut grid, BoardRow::BlockHeight, &text("#999"))
            .expect("render");
        let row = grid.row(BoardRow::BlockHeight);
        assert_eq!(&row[..7], &Grid::with_labels().row(BoardRow::BlockHeight)[..7]);
        assert_eq!(&row[COLS - 6..COLS - 4], &[BLANK, BLANK]);
        assert_eq!(&row[COLS - 4..], &[39, 35, 35, 35]);
    }

    #[test]
    fn empty_value_is_a_no_op() {
        let mut grid = Grid::with_labels();
        let before = grid;
        RowRenderer::new(RenderPolicy::ClearValueField)
            .render(&mut grid, BoardRow::Followers, &text(""))
            .expect("render");
        assert_eq!(grid, before);
    }

    #[test]
    fn too_long_value_is_rejected_without_touching_row() {
        let mut grid = Grid::with_labels();
        let before = grid;
        let err = RowRenderer::default()
            .render(&mut grid, BoardRow::Followers, &text("abcdefghijklmnopqrstuvw"))
            .unwrap_err();
        assert!(matches!(err, SfbError::ValueTooLong { len: 23, max: COLS }));
        assert_eq!(grid, before);
    }

    #[test]
    fn full_width_value_fills_row() {
        let mut grid = Grid::with_labels();
        let value = text("abcdefghijklmnopqrstuv");
        RowRenderer::default()
            .render(&mut grid, BoardRow::SecondaryPrice, &value)
            .expect("render");
        assert_eq!(grid.row(BoardRow::SecondaryPrice).as_slice(), value.codes());
    }

    fn displayable() -> impl Strategy<Value = String> {
        proptest::string::string_regex("[a-z0-9#$.:%/ -]{0,22}").expect("valid regex")
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prefix_untouched_and_span_encoded(
            seed in displayable(),
            value in displayable(),
            row_index in 0usize..6,
        ) {
            let row = BoardRow::from_index(row_index).expect("row in range");
            let renderer = RowRenderer::default();
            let mut grid = Grid::with_labels();
            renderer.render(&mut grid, row, &text(&seed)).expect("seed render");
            let before = *grid.row(row);

            let value = text(&value);
            renderer.render(&mut grid, row, &value).expect("render");
            let after = grid.row(row);
            let split = COLS - value.len();

            prop_assert_eq!(&after[..split], &before[..split]);
            prop_assert_eq!(&after[split..], value.codes());
        }

        #[test]
        fn other_rows_never_change(value in displayable(), row_index in 0usize..6) {
            let row = BoardRow::from_index(row_index).expect("row in range");
            let mut grid = Grid::with_labels();
            let before = grid;
            RowRenderer::new(RenderPolicy::ClearValueField)
                .render(&mut grid, row, &text(&value))
                .expect("render");
            for other in BoardRow::ALL.into_iter().filter(|r| *r != row) {
                prop_assert_eq!(grid.row(other), before.row(other));
            }
        }
    }
}
