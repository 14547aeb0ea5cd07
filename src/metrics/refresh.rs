//! Full metric refresh: fetch every metric and render each into its row.
//!
//! Each metric is fetched and rendered on its own; one failing source only
//! turns its own row into [`ERROR_SENTINEL`]. The two prices share a single
//! batch call, so a failed call marks both price rows.

use serde::Serialize;

use crate::board::charset::DisplayText;
use crate::board::grid::Grid;
use crate::board::render::RowRenderer;
use crate::metrics::sources::{MetricSource, PriceQuotes};
use crate::metrics::values::{
    ERROR_SENTINEL, MetricKind, MetricValue, format_archived, format_followers, format_height,
    format_price, sum_archived_bytes,
};

/// What happened to one metric during a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricOutcome {
    pub kind: MetricKind,
    pub value: MetricValue,
    /// Characters that had no flap code and were rendered blank.
    pub replaced: Vec<char>,
}

impl MetricOutcome {
    /// Text that ended up on the board for this metric.
    #[must_use]
    pub fn rendered(&self) -> &str {
        self.value.text()
    }
}

/// Per-metric results of one [`RefreshCoordinator::refresh_all`] pass, in
/// refresh order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub outcomes: Vec<MetricOutcome>,
}

/// Compact summary for the activity log.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub ok: usize,
    pub failed: Vec<MetricKind>,
}

impl RefreshReport {
    /// Metrics rendered as the error sentinel.
    #[must_use]
    pub fn failed(&self) -> Vec<MetricKind> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.value.is_failed())
            .map(|outcome| outcome.kind)
            .collect()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|outcome| !outcome.value.is_failed())
    }

    #[must_use]
    pub fn outcome(&self, kind: MetricKind) -> Option<&MetricOutcome> {
        self.outcomes.iter().find(|outcome| outcome.kind == kind)
    }

    #[must_use]
    pub fn summary(&self) -> RefreshSummary {
        let failed = self.failed();
        RefreshSummary {
            ok: self.outcomes.len() - failed.len(),
            failed,
        }
    }
}

/// Sequences the metric fetches and renders each result.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshCoordinator {
    renderer: RowRenderer,
}

impl RefreshCoordinator {
    #[must_use]
    pub const fn new(renderer: RowRenderer) -> Self {
        Self { renderer }
    }

    /// Fetch all metrics from `source` and render them into `grid`.
    ///
    /// Never fails as a whole; failures are reported per metric.
    pub fn refresh_all(&self, grid: &mut Grid, source: &dyn MetricSource) -> RefreshReport {
        let mut report = RefreshReport::default();

        let height = MetricValue::from_result(source.block_height(), format_height);
        report.outcomes.push(self.apply(grid, MetricKind::BlockHeight, height));

        let followers = MetricValue::from_result(source.follower_count(), format_followers);
        report.outcomes.push(self.apply(grid, MetricKind::Followers, followers));

        let archived = MetricValue::from_result(
            source.pool_archived_bytes().and_then(sum_archived_bytes),
            format_archived,
        );
        report.outcomes.push(self.apply(grid, MetricKind::ArchivedVolume, archived));

        let (secondary, primary) = match source.prices() {
            Ok(PriceQuotes { primary, secondary }) => (price_value(secondary), price_value(primary)),
            Err(err) => {
                let details = err.to_string();
                (
                    MetricValue::Failed {
                        details: details.clone(),
                    },
                    MetricValue::Failed { details },
                )
            }
        };
        report.outcomes.push(self.apply(grid, MetricKind::SecondaryPrice, secondary));
        report.outcomes.push(self.apply(grid, MetricKind::PrimaryPrice, primary));

        report
    }

    fn apply(&self, grid: &mut Grid, kind: MetricKind, value: MetricValue) -> MetricOutcome {
        let (text, replaced) = DisplayText::lossy(value.text());
        match self.renderer.render(grid, kind.row(), &text) {
            Ok(()) => MetricOutcome {
                kind,
                value,
                replaced,
            },
            Err(err) => {
                let (sentinel, _) = DisplayText::lossy(ERROR_SENTINEL);
                if let Err(sentinel_err) = self.renderer.render(grid, kind.row(), &sentinel) {
                    eprintln!(
                        "[SFB-REFRESH] {} row kept its previous value: {sentinel_err}",
                        kind.name()
                    );
                }
                MetricOutcome {
                    kind,
                    value: MetricValue::Failed {
                        details: format!("value {:?} not rendered: {err}", value.text()),
                    },
                    replaced: Vec::new(),
                }
            }
        }
    }
}

fn price_value(price: Option<f64>) -> MetricValue {
    match price {
        Some(price) => MetricValue::from_result(format_price(price), |text| text),
        None => MetricValue::Failed {
            details: "asset missing from quote response".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::charset;
    use crate::board::grid::{BoardRow, COLS};
    use crate::board::render::RenderPolicy;
    use crate::core::errors::{Result, SfbError};

    struct FixedSource {
        height: Option<u64>,
        followers: Option<u64>,
        pools: Option<Vec<String>>,
        prices: Option<PriceQuotes>,
    }

    impl FixedSource {
        fn healthy() -> Self {
            Self {
                height: Some(12_345),
                followers: Some(4_821),
                pools: Some(vec!["1000000000".to_string(), "235000000".to_string()]),
                prices: Some(PriceQuotes {
                    primary: Some(27_123.456),
                    secondary: Some(5.5),
                }),
            }
        }
    }

    fn down(name: &'static str) -> SfbError {
        SfbError::Http {
            context: name,
            details: "connection refused".to_string(),
        }
    }

    impl MetricSource for FixedSource {
        fn block_height(&self) -> Result<u64> {
            self.height.ok_or_else(|| down("chain_status"))
        }
        fn follower_count(&self) -> Result<u64> {
            self.followers.ok_or_else(|| down("followers"))
        }
        fn pool_archived_bytes(&self) -> Result<Vec<String>> {
            self.pools.clone().ok_or_else(|| down("pools"))
        }
        fn prices(&self) -> Result<PriceQuotes> {
            self.prices.ok_or_else(|| down("quotes"))
        }
    }

    fn row_text(grid: &Grid, row: BoardRow, width: usize) -> String {
        grid.row(row)[COLS - width..]
            .iter()
            .map(|code| charset::decode(*code).unwrap_or('?'))
            .collect()
    }

    #[test]
    fn healthy_refresh_renders_every_row() {
        let mut grid = Grid::with_labels();
        let report = RefreshCoordinator::default().refresh_all(&mut grid, &FixedSource::healthy());
        assert!(report.is_clean());
        assert_eq!(report.outcomes.len(), MetricKind::ALL.len());
        assert_eq!(row_text(&grid, BoardRow::BlockHeight, 6), "#12345");
        assert_eq!(row_text(&grid, BoardRow::Followers, 4), "4821");
        assert_eq!(row_text(&grid, BoardRow::ArchivedVolume, 6), "1.24gb");
        assert_eq!(row_text(&grid, BoardRow::SecondaryPrice, 5), "5.50$");
        assert_eq!(row_text(&grid, BoardRow::PrimaryPrice, 9), "27123.46$");
        assert!(grid.has_rendered_row(BoardRow::BlockHeight));
    }

    #[test]
    fn one_failing_source_only_marks_its_row() {
        let mut grid = Grid::with_labels();
        let source = FixedSource {
            followers: None,
            ..FixedSource::healthy()
        };
        let report = RefreshCoordinator::default().refresh_all(&mut grid, &source);
        assert_eq!(report.failed(), vec![MetricKind::Followers]);
        assert_eq!(row_text(&grid, BoardRow::Followers, 5), ERROR_SENTINEL);
        assert_eq!(row_text(&grid, BoardRow::BlockHeight, 6), "#12345");
    }

    #[test]
    fn failed_quote_call_marks_both_prices() {
        let mut grid = Grid::with_labels();
        let source = FixedSource {
            prices: None,
            ..FixedSource::healthy()
        };
        let report = RefreshCoordinator::default().refresh_all(&mut grid, &source);
        assert_eq!(
            report.failed(),
            vec![MetricKind::SecondaryPrice, MetricKind::PrimaryPrice]
        );
        assert_eq!(row_text(&grid, BoardRow::PrimaryPrice, 5), ERROR_SENTINEL);
        assert_eq!(row_text(&grid, BoardRow::SecondaryPrice, 5), ERROR_SENTINEL);
        assert_eq!(row_text(&grid, BoardRow::ArchivedVolume, 6), "1.24gb");
    }

    #[test]
    fn missing_asset_marks_only_that_price() {
        let mut grid = Grid::with_labels();
        let source = FixedSource {
            prices: Some(PriceQuotes {
                primary: Some(30_000.0),
                secondary: None,
            }),
            ..FixedSource::healthy()
        };
        let report = RefreshCoordinator::default().refresh_all(&mut grid, &source);
        assert_eq!(report.failed(), vec![MetricKind::SecondaryPrice]);
        assert_eq!(row_text(&grid, BoardRow::PrimaryPrice, 9), "30000.00$");
    }

    #[test]
    fn malformed_pool_count_marks_archived_row() {
        let mut grid = Grid::with_labels();
        let source = FixedSource {
            pools: Some(vec!["12".to_string(), "lots".to_string()]),
            ..FixedSource::healthy()
        };
        let report = RefreshCoordinator::default().refresh_all(&mut grid, &source);
        assert_eq!(report.failed(), vec![MetricKind::ArchivedVolume]);
        assert_eq!(row_text(&grid, BoardRow::ArchivedVolume, 5), ERROR_SENTINEL);
    }

    #[test]
    fn oversized_value_falls_back_to_sentinel() {
        let mut grid = Grid::with_labels();
        let source = FixedSource {
            prices: Some(PriceQuotes {
                primary: Some(1e30),
                secondary: Some(1.0),
            }),
            ..FixedSource::healthy()
        };
        let report = RefreshCoordinator::default().refresh_all(&mut grid, &source);
        let outcome = report.outcome(MetricKind::PrimaryPrice).expect("price outcome");
        assert!(outcome.value.is_failed());
        assert_eq!(outcome.rendered(), ERROR_SENTINEL);
        assert_eq!(row_text(&grid, BoardRow::PrimaryPrice, 5), ERROR_SENTINEL);
    }

    #[test]
    fn sentinel_fits_every_metric_row() {
        let (sentinel, replaced) = DisplayText::lossy(ERROR_SENTINEL);
        assert!(replaced.is_empty());
        for policy in [RenderPolicy::RetainStale, RenderPolicy::ClearValueField] {
            let renderer = RowRenderer::new(policy);
            let mut grid = Grid::with_labels();
            for kind in MetricKind::ALL {
                renderer
                    .render(&mut grid, kind.row(), &sentinel)
                    .unwrap_or_else(|err| panic!("{kind} sentinel under {policy:?}: {err}"));
                assert_eq!(row_text(&grid, kind.row(), ERROR_SENTINEL.len()), ERROR_SENTINEL);
            }
        }
    }

    #[test]
    fn summary_counts_successes() {
        let mut grid = Grid::with_labels();
        let source = FixedSource {
            height: None,
            ..FixedSource::healthy()
        };
        let summary = RefreshCoordinator::default()
            .refresh_all(&mut grid, &source)
            .summary();
        assert_eq!(summary.ok, 4);
        assert_eq!(summary.failed, vec![MetricKind::BlockHeight]);
    }
}
