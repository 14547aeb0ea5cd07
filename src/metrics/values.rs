//! Metric kinds and the text each one renders as.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::board::grid::BoardRow;
use crate::core::errors::{Result, SfbError};

/// Text rendered in place of any metric that could not be fetched.
pub const ERROR_SENTINEL: &str = "error";

/// Unit marker appended to the archived volume.
pub const VOLUME_UNIT: &str = "gb";

/// Currency marker appended to prices.
pub const CURRENCY_MARKER: &str = "$";

const BYTES_PER_GB: u128 = 1_000_000_000;
/// Bytes per hundredth of a gigabyte.
const BYTES_PER_CENTI_GB: u128 = BYTES_PER_GB / 100;

/// Each metric the board shows, bound to its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    BlockHeight,
    Followers,
    ArchivedVolume,
    SecondaryPrice,
    PrimaryPrice,
}

impl MetricKind {
    /// Refresh order.
    pub const ALL: [Self; 5] = [
        Self::BlockHeight,
        Self::Followers,
        Self::ArchivedVolume,
        Self::SecondaryPrice,
        Self::PrimaryPrice,
    ];

    #[must_use]
    pub const fn row(self) -> BoardRow {
        match self {
            Self::BlockHeight => BoardRow::BlockHeight,
            Self::Followers => BoardRow::Followers,
            Self::ArchivedVolume => BoardRow::ArchivedVolume,
            Self::SecondaryPrice => BoardRow::SecondaryPrice,
            Self::PrimaryPrice => BoardRow::PrimaryPrice,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BlockHeight => "block_height",
            Self::Followers => "followers",
            Self::ArchivedVolume => "archived_volume",
            Self::SecondaryPrice => "secondary_price",
            Self::PrimaryPrice => "primary_price",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of fetching one metric, reduced to what the board shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricValue {
    Ready(String),
    Failed { details: String },
}

impl MetricValue {
    /// Collapse a fetch result, formatting successes with `format`.
    pub fn from_result<T>(result: Result<T>, format: impl FnOnce(T) -> String) -> Self {
        match result {
            Ok(value) => Self::Ready(format(value)),
            Err(err) => Self::Failed {
                details: err.to_string(),
            },
        }
    }

    /// The board text: the formatted value, or [`ERROR_SENTINEL`].
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Ready(text) => text,
            Self::Failed { .. } => ERROR_SENTINEL,
        }
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// `#<height>`.
#[must_use]
pub fn format_height(height: u64) -> String {
    format!("#{height}")
}

#[must_use]
pub fn format_followers(count: u64) -> String {
    count.to_string()
}

/// 2^53: past this `price * 8.0` no longer converts to `u64` exactly.
const EXACT_EIGHTHS_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Price to two decimal places with the currency marker.
///
/// Exact ties (x.125, x.375, x.625, x.875) round up; `{:.2}` alone would send
/// them to the even cent.
pub fn format_price(price: f64) -> Result<String> {
    if !price.is_finite() || price < 0.0 {
        return Err(SfbError::Upstream {
            source_name: "quotes",
            details: format!("price {price} is not displayable"),
        });
    }
    let eighths = price * 8.0;
    if eighths.fract() == 0.0 && eighths < EXACT_EIGHTHS_LIMIT {
        // Only multiples of 1/8 can sit exactly on a half cent.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let eighths = eighths as u64;
        let cents = (eighths * 25 + 1) / 2;
        return Ok(format!("{}.{:02}{CURRENCY_MARKER}", cents / 100, cents % 100));
    }
    Ok(format!("{price:.2}{CURRENCY_MARKER}"))
}

/// Exact total of per-pool archived byte counts.
///
/// Counts arrive as decimal integer strings that can exceed what an `f64`
/// represents exactly, so they are summed as integers.
pub fn sum_archived_bytes<I, S>(counts: I) -> Result<u128>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    counts.into_iter().try_fold(0_u128, |total, raw| {
        let raw = raw.as_ref().trim();
        let bytes = raw.parse::<u128>().map_err(|err| SfbError::Upstream {
            source_name: "pools",
            details: format!("bytes_archived {raw:?}: {err}"),
        })?;
        total.checked_add(bytes).ok_or_else(|| SfbError::Upstream {
            source_name: "pools",
            details: "archived byte total overflows".to_string(),
        })
    })
}

/// Bytes as gigabytes (10⁹) rounded half-up to two decimals, with unit marker.
#[must_use]
pub fn format_archived(total_bytes: u128) -> String {
    let hundredths = total_bytes / BYTES_PER_CENTI_GB
        + u128::from(total_bytes % BYTES_PER_CENTI_GB >= BYTES_PER_CENTI_GB / 2);
    format!(
        "{}.{:02}{VOLUME_UNIT}",
        hundredths / 100,
        hundredths % 100
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_rows_match_board_layout() {
        assert_eq!(MetricKind::BlockHeight.row().index(), 0);
        assert_eq!(MetricKind::Followers.row().index(), 2);
        assert_eq!(MetricKind::ArchivedVolume.row().index(), 3);
        assert_eq!(MetricKind::SecondaryPrice.row().index(), 4);
        assert_eq!(MetricKind::PrimaryPrice.row().index(), 5);
    }

    #[test]
    fn height_is_hash_prefixed() {
        assert_eq!(format_height(12_345), "#12345");
    }

    #[test]
    fn prices_have_two_decimals_and_marker() {
        assert_eq!(format_price(27_123.456).unwrap(), "27123.46$");
        assert_eq!(format_price(5.0).unwrap(), "5.00$");
        assert_eq!(format_price(0.0).unwrap(), "0.00$");
        assert_eq!(format_price(0.5).unwrap(), "0.50$");
        assert!(format_price(f64::NAN).is_err());
        assert!(format_price(-1.0).is_err());
    }

    #[test]
    fn exact_half_cent_prices_round_up() {
        assert_eq!(format_price(5.125).unwrap(), "5.13$");
        assert_eq!(format_price(27_123.625).unwrap(), "27123.63$");
        assert_eq!(format_price(0.375).unwrap(), "0.38$");
        assert_eq!(format_price(2.875).unwrap(), "2.88$");
        // Not a tie in binary: 1.005 is stored slightly below the half cent.
        assert_eq!(format_price(1.005).unwrap(), "1.00$");
    }

    #[test]
    fn archived_sum_is_exact_beyond_f64_precision() {
        // 2^53 + 1 is not representable as f64; naive float summation loses the 1s.
        let counts = ["9007199254740993", "9007199254740993", "1"];
        let total = sum_archived_bytes(counts).expect("valid counts");
        assert_eq!(total, 18_014_398_509_481_987);
        assert_eq!(format_archived(total), "18014398.51gb");
    }

    #[test]
    fn archived_rounds_half_up() {
        assert_eq!(format_archived(1_234_999_999), "1.23gb");
        assert_eq!(format_archived(1_235_000_000), "1.24gb");
        assert_eq!(format_archived(4_999_999), "0.00gb");
        assert_eq!(format_archived(5_000_000), "0.01gb");
        assert_eq!(format_archived(0), "0.00gb");
        assert_eq!(format_archived(2_000_000_000_000), "2000.00gb");
    }

    #[test]
    fn archived_sum_of_nothing_is_zero() {
        assert_eq!(sum_archived_bytes(Vec::<String>::new()).unwrap(), 0);
    }

    #[test]
    fn archived_sum_rejects_non_integer_counts() {
        let err = sum_archived_bytes(["100", "12.5"]).unwrap_err();
        assert_eq!(err.code(), "SFB-3001");
        assert!(err.to_string().contains("12.5"));
        assert!(sum_archived_bytes(["-4"]).is_err());
    }

    #[test]
    fn failed_value_renders_sentinel() {
        let value = MetricValue::from_result(
            Err::<u64, _>(SfbError::Http {
                context: "test",
                details: "timeout".to_string(),
            }),
            format_height,
        );
        assert!(value.is_failed());
        assert_eq!(value.text(), ERROR_SENTINEL);

        let ok = MetricValue::from_result(Ok(42_u64), format_followers);
        assert_eq!(ok.text(), "42");
    }
}
