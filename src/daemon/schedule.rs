//! Recurring full-refresh slots: minute 0 of each hour in an inclusive hour
//! range, on a set of ISO weekdays, in a fixed UTC offset.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, TimeZone, Timelike, Utc};

use crate::core::config::ScheduleConfig;
use crate::core::errors::{Result, SfbError};

/// Slots are hourly, so a week plus a day covers every possible gap.
const MAX_HOURS_SEARCHED: i64 = 24 * 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSchedule {
    enabled: bool,
    first_hour: u32,
    last_hour: u32,
    /// Index 1..=7 is Monday..=Sunday.
    weekdays: [bool; 8],
    offset: FixedOffset,
}

impl RefreshSchedule {
    pub fn from_config(cfg: &ScheduleConfig) -> Result<Self> {
        let offset = FixedOffset::east_opt(cfg.utc_offset_minutes * 60).ok_or_else(|| {
            SfbError::InvalidConfig {
                details: format!(
                    "schedule.utc_offset_minutes={} is not a valid offset",
                    cfg.utc_offset_minutes
                ),
            }
        })?;
        let mut weekdays = [false; 8];
        for day in &cfg.weekdays {
            let slot = usize::try_from(*day)
                .ok()
                .filter(|d| (1..=7).contains(d))
                .ok_or_else(|| SfbError::InvalidConfig {
                    details: format!("schedule weekday {day} is outside 1..=7"),
                })?;
            weekdays[slot] = true;
        }
        Ok(Self {
            enabled: cfg.enabled,
            first_hour: cfg.first_hour,
            last_hour: cfg.last_hour,
            weekdays,
            offset,
        })
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether `at` is exactly a refresh slot.
    #[must_use]
    pub fn is_slot(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.offset);
        let weekday = local.weekday().number_from_monday() as usize;
        self.enabled
            && local.minute() == 0
            && local.second() == 0
            && local.nanosecond() == 0
            && (self.first_hour..=self.last_hour).contains(&local.hour())
            && self.weekdays[weekday]
    }

    /// First slot strictly after `now`, or `None` when disabled or no slot
    /// exists (no weekdays selected).
    #[must_use]
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.enabled {
            return None;
        }
        let local = now.with_timezone(&self.offset);
        let hour_start = local
            .date_naive()
            .and_time(NaiveTime::from_hms_opt(local.hour(), 0, 0)?);
        let mut candidate = self
            .offset
            .from_local_datetime(&hour_start)
            .single()?
            .with_timezone(&Utc);
        for _ in 0..=MAX_HOURS_SEARCHED {
            if candidate > now && self.is_slot(candidate) {
                return Some(candidate);
            }
            candidate += Duration::hours(1);
        }
        None
    }

    /// The next `count` slots after `now`.
    #[must_use]
    pub fn upcoming(&self, now: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let mut slots = Vec::with_capacity(count);
        let mut cursor = now;
        while slots.len() < count {
            let Some(next) = self.next_after(cursor) else {
                break;
            };
            slots.push(next);
            cursor = next;
        }
        slots
    }

    /// Render a slot in the schedule's own offset.
    #[must_use]
    pub fn local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset)
    }
}
