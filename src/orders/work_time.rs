//! Work-hours aware elapsed time.
//!
//! Elapsed time is only counted inside a daily time-of-day window (08:00 to
//! 16:30 unless configured otherwise). Weekends are not special: every
//! calendar day contributes its window.

use crate::error::{Error, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// A daily work window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkHours {
    start: NaiveTime,
    end: NaiveTime,
}

impl Default for WorkHours {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(16, 30, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl WorkHours {
    /// Create a work window.
    ///
    /// # Errors
    ///
    /// Returns an error if `start` is not strictly before `end`.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start >= end {
            return Err(Error::InvalidTime(format!(
                "work window start {start} must be before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse a window from `HH:MM` (or `HH:MM:SS`) strings.
    ///
    /// # Errors
    ///
    /// Returns an error if either time fails to parse or the window is empty.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_time(start)?, parse_time(end)?)
    }

    /// Start of the daily window.
    #[must_use]
    pub const fn start(&self) -> NaiveTime {
        self.start
    }

    /// End of the daily window.
    #[must_use]
    pub const fn end(&self) -> NaiveTime {
        self.end
    }

    /// Length of one full work day.
    #[must_use]
    pub fn day_length(&self) -> Duration {
        self.end - self.start
    }

    /// Work time elapsed between two instants.
    ///
    /// Each calendar day from `start` to `end` contributes the overlap of its
    /// window with `[start, end]`. Returns zero when `end <= start`.
    #[must_use]
    pub fn work_time_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> Duration {
        if end <= start {
            return Duration::zero();
        }

        let mut total = Duration::zero();
        let mut day = start.date();
        let last = end.date();

        while day <= last {
            let window_start = day.and_time(self.start).max(start);
            let window_end = day.and_time(self.end).min(end);
            if window_end > window_start {
                total += window_end - window_start;
            }
            let Some(next) = day.succ_opt() else { break };
            day = next;
        }

        total
    }

    /// Whether an instant falls inside the window (start inclusive, end exclusive).
    #[must_use]
    pub fn is_within_work_hours(&self, at: NaiveDateTime) -> bool {
        let time = at.time();
        time >= self.start && time < self.end
    }

    /// The earliest instant at or after `at` when work can resume.
    #[must_use]
    pub fn next_work_start(&self, at: NaiveDateTime) -> NaiveDateTime {
        if self.is_within_work_hours(at) {
            return at;
        }
        if at.time() < self.start {
            return at.date().and_time(self.start);
        }
        let tomorrow = at.date().succ_opt().unwrap_or(NaiveDate::MAX);
        tomorrow.and_time(self.start)
    }
}

/// How elapsed time is accrued into an order's state counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeAccrual {
    /// Every second between entering and leaving a state counts.
    #[default]
    WallClock,
    /// Only seconds inside the daily work window count.
    WorkHours(WorkHours),
}

impl TimeAccrual {
    /// Elapsed time between two instants under this policy.
    #[must_use]
    pub fn elapsed(&self, from: NaiveDateTime, to: NaiveDateTime) -> Duration {
        match self {
            Self::WallClock => {
                if to > from {
                    to - from
                } else {
                    Duration::zero()
                }
            }
            Self::WorkHours(hours) => hours.work_time_between(from, to),
        }
    }
}

/// Parse `HH:MM` or `HH:MM:SS`.
///
/// # Errors
///
/// Returns an error if the string is neither format.
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| Error::InvalidTime(s.to_string()))
}
