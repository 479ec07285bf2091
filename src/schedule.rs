//! Posting-date schedule generation.
//!
//! Turns (year, month, interval, image count) into the ordered list of
//! calendar dates printed as page headings. Pure and deterministic: the
//! same inputs always produce the same dates.
//!
//! ## The day-29 cutoff
//!
//! Dates are never scheduled past the 29th of a month, even in 31-day
//! months. Month-end posts get buried by billing-cycle noise on most
//! social dashboards, so the product contract stops the sequence early
//! rather than filling the tail of the month.
//!
//! ## Shortfall is an error
//!
//! If the interval can't produce one date per image before the cutoff,
//! the whole request is rejected with [`ScheduleError::InsufficientDates`].
//! Silently clamping extra images to the last date, or rolling into the
//! next month, would reorder or stack posts without the operator noticing;
//! both behaviors are deliberately not offered.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid month: {year}-{month:02}")]
    InvalidMonth { year: i32, month: u32 },
    #[error(
        "insufficient dates: {count} images need {count} slots but a {interval}-day \
         interval only yields {available} before day {cutoff}"
    )]
    InsufficientDates {
        count: usize,
        interval: u32,
        available: usize,
        cutoff: u32,
    },
}

/// Latest day-of-month a post may be scheduled on.
const DAY_CUTOFF: u32 = 29;

/// Build the posting schedule for one month.
///
/// Starts at day 1 and steps by `interval_days` (coerced up to 1) while the
/// day stays within `min(29, days_in_month)`. Returns exactly `count` dates
/// or an error — never a silently shortened or extended list.
///
/// ```
/// # use snapsheet::schedule::build_schedule;
/// let dates = build_schedule(2025, 9, 2, 5).unwrap();
/// assert_eq!(dates.len(), 5);
/// assert_eq!(dates[0].to_string(), "2025-09-01");
/// assert_eq!(dates[4].to_string(), "2025-09-09");
/// ```
pub fn build_schedule(
    year: i32,
    month: u32,
    interval_days: u32,
    count: usize,
) -> Result<Vec<NaiveDate>, ScheduleError> {
    let interval = interval_days.max(1);
    let cutoff = DAY_CUTOFF.min(days_in_month(year, month)?);

    let mut dates = Vec::with_capacity(count);
    let mut day = 1;
    while day <= cutoff && dates.len() < count {
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or(ScheduleError::InvalidMonth { year, month })?;
        dates.push(date);
        day += interval;
    }

    if dates.len() < count {
        return Err(ScheduleError::InsufficientDates {
            count,
            interval,
            available: dates.len(),
            cutoff,
        });
    }
    Ok(dates)
}

/// Number of days in a month, via the first-of-next-month trick.
fn days_in_month(year: i32, month: u32) -> Result<u32, ScheduleError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or(ScheduleError::InvalidMonth { year, month })?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or(ScheduleError::InvalidMonth { year, month })?;
    Ok(next_first.signed_duration_since(first).num_days() as u32)
}

/// Parse a `YYYY-MM` plan month string as accepted by the CLI.
pub fn parse_plan_month(s: &str) -> Option<(i32, u32)> {
    let (y, m) = s.split_once('-')?;
    let year: i32 = y.parse().ok()?;
    let month: u32 = m.parse().ok()?;
    if (1..=12).contains(&month) {
        Some((year, month))
    } else {
        None
    }
}
