//! Pure calendar arithmetic for recurrence rules.
//!
//! Everything here operates on `NaiveDate` values; no I/O. Weekdays use the
//! 0=Monday..6=Sunday convention carried by rule rows.

use crate::types::ScheduleType;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Recurrence anchor resolved within a target month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    /// A fixed day of month (1-31), clamped to the month's length.
    DayOfMonth(u32),
    /// The nth occurrence of a weekday; `week_of_month` is 1..4 or -1 for last.
    WeekdayOfMonth { weekday: u32, week_of_month: i32 },
}

impl Anchor {
    /// Derive the anchor from a rule's nullable columns. Day-of-month wins
    /// when both modes are populated; a zero `week_of_month` leaves the
    /// weekday mode inert.
    pub fn from_fields(
        day_of_month: Option<u32>,
        weekday: Option<u32>,
        week_of_month: Option<i32>,
    ) -> Option<Self> {
        if let Some(dom) = day_of_month {
            return Some(Anchor::DayOfMonth(dom));
        }
        if let (Some(wd), Some(wom)) = (weekday, week_of_month)
            && wom != 0
        {
            return Some(Anchor::WeekdayOfMonth {
                weekday: wd,
                week_of_month: wom,
            });
        }
        None
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    const DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    if month == 2 && is_leap_year(year) {
        29
    } else {
        DAYS[(month - 1) as usize]
    }
}

/// Return (year, month) after adding `months` to the given (year, month).
pub fn add_months(year: i32, month: u32, months: u32) -> (i32, u32) {
    let zero_based = year * 12 + (month as i32 - 1) + months as i32;
    (zero_based.div_euclid(12), (zero_based.rem_euclid(12) + 1) as u32)
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    // Callers clamp `day` into the month, so construction cannot fail.
    NaiveDate::from_ymd_opt(year, month, day).expect("day within month")
}

fn weekday0(d: NaiveDate) -> u32 {
    d.weekday().num_days_from_monday()
}

fn last_occurrence(year: i32, month: u32, weekday: u32) -> NaiveDate {
    let last = ymd(year, month, last_day_of_month(year, month));
    let back = (weekday0(last) as i64 - weekday as i64).rem_euclid(7);
    last - Duration::days(back)
}

/// Resolve an anchor within (year, month). With no anchor, the day-of-month
/// of `from` is reused, clamped to the month's length.
fn resolve_in_month(year: i32, month: u32, from: NaiveDate, anchor: Option<Anchor>) -> NaiveDate {
    match anchor {
        Some(Anchor::DayOfMonth(dom)) => {
            let dom = dom.clamp(1, 31);
            ymd(year, month, dom.min(last_day_of_month(year, month)))
        }
        Some(Anchor::WeekdayOfMonth {
            weekday,
            week_of_month,
        }) => {
            let weekday = weekday % 7;
            if week_of_month > 0 {
                let first = ymd(year, month, 1);
                let offset = (weekday as i64 - weekday0(first) as i64).rem_euclid(7);
                let candidate = first + Duration::days(offset + 7 * (week_of_month as i64 - 1));
                if candidate.month() == month {
                    candidate
                } else {
                    // An nth occurrence that doesn't exist (e.g. "5th Friday")
                    // clamps back to the month's last occurrence instead of
                    // drifting into the next month.
                    last_occurrence(year, month, weekday)
                }
            } else {
                last_occurrence(year, month, weekday)
            }
        }
        None => ymd(year, month, from.day().min(last_day_of_month(year, month))),
    }
}

/// Compute the next due date strictly after `from`: step the schedule's
/// month count, then resolve the anchor within the target month.
pub fn advance(schedule: ScheduleType, from: NaiveDate, anchor: Option<Anchor>) -> NaiveDate {
    let (year, month) = add_months(from.year(), from.month(), schedule.months());
    resolve_in_month(year, month, from, anchor)
}

/// First due date on or after `from`, for a brand-new rule. Resolves the
/// anchor within `from`'s own month first, then steps forward one schedule
/// period at a time until the resolved date is not in the past.
pub fn next_on_or_after(
    schedule: ScheduleType,
    from: NaiveDate,
    anchor: Option<Anchor>,
) -> NaiveDate {
    let (mut year, mut month) = (from.year(), from.month());
    loop {
        let candidate = resolve_in_month(year, month, from, anchor);
        if candidate >= from {
            return candidate;
        }
        (year, month) = add_months(year, month, schedule.months());
    }
}
