//! Repeat calendar: civil-calendar arithmetic for recurring reminders.
//!
//! # Invariants
//! - `advance(t, k) > t` for every recurring `k`.
//! - Month and year steps clamp to the last valid day of the target month
//!   (Jan 31 + 1 month = Feb 28/29, Feb 29 + 1 year = Feb 28).
//! - `next_after` is anchored: occurrence `n` is always `anchor + n units`,
//!   so clamping in a short month never shifts later occurrences.

use crate::model::reminder::RepeatKind;
use chrono::{Datelike, Days, Duration, Months, NaiveDateTime};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    /// The next occurrence is outside the representable date range.
    OutOfRange {
        from: NaiveDateTime,
        kind: RepeatKind,
    },
}

impl Display for CalendarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { from, kind } => {
                write!(f, "cannot advance {from} by one {kind} step: out of range")
            }
        }
    }
}

impl Error for CalendarError {}

enum Step {
    Fixed(Duration),
    Months(u32),
}

fn step_of(kind: RepeatKind) -> Option<Step> {
    match kind {
        RepeatKind::Never => None,
        RepeatKind::Hourly => Some(Step::Fixed(Duration::hours(1))),
        RepeatKind::Daily => Some(Step::Fixed(Duration::days(1))),
        RepeatKind::Weekly => Some(Step::Fixed(Duration::weeks(1))),
        RepeatKind::Monthly => Some(Step::Months(1)),
        RepeatKind::Yearly => Some(Step::Months(12)),
    }
}

/// Adds exactly one calendar unit of `kind` to `timestamp`.
///
/// `Never` returns the input unchanged; the caller marks such a reminder
/// consumed instead.
pub fn advance(timestamp: NaiveDateTime, kind: RepeatKind) -> Result<NaiveDateTime, CalendarError> {
    let out_of_range = || CalendarError::OutOfRange {
        from: timestamp,
        kind,
    };
    match kind {
        RepeatKind::Never => Ok(timestamp),
        RepeatKind::Daily => timestamp.checked_add_days(Days::new(1)).ok_or_else(out_of_range),
        RepeatKind::Weekly => timestamp.checked_add_days(Days::new(7)).ok_or_else(out_of_range),
        RepeatKind::Hourly => timestamp
            .checked_add_signed(Duration::hours(1))
            .ok_or_else(out_of_range),
        RepeatKind::Monthly => timestamp
            .checked_add_months(Months::new(1))
            .ok_or_else(out_of_range),
        RepeatKind::Yearly => timestamp
            .checked_add_months(Months::new(12))
            .ok_or_else(out_of_range),
    }
}

/// Returns the first occurrence `anchor + n units` (`n >= 1`) strictly later
/// than `after`.
///
/// For `Never` this returns `after` unchanged.
pub fn next_after(
    anchor: NaiveDateTime,
    kind: RepeatKind,
    after: NaiveDateTime,
) -> Result<NaiveDateTime, CalendarError> {
    let out_of_range = || CalendarError::OutOfRange { from: after, kind };
    let Some(step) = step_of(kind) else {
        return Ok(after);
    };

    match step {
        Step::Fixed(unit) => {
            let unit_secs = unit.num_seconds();
            let elapsed_secs = (after - anchor).num_seconds().max(0);
            let n = elapsed_secs / unit_secs + 1;
            anchor
                .checked_add_signed(Duration::seconds(n.checked_mul(unit_secs).ok_or_else(out_of_range)?))
                .ok_or_else(out_of_range)
        }
        Step::Months(unit) => {
            let elapsed_months = i64::from(after.year() - anchor.year()) * 12
                + i64::from(after.month()) - i64::from(anchor.month());
            let mut n = (elapsed_months / i64::from(unit)).max(1);
            // Clamping can place occurrence `n` at or before `after` within
            // the same month, so at most two candidates are examined.
            for _ in 0..3 {
                let months = u32::try_from(n * i64::from(unit)).map_err(|_| out_of_range())?;
                let candidate = anchor
                    .checked_add_months(Months::new(months))
                    .ok_or_else(out_of_range)?;
                if candidate > after {
                    return Ok(candidate);
                }
                n += 1;
            }
            Err(out_of_range())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{advance, next_after, CalendarError};
    use crate::model::reminder::RepeatKind;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn never_returns_input_unchanged() {
        let t = at(2024, 3, 10, 9, 0);
        assert_eq!(advance(t, RepeatKind::Never).unwrap(), t);
        assert_eq!(next_after(t, RepeatKind::Never, t).unwrap(), t);
    }

    #[test]
    fn recurring_kinds_always_move_forward() {
        let starts = [
            at(2024, 1, 31, 23, 30),
            at(2024, 2, 29, 0, 0),
            at(2023, 12, 31, 23, 59),
            at(2025, 6, 15, 12, 0),
        ];
        for start in starts {
            for kind in RepeatKind::ALL.into_iter().filter(|k| k.is_recurring()) {
                let next = advance(start, kind).unwrap();
                assert!(next > start, "{kind} from {start} gave {next}");
            }
        }
    }

    #[test]
    fn single_steps_use_civil_units() {
        let t = at(2024, 3, 9, 7, 15);
        assert_eq!(advance(t, RepeatKind::Hourly).unwrap(), at(2024, 3, 9, 8, 15));
        assert_eq!(advance(t, RepeatKind::Daily).unwrap(), at(2024, 3, 10, 7, 15));
        assert_eq!(advance(t, RepeatKind::Weekly).unwrap(), at(2024, 3, 16, 7, 15));
        assert_eq!(advance(t, RepeatKind::Monthly).unwrap(), at(2024, 4, 9, 7, 15));
        assert_eq!(advance(t, RepeatKind::Yearly).unwrap(), at(2025, 3, 9, 7, 15));
    }

    #[test]
    fn month_and_year_steps_clamp_to_month_end() {
        assert_eq!(
            advance(at(2024, 1, 31, 8, 0), RepeatKind::Monthly).unwrap(),
            at(2024, 2, 29, 8, 0)
        );
        assert_eq!(
            advance(at(2023, 1, 31, 8, 0), RepeatKind::Monthly).unwrap(),
            at(2023, 2, 28, 8, 0)
        );
        assert_eq!(
            advance(at(2024, 2, 29, 8, 0), RepeatKind::Yearly).unwrap(),
            at(2025, 2, 28, 8, 0)
        );
    }

    #[test]
    fn twelve_monthly_advances_land_one_year_later() {
        let start = at(2024, 5, 15, 6, 30);
        let mut t = start;
        for _ in 0..12 {
            t = advance(t, RepeatKind::Monthly).unwrap();
        }
        assert_eq!(t, at(2025, 5, 15, 6, 30));
    }

    #[test]
    fn anchored_monthly_occurrences_from_the_31st_do_not_drift() {
        let anchor = at(2024, 1, 31, 8, 0);
        let mut t = anchor;
        let mut seen = Vec::new();
        for _ in 0..12 {
            t = next_after(anchor, RepeatKind::Monthly, t).unwrap();
            seen.push(t);
        }
        assert_eq!(seen[0], at(2024, 2, 29, 8, 0));
        assert_eq!(seen[1], at(2024, 3, 31, 8, 0));
        assert_eq!(seen[2], at(2024, 4, 30, 8, 0));
        assert_eq!(t, at(2025, 1, 31, 8, 0));
    }

    #[test]
    fn next_after_skips_missed_occurrences() {
        let anchor = at(2024, 3, 1, 7, 0);
        let now = at(2024, 3, 5, 9, 0);
        assert_eq!(
            next_after(anchor, RepeatKind::Daily, now).unwrap(),
            at(2024, 3, 6, 7, 0)
        );
        assert_eq!(
            next_after(anchor, RepeatKind::Hourly, now).unwrap(),
            at(2024, 3, 5, 10, 0)
        );
        assert_eq!(
            next_after(anchor, RepeatKind::Yearly, at(2027, 3, 1, 7, 0)).unwrap(),
            at(2028, 3, 1, 7, 0)
        );
    }

    #[test]
    fn next_after_fire_time_is_exactly_one_unit_later() {
        let anchor = at(2024, 3, 1, 7, 0);
        assert_eq!(
            next_after(anchor, RepeatKind::Daily, anchor).unwrap(),
            at(2024, 3, 2, 7, 0)
        );
        assert_eq!(
            next_after(anchor, RepeatKind::Weekly, anchor).unwrap(),
            at(2024, 3, 8, 7, 0)
        );
    }

    #[test]
    fn overflow_is_signaled() {
        let err = advance(NaiveDateTime::MAX, RepeatKind::Daily).unwrap_err();
        assert!(matches!(err, CalendarError::OutOfRange { kind: RepeatKind::Daily, .. }));
    }
}
