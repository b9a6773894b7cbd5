// SPDX-License-Identifier: MIT
//! Consecutive-day activity streak.
//!
//! Dates are compared at calendar-day granularity in UTC everywhere — one
//! fixed zone, so a streak can't break (or double-count) across DST or a
//! traveling user's local midnight.
//!
//! A repeat activity on an already-counted day leaves the streak unchanged:
//! a streak counts distinct days, not activities.

use chrono::NaiveDate;

/// Advance a streak for one qualifying activity on `today`.
///
/// Returns the new streak count; the caller persists `today` as the new
/// last-activity date alongside it.
pub fn advance(last_activity: Option<NaiveDate>, today: NaiveDate, streak: u32) -> u32 {
    match last_activity {
        None => 1,
        Some(last) => {
            let gap = (today - last).num_days();
            match gap {
                0 => streak.max(1),
                1 => streak + 1,
                // Also covers a clock that went backwards (gap < 0): the
                // stored date is ahead of "today", so don't extend anything.
                _ if gap > 1 => 1,
                _ => streak.max(1),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn first_activity_starts_at_one() {
        assert_eq!(advance(None, d("2026-08-28"), 0), 1);
    }

    #[test]
    fn next_day_increments() {
        assert_eq!(advance(Some(d("2026-08-27")), d("2026-08-28"), 4), 5);
    }

    #[test]
    fn same_day_does_not_double_count() {
        assert_eq!(advance(Some(d("2026-08-28")), d("2026-08-28"), 4), 4);
        // Legacy rows with a date but zero streak still count today.
        assert_eq!(advance(Some(d("2026-08-28")), d("2026-08-28"), 0), 1);
    }

    #[test]
    fn gap_resets_to_one() {
        assert_eq!(advance(Some(d("2026-08-25")), d("2026-08-28"), 9), 1);
    }

    #[test]
    fn backwards_clock_keeps_streak() {
        assert_eq!(advance(Some(d("2026-08-29")), d("2026-08-28"), 3), 3);
    }
}
