//! Consecutive-day run detection

use chrono::NaiveDate;
use pulse_common::time::is_next_day;
use std::collections::BTreeSet;

/// Length of the longest run of consecutive calendar dates
///
/// Duplicates are ignored; an empty input yields 0.
pub fn longest_run<I>(dates: I) -> u32
where
    I: IntoIterator<Item = NaiveDate>,
{
    let sorted: BTreeSet<NaiveDate> = dates.into_iter().collect();

    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<NaiveDate> = None;

    for date in sorted {
        current = match previous {
            Some(prev) if is_next_day(prev, date) => current + 1,
            _ => 1,
        };
        longest = longest.max(current);
        previous = Some(date);
    }

    longest
}
