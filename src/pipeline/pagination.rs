//! Page-range arithmetic for the 100-row ranking pages.

use std::ops::RangeInclusive;

pub const PAGE_SIZE: i64 = 100;

/// Page holding the 1-based record `n`. Anything below 1 lands on page 1.
pub fn page_of(n: i64) -> i64 {
    if n < 1 { 1 } else { (n + PAGE_SIZE - 1) / PAGE_SIZE }
}

/// Pages covering records `start ..= start + count - 1`.
pub fn listing_pages(start: i64, count: u32) -> RangeInclusive<i64> {
    page_of(start)..=page_of(start + i64::from(count) - 1)
}

/// Pages scanned for symbol discovery. The upper bound uses `start + count`,
/// so a slice ending exactly on a page boundary pulls one extra page.
pub fn detail_pages(start: i64, count: u32) -> RangeInclusive<i64> {
    page_of(start)..=page_of(start + i64::from(count))
}
