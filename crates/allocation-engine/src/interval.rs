//! Pure interval arithmetic over `[start, end)` date ranges.
//!
//! The overlap test is inclusive on both bounds: two ranges that merely touch
//! (one ends exactly when the other starts) DO overlap. Booking queries in the
//! store are expressed the same way (`start_date <= X AND end_date >= Y`), so the
//! in-memory math and the store predicate always agree.

use chrono::{DateTime, Utc};

use crate::error::{AllocationError, Result};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Reject ranges whose start lies after their end.
///
/// Zero-length ranges (`start == end`) are valid.
pub fn validate(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if start > end {
        return Err(AllocationError::InvalidInterval { start, end });
    }
    Ok(())
}

/// Inclusive-bounds overlap test: `a_start <= b_end && b_start <= a_end`.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start <= b_end && b_start <= a_end
}

/// The shared sub-range `max(starts)..min(ends)`, or `None` when it would be inverted.
pub fn overlap_interval(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = a_start.max(b_start);
    let end = a_end.min(b_end);
    (start <= end).then_some((start, end))
}

/// Length of a range in fractional hours. Inverted ranges count as zero.
pub fn duration_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    if end <= start {
        return 0.0;
    }
    (end - start).num_seconds() as f64 / SECONDS_PER_HOUR
}

/// Hours of an allocation that fall inside a reporting window. Never negative.
pub fn clipped_duration_hours(
    alloc_start: DateTime<Utc>,
    alloc_end: DateTime<Utc>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> f64 {
    overlap_interval(alloc_start, alloc_end, window_start, window_end)
        .map(|(start, end)| duration_hours(start, end))
        .unwrap_or(0.0)
}
