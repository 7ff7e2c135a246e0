//! Binary availability check for a single resource over a candidate window.
//!
//! A resource is available iff no non-cancelled allocation on it overlaps the
//! window (inclusive bounds), ignoring the allocations of `exclude_job` if given.
//! Partial capacity is not modelled: an employee booked for 4 of 8 hours is
//! still unavailable for any further overlapping booking.

use chrono::{DateTime, Utc};

use crate::error::{AllocationError, Result};
use crate::interval;
use crate::model::{JobId, ResourceAllocation, ResourceId};
use crate::store::{AllocationQuery, ResourceStore};

/// The non-cancelled allocations on `resource_id` that block the window.
pub async fn blocking_allocations<S: ResourceStore + ?Sized>(
    store: &S,
    resource_id: ResourceId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_job: Option<JobId>,
) -> Result<Vec<ResourceAllocation>> {
    interval::validate(start, end)?;

    let query = AllocationQuery::for_resource(resource_id)
        .overlapping(start, end)
        .excluding_job(exclude_job);
    let mut blocking = store.list_allocations_for_resource(&query).await?;
    // Stores are trusted for the range predicate, but re-check locally.
    blocking.retain(|a| query.matches(a) && a.overlaps(start, end));

    tracing::debug!(
        resource = %resource_id,
        %start,
        %end,
        blocking = blocking.len(),
        "availability checked"
    );
    Ok(blocking)
}

/// True if `resource_id` has no active booking overlapping `[start, end]`.
pub async fn is_available<S: ResourceStore + ?Sized>(
    store: &S,
    resource_id: ResourceId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_job: Option<JobId>,
) -> Result<bool> {
    Ok(blocking_allocations(store, resource_id, start, end, exclude_job)
        .await?
        .is_empty())
}

/// Like [`is_available`], but fails with [`AllocationError::ResourceUnavailable`]
/// carrying the blocking window and allocation ids.
pub async fn ensure_available<S: ResourceStore + ?Sized>(
    store: &S,
    resource_id: ResourceId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_job: Option<JobId>,
) -> Result<()> {
    let blocking = blocking_allocations(store, resource_id, start, end, exclude_job).await?;
    if blocking.is_empty() {
        return Ok(());
    }

    // Report the span of the requested window actually covered by existing bookings.
    let covered_start = blocking
        .iter()
        .map(|a| a.start_date.max(start))
        .min()
        .unwrap_or(start);
    let covered_end = blocking
        .iter()
        .map(|a| a.end_date.min(end))
        .max()
        .unwrap_or(end);

    tracing::warn!(
        resource = %resource_id,
        conflicting = blocking.len(),
        "booking rejected: resource unavailable"
    );
    Err(AllocationError::ResourceUnavailable {
        resource_id,
        start: covered_start,
        end: covered_end,
        conflicting: blocking.iter().map(|a| a.id).collect(),
    })
}
