//! Allocated hours per resource over a reporting window.
//!
//! Each active allocation contributes the hours of its interval that fall inside
//! the window. Theoretical capacity is `days_in_window * hours_per_day`, where
//! `days_in_window` is fractional. A double-booked resource can exceed 100%.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::interval;
use crate::model::{Resource, ResourceAllocation, ResourceId, ResourceType};
use crate::store::{AllocationQuery, ResourceStore};

/// Default working hours per day used for theoretical capacity.
pub const DEFAULT_HOURS_PER_DAY: f64 = 8.0;

const HOURS_PER_CALENDAR_DAY: f64 = 24.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUtilization {
    pub resource_id: ResourceId,
    pub resource_name: String,
    pub resource_type: ResourceType,
    /// Allocated hours clipped to the reporting window.
    pub total_hours_allocated: f64,
    pub total_available_hours: f64,
    pub utilization_percentage: f64,
    pub allocations: Vec<ResourceAllocation>,
}

/// Theoretical working hours in a window.
pub fn available_hours(
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    hours_per_day: f64,
) -> f64 {
    interval::duration_hours(window_start, window_end) / HOURS_PER_CALENDAR_DAY * hours_per_day
}

/// Sum of active allocation hours inside the window. Allocations of other
/// resources are ignored.
pub fn allocated_hours(
    resource_id: ResourceId,
    allocations: &[ResourceAllocation],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> f64 {
    allocations
        .iter()
        .filter(|a| a.resource_id == resource_id && a.is_active())
        .map(|a| {
            interval::clipped_duration_hours(a.start_date, a.end_date, window_start, window_end)
        })
        .sum()
}

/// Compute one resource's utilization from an already-fetched allocation set.
pub fn summarize(
    resource: &Resource,
    allocations: Vec<ResourceAllocation>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    hours_per_day: f64,
) -> ResourceUtilization {
    let allocations: Vec<ResourceAllocation> = allocations
        .into_iter()
        .filter(|a| {
            a.resource_id == resource.id && a.is_active() && a.overlaps(window_start, window_end)
        })
        .collect();
    let total_hours_allocated = allocated_hours(resource.id, &allocations, window_start, window_end);
    let total_available_hours = available_hours(window_start, window_end, hours_per_day);
    let utilization_percentage = if total_available_hours > 0.0 {
        total_hours_allocated / total_available_hours * 100.0
    } else {
        0.0
    };

    ResourceUtilization {
        resource_id: resource.id,
        resource_name: resource.name.clone(),
        resource_type: resource.resource_type(),
        total_hours_allocated,
        total_available_hours,
        utilization_percentage,
        allocations,
    }
}

/// Utilization of each resource in `resource_ids` over the window, in input order.
///
/// Fails with `NotFound` for an unknown resource and `InvalidInterval` for an
/// inverted window (before any store call).
pub async fn utilization<S: ResourceStore + ?Sized>(
    store: &S,
    resource_ids: &[ResourceId],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    hours_per_day: f64,
) -> Result<Vec<ResourceUtilization>> {
    interval::validate(window_start, window_end)?;

    let mut report = Vec::with_capacity(resource_ids.len());
    for &resource_id in resource_ids {
        let resource = store.get_resource(resource_id).await?;
        let query = AllocationQuery::for_resource(resource_id).overlapping(window_start, window_end);
        let allocations = store.list_allocations_for_resource(&query).await?;
        report.push(summarize(
            &resource,
            allocations,
            window_start,
            window_end,
            hours_per_day,
        ));
    }

    tracing::debug!(resources = report.len(), "utilization computed");
    Ok(report)
}
