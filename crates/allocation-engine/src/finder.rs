//! Find resources free over a window, optionally filtered by type and skills.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::availability;
use crate::error::Result;
use crate::interval;
use crate::model::{Resource, ResourceDetails, ResourceType};
use crate::store::ResourceStore;

/// Whether `resource` satisfies a required skill set.
///
/// Only employees carry skills; every required skill must be present. Other
/// resource types are not subject to skill filtering.
pub fn has_required_skills(resource: &Resource, required: &BTreeSet<String>) -> bool {
    match &resource.details {
        ResourceDetails::Employee(employee) => required.is_subset(&employee.skills),
        ResourceDetails::Equipment(_) | ResourceDetails::Material(_) | ResourceDetails::Vehicle(_) => {
            true
        }
    }
}

/// Resources (of `resource_type`, if given) with no active booking overlapping
/// `[start, end]` and, for employees, holding all of `required_skills`.
///
/// Availability here is about bookings only. `ResourceStatus` is not consulted,
/// so an unbooked `out_of_service` or `unavailable` resource is still returned;
/// callers offering bookable resources filter on `status` themselves.
pub async fn find_available<S: ResourceStore + ?Sized>(
    store: &S,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    resource_type: Option<ResourceType>,
    required_skills: Option<&BTreeSet<String>>,
) -> Result<Vec<Resource>> {
    interval::validate(start, end)?;

    let candidates = store.list_resources(resource_type).await?;
    let mut available = Vec::new();
    for resource in candidates {
        // Skills are local data; skip the store round-trip when they already fail.
        if required_skills.is_some_and(|skills| !has_required_skills(&resource, skills)) {
            continue;
        }
        if availability::is_available(store, resource.id, start, end, None).await? {
            available.push(resource);
        }
    }

    tracing::debug!(
        resource_type = resource_type.map(ResourceType::as_str),
        found = available.len(),
        "available resources found"
    );
    Ok(available)
}
