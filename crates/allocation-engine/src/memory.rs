//! In-process [`ResourceStore`] backed by hash maps behind a `parking_lot` lock.
//!
//! Used by tests and the CLI. Locks are never held across an `.await`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{AllocationError, Result};
use crate::interval;
use crate::model::{
    AllocationId, AllocationPatch, JobId, NewAllocation, NewResource, Resource, ResourceAllocation,
    ResourceId, ResourcePatch, ResourceType,
};
use crate::store::{AllocationQuery, ResourceStore};

/// A serializable dump of the whole store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub allocations: Vec<ResourceAllocation>,
}

#[derive(Default)]
struct Tables {
    resources: HashMap<ResourceId, Resource>,
    allocations: HashMap<AllocationId, ResourceAllocation>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot, re-deriving each allocation's denormalized resource type.
    ///
    /// Cancelled allocations may outlive their resource (a cascade delete keeps
    /// them for audit) and load with their stored type. Fails if an active
    /// allocation references a missing resource, or if any allocation has an
    /// inverted interval or an amount that does not fit its resource type.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let mut tables = Tables::default();
        for resource in snapshot.resources {
            tables.resources.insert(resource.id, resource);
        }
        for mut allocation in snapshot.allocations {
            interval::validate(allocation.start_date, allocation.end_date)?;
            match tables.resources.get(&allocation.resource_id) {
                Some(resource) => allocation.resource_type = resource.resource_type(),
                None if allocation.is_active() => {
                    return Err(AllocationError::resource_not_found(allocation.resource_id));
                }
                None => {}
            }
            allocation.amount.check(allocation.resource_type)?;
            tables.allocations.insert(allocation.id, allocation);
        }
        Ok(InMemoryStore {
            tables: RwLock::new(tables),
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        let tables = self.tables.read();
        let mut resources: Vec<Resource> = tables.resources.values().cloned().collect();
        sort_resources(&mut resources);
        let mut allocations: Vec<ResourceAllocation> =
            tables.allocations.values().cloned().collect();
        sort_allocations(&mut allocations);
        Snapshot {
            resources,
            allocations,
        }
    }
}

fn sort_resources(resources: &mut [Resource]) {
    resources.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

fn sort_allocations(allocations: &mut [ResourceAllocation]) {
    allocations.sort_by_key(|a| (a.start_date, a.end_date, a.id));
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn list_resources(&self, resource_type: Option<ResourceType>) -> Result<Vec<Resource>> {
        let tables = self.tables.read();
        let mut resources: Vec<Resource> = tables
            .resources
            .values()
            .filter(|r| resource_type.is_none_or(|t| r.resource_type() == t))
            .cloned()
            .collect();
        sort_resources(&mut resources);
        Ok(resources)
    }

    async fn get_resource(&self, id: ResourceId) -> Result<Resource> {
        self.tables
            .read()
            .resources
            .get(&id)
            .cloned()
            .ok_or_else(|| AllocationError::resource_not_found(id))
    }

    async fn create_resource(&self, new: NewResource) -> Result<Resource> {
        let resource = new.into_resource(ResourceId::new(), Utc::now());
        self.tables
            .write()
            .resources
            .insert(resource.id, resource.clone());
        Ok(resource)
    }

    async fn update_resource(&self, id: ResourceId, patch: ResourcePatch) -> Result<Resource> {
        let mut tables = self.tables.write();
        let resource = tables
            .resources
            .get_mut(&id)
            .ok_or_else(|| AllocationError::resource_not_found(id))?;
        // Apply to a copy so a rejected patch leaves the stored row untouched.
        let mut updated = resource.clone();
        updated.apply(patch, Utc::now())?;
        *resource = updated.clone();
        Ok(updated)
    }

    async fn delete_resource(&self, id: ResourceId) -> Result<()> {
        let mut tables = self.tables.write();
        if !tables.resources.contains_key(&id) {
            return Err(AllocationError::resource_not_found(id));
        }
        let mut active: Vec<&ResourceAllocation> = tables
            .allocations
            .values()
            .filter(|a| a.resource_id == id && a.is_active())
            .collect();
        if !active.is_empty() {
            active.sort_by_key(|a| (a.start_date, a.id));
            return Err(AllocationError::ResourceInUse {
                resource_id: id,
                allocations: active.iter().map(|a| a.id).collect(),
            });
        }
        tables.resources.remove(&id);
        Ok(())
    }

    async fn get_allocation(&self, id: AllocationId) -> Result<ResourceAllocation> {
        self.tables
            .read()
            .allocations
            .get(&id)
            .cloned()
            .ok_or_else(|| AllocationError::allocation_not_found(id))
    }

    async fn list_allocations_for_job(
        &self,
        job_id: JobId,
        include_cancelled: bool,
    ) -> Result<Vec<ResourceAllocation>> {
        let tables = self.tables.read();
        let mut allocations: Vec<ResourceAllocation> = tables
            .allocations
            .values()
            .filter(|a| a.job_id == job_id && (include_cancelled || a.is_active()))
            .cloned()
            .collect();
        sort_allocations(&mut allocations);
        Ok(allocations)
    }

    async fn list_allocations_for_resource(
        &self,
        query: &AllocationQuery,
    ) -> Result<Vec<ResourceAllocation>> {
        let tables = self.tables.read();
        let mut allocations: Vec<ResourceAllocation> = tables
            .allocations
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        sort_allocations(&mut allocations);
        Ok(allocations)
    }

    async fn create_allocation(&self, new: NewAllocation) -> Result<ResourceAllocation> {
        interval::validate(new.start_date, new.end_date)?;
        let mut tables = self.tables.write();
        let resource_type = tables
            .resources
            .get(&new.resource_id)
            .map(Resource::resource_type)
            .ok_or_else(|| AllocationError::resource_not_found(new.resource_id))?;
        new.amount.check(resource_type)?;
        let allocation = new.into_allocation(AllocationId::new(), resource_type, Utc::now());
        tables
            .allocations
            .insert(allocation.id, allocation.clone());
        Ok(allocation)
    }

    async fn update_allocation(
        &self,
        id: AllocationId,
        patch: AllocationPatch,
    ) -> Result<ResourceAllocation> {
        let mut tables = self.tables.write();
        let Tables {
            resources,
            allocations,
        } = &mut *tables;
        let allocation = allocations
            .get_mut(&id)
            .ok_or_else(|| AllocationError::allocation_not_found(id))?;
        let mut updated = allocation.clone();
        updated.apply(patch, Utc::now())?;
        // Orphaned audit rows stay cancelled.
        if updated.is_active() && !resources.contains_key(&updated.resource_id) {
            return Err(AllocationError::resource_not_found(updated.resource_id));
        }
        *allocation = updated.clone();
        Ok(updated)
    }

    async fn delete_allocation(&self, id: AllocationId) -> Result<()> {
        self.tables
            .write()
            .allocations
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AllocationError::allocation_not_found(id))
    }
}
