//! Request/response entry point for the presentation layer.
//!
//! [`AllocationService`] wraps a [`ResourceStore`] in a [`TimedStore`] and owns
//! the mutation flows: availability-checked booking, date-change re-checks,
//! cancellation and policy-driven resource deletion.
//!
//! Availability check and insert run under a per-resource async lock, so two
//! callers sharing one service can never both pass the check for overlapping
//! windows on the same resource. The lock is advisory and process-local; stores
//! shared between processes still need a constraint of their own.
//!
//! Each flow awaits its store calls in sequence and spawns nothing. Dropping a
//! returned future stops all further dependent store calls.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::availability;
use crate::config::{DeletePolicy, SchedulingConfig};
use crate::conflict::{self, ResourceConflict};
use crate::error::{AllocationError, Result};
use crate::finder;
use crate::interval;
use crate::model::{
    AllocationId, AllocationPatch, AllocationStatus, JobId, NewAllocation, NewResource, Resource,
    ResourceAllocation, ResourceId, ResourcePatch, ResourceStatus, ResourceType,
};
use crate::store::{AllocationQuery, ResourceStore, TimedStore};
use crate::utilization::{self, ResourceUtilization};

/// Advisory per-resource locks held across check-and-write sequences.
#[derive(Default)]
pub struct ResourceLocks {
    slots: parking_lot::Mutex<HashMap<ResourceId, Arc<Mutex<()>>>>,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `resource_id`. Released when the guard drops.
    pub async fn acquire(&self, resource_id: ResourceId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock();
            // Drop slots nobody holds or waits on.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots.entry(resource_id).or_default().clone()
        };
        slot.lock_owned().await
    }
}

pub struct AllocationService<S> {
    store: TimedStore<S>,
    config: SchedulingConfig,
    locks: ResourceLocks,
}

impl<S: ResourceStore> AllocationService<S> {
    pub fn new(store: S, config: SchedulingConfig) -> Result<Self> {
        config.validate()?;
        Ok(AllocationService {
            store: TimedStore::new(store, config.store_timeout()),
            config,
            locks: ResourceLocks::new(),
        })
    }

    pub fn config(&self) -> &SchedulingConfig {
        &self.config
    }

    /// The undecorated backing store.
    pub fn store(&self) -> &S {
        self.store.inner()
    }

    // ── Queries ────────────────────────────────────────────────────────────

    pub async fn is_available(
        &self,
        resource_id: ResourceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_job: Option<JobId>,
    ) -> Result<bool> {
        availability::is_available(&self.store, resource_id, start, end, exclude_job).await
    }

    pub async fn find_conflicts(&self, job_id: JobId) -> Result<Vec<ResourceConflict>> {
        conflict::find_conflicts(&self.store, job_id).await
    }

    pub async fn utilization(
        &self,
        resource_ids: &[ResourceId],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<ResourceUtilization>> {
        utilization::utilization(
            &self.store,
            resource_ids,
            window_start,
            window_end,
            self.config.hours_per_day,
        )
        .await
    }

    pub async fn find_available(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        resource_type: Option<ResourceType>,
        required_skills: Option<&BTreeSet<String>>,
    ) -> Result<Vec<Resource>> {
        finder::find_available(&self.store, start, end, resource_type, required_skills).await
    }

    pub async fn list_resources(&self, resource_type: Option<ResourceType>) -> Result<Vec<Resource>> {
        self.store.list_resources(resource_type).await
    }

    pub async fn get_resource(&self, id: ResourceId) -> Result<Resource> {
        self.store.get_resource(id).await
    }

    pub async fn list_allocations_for_job(
        &self,
        job_id: JobId,
        include_cancelled: bool,
    ) -> Result<Vec<ResourceAllocation>> {
        self.store
            .list_allocations_for_job(job_id, include_cancelled)
            .await
    }

    pub async fn list_allocations_for_resource(
        &self,
        query: &AllocationQuery,
    ) -> Result<Vec<ResourceAllocation>> {
        if let (Some(start), Some(end)) = (query.window_start, query.window_end) {
            interval::validate(start, end)?;
        }
        self.store.list_allocations_for_resource(query).await
    }

    // ── Resources ──────────────────────────────────────────────────────────

    pub async fn create_resource(&self, new: NewResource) -> Result<Resource> {
        let resource = self.store.create_resource(new).await?;
        tracing::info!(resource = %resource.id, kind = %resource.resource_type(), "resource created");
        Ok(resource)
    }

    /// Update a resource. Replacing its details with another type's fails with
    /// `TypeChange` regardless of what the backing store enforces.
    pub async fn update_resource(&self, id: ResourceId, patch: ResourcePatch) -> Result<Resource> {
        let _guard = self.locks.acquire(id).await;
        if let Some(details) = &patch.details {
            let current = self.store.get_resource(id).await?;
            let (from, to) = (current.resource_type(), details.resource_type());
            if from != to {
                return Err(AllocationError::TypeChange { from, to });
            }
        }
        self.store.update_resource(id, patch).await
    }

    /// Delete a resource according to the configured [`DeletePolicy`].
    ///
    /// Returns the ids of allocations cancelled along the way (always empty under
    /// `Reject`).
    pub async fn delete_resource(&self, id: ResourceId) -> Result<Vec<AllocationId>> {
        let _guard = self.locks.acquire(id).await;
        let active = self
            .store
            .list_allocations_for_resource(&AllocationQuery::for_resource(id))
            .await?;

        let mut cancelled = Vec::new();
        if !active.is_empty() {
            match self.config.delete_policy {
                DeletePolicy::Reject => {
                    tracing::warn!(resource = %id, active = active.len(), "delete rejected: resource in use");
                    return Err(AllocationError::ResourceInUse {
                        resource_id: id,
                        allocations: active.iter().map(|a| a.id).collect(),
                    });
                }
                DeletePolicy::CascadeCancel => {
                    for allocation in &active {
                        if let Err(e) = self
                            .store
                            .update_allocation(
                                allocation.id,
                                AllocationPatch::status(AllocationStatus::Cancelled),
                            )
                            .await
                        {
                            return Err(partial_failure(cancelled, "cascade cancel", e));
                        }
                        cancelled.push(allocation.id);
                    }
                }
            }
        }

        if let Err(e) = self.store.delete_resource(id).await {
            if cancelled.is_empty() {
                return Err(e);
            }
            return Err(partial_failure(cancelled, "delete resource", e));
        }
        tracing::info!(resource = %id, cancelled = cancelled.len(), "resource deleted");
        Ok(cancelled)
    }

    // ── Allocations ────────────────────────────────────────────────────────

    /// Book a resource for a job.
    ///
    /// Fails with `InvalidInterval` before touching the store, `NotFound` for an
    /// unknown resource, `AmountMismatch` when hours/quantity do not fit the
    /// resource type, and `ResourceUnavailable` when an active booking overlaps.
    /// If the booking commits but marking the resource scheduled fails, the
    /// result is `PartialFailure` naming the committed allocation.
    ///
    /// The resource is read under the per-resource lock, so the scheduled
    /// follow-up sees the status left by any booking that finished first.
    pub async fn allocate(&self, new: NewAllocation) -> Result<ResourceAllocation> {
        interval::validate(new.start_date, new.end_date)?;

        let _guard = self.locks.acquire(new.resource_id).await;
        let resource = self.store.get_resource(new.resource_id).await?;
        new.amount.check(resource.resource_type())?;

        if new.status.is_active() {
            availability::ensure_available(
                &self.store,
                resource.id,
                new.start_date,
                new.end_date,
                None,
            )
            .await?;
        }
        let allocation = self.store.create_allocation(new).await?;
        tracing::info!(
            allocation = %allocation.id,
            resource = %allocation.resource_id,
            job = %allocation.job_id,
            "allocation created"
        );

        if self.config.mark_resource_scheduled
            && allocation.is_active()
            && resource.status == ResourceStatus::Available
        {
            let patch = ResourcePatch {
                status: Some(ResourceStatus::Scheduled),
                ..Default::default()
            };
            if let Err(e) = self.store.update_resource(resource.id, patch).await {
                return Err(partial_failure(vec![allocation.id], "mark resource scheduled", e));
            }
        }

        Ok(allocation)
    }

    /// Update an allocation.
    ///
    /// Availability is re-checked (ignoring the allocation's own job) only when
    /// the dates move or a cancelled allocation is reactivated. Either fails
    /// with `NotFound` once the allocation's resource has been deleted.
    pub async fn update_allocation(
        &self,
        id: AllocationId,
        patch: AllocationPatch,
    ) -> Result<ResourceAllocation> {
        if let (Some(start), Some(end)) = (patch.start_date, patch.end_date) {
            interval::validate(start, end)?;
        }

        let current = self.store.get_allocation(id).await?;
        let start = patch.start_date.unwrap_or(current.start_date);
        let end = patch.end_date.unwrap_or(current.end_date);
        interval::validate(start, end)?;

        let reactivates = !current.is_active() && patch.status.is_some_and(|s| s.is_active());
        let stays_active = patch.status.map_or(current.is_active(), |s| s.is_active());
        let needs_check = stays_active && (patch.moves(&current) || reactivates);

        let updated = if needs_check {
            let _guard = self.locks.acquire(current.resource_id).await;
            // A cascade delete can leave cancelled rows behind; they cannot come back.
            self.store.get_resource(current.resource_id).await?;
            availability::ensure_available(
                &self.store,
                current.resource_id,
                start,
                end,
                Some(current.job_id),
            )
            .await?;
            self.store.update_allocation(id, patch).await?
        } else {
            self.store.update_allocation(id, patch).await?
        };

        tracing::info!(allocation = %id, status = ?updated.status, "allocation updated");
        Ok(updated)
    }

    /// Retire an allocation without deleting it.
    pub async fn cancel_allocation(&self, id: AllocationId) -> Result<ResourceAllocation> {
        self.update_allocation(id, AllocationPatch::status(AllocationStatus::Cancelled))
            .await
    }

    /// Hard delete, for erroneous entries.
    pub async fn delete_allocation(&self, id: AllocationId) -> Result<()> {
        self.store.delete_allocation(id).await?;
        tracing::info!(allocation = %id, "allocation deleted");
        Ok(())
    }
}

fn partial_failure(
    committed: Vec<AllocationId>,
    step: &'static str,
    source: AllocationError,
) -> AllocationError {
    tracing::warn!(step, committed = committed.len(), error = %source, "partial failure");
    AllocationError::PartialFailure {
        committed,
        step,
        source: Box::new(source),
    }
}
