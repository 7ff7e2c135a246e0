//! The contract the scheduling core needs from the external resource store.
//!
//! Any backend offering equality filters on `resource_id`/`job_id`/`status` and
//! the range predicates `start_date <= window_end AND end_date >= window_start`
//! can implement [`ResourceStore`]. Every list operation excludes cancelled
//! allocations unless the query explicitly asks for them.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AllocationError, Result};
use crate::model::{
    AllocationId, AllocationPatch, JobId, NewAllocation, NewResource, Resource, ResourceAllocation,
    ResourceId, ResourcePatch, ResourceType,
};

/// Filters for [`ResourceStore::list_allocations_for_resource`].
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationQuery {
    pub resource_id: ResourceId,
    /// Keep allocations with `end_date >= window_start`.
    pub window_start: Option<DateTime<Utc>>,
    /// Keep allocations with `start_date <= window_end`.
    pub window_end: Option<DateTime<Utc>>,
    pub exclude_job: Option<JobId>,
    pub include_cancelled: bool,
}

impl AllocationQuery {
    pub fn for_resource(resource_id: ResourceId) -> Self {
        AllocationQuery {
            resource_id,
            window_start: None,
            window_end: None,
            exclude_job: None,
            include_cancelled: false,
        }
    }

    pub fn overlapping(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.window_start = Some(start);
        self.window_end = Some(end);
        self
    }

    pub fn excluding_job(mut self, job_id: Option<JobId>) -> Self {
        self.exclude_job = job_id;
        self
    }

    pub fn with_cancelled(mut self) -> Self {
        self.include_cancelled = true;
        self
    }

    /// Evaluate the query predicate against a single allocation.
    pub fn matches(&self, allocation: &ResourceAllocation) -> bool {
        allocation.resource_id == self.resource_id
            && (self.include_cancelled || allocation.is_active())
            && self.exclude_job != Some(allocation.job_id)
            && self.window_start.is_none_or(|ws| allocation.end_date >= ws)
            && self.window_end.is_none_or(|we| allocation.start_date <= we)
    }
}

/// Typed CRUD and query gateway over resources and allocations.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// List resources, optionally restricted to one type.
    async fn list_resources(&self, resource_type: Option<ResourceType>) -> Result<Vec<Resource>>;

    /// Fetch one resource; `NotFound` if absent.
    async fn get_resource(&self, id: ResourceId) -> Result<Resource>;

    async fn create_resource(&self, new: NewResource) -> Result<Resource>;

    async fn update_resource(&self, id: ResourceId, patch: ResourcePatch) -> Result<Resource>;

    async fn delete_resource(&self, id: ResourceId) -> Result<()>;

    async fn get_allocation(&self, id: AllocationId) -> Result<ResourceAllocation>;

    async fn list_allocations_for_job(
        &self,
        job_id: JobId,
        include_cancelled: bool,
    ) -> Result<Vec<ResourceAllocation>>;

    async fn list_allocations_for_resource(
        &self,
        query: &AllocationQuery,
    ) -> Result<Vec<ResourceAllocation>>;

    /// Insert an allocation. The store fills in the referenced resource's type and
    /// fails with `NotFound` if the resource does not exist.
    async fn create_allocation(&self, new: NewAllocation) -> Result<ResourceAllocation>;

    async fn update_allocation(
        &self,
        id: AllocationId,
        patch: AllocationPatch,
    ) -> Result<ResourceAllocation>;

    /// Hard delete, for erroneous entries. Prefer cancelling.
    async fn delete_allocation(&self, id: AllocationId) -> Result<()>;
}

/// Decorates a store so that every call is bounded by a timeout.
///
/// An elapsed timeout surfaces as [`AllocationError::Store`] naming the
/// operation and entity. Nothing is retried.
pub struct TimedStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S> TimedStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        TimedStore { inner, timeout }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        entity: String,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, entity = %entity, "store call timed out");
                Err(AllocationError::Store {
                    operation,
                    entity,
                    message: format!("timed out after {} ms", self.timeout.as_millis()),
                })
            }
        }
    }
}

#[async_trait]
impl<S: ResourceStore> ResourceStore for TimedStore<S> {
    async fn list_resources(&self, resource_type: Option<ResourceType>) -> Result<Vec<Resource>> {
        let entity = resource_type.map_or_else(|| "resources".to_string(), |t| t.to_string());
        self.bounded("list_resources", entity, self.inner.list_resources(resource_type))
            .await
    }

    async fn get_resource(&self, id: ResourceId) -> Result<Resource> {
        self.bounded("get_resource", id.to_string(), self.inner.get_resource(id))
            .await
    }

    async fn create_resource(&self, new: NewResource) -> Result<Resource> {
        let entity = new.name.clone();
        self.bounded("create_resource", entity, self.inner.create_resource(new))
            .await
    }

    async fn update_resource(&self, id: ResourceId, patch: ResourcePatch) -> Result<Resource> {
        self.bounded(
            "update_resource",
            id.to_string(),
            self.inner.update_resource(id, patch),
        )
        .await
    }

    async fn delete_resource(&self, id: ResourceId) -> Result<()> {
        self.bounded("delete_resource", id.to_string(), self.inner.delete_resource(id))
            .await
    }

    async fn get_allocation(&self, id: AllocationId) -> Result<ResourceAllocation> {
        self.bounded("get_allocation", id.to_string(), self.inner.get_allocation(id))
            .await
    }

    async fn list_allocations_for_job(
        &self,
        job_id: JobId,
        include_cancelled: bool,
    ) -> Result<Vec<ResourceAllocation>> {
        self.bounded(
            "list_allocations_for_job",
            job_id.to_string(),
            self.inner.list_allocations_for_job(job_id, include_cancelled),
        )
        .await
    }

    async fn list_allocations_for_resource(
        &self,
        query: &AllocationQuery,
    ) -> Result<Vec<ResourceAllocation>> {
        self.bounded(
            "list_allocations_for_resource",
            query.resource_id.to_string(),
            self.inner.list_allocations_for_resource(query),
        )
        .await
    }

    async fn create_allocation(&self, new: NewAllocation) -> Result<ResourceAllocation> {
        let entity = new.resource_id.to_string();
        self.bounded("create_allocation", entity, self.inner.create_allocation(new))
            .await
    }

    async fn update_allocation(
        &self,
        id: AllocationId,
        patch: AllocationPatch,
    ) -> Result<ResourceAllocation> {
        self.bounded(
            "update_allocation",
            id.to_string(),
            self.inner.update_allocation(id, patch),
        )
        .await
    }

    async fn delete_allocation(&self, id: AllocationId) -> Result<()> {
        self.bounded("delete_allocation", id.to_string(), self.inner.delete_allocation(id))
            .await
    }
}
