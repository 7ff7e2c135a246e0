//! Error types for allocation-engine operations.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{AllocationId, ResourceId, ResourceType};

/// The kind of stored entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Resource,
    Allocation,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Resource => f.write_str("resource"),
            Entity::Allocation => f.write_str("allocation"),
        }
    }
}

/// Errors that can occur while querying or mutating resources and allocations.
#[derive(Error, Debug)]
pub enum AllocationError {
    /// A resource or allocation id is absent from the store.
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    /// The interval start lies after its end. Raised before any store call.
    #[error("Invalid interval: start {start} is after end {end}")]
    InvalidInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// The resource already has non-cancelled bookings overlapping the requested window.
    #[error(
        "Resource {resource_id} is unavailable from {start} to {end} ({} conflicting allocation(s))",
        .conflicting.len()
    )]
    ResourceUnavailable {
        resource_id: ResourceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        conflicting: Vec<AllocationId>,
    },

    /// A resource's type is fixed at creation.
    #[error("Resource type cannot change from {from} to {to}")]
    TypeChange { from: ResourceType, to: ResourceType },

    /// Hours were given for a consumable, or a quantity for a time-based resource.
    #[error("Allocation amount does not match resource type {resource_type}")]
    AmountMismatch { resource_type: ResourceType },

    /// Deleting the resource was rejected because active allocations still reference it.
    #[error("Resource {resource_id} is referenced by {} active allocation(s)", .allocations.len())]
    ResourceInUse {
        resource_id: ResourceId,
        allocations: Vec<AllocationId>,
    },

    /// Opaque failure from the underlying store, with the operation and entity that failed.
    #[error("Store error during {operation} on {entity}: {message}")]
    Store {
        operation: &'static str,
        entity: String,
        message: String,
    },

    /// A multi-step mutation committed some writes before a follow-up step failed.
    /// `committed` lists the allocations already written.
    #[error("{step} failed after committing allocation(s) {committed:?}: {source}")]
    PartialFailure {
        committed: Vec<AllocationId>,
        step: &'static str,
        #[source]
        source: Box<AllocationError>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AllocationError {
    pub(crate) fn resource_not_found(id: ResourceId) -> Self {
        AllocationError::NotFound {
            entity: Entity::Resource,
            id: id.to_string(),
        }
    }

    pub(crate) fn allocation_not_found(id: AllocationId) -> Self {
        AllocationError::NotFound {
            entity: Entity::Allocation,
            id: id.to_string(),
        }
    }

    /// True for expected business outcomes that callers should render rather than
    /// treat as faults.
    pub fn is_business_outcome(&self) -> bool {
        matches!(
            self,
            AllocationError::ResourceUnavailable { .. } | AllocationError::ResourceInUse { .. }
        )
    }
}

/// Convenience alias used throughout allocation-engine.
pub type Result<T> = std::result::Result<T, AllocationError>;
