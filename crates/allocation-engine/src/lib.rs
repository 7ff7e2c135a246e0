//! # allocation-engine
//!
//! Resource allocation and scheduling core for field-service work.
//!
//! Employees, equipment, materials and vehicles are booked to jobs over date
//! intervals. This crate answers the scheduling questions on top of an external
//! resource store: can this resource be booked for this window, which of a job's
//! bookings are double-booked and how badly, how utilized is each resource over a
//! reporting window, and which resources are free (and skilled) for a window.
//!
//! Every operation re-reads the store; nothing authoritative is cached between calls.
//!
//! ## Modules
//!
//! - [`interval`] - Overlap test, overlap interval and clipped durations
//! - [`model`] - Resources, allocations, ids and patches
//! - [`store`] - The `ResourceStore` gateway contract and the timeout decorator
//! - [`memory`] - In-memory store and JSON snapshots
//! - [`availability`] - Binary availability check for one resource
//! - [`conflict`] - Double-booking detection with severity tiers
//! - [`utilization`] - Allocated vs. theoretical hours per resource
//! - [`finder`] - Available resources by type and required skills
//! - [`config`] - Scheduling policy constants and store timeouts
//! - [`service`] - Locked check-and-write flows for the presentation layer
//! - [`error`] - Error types

pub mod availability;
pub mod config;
pub mod conflict;
pub mod error;
pub mod finder;
pub mod interval;
pub mod memory;
pub mod model;
pub mod service;
pub mod store;
pub mod utilization;

pub use availability::is_available;
pub use config::{DeletePolicy, SchedulingConfig};
pub use conflict::{find_conflicts, ConflictSeverity, ResourceConflict};
pub use error::{AllocationError, Result};
pub use finder::find_available;
pub use memory::{InMemoryStore, Snapshot};
pub use model::{
    AllocationAmount, AllocationId, AllocationPatch, AllocationStatus, JobId, NewAllocation,
    NewResource, Resource, ResourceAllocation, ResourceDetails, ResourceId, ResourcePatch,
    ResourceStatus, ResourceType,
};
pub use service::AllocationService;
pub use store::{AllocationQuery, ResourceStore, TimedStore};
pub use utilization::{utilization, ResourceUtilization};
