//! Persisted entities: resources and their allocations to jobs.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AllocationError, Result};
use crate::interval;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

id_type!(
    /// Identity of a [`Resource`].
    ResourceId
);
id_type!(
    /// Identity of a [`ResourceAllocation`].
    AllocationId
);
id_type!(
    /// Identity of a job owned by the surrounding application.
    JobId
);

/// The closed set of resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Employee,
    Equipment,
    Material,
    Vehicle,
}

impl ResourceType {
    pub const ALL: [ResourceType; 4] = [
        ResourceType::Employee,
        ResourceType::Equipment,
        ResourceType::Material,
        ResourceType::Vehicle,
    ];

    /// Time-based resources are booked in hours; materials are consumed by quantity.
    pub fn is_time_based(self) -> bool {
        !matches!(self, ResourceType::Material)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Employee => "employee",
            ResourceType::Equipment => "equipment",
            ResourceType::Material => "material",
            ResourceType::Vehicle => "vehicle",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown resource type '{}'; expected one of employee, equipment, material, vehicle",
                    s
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    #[default]
    Available,
    PartiallyAvailable,
    Unavailable,
    Scheduled,
    OutOfService,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmployeeDetails {
    #[serde(default)]
    pub skills: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EquipmentDetails {
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MaterialDetails {
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub quantity_on_hand: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleDetails {
    #[serde(default)]
    pub plate: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
}

/// Subtype-specific attributes, tagged by the resource's `type`.
///
/// The variant IS the resource type; there is no separate type field that could
/// drift out of sync with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceDetails {
    Employee(EmployeeDetails),
    Equipment(EquipmentDetails),
    Material(MaterialDetails),
    Vehicle(VehicleDetails),
}

impl ResourceDetails {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceDetails::Employee(_) => ResourceType::Employee,
            ResourceDetails::Equipment(_) => ResourceType::Equipment,
            ResourceDetails::Material(_) => ResourceType::Material,
            ResourceDetails::Vehicle(_) => ResourceType::Vehicle,
        }
    }

    /// Empty details for a given type.
    pub fn empty(resource_type: ResourceType) -> Self {
        match resource_type {
            ResourceType::Employee => ResourceDetails::Employee(EmployeeDetails::default()),
            ResourceType::Equipment => ResourceDetails::Equipment(EquipmentDetails::default()),
            ResourceType::Material => ResourceDetails::Material(MaterialDetails::default()),
            ResourceType::Vehicle => ResourceDetails::Vehicle(VehicleDetails::default()),
        }
    }
}

/// An employee, piece of equipment, material stock or vehicle that can be booked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub status: ResourceStatus,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(flatten)]
    pub details: ResourceDetails,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    pub fn resource_type(&self) -> ResourceType {
        self.details.resource_type()
    }

    /// Apply a partial update. The resource type can never change.
    pub fn apply(&mut self, patch: ResourcePatch, now: DateTime<Utc>) -> Result<()> {
        if let Some(details) = &patch.details {
            let (from, to) = (self.resource_type(), details.resource_type());
            if from != to {
                return Err(AllocationError::TypeChange { from, to });
            }
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(details) = patch.details {
            self.details = details;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Input for creating a resource; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewResource {
    pub name: String,
    #[serde(default)]
    pub status: ResourceStatus,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(flatten)]
    pub details: ResourceDetails,
}

impl NewResource {
    pub fn new(name: impl Into<String>, details: ResourceDetails) -> Self {
        NewResource {
            name: name.into(),
            status: ResourceStatus::Available,
            description: String::new(),
            tags: BTreeSet::new(),
            details,
        }
    }

    pub fn into_resource(self, id: ResourceId, now: DateTime<Utc>) -> Resource {
        Resource {
            id,
            name: self.name,
            status: self.status,
            description: self.description,
            tags: self.tags,
            details: self.details,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcePatch {
    pub name: Option<String>,
    pub status: Option<ResourceStatus>,
    pub description: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    /// Replacement details; must be the same variant as the stored resource.
    pub details: Option<ResourceDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    #[default]
    Planned,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl AllocationStatus {
    /// Cancelled bookings stay on record but never block or count.
    pub fn is_active(self) -> bool {
        self != AllocationStatus::Cancelled
    }
}

/// How much of a resource an allocation books: hours for time-based resources,
/// a quantity for consumables. Exactly one applies per resource type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationAmount {
    Hours(f64),
    Quantity(f64),
}

impl AllocationAmount {
    pub fn check(&self, resource_type: ResourceType) -> Result<()> {
        let valid = match self {
            AllocationAmount::Hours(h) => resource_type.is_time_based() && *h >= 0.0,
            AllocationAmount::Quantity(q) => !resource_type.is_time_based() && *q >= 0.0,
        };
        if valid {
            Ok(())
        } else {
            Err(AllocationError::AmountMismatch { resource_type })
        }
    }

    pub fn hours(&self) -> Option<f64> {
        match self {
            AllocationAmount::Hours(h) => Some(*h),
            AllocationAmount::Quantity(_) => None,
        }
    }

    pub fn quantity(&self) -> Option<f64> {
        match self {
            AllocationAmount::Quantity(q) => Some(*q),
            AllocationAmount::Hours(_) => None,
        }
    }
}

/// A booking of one resource to one job over `[start_date, end_date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub id: AllocationId,
    pub job_id: JobId,
    pub resource_id: ResourceId,
    /// Denormalized from the referenced resource.
    pub resource_type: ResourceType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub amount: AllocationAmount,
    #[serde(default)]
    pub status: AllocationStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ResourceAllocation {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        interval::overlaps(self.start_date, self.end_date, start, end)
    }

    pub fn duration_hours(&self) -> f64 {
        interval::duration_hours(self.start_date, self.end_date)
    }

    /// Apply a partial update, keeping `start_date <= end_date`.
    pub fn apply(&mut self, patch: AllocationPatch, now: DateTime<Utc>) -> Result<()> {
        let start = patch.start_date.unwrap_or(self.start_date);
        let end = patch.end_date.unwrap_or(self.end_date);
        interval::validate(start, end)?;
        if let Some(amount) = &patch.amount {
            amount.check(self.resource_type)?;
        }

        self.start_date = start;
        self.end_date = end;
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Input for booking a resource; the store assigns id, timestamps and the
/// denormalized resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAllocation {
    pub job_id: JobId,
    pub resource_id: ResourceId,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub amount: AllocationAmount,
    #[serde(default)]
    pub status: AllocationStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewAllocation {
    pub fn into_allocation(
        self,
        id: AllocationId,
        resource_type: ResourceType,
        now: DateTime<Utc>,
    ) -> ResourceAllocation {
        ResourceAllocation {
            id,
            job_id: self.job_id,
            resource_id: self.resource_id,
            resource_type,
            start_date: self.start_date,
            end_date: self.end_date,
            amount: self.amount,
            status: self.status,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationPatch {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<AllocationStatus>,
    pub amount: Option<AllocationAmount>,
    /// `Some(None)` clears the notes.
    pub notes: Option<Option<String>>,
}

impl AllocationPatch {
    pub fn status(status: AllocationStatus) -> Self {
        AllocationPatch {
            status: Some(status),
            ..Default::default()
        }
    }

    /// True when applying this patch would move the allocation's interval.
    pub fn moves(&self, current: &ResourceAllocation) -> bool {
        self.start_date.is_some_and(|s| s != current.start_date)
            || self.end_date.is_some_and(|e| e != current.end_date)
    }
}
