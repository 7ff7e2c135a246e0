//! Detect double-bookings of a job's resources by other jobs.
//!
//! For each active allocation of the subject job, all other jobs' active
//! allocations on the same resource that overlap it are collected. The conflict
//! window starts as the subject's own interval and is narrowed to the latest
//! start and earliest end among the conflicting allocations. Severity comes from
//! the share of the subject's duration covered by that window.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::interval;
use crate::model::{AllocationId, JobId, ResourceAllocation, ResourceId};
use crate::store::{AllocationQuery, ResourceStore};

/// Overlap share (percent) above which a conflict is high severity.
pub const HIGH_SEVERITY_ABOVE: f64 = 75.0;
/// Overlap share (percent) above which a conflict is medium severity.
pub const MEDIUM_SEVERITY_ABOVE: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
}

impl ConflictSeverity {
    /// Thresholds are strict: exactly 25% is low and exactly 75% is medium.
    pub fn from_overlap_percentage(percentage: f64) -> Self {
        if percentage > HIGH_SEVERITY_ABOVE {
            ConflictSeverity::High
        } else if percentage > MEDIUM_SEVERITY_ABOVE {
            ConflictSeverity::Medium
        } else {
            ConflictSeverity::Low
        }
    }
}

/// The result of comparing one allocation against the bookings that overlap it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictAssessment {
    pub conflicting: Vec<ResourceAllocation>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub overlap_percentage: f64,
    pub severity: ConflictSeverity,
}

/// A double-booking of one resource, reported for one allocation of the subject job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConflict {
    pub resource_id: ResourceId,
    pub resource_name: String,
    /// The subject job's allocation that is double-booked.
    pub allocation_id: AllocationId,
    pub job_id: JobId,
    /// Other jobs' allocations overlapping the subject allocation.
    pub conflicting_allocations: Vec<ResourceAllocation>,
    pub conflict_start_date: DateTime<Utc>,
    pub conflict_end_date: DateTime<Utc>,
    pub overlap_percentage: f64,
    pub severity: ConflictSeverity,
}

/// Compare `subject` against `candidates`, keeping only active allocations of
/// other jobs on the same resource that overlap it.
///
/// Returns `None` when nothing conflicts. If the conflicting allocations share no
/// common instant, the window falls back to the span of their individual overlaps
/// with the subject. A zero-length subject that conflicts is fully covered (100%).
pub fn assess(
    subject: &ResourceAllocation,
    candidates: &[ResourceAllocation],
) -> Option<ConflictAssessment> {
    let conflicting: Vec<ResourceAllocation> = candidates
        .iter()
        .filter(|c| {
            c.id != subject.id
                && c.job_id != subject.job_id
                && c.resource_id == subject.resource_id
                && c.is_active()
                && c.overlaps(subject.start_date, subject.end_date)
        })
        .cloned()
        .collect();

    if conflicting.is_empty() {
        return None;
    }

    let mut window_start = subject.start_date;
    let mut window_end = subject.end_date;
    for c in &conflicting {
        window_start = window_start.max(c.start_date);
        window_end = window_end.min(c.end_date);
    }

    if window_start > window_end {
        let pairwise = conflicting.iter().filter_map(|c| {
            interval::overlap_interval(
                subject.start_date,
                subject.end_date,
                c.start_date,
                c.end_date,
            )
        });
        let (starts, ends): (Vec<_>, Vec<_>) = pairwise.unzip();
        window_start = starts.into_iter().min().unwrap_or(subject.start_date);
        window_end = ends.into_iter().max().unwrap_or(subject.end_date);
    }

    let subject_hours = subject.duration_hours();
    let overlap_percentage = if subject_hours > 0.0 {
        interval::duration_hours(window_start, window_end) / subject_hours * 100.0
    } else {
        100.0
    };

    Some(ConflictAssessment {
        conflicting,
        window_start,
        window_end,
        overlap_percentage,
        severity: ConflictSeverity::from_overlap_percentage(overlap_percentage),
    })
}

/// Find every double-booking of `job_id`'s resources by other jobs.
///
/// Returns one conflict per subject allocation that has at least one overlap, so
/// a resource may appear more than once. Read-only.
pub async fn find_conflicts<S: ResourceStore + ?Sized>(
    store: &S,
    job_id: JobId,
) -> Result<Vec<ResourceConflict>> {
    let subjects = store.list_allocations_for_job(job_id, false).await?;
    let mut names: HashMap<ResourceId, String> = HashMap::new();
    let mut conflicts = Vec::new();

    for subject in subjects.iter().filter(|a| a.is_active()) {
        let query = AllocationQuery::for_resource(subject.resource_id)
            .overlapping(subject.start_date, subject.end_date)
            .excluding_job(Some(job_id));
        let candidates = store.list_allocations_for_resource(&query).await?;

        let Some(assessment) = assess(subject, &candidates) else {
            continue;
        };

        let resource_name = match names.get(&subject.resource_id) {
            Some(name) => name.clone(),
            None => {
                let name = store.get_resource(subject.resource_id).await?.name;
                names.insert(subject.resource_id, name.clone());
                name
            }
        };

        conflicts.push(ResourceConflict {
            resource_id: subject.resource_id,
            resource_name,
            allocation_id: subject.id,
            job_id,
            conflicting_allocations: assessment.conflicting,
            conflict_start_date: assessment.window_start,
            conflict_end_date: assessment.window_end,
            overlap_percentage: assessment.overlap_percentage,
            severity: assessment.severity,
        });
    }

    tracing::debug!(job = %job_id, conflicts = conflicts.len(), "conflict scan finished");
    Ok(conflicts)
}
