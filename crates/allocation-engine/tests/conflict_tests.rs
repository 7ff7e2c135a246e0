//! Tests for double-booking detection and severity scoring.

use allocation_engine::conflict::{assess, ConflictSeverity};
use allocation_engine::{
    find_conflicts, AllocationAmount, AllocationId, AllocationPatch, AllocationStatus,
    InMemoryStore, JobId, NewAllocation, NewResource, ResourceAllocation, ResourceDetails,
    ResourceId, ResourceStore, ResourceType,
};
use chrono::{DateTime, Utc};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn day(date: &str) -> DateTime<Utc> {
    format!("{}T00:00:00Z", date).parse().unwrap()
}

/// A detached allocation for exercising the pure `assess` function.
fn allocation(resource_id: ResourceId, job_id: JobId, start: &str, end: &str) -> ResourceAllocation {
    let now = day("2023-12-01");
    ResourceAllocation {
        id: AllocationId::new(),
        job_id,
        resource_id,
        resource_type: ResourceType::Equipment,
        start_date: day(start),
        end_date: day(end),
        amount: AllocationAmount::Hours(8.0),
        status: AllocationStatus::Confirmed,
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

async fn resource(store: &InMemoryStore, name: &str) -> ResourceId {
    store
        .create_resource(NewResource::new(name, ResourceDetails::empty(ResourceType::Equipment)))
        .await
        .unwrap()
        .id
}

async fn book(
    store: &InMemoryStore,
    resource_id: ResourceId,
    job_id: JobId,
    start: &str,
    end: &str,
) -> ResourceAllocation {
    store
        .create_allocation(NewAllocation {
            job_id,
            resource_id,
            start_date: day(start),
            end_date: day(end),
            amount: AllocationAmount::Hours(8.0),
            status: AllocationStatus::Planned,
            notes: None,
        })
        .await
        .unwrap()
}

// ── Scenario B ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn overlapping_job_reports_narrowed_window() {
    let store = InMemoryStore::new();
    let r1 = resource(&store, "R1").await;
    let (j1, j2) = (JobId::new(), JobId::new());
    let first = book(&store, r1, j1, "2024-01-01", "2024-01-10").await;
    let second = book(&store, r1, j2, "2024-01-08", "2024-01-20").await;

    let conflicts = find_conflicts(&store, j2).await.unwrap();

    assert_eq!(conflicts.len(), 1);
    let c = &conflicts[0];
    assert_eq!(c.resource_id, r1);
    assert_eq!(c.resource_name, "R1");
    assert_eq!(c.allocation_id, second.id);
    assert_eq!(c.job_id, j2);
    assert_eq!(c.conflict_start_date, day("2024-01-08"));
    assert_eq!(c.conflict_end_date, day("2024-01-10"));
    assert_eq!(c.conflicting_allocations.len(), 1);
    assert_eq!(c.conflicting_allocations[0].id, first.id);
    // 2 of J2's 12 days are contested.
    assert!((c.overlap_percentage - 2.0 / 12.0 * 100.0).abs() < 1e-9);
    assert_eq!(c.severity, ConflictSeverity::Low);
}

#[tokio::test]
async fn fully_covered_allocation_is_high_severity() {
    let store = InMemoryStore::new();
    let r1 = resource(&store, "R1").await;
    let (j1, j3) = (JobId::new(), JobId::new());
    book(&store, r1, j1, "2024-01-01", "2024-01-10").await;
    book(&store, r1, j3, "2024-01-02", "2024-01-09").await;

    let conflicts = find_conflicts(&store, j3).await.unwrap();

    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].overlap_percentage, 100.0);
    assert_eq!(conflicts[0].severity, ConflictSeverity::High);
}

#[tokio::test]
async fn job_without_overlaps_has_no_conflicts() {
    let store = InMemoryStore::new();
    let r1 = resource(&store, "R1").await;
    let (j1, j2) = (JobId::new(), JobId::new());
    book(&store, r1, j1, "2024-01-01", "2024-01-10").await;
    book(&store, r1, j2, "2024-01-11", "2024-01-20").await;

    assert!(find_conflicts(&store, j2).await.unwrap().is_empty());
    assert!(find_conflicts(&store, JobId::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn same_job_bookings_are_not_conflicts() {
    let store = InMemoryStore::new();
    let r1 = resource(&store, "R1").await;
    let j1 = JobId::new();
    book(&store, r1, j1, "2024-01-01", "2024-01-10").await;
    book(&store, r1, j1, "2024-01-05", "2024-01-15").await;

    assert!(find_conflicts(&store, j1).await.unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_bookings_are_ignored_on_both_sides() {
    let store = InMemoryStore::new();
    let r1 = resource(&store, "R1").await;
    let (j1, j2) = (JobId::new(), JobId::new());
    let other = book(&store, r1, j1, "2024-01-01", "2024-01-10").await;
    book(&store, r1, j2, "2024-01-05", "2024-01-08").await;

    assert_eq!(find_conflicts(&store, j2).await.unwrap().len(), 1);

    store
        .update_allocation(other.id, AllocationPatch::status(AllocationStatus::Cancelled))
        .await
        .unwrap();
    assert!(find_conflicts(&store, j2).await.unwrap().is_empty());
    assert!(find_conflicts(&store, j1).await.unwrap().is_empty());
}

#[tokio::test]
async fn each_conflicting_allocation_is_reported_separately() {
    let store = InMemoryStore::new();
    let r1 = resource(&store, "R1").await;
    let r2 = resource(&store, "R2").await;
    let (job, other) = (JobId::new(), JobId::new());
    book(&store, r1, other, "2024-03-01", "2024-03-31").await;
    book(&store, r2, other, "2024-03-01", "2024-03-31").await;
    book(&store, r1, job, "2024-03-02", "2024-03-03").await;
    book(&store, r1, job, "2024-03-10", "2024-03-11").await;
    book(&store, r2, job, "2024-03-20", "2024-03-21").await;

    let conflicts = find_conflicts(&store, job).await.unwrap();

    assert_eq!(conflicts.len(), 3);
    let on_r1 = conflicts.iter().filter(|c| c.resource_id == r1).count();
    assert_eq!(on_r1, 2, "a resource appears once per conflicting allocation");
    assert!(conflicts.iter().all(|c| c.severity == ConflictSeverity::High));
}

// ── Window narrowing and severity tiers (pure) ──────────────────────────────

#[test]
fn window_narrows_to_latest_start_and_earliest_end() {
    let r = ResourceId::new();
    let subject = allocation(r, JobId::new(), "2024-01-01", "2024-01-21");
    let others = vec![
        allocation(r, JobId::new(), "2023-12-25", "2024-01-15"),
        allocation(r, JobId::new(), "2024-01-05", "2024-02-01"),
    ];

    let a = assess(&subject, &others).unwrap();

    assert_eq!(a.conflicting.len(), 2);
    assert_eq!(a.window_start, day("2024-01-05"));
    assert_eq!(a.window_end, day("2024-01-15"));
    assert!((a.overlap_percentage - 50.0).abs() < 1e-9);
    assert_eq!(a.severity, ConflictSeverity::Medium);
}

#[test]
fn disjoint_conflicts_fall_back_to_overlap_span() {
    let r = ResourceId::new();
    let subject = allocation(r, JobId::new(), "2024-01-01", "2024-01-21");
    let others = vec![
        allocation(r, JobId::new(), "2024-01-02", "2024-01-03"),
        allocation(r, JobId::new(), "2024-01-10", "2024-01-12"),
    ];

    let a = assess(&subject, &others).unwrap();

    assert_eq!(a.window_start, day("2024-01-02"));
    assert_eq!(a.window_end, day("2024-01-12"));
    assert!(a.window_start <= a.window_end);
}

#[test]
fn exactly_twenty_five_percent_is_low() {
    let r = ResourceId::new();
    let subject = allocation(r, JobId::new(), "2024-01-01", "2024-01-05");
    let other = allocation(r, JobId::new(), "2023-12-20", "2024-01-02");

    let a = assess(&subject, &[other]).unwrap();

    assert_eq!(a.overlap_percentage, 25.0);
    assert_eq!(a.severity, ConflictSeverity::Low);
}

#[test]
fn exactly_seventy_five_percent_is_medium() {
    let r = ResourceId::new();
    let subject = allocation(r, JobId::new(), "2024-01-01", "2024-01-05");
    let other = allocation(r, JobId::new(), "2023-12-20", "2024-01-04");

    let a = assess(&subject, &[other]).unwrap();

    assert_eq!(a.overlap_percentage, 75.0);
    assert_eq!(a.severity, ConflictSeverity::Medium);
}

#[test]
fn touching_allocations_conflict_at_zero_percent() {
    let r = ResourceId::new();
    let subject = allocation(r, JobId::new(), "2024-01-05", "2024-01-10");
    let other = allocation(r, JobId::new(), "2024-01-01", "2024-01-05");

    let a = assess(&subject, &[other]).unwrap();

    assert_eq!(a.window_start, day("2024-01-05"));
    assert_eq!(a.window_end, day("2024-01-05"));
    assert_eq!(a.overlap_percentage, 0.0);
    assert_eq!(a.severity, ConflictSeverity::Low);
}

#[test]
fn other_resources_and_same_job_are_filtered() {
    let r = ResourceId::new();
    let job = JobId::new();
    let subject = allocation(r, job, "2024-01-01", "2024-01-10");
    let candidates = vec![
        allocation(ResourceId::new(), JobId::new(), "2024-01-01", "2024-01-10"),
        allocation(r, job, "2024-01-01", "2024-01-10"),
        subject.clone(),
    ];

    assert!(assess(&subject, &candidates).is_none());
}
