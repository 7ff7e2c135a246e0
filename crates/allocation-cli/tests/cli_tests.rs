//! Integration tests for the `alloc` CLI binary.
//!
//! These tests use `assert_cmd` and `predicates` to run every subcommand against
//! a JSON snapshot fixture, via both `-i` and stdin, and to check error reporting.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;

const RILEY: &str = "11111111-1111-4111-8111-111111111111";
const SAM: &str = "22222222-2222-4222-8222-222222222222";
const TRUCK: &str = "33333333-3333-4333-8333-333333333333";
const JOB_1: &str = "aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa";
const JOB_2: &str = "bbbbbbbb-bbbb-4bbb-8bbb-bbbbbbbbbbbb";

/// Helper: path to the snapshot.json fixture.
fn snapshot_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/snapshot.json")
}

/// Helper: the `alloc` binary with ALLOC_* overrides cleared.
fn alloc() -> Command {
    let mut cmd = Command::cargo_bin("alloc").unwrap();
    for key in [
        "ALLOC_HOURS_PER_DAY",
        "ALLOC_STORE_TIMEOUT_MS",
        "ALLOC_DELETE_POLICY",
        "ALLOC_MARK_SCHEDULED",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

/// Helper: run a subcommand against the fixture and parse stdout as JSON.
fn run_json(args: &[&str]) -> serde_json::Value {
    let output = alloc()
        .args(["-i", snapshot_path()])
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "alloc {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout must be JSON")
}

// ─────────────────────────────────────────────────────────────────────────────
// check
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn check_reports_booked_window_unavailable() {
    let v = run_json(&["check", "--resource", RILEY, "--start", "2024-01-05", "--end", "2024-01-06"]);
    assert_eq!(v["available"], false);
    assert_eq!(v["resource_id"], RILEY);
}

#[test]
fn check_reports_free_window_available() {
    let v = run_json(&["check", "--resource", RILEY, "--start", "2024-01-21", "--end", "2024-01-25"]);
    assert_eq!(v["available"], true);
}

#[test]
fn check_honours_excluded_job() {
    let v = run_json(&[
        "check",
        "--resource",
        RILEY,
        "--start",
        "2024-01-02",
        "--end",
        "2024-01-03",
        "--exclude-job",
        JOB_1,
    ]);
    assert_eq!(v["available"], true);
}

#[test]
fn check_ignores_cancelled_booking() {
    let v = run_json(&["check", "--resource", TRUCK, "--start", "2024-01-02", "--end", "2024-01-03"]);
    assert_eq!(v["available"], true);
}

#[test]
fn check_reads_snapshot_from_stdin() {
    let snapshot = std::fs::read_to_string(snapshot_path()).expect("snapshot fixture must exist");

    alloc()
        .args(["check", "--resource", RILEY, "--start", "2024-01-05T09:00:00Z", "--end", "2024-01-05T17:00:00Z"])
        .write_stdin(snapshot)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"available\": false"));
}

// ─────────────────────────────────────────────────────────────────────────────
// conflicts
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn conflicts_lists_double_booking() {
    let v = run_json(&["conflicts", "--job", JOB_2]);
    let conflicts = v.as_array().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["resource_name"], "Riley");
    assert_eq!(conflicts[0]["conflict_start_date"], "2024-01-08T00:00:00Z");
    assert_eq!(conflicts[0]["conflict_end_date"], "2024-01-10T00:00:00Z");
    assert_eq!(conflicts[0]["severity"], "low");
}

#[test]
fn conflicts_for_unknown_job_is_empty() {
    let v = run_json(&["conflicts", "--job", "cccccccc-cccc-4ccc-8ccc-cccccccccccc"]);
    assert_eq!(v, serde_json::json!([]));
}

// ─────────────────────────────────────────────────────────────────────────────
// utilization
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn utilization_excludes_cancelled_allocations() {
    let v = run_json(&["utilization", "--resource", TRUCK, "--start", "2024-01-01", "--end", "2024-01-08"]);
    assert_eq!(v[0]["resource_name"], "Bucket truck");
    assert_eq!(v[0]["total_hours_allocated"], 0.0);
    assert_eq!(v[0]["utilization_percentage"], 0.0);
}

#[test]
fn utilization_can_exceed_one_hundred_percent() {
    // One full calendar day booked against an 8-hour working day.
    let v = run_json(&["utilization", "--resource", RILEY, "--start", "2024-01-02", "--end", "2024-01-03"]);
    assert_eq!(v[0]["total_hours_allocated"], 24.0);
    assert_eq!(v[0]["utilization_percentage"], 300.0);
}

#[test]
fn utilization_respects_hours_per_day_flag() {
    let v = run_json(&[
        "utilization",
        "--resource",
        RILEY,
        "--start",
        "2024-01-02",
        "--end",
        "2024-01-03",
        "--hours-per-day",
        "12",
    ]);
    assert_eq!(v[0]["utilization_percentage"], 200.0);
}

#[test]
fn utilization_defaults_to_every_resource() {
    let v = run_json(&["utilization", "--start", "2024-01-01", "--end", "2024-01-02"]);
    assert_eq!(v.as_array().unwrap().len(), 3);
}

#[test]
fn utilization_honours_env_override() {
    let output = alloc()
        .env("ALLOC_HOURS_PER_DAY", "6")
        .args(["-i", snapshot_path(), "utilization", "--resource", RILEY])
        .args(["--start", "2024-01-02", "--end", "2024-01-03"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v[0]["utilization_percentage"], 400.0);
}

// ─────────────────────────────────────────────────────────────────────────────
// find
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn find_excludes_booked_and_unskilled_employees() {
    let v = run_json(&[
        "find", "--start", "2024-01-05", "--end", "2024-01-06", "--type", "employee", "--skill", "welding",
    ]);
    assert_eq!(v, serde_json::json!([]));
}

#[test]
fn find_returns_free_employees() {
    let v = run_json(&["find", "--start", "2024-01-05", "--end", "2024-01-06", "--type", "employee"]);
    let found = v.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], SAM);
    assert_eq!(found[0]["type"], "employee");
}

#[test]
fn find_matches_skilled_employee_when_free() {
    let v = run_json(&[
        "find", "--start", "2024-02-01", "--end", "2024-02-02", "--type", "employee", "--skill", "welding",
    ]);
    let found = v.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["name"], "Riley");
}

// ─────────────────────────────────────────────────────────────────────────────
// Error handling
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn rejects_malformed_date() {
    alloc()
        .args(["-i", snapshot_path(), "check", "--resource", RILEY, "--start", "next tuesday", "--end", "2024-01-06"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected YYYY-MM-DD"));
}

#[test]
fn rejects_inverted_window() {
    alloc()
        .args(["-i", snapshot_path(), "check", "--resource", RILEY, "--start", "2024-01-06", "--end", "2024-01-05"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid interval"));
}

#[test]
fn rejects_unknown_resource_type() {
    alloc()
        .args(["-i", snapshot_path(), "find", "--start", "2024-01-05", "--end", "2024-01-06", "--type", "crane"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown resource type"));
}

#[test]
fn missing_snapshot_file_fails() {
    alloc()
        .args(["-i", "/nonexistent/snapshot.json", "conflicts", "--job", JOB_1])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read snapshot file"));
}

#[test]
fn malformed_snapshot_fails() {
    alloc()
        .args(["conflicts", "--job", JOB_1])
        .write_stdin("{not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse snapshot JSON"));
}

#[test]
fn snapshot_with_mismatched_amount_fails() {
    let snapshot = r#"{
        "resources": [
            { "id": "44444444-4444-4444-8444-444444444444", "name": "Cable", "type": "material" }
        ],
        "allocations": [
            {
                "id": "a4a4a4a4-a4a4-44a4-84a4-a4a4a4a4a4a4",
                "job_id": "aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa",
                "resource_id": "44444444-4444-4444-8444-444444444444",
                "resource_type": "material",
                "start_date": "2024-01-01T00:00:00Z",
                "end_date": "2024-01-02T00:00:00Z",
                "amount": { "hours": 8.0 },
                "status": "planned"
            }
        ]
    }"#;
    alloc()
        .args(["conflicts", "--job", JOB_1])
        .write_stdin(snapshot)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Snapshot is inconsistent"));
}

#[test]
fn unknown_utilization_resource_fails() {
    alloc()
        .args(["-i", snapshot_path(), "utilization", "--resource", "44444444-4444-4444-8444-444444444444"])
        .args(["--start", "2024-01-01", "--end", "2024-01-02"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("resource not found"));
}
