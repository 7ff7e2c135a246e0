//! `alloc` CLI - query availability, conflicts, utilization and free resources
//! from a JSON snapshot of resources and allocations.
//!
//! ## Usage
//!
//! ```sh
//! # Is a resource free for a window? (snapshot from stdin)
//! cat snapshot.json | alloc check --resource <ID> --start 2024-01-05 --end 2024-01-06
//!
//! # Double-bookings of a job's resources
//! alloc -i snapshot.json conflicts --job <JOB_ID>
//!
//! # Utilization over a reporting window (8-hour days unless overridden)
//! alloc -i snapshot.json utilization --resource <ID> --resource <ID> \
//!     --start 2024-01-01 --end 2024-02-01 --hours-per-day 10
//!
//! # Free welders for a window
//! alloc -i snapshot.json find --start 2024-01-05 --end 2024-01-06 --type employee --skill welding
//! ```
//!
//! Results are printed as pretty JSON on stdout. Logs go to stderr and are
//! controlled by `RUST_LOG`. `ALLOC_*` variables (or a `.env` file) override
//! the scheduling defaults.

use std::collections::BTreeSet;
use std::io::{self, Read};

use allocation_engine::{
    AllocationService, InMemoryStore, JobId, ResourceId, ResourceType, SchedulingConfig, Snapshot,
};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde_json::json;

#[derive(Parser)]
#[command(
    name = "alloc",
    version,
    about = "Resource allocation queries over a JSON snapshot"
)]
struct Cli {
    /// Snapshot file with `resources` and `allocations` (reads from stdin if omitted)
    #[arg(short, long, global = true)]
    input: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a resource is free for a window
    Check {
        #[arg(long)]
        resource: ResourceId,
        #[arg(long, value_parser = parse_instant)]
        start: DateTime<Utc>,
        #[arg(long, value_parser = parse_instant)]
        end: DateTime<Utc>,
        /// Ignore bookings belonging to this job
        #[arg(long)]
        exclude_job: Option<JobId>,
    },
    /// List double-bookings of a job's resources by other jobs
    Conflicts {
        #[arg(long)]
        job: JobId,
    },
    /// Report allocated hours and utilization per resource over a window
    Utilization {
        /// Resource id (repeatable); all resources if omitted
        #[arg(long = "resource")]
        resources: Vec<ResourceId>,
        #[arg(long, value_parser = parse_instant)]
        start: DateTime<Utc>,
        #[arg(long, value_parser = parse_instant)]
        end: DateTime<Utc>,
        /// Working hours per day used as capacity
        #[arg(long)]
        hours_per_day: Option<f64>,
    },
    /// Find resources free for a window
    Find {
        #[arg(long, value_parser = parse_instant)]
        start: DateTime<Utc>,
        #[arg(long, value_parser = parse_instant)]
        end: DateTime<Utc>,
        /// Restrict to one resource type (employee, equipment, material, vehicle)
        #[arg(long = "type")]
        resource_type: Option<ResourceType>,
        /// Required employee skill (repeatable)
        #[arg(long = "skill")]
        skills: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    // A missing .env file is fine; the environment alone is used then.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = SchedulingConfig::from_env().context("Invalid ALLOC_* configuration")?;
    if let Commands::Utilization {
        hours_per_day: Some(hours),
        ..
    } = &cli.command
    {
        config.hours_per_day = *hours;
    }

    let store = load_store(cli.input.as_deref())?;
    let service = AllocationService::new(store, config).context("Invalid scheduling configuration")?;
    tracing::debug!("snapshot loaded");

    let output = match cli.command {
        Commands::Check {
            resource,
            start,
            end,
            exclude_job,
        } => {
            let available = service
                .is_available(resource, start, end, exclude_job)
                .await
                .context("Availability check failed")?;
            json!({
                "resource_id": resource,
                "start": start,
                "end": end,
                "available": available,
            })
        }
        Commands::Conflicts { job } => {
            let conflicts = service
                .find_conflicts(job)
                .await
                .context("Conflict detection failed")?;
            serde_json::to_value(conflicts)?
        }
        Commands::Utilization {
            resources,
            start,
            end,
            ..
        } => {
            let ids = if resources.is_empty() {
                service
                    .list_resources(None)
                    .await?
                    .into_iter()
                    .map(|r| r.id)
                    .collect()
            } else {
                resources
            };
            let report = service
                .utilization(&ids, start, end)
                .await
                .context("Utilization report failed")?;
            serde_json::to_value(report)?
        }
        Commands::Find {
            start,
            end,
            resource_type,
            skills,
        } => {
            let required: BTreeSet<String> = skills
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            let found = service
                .find_available(
                    start,
                    end,
                    resource_type,
                    (!required.is_empty()).then_some(&required),
                )
                .await
                .context("Resource search failed")?;
            serde_json::to_value(found)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Install a stderr fmt subscriber filtered by `RUST_LOG`, unless one is already set.
fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}

/// Accept RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
fn parse_instant(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("expected YYYY-MM-DD or an RFC 3339 timestamp, got '{}'", raw))
}

/// Read a snapshot from `path` (stdin when `None`) into an in-memory store.
fn load_store(path: Option<&str>) -> Result<InMemoryStore> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot file: {}", path))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read snapshot from stdin")?;
            buf
        }
    };
    let snapshot: Snapshot = serde_json::from_str(&raw).context("Failed to parse snapshot JSON")?;
    InMemoryStore::from_snapshot(snapshot).context("Snapshot is inconsistent")
}
