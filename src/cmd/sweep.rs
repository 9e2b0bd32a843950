//! One-shot escalation sweep — `sluice sweep`.
//!
//! Runs the same pass the background scheduler runs, then prints the
//! report. Useful for cron-style deployments and for inspecting what the
//! sweep would do.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use sluice::config::SluiceConfig;
use sluice::workorder::clock::{SystemClock, UuidIdGenerator};
use sluice::workorder::engine::WorkOrderEngine;
use sluice::workorder::escalation::TimeoutEscalationScheduler;
use sluice::workorder::events::TracingEventSink;
use sluice::workorder::roster::SqliteRoster;
use sluice::workorder::store::{DbHandle, WorkOrderDb};

pub async fn run(dir: &Path, config: SluiceConfig) -> Result<()> {
    let path = super::db_path(dir, &config);
    if !path.exists() {
        anyhow::bail!(
            "No database at {} — run `sluice init` first",
            path.display()
        );
    }

    let store = DbHandle::new(
        WorkOrderDb::new(&path).context("Failed to open workorder database")?,
    );
    let roster =
        Arc::new(SqliteRoster::open(&path).context("Failed to open roster connection")?);
    let clock = Arc::new(SystemClock);

    let engine = Arc::new(WorkOrderEngine::new(
        store,
        roster.clone(),
        Arc::new(TracingEventSink),
        clock.clone(),
        Arc::new(UuidIdGenerator),
    ));

    let scheduler = TimeoutEscalationScheduler::new(
        engine,
        roster,
        clock,
        config.escalation.to_escalation_config(),
    );

    let report = scheduler.sweep_once().await?;
    println!(
        "Sweep finished: {} examined, {} escalated, {} skipped, {} failed",
        report.examined, report.escalated, report.skipped, report.failed
    );
    Ok(())
}
