// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! # Retention Sweeper
//!
//! Background task that removes old exports. Once a day it deletes:
//!
//! 1. Ledger rows created before the retention horizon, each after its
//!    archive.
//! 2. Leftovers in the exports directory older than the horizon: archives
//!    without a row, `.partial` files and staging directories.
//!
//! Sweeps are idempotent. A single entry that cannot be removed is logged
//! and skipped.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::archive::PARTIAL_SUFFIX;
use crate::storage::{ExportLedger, FileStore};

/// Default interval between sweeps.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default retention horizon in days.
const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Error recorded on jobs that were active when the server stopped.
pub const INTERRUPTED_MESSAGE: &str = "Export interrupted by server restart";

/// What one sweep removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub jobs: usize,
    pub archives: usize,
    pub partials: usize,
    pub staging_dirs: usize,
}

/// Background sweeper for expired export artifacts and ledger rows.
pub struct RetentionSweeper {
    store: Arc<FileStore>,
    ledger: Arc<ExportLedger>,
    interval: Duration,
    retention: chrono::Duration,
}

impl RetentionSweeper {
    pub fn new(store: Arc<FileStore>, ledger: Arc<ExportLedger>) -> Self {
        Self {
            store,
            ledger,
            interval: DEFAULT_SWEEP_INTERVAL,
            retention: chrono::Duration::days(DEFAULT_RETENTION_DAYS),
        }
    }

    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention = chrono::Duration::days(days);
        self
    }

    /// Run the sweeper loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            retention_days = self.retention.num_days(),
            "Export retention sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Export retention sweeper shutting down");
                return;
            }

            let store = self.store.clone();
            let ledger = self.ledger.clone();
            let retention = self.retention;
            let swept = tokio::task::spawn_blocking(move || {
                sweep(&store, &ledger, retention, Utc::now())
            })
            .await;
            if let Err(e) = swept {
                warn!(error = %e, "Export retention sweep aborted");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Export retention sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// Sweep as if the current time were `now`.
    pub fn sweep_once(&self, now: DateTime<Utc>) -> SweepReport {
        sweep(&self.store, &self.ledger, self.retention, now)
    }

    /// Fail every job still pending or processing.
    ///
    /// Call once at startup, before any new export is queued: no worker can
    /// own these rows any more.
    pub fn recover_interrupted(&self) -> usize {
        let jobs = match self
            .ledger
            .jobs_created_before(Utc::now() + chrono::Duration::seconds(1))
        {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(error = %e, "Failed to list export jobs");
                return 0;
            }
        };

        let mut recovered = 0;
        for job in jobs.iter().filter(|job| job.status.is_active()) {
            match self.ledger.mark_failed(&job.id, INTERRUPTED_MESSAGE) {
                Ok(true) => {
                    warn!(job_id = %job.id, org_id = job.org_id, "Export interrupted by restart");
                    recovered += 1;
                }
                Ok(false) => {}
                Err(e) => warn!(job_id = %job.id, error = %e, "Failed to recover export job"),
            }
        }
        recovered
    }
}

fn sweep(
    store: &FileStore,
    ledger: &ExportLedger,
    retention: chrono::Duration,
    now: DateTime<Utc>,
) -> SweepReport {
    let cutoff = now - retention;
    let mut report = SweepReport::default();

    match ledger.jobs_created_before(cutoff) {
        Ok(jobs) => {
            for job in jobs {
                if job.status.is_active() {
                    debug!(job_id = %job.id, "Skipping active export job");
                    continue;
                }
                let archive = job
                    .file_path
                    .clone()
                    .map(Into::into)
                    .unwrap_or_else(|| store.paths().export_archive(job.org_id, &job.id));
                if remove_file(&archive) {
                    report.archives += 1;
                }
                match ledger.delete_job(&job.id) {
                    Ok(true) => report.jobs += 1,
                    Ok(false) => {}
                    Err(e) => warn!(job_id = %job.id, error = %e, "Failed to delete export job"),
                }
            }
        }
        Err(e) => warn!(error = %e, "Failed to list expired export jobs"),
    }

    let exports_dir = store.paths().exports_dir();
    let entries = match std::fs::read_dir(&exports_dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %exports_dir.display(), error = %e, "Failed to read exports directory");
            }
            return report;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with("org_") {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let modified: DateTime<Utc> = match metadata.modified() {
            Ok(time) => time.into(),
            Err(_) => continue,
        };
        if modified >= cutoff {
            continue;
        }

        if metadata.is_dir() {
            match std::fs::remove_dir_all(&path) {
                Ok(()) => report.staging_dirs += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove staging directory"),
            }
        } else if name.ends_with(PARTIAL_SUFFIX) {
            if remove_file(&path) {
                report.partials += 1;
            }
        } else if name.ends_with(".zip") && remove_file(&path) {
            report.archives += 1;
        }
    }

    if report != SweepReport::default() {
        info!(
            jobs = report.jobs,
            archives = report.archives,
            partials = report.partials,
            staging_dirs = report.staging_dirs,
            "Expired exports removed"
        );
    }
    report
}

/// Remove a file, returning whether it existed.
fn remove_file(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove export file");
            false
        }
    }
}
