// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! # Export Runner
//!
//! Hands export jobs to a bounded pool of blocking workers. Each job waits
//! for a permit from a semaphore sized by `EXPORT_WORKERS`, then runs
//! [`run_job`] on tokio's blocking pool. A worker that panics or is aborted
//! leaves its job `failed` rather than stuck in `processing`.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::orchestrator::{run_job, ExportInputs, Outcome};
use crate::crypto::SecretCipher;
use crate::storage::{ExportLedger, FileStore};

/// Default number of exports that may run at once.
pub const DEFAULT_WORKERS: usize = 2;

/// Spawns export jobs onto the blocking pool.
#[derive(Clone)]
pub struct ExportRunner {
    store: Arc<FileStore>,
    ledger: Arc<ExportLedger>,
    cipher: Arc<SecretCipher>,
    static_root: Arc<PathBuf>,
    permits: Arc<Semaphore>,
}

impl ExportRunner {
    /// Create a runner allowing `workers` concurrent exports (at least one).
    pub fn new(
        store: Arc<FileStore>,
        ledger: Arc<ExportLedger>,
        cipher: Arc<SecretCipher>,
        static_root: PathBuf,
        workers: usize,
    ) -> Self {
        Self {
            store,
            ledger,
            cipher,
            static_root: Arc::new(static_root),
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Permits not currently held by a running export.
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }

    /// Queue `job_id` for execution.
    ///
    /// The returned handle resolves once the job reaches a terminal state.
    /// Callers are free to drop it.
    pub fn spawn(&self, job_id: String) -> JoinHandle<Outcome> {
        let runner = self.clone();
        tokio::spawn(async move { runner.execute(job_id).await })
    }

    async fn execute(self, job_id: String) -> Outcome {
        let permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return self.fail(&job_id, "Export workers are shut down"),
        };
        debug!(job_id = %job_id, "Export worker acquired");

        let store = self.store.clone();
        let ledger = self.ledger.clone();
        let cipher = self.cipher.clone();
        let static_root = self.static_root.clone();
        let id = job_id.clone();

        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let inputs = ExportInputs {
                store: &store,
                cipher: &cipher,
                static_root: &static_root,
            };
            run_job(inputs, &ledger, &id)
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => self.fail(&job_id, "Export worker panicked"),
            Err(_) => self.fail(&job_id, "Export worker was aborted"),
        }
    }

    fn fail(&self, job_id: &str, message: &str) -> Outcome {
        error!(job_id = %job_id, "{message}");
        if let Err(e) = self.ledger.mark_failed(job_id, message) {
            error!(job_id = %job_id, error = %e, "Failed to record export failure");
        }
        Outcome::Failed(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::test_support::Fixture;
    use crate::storage::ExportStatus;

    fn runner(fx: &Fixture, workers: usize) -> ExportRunner {
        ExportRunner::new(
            fx.store.clone(),
            fx.ledger.clone(),
            fx.cipher.clone(),
            fx.static_root.clone(),
            workers,
        )
    }

    #[test]
    fn worker_count_is_at_least_one() {
        let fx = Fixture::new();
        assert_eq!(runner(&fx, 0).available_workers(), 1);
        assert_eq!(runner(&fx, 3).available_workers(), 3);
    }

    #[tokio::test]
    async fn spawned_job_completes_and_releases_its_permit() {
        let fx = Fixture::new();
        fx.seed();
        let runner = runner(&fx, 1);
        let job = fx.ledger.start_export(1, None).unwrap();

        let outcome = runner.spawn(job.id.clone()).await.unwrap();
        assert!(matches!(outcome, Outcome::Completed { render_failures: 0, .. }));
        assert_eq!(runner.available_workers(), 1);

        let stored = fx.ledger.get_job(&job.id).unwrap().unwrap();
        assert_eq!(stored.status, ExportStatus::Completed);
        assert_eq!(stored.progress, 100);
    }

    #[tokio::test]
    async fn jobs_for_different_orgs_run_independently() {
        let fx = Fixture::new();
        fx.seed();
        let runner = runner(&fx, 2);
        let first = fx.ledger.start_export(1, None).unwrap();
        let missing = fx.ledger.start_export(2, None).unwrap();

        let (a, b) = tokio::join!(runner.spawn(first.id.clone()), runner.spawn(missing.id.clone()));
        assert!(matches!(a.unwrap(), Outcome::Completed { .. }));
        assert_eq!(b.unwrap(), Outcome::Failed("Organization not found".into()));
    }
}
