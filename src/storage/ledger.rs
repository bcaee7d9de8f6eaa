// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! Export job ledger backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `export_jobs`: job_id → serialized ExportJob
//! - `org_job_index`: composite key (org_id|!created_at|job_id) → job_id
//!
//! Every status transition runs inside a single write transaction and checks
//! the current row before applying, so a progress write can never resurrect a
//! job that was cancelled concurrently and at most one job per organization is
//! ever pending or processing.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: job_id → serialized ExportJob (JSON bytes).
const EXPORT_JOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("export_jobs");

/// Index: composite key → job_id.
/// Key format: `org_id_be|!created_at_be|job_id` for newest-first scans per org.
const ORG_JOB_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("org_job_index");

/// Message stored on a job cancelled through the API.
pub const CANCELLED_BY_USER: &str = "Export cancelled by user";

// =============================================================================
// Records
// =============================================================================

/// Lifecycle state of an export job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl ExportStatus {
    /// Pending or processing.
    pub fn is_active(self) -> bool {
        matches!(self, ExportStatus::Pending | ExportStatus::Processing)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExportStatus::Pending => "pending",
            ExportStatus::Processing => "processing",
            ExportStatus::Completed => "completed",
            ExportStatus::Failed => "failed",
            ExportStatus::Cancelled => "cancelled",
        }
    }
}

/// One document that could not be rendered into one format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct RenderFailure {
    pub document_id: i64,
    pub title: String,
    /// File extension of the failed format (`md`, `pdf`, `docx`, `rtf`).
    pub format: String,
    pub reason: String,
}

/// Ledger row for one organization export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ExportJob {
    /// Job identifier (UUID v4)
    pub id: String,
    pub org_id: i64,
    pub status: ExportStatus,
    /// Percentage of work units done (0-100)
    pub progress: u8,
    /// Archive location; present only once completed
    pub file_path: Option<String>,
    /// Present only when failed or cancelled
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Requesting user, recorded for auditing
    pub created_by: Option<String>,
    #[serde(default)]
    pub render_failures: Vec<RenderFailure>,
}

impl ExportJob {
    fn new_pending(org_id: i64, created_by: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            org_id,
            status: ExportStatus::Pending,
            progress: 0,
            file_path: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            created_by,
            render_failures: Vec::new(),
        }
    }
}

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key for the org_job_index table.
///
/// Format: `org_id_be | inverted_created_at_be | job_id`
///
/// The inverted timestamp makes a forward scan return the newest job first.
fn make_index_key(org_id: i64, created_at: DateTime<Utc>, job_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + 1 + 8 + 1 + job_id.len());
    key.extend_from_slice(&org_id.to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!(created_at.timestamp_micros() as u64)).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(job_id.as_bytes());
    key
}

fn make_prefix(org_id: i64) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(9);
    prefix.extend_from_slice(&org_id.to_be_bytes());
    prefix.push(b'|');
    prefix
}

/// Upper bound for a range scan over one organization's keys.
fn make_prefix_end(org_id: i64) -> Vec<u8> {
    let mut end = make_prefix(org_id);
    end.extend_from_slice(&[0xFF; 64]);
    end
}

// =============================================================================
// ExportLedger
// =============================================================================

/// Embedded ACID ledger of export jobs.
pub struct ExportLedger {
    db: Database,
}

impl ExportLedger {
    /// Open (or create) the ledger at the given path.
    pub fn open(path: &Path) -> LedgerResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(EXPORT_JOBS)?;
            let _ = write_txn.open_table(ORG_JOB_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Create a pending job for `org_id`.
    ///
    /// Fails with [`LedgerError::Conflict`] when the organization already has a
    /// pending or processing job. The check and the insert share one write
    /// transaction.
    pub fn start_export(&self, org_id: i64, created_by: Option<String>) -> LedgerResult<ExportJob> {
        let write_txn = self.db.begin_write()?;
        let job = {
            if let Some(active) = active_in_txn(&write_txn, org_id)? {
                return Err(LedgerError::Conflict(format!(
                    "Export job {} is already {} for organization {org_id}",
                    active.id,
                    active.status.as_str()
                )));
            }

            let job = ExportJob::new_pending(org_id, created_by);
            let json = serde_json::to_vec(&job)?;

            let mut jobs = write_txn.open_table(EXPORT_JOBS)?;
            jobs.insert(job.id.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(ORG_JOB_INDEX)?;
            let key = make_index_key(org_id, job.created_at, &job.id);
            index.insert(key.as_slice(), job.id.as_str())?;
            job
        };
        write_txn.commit()?;
        Ok(job)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Look up a single job by id.
    pub fn get_job(&self, job_id: &str) -> LedgerResult<Option<ExportJob>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EXPORT_JOBS)?;
        match table.get(job_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All jobs of an organization, newest first.
    pub fn list_jobs(&self, org_id: i64) -> LedgerResult<Vec<ExportJob>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(ORG_JOB_INDEX)?;
        let jobs = read_txn.open_table(EXPORT_JOBS)?;

        let prefix = make_prefix(org_id);
        let prefix_end = make_prefix_end(org_id);

        let mut results = Vec::new();
        for entry in index.range(prefix.as_slice()..prefix_end.as_slice())? {
            let (_, job_id) = entry?;
            if let Some(value) = jobs.get(job_id.value())? {
                results.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(results)
    }

    /// Most recently created job of an organization.
    pub fn latest_job(&self, org_id: i64) -> LedgerResult<Option<ExportJob>> {
        Ok(self.list_jobs(org_id)?.into_iter().next())
    }

    /// Most recent completed job of an organization.
    pub fn latest_completed(&self, org_id: i64) -> LedgerResult<Option<ExportJob>> {
        Ok(self
            .list_jobs(org_id)?
            .into_iter()
            .find(|job| job.status == ExportStatus::Completed))
    }

    /// The pending or processing job of an organization, if any.
    pub fn active_job(&self, org_id: i64) -> LedgerResult<Option<ExportJob>> {
        Ok(self
            .list_jobs(org_id)?
            .into_iter()
            .find(|job| job.status.is_active()))
    }

    /// Whether the job was cancelled. A row that no longer exists counts as
    /// cancelled so a running export stops once its row is gone.
    pub fn is_cancelled(&self, job_id: &str) -> LedgerResult<bool> {
        Ok(match self.get_job(job_id)? {
            Some(job) => job.status == ExportStatus::Cancelled,
            None => true,
        })
    }

    /// Jobs across all organizations created strictly before `cutoff`.
    pub fn jobs_created_before(&self, cutoff: DateTime<Utc>) -> LedgerResult<Vec<ExportJob>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EXPORT_JOBS)?;

        let mut results = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let job: ExportJob = serde_json::from_slice(value.value())?;
            if job.created_at < cutoff {
                results.push(job);
            }
        }
        Ok(results)
    }

    // =========================================================================
    // Status Transitions
    // =========================================================================

    /// pending → processing. Returns false if the job is no longer pending.
    pub fn mark_processing(&self, job_id: &str) -> LedgerResult<bool> {
        self.modify_job(job_id, |job| {
            if job.status != ExportStatus::Pending {
                return false;
            }
            job.status = ExportStatus::Processing;
            true
        })
    }

    /// Raise the progress of a processing job.
    ///
    /// Ignored (returns false) once the job has left `processing`, and never
    /// lowers the stored value.
    pub fn update_progress(&self, job_id: &str, progress: u8) -> LedgerResult<bool> {
        self.modify_job(job_id, |job| {
            if job.status != ExportStatus::Processing {
                return false;
            }
            let progress = progress.min(100);
            if progress <= job.progress {
                return false;
            }
            job.progress = progress;
            true
        })
    }

    /// processing → completed with the archive path.
    pub fn mark_completed(&self, job_id: &str, file_path: &str) -> LedgerResult<bool> {
        self.modify_job(job_id, |job| {
            if job.status != ExportStatus::Processing {
                return false;
            }
            job.status = ExportStatus::Completed;
            job.progress = 100;
            job.file_path = Some(file_path.to_string());
            job.error_message = None;
            job.completed_at = Some(Utc::now());
            true
        })
    }

    /// Any active state → failed.
    pub fn mark_failed(&self, job_id: &str, message: &str) -> LedgerResult<bool> {
        self.modify_job(job_id, |job| {
            if job.status.is_terminal() {
                return false;
            }
            job.status = ExportStatus::Failed;
            job.file_path = None;
            job.error_message = Some(message.to_string());
            true
        })
    }

    /// Cancel the active job of an organization.
    ///
    /// Fails with [`LedgerError::NotFound`] when nothing is pending or
    /// processing.
    pub fn request_cancel(&self, org_id: i64) -> LedgerResult<ExportJob> {
        let write_txn = self.db.begin_write()?;
        let job = {
            let mut job = active_in_txn(&write_txn, org_id)?.ok_or_else(|| {
                LedgerError::NotFound(format!("No active export for organization {org_id}"))
            })?;

            job.status = ExportStatus::Cancelled;
            job.file_path = None;
            job.error_message = Some(CANCELLED_BY_USER.to_string());
            job.updated_at = Utc::now();

            let json = serde_json::to_vec(&job)?;
            let mut jobs = write_txn.open_table(EXPORT_JOBS)?;
            jobs.insert(job.id.as_str(), json.as_slice())?;
            job
        };
        write_txn.commit()?;
        Ok(job)
    }

    /// Append a render failure to a processing job.
    pub fn record_render_failure(&self, job_id: &str, failure: RenderFailure) -> LedgerResult<bool> {
        self.modify_job(job_id, move |job| {
            if job.status != ExportStatus::Processing {
                return false;
            }
            job.render_failures.push(failure);
            true
        })
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Remove one job and its index entry. Returns false if it did not exist.
    pub fn delete_job(&self, job_id: &str) -> LedgerResult<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut jobs = write_txn.open_table(EXPORT_JOBS)?;
            let existing = match jobs.remove(job_id)? {
                Some(value) => Some(serde_json::from_slice::<ExportJob>(value.value())?),
                None => None,
            };

            match existing {
                Some(job) => {
                    let mut index = write_txn.open_table(ORG_JOB_INDEX)?;
                    let key = make_index_key(job.org_id, job.created_at, &job.id);
                    index.remove(key.as_slice())?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Remove every job of an organization, returning the removed rows.
    ///
    /// Refuses with [`LedgerError::Conflict`] while a job is active.
    pub fn delete_jobs_for_org(&self, org_id: i64) -> LedgerResult<Vec<ExportJob>> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let existing = jobs_in_txn(&write_txn, org_id)?;
            if let Some(active) = existing.iter().find(|job| job.status.is_active()) {
                return Err(LedgerError::Conflict(format!(
                    "Export job {} is still {}",
                    active.id,
                    active.status.as_str()
                )));
            }

            let mut jobs = write_txn.open_table(EXPORT_JOBS)?;
            let mut index = write_txn.open_table(ORG_JOB_INDEX)?;
            for job in &existing {
                jobs.remove(job.id.as_str())?;
                let key = make_index_key(job.org_id, job.created_at, &job.id);
                index.remove(key.as_slice())?;
            }
            existing
        };
        write_txn.commit()?;
        Ok(removed)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Read-modify-write one row inside a single write transaction.
    ///
    /// `apply` returns whether it changed the job; unchanged rows are not
    /// rewritten and a missing row yields `Ok(false)`.
    fn modify_job<F>(&self, job_id: &str, apply: F) -> LedgerResult<bool>
    where
        F: FnOnce(&mut ExportJob) -> bool,
    {
        let write_txn = self.db.begin_write()?;
        let applied = {
            let mut table = write_txn.open_table(EXPORT_JOBS)?;

            // Read existing value and deserialize before mutating
            let existing_bytes = match table.get(job_id)? {
                Some(value) => value.value().to_vec(),
                None => return Ok(false),
            };

            let mut job: ExportJob = serde_json::from_slice(&existing_bytes)?;
            if apply(&mut job) {
                job.updated_at = Utc::now();
                let json = serde_json::to_vec(&job)?;
                table.insert(job_id, json.as_slice())?;
                true
            } else {
                false
            }
        };
        if applied {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(applied)
    }
}

/// Jobs of an organization as seen by an open write transaction.
fn jobs_in_txn(txn: &WriteTransaction, org_id: i64) -> LedgerResult<Vec<ExportJob>> {
    let index = txn.open_table(ORG_JOB_INDEX)?;
    let jobs = txn.open_table(EXPORT_JOBS)?;

    let prefix = make_prefix(org_id);
    let prefix_end = make_prefix_end(org_id);

    let mut results = Vec::new();
    for entry in index.range(prefix.as_slice()..prefix_end.as_slice())? {
        let (_, job_id) = entry?;
        if let Some(value) = jobs.get(job_id.value())? {
            results.push(serde_json::from_slice(value.value())?);
        }
    }
    Ok(results)
}

fn active_in_txn(txn: &WriteTransaction, org_id: i64) -> LedgerResult<Option<ExportJob>> {
    Ok(jobs_in_txn(txn, org_id)?
        .into_iter()
        .find(|job| job.status.is_active()))
}

// =============================================================================
// Tests
// =============================================================================
