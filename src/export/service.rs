// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! Request-facing export operations.
//!
//! Every method reads or writes the ledger in its own transaction and returns
//! immediately; the export itself runs on the [`ExportRunner`]. Failures of a
//! running job are only observable through [`ExportService::get_export_status`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::orchestrator::Outcome;
use super::runner::ExportRunner;
use super::sweeper::RetentionSweeper;
use super::{sanitize_filename, ExportError, ExportResult};
use crate::audit_log;
use crate::crypto::SecretCipher;
use crate::render::{self, DocumentFormat, RenderContext};
use crate::storage::{
    AuditEvent, AuditEventType, AuditRepository, CredentialRepository, DocumentRepository,
    ExportJob, ExportLedger, ExportStatus, FileStore, OrganizationRepository, RenderFailure,
};

/// Returned by [`ExportService::start_export`].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StartedExport {
    pub job_id: String,
    pub status: ExportStatus,
    pub progress: u8,
}

/// Status of an organization's most recent export.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ExportStatusView {
    /// False when the organization has never been exported.
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ExportStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Whether a downloadable archive exists on disk.
    pub has_file: bool,
    /// Documents that could not be rendered into some format.
    pub render_failures: Vec<RenderFailure>,
}

impl ExportStatusView {
    fn from_job(job: ExportJob) -> Self {
        let has_file = job.status == ExportStatus::Completed
            && job.file_path.as_deref().is_some_and(|p| Path::new(p).is_file());
        Self {
            exists: true,
            job_id: Some(job.id),
            status: Some(job.status),
            progress: Some(job.progress),
            created_at: Some(job.created_at),
            updated_at: Some(job.updated_at),
            completed_at: job.completed_at,
            error_message: job.error_message,
            has_file,
            render_failures: job.render_failures,
        }
    }
}

/// A file handed back to the caller.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Decrypted secrets of one credential.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RevealedCredential {
    pub id: i64,
    pub title: String,
    pub password: Option<String>,
    #[serde(rename = "2fa_secret")]
    pub two_factor_secret: Option<String>,
}

/// Entry point for export, download and reveal requests.
#[derive(Clone)]
pub struct ExportService {
    store: Arc<FileStore>,
    ledger: Arc<ExportLedger>,
    cipher: Arc<SecretCipher>,
    static_root: Arc<PathBuf>,
    runner: ExportRunner,
}

impl ExportService {
    pub fn new(
        store: Arc<FileStore>,
        ledger: Arc<ExportLedger>,
        cipher: Arc<SecretCipher>,
        static_root: PathBuf,
        workers: usize,
    ) -> Self {
        let runner = ExportRunner::new(
            store.clone(),
            ledger.clone(),
            cipher.clone(),
            static_root.clone(),
            workers,
        );
        Self {
            store,
            ledger,
            cipher,
            static_root: Arc::new(static_root),
            runner,
        }
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn ledger(&self) -> &ExportLedger {
        &self.ledger
    }

    pub fn runner(&self) -> &ExportRunner {
        &self.runner
    }

    pub fn encryption_configured(&self) -> bool {
        self.cipher.is_configured()
    }

    /// Sweeper over the same data root and ledger.
    pub fn retention_sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(self.store.clone(), self.ledger.clone())
    }

    // =========================================================================
    // Export Jobs
    // =========================================================================

    /// Create a pending job and queue it.
    ///
    /// Fails with [`ExportError::Conflict`] while another export of the
    /// organization is pending or processing. The handle resolves when the
    /// job finishes and may be dropped.
    pub fn start_export(
        &self,
        org_id: i64,
        created_by: Option<&str>,
    ) -> ExportResult<(StartedExport, JoinHandle<Outcome>)> {
        let job = self
            .ledger
            .start_export(org_id, created_by.map(str::to_string))?;

        info!(job_id = %job.id, org_id, "Export queued");
        audit_log!(
            &self.store,
            AuditEventType::ExportStarted,
            created_by,
            org_id,
            "export",
            &job.id
        );

        let handle = self.runner.spawn(job.id.clone());
        Ok((
            StartedExport {
                job_id: job.id,
                status: job.status,
                progress: job.progress,
            },
            handle,
        ))
    }

    /// Mark the active job cancelled. The worker stops at its next check.
    pub fn cancel_export(&self, org_id: i64, user: Option<&str>) -> ExportResult<ExportJob> {
        let job = self.ledger.request_cancel(org_id)?;
        info!(job_id = %job.id, org_id, "Export cancellation requested");
        audit_log!(
            &self.store,
            AuditEventType::ExportCancelled,
            user,
            org_id,
            "export",
            &job.id
        );
        Ok(job)
    }

    pub fn get_export_status(&self, org_id: i64) -> ExportResult<ExportStatusView> {
        Ok(self
            .ledger
            .latest_job(org_id)?
            .map(ExportStatusView::from_job)
            .unwrap_or_default())
    }

    /// Archive of the most recent completed export.
    pub fn download_export(&self, org_id: i64, user: Option<&str>) -> ExportResult<FilePayload> {
        let not_found = || ExportError::NotFound("No completed export available".to_string());

        let job = self.ledger.latest_completed(org_id)?.ok_or_else(not_found)?;
        let path = job.file_path.as_deref().map(PathBuf::from).ok_or_else(not_found)?;
        if !path.is_file() {
            warn!(job_id = %job.id, org_id, path = %path.display(), "Export archive missing on disk");
            return Err(not_found());
        }

        let bytes = std::fs::read(&path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("org_{org_id}_export_{}.zip", job.id));

        audit_log!(
            &self.store,
            AuditEventType::ExportDownloaded,
            user,
            org_id,
            "export",
            &job.id
        );

        Ok(FilePayload {
            file_name,
            content_type: "application/zip",
            bytes,
        })
    }

    /// Delete every previous job and archive, then start a new export.
    pub fn regenerate_export(
        &self,
        org_id: i64,
        created_by: Option<&str>,
    ) -> ExportResult<(StartedExport, JoinHandle<Outcome>)> {
        let removed = self.ledger.delete_jobs_for_org(org_id)?;
        for job in &removed {
            self.remove_artifact(job);
        }

        info!(org_id, removed_jobs = removed.len(), "Previous exports removed");
        let event = AuditEvent::new(AuditEventType::ExportRegenerated)
            .with_user(created_by)
            .with_org(org_id)
            .with_details(serde_json::json!({ "removed_jobs": removed.len() }));
        if let Err(e) = AuditRepository::new(&self.store).log(&event) {
            warn!(error = %e, "Failed to write audit event");
        }

        self.start_export(org_id, created_by)
    }

    fn remove_artifact(&self, job: &ExportJob) {
        let path = job
            .file_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.store.paths().export_archive(job.org_id, &job.id));
        match std::fs::remove_file(&path) {
            Ok(()) => info!(job_id = %job.id, path = %path.display(), "Export archive removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(job_id = %job.id, error = %e, "Failed to remove export archive"),
        }
    }

    // =========================================================================
    // Single Records
    // =========================================================================

    /// Decrypt one credential's secrets.
    pub fn reveal_credential(
        &self,
        org_id: i64,
        credential_id: i64,
        user: Option<&str>,
    ) -> ExportResult<RevealedCredential> {
        let record = CredentialRepository::new(&self.store).get(org_id, credential_id)?;
        let revealed = RevealedCredential {
            id: record.id,
            password: record.password(&self.cipher)?,
            two_factor_secret: record.two_factor_secret(&self.cipher)?,
            title: record.title,
        };

        audit_log!(
            &self.store,
            AuditEventType::CredentialRevealed,
            user,
            org_id,
            "credential",
            credential_id.to_string()
        );
        Ok(revealed)
    }

    /// Render one document into `format`.
    pub fn render_document(
        &self,
        org_id: i64,
        document_id: i64,
        format: DocumentFormat,
        user: Option<&str>,
    ) -> ExportResult<FilePayload> {
        let document = DocumentRepository::new(&self.store).get(org_id, document_id)?;
        let organization = OrganizationRepository::new(&self.store).get(org_id).ok();

        let ctx = RenderContext::new(self.static_root.as_path(), Utc::now());
        let bytes = render::render(
            format,
            &document,
            organization.as_ref().map(|org| org.name.as_str()),
            &ctx,
        )?;

        audit_log!(
            &self.store,
            AuditEventType::DocumentExported,
            user,
            org_id,
            "document",
            document_id.to_string()
        );

        Ok(FilePayload {
            file_name: format!(
                "{}.{}",
                sanitize_filename(&document.title, document.id),
                format.extension()
            ),
            content_type: format.mime_type(),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::test_support::Fixture;
    use crate::storage::CredentialRecord;
    use std::time::Duration;

    fn service(fx: &Fixture) -> ExportService {
        ExportService::new(
            fx.store.clone(),
            fx.ledger.clone(),
            fx.cipher.clone(),
            fx.static_root.clone(),
            2,
        )
    }

    fn audit_types(fx: &Fixture) -> Vec<AuditEventType> {
        let date = Utc::now().format("%Y-%m-%d").to_string();
        AuditRepository::new(&fx.store)
            .read_events(&date)
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    #[test]
    fn status_of_a_never_exported_org() {
        let fx = Fixture::new();
        let view = service(&fx).get_export_status(1).unwrap();
        assert!(!view.exists);
        assert!(!view.has_file);
        assert_eq!(serde_json::to_value(&view).unwrap(), serde_json::json!({
            "exists": false,
            "has_file": false,
            "render_failures": []
        }));
    }

    #[tokio::test]
    async fn start_then_download() {
        let fx = Fixture::new();
        fx.seed();
        let service = service(&fx);

        let (started, handle) = service.start_export(1, Some("admin")).unwrap();
        assert_eq!(started.status, ExportStatus::Pending);
        assert_eq!(started.progress, 0);
        assert!(matches!(handle.await.unwrap(), Outcome::Completed { .. }));

        let view = service.get_export_status(1).unwrap();
        assert!(view.exists);
        assert_eq!(view.job_id.as_deref(), Some(started.job_id.as_str()));
        assert_eq!(view.status, Some(ExportStatus::Completed));
        assert_eq!(view.progress, Some(100));
        assert!(view.has_file);
        assert!(view.completed_at.is_some());

        let download = service.download_export(1, Some("admin")).unwrap();
        assert_eq!(download.file_name, format!("org_1_export_{}.zip", started.job_id));
        assert_eq!(download.content_type, "application/zip");
        assert_eq!(&download.bytes[..2], b"PK");

        assert_eq!(
            audit_types(&fx),
            vec![AuditEventType::ExportStarted, AuditEventType::ExportDownloaded]
        );
    }

    #[tokio::test]
    async fn second_start_conflicts_while_active() {
        let fx = Fixture::new();
        fx.seed();
        // A pending row the runner has not picked up
        fx.ledger.start_export(1, None).unwrap();

        let err = service(&fx).start_export(1, None).unwrap_err();
        assert!(matches!(err, ExportError::Conflict(_)));
    }

    #[test]
    fn cancel_without_active_job_is_not_found() {
        let fx = Fixture::new();
        let err = service(&fx).cancel_export(1, None).unwrap_err();
        assert!(matches!(err, ExportError::NotFound(_)));
    }

    #[test]
    fn download_requires_a_completed_job_with_a_file() {
        let fx = Fixture::new();
        let service = service(&fx);
        assert!(matches!(service.download_export(1, None), Err(ExportError::NotFound(_))));

        let job = fx.ledger.start_export(1, None).unwrap();
        fx.ledger.mark_processing(&job.id).unwrap();
        fx.ledger.mark_completed(&job.id, "/nonexistent/org_1.zip").unwrap();

        assert!(!service.get_export_status(1).unwrap().has_file);
        assert!(matches!(service.download_export(1, None), Err(ExportError::NotFound(_))));
    }

    #[tokio::test]
    async fn cancelled_job_leaves_nothing_to_download() {
        let fx = Fixture::new();
        fx.seed();
        let service = service(&fx);

        let job = fx.ledger.start_export(1, None).unwrap();
        fx.ledger.mark_processing(&job.id).unwrap();
        service.cancel_export(1, Some("admin")).unwrap();

        let view = service.get_export_status(1).unwrap();
        assert_eq!(view.status, Some(ExportStatus::Cancelled));
        assert!(view.error_message.is_some());
        assert!(!view.has_file);
        assert!(matches!(service.download_export(1, None), Err(ExportError::NotFound(_))));
    }

    #[tokio::test]
    async fn regenerate_replaces_previous_artifact_and_row() {
        let fx = Fixture::new();
        fx.seed();
        let service = service(&fx);

        let (first, handle) = service.start_export(1, None).unwrap();
        handle.await.unwrap();
        let old_archive = fx.store.paths().export_archive(1, &first.job_id);
        assert!(old_archive.exists());

        let (second, handle) = service.regenerate_export(1, Some("admin")).unwrap();
        assert_ne!(first.job_id, second.job_id);
        assert!(!old_archive.exists());
        assert!(fx.ledger.get_job(&first.job_id).unwrap().is_none());

        handle.await.unwrap();
        assert_eq!(
            fx.exports_dir_entries(),
            vec![format!("org_1_export_{}.zip", second.job_id)]
        );
        assert!(audit_types(&fx).contains(&AuditEventType::ExportRegenerated));
    }

    #[tokio::test]
    async fn regenerate_refuses_while_active() {
        let fx = Fixture::new();
        fx.ledger.start_export(1, None).unwrap();
        let err = service(&fx).regenerate_export(1, None).unwrap_err();
        assert!(matches!(err, ExportError::Conflict(_)));
        // Give nothing a chance to run; the pending row is untouched
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fx.ledger.list_jobs(1).unwrap().len(), 1);
    }

    #[test]
    fn reveal_decrypts_and_audits() {
        let fx = Fixture::new();
        let mut record = CredentialRecord::new(5, 1, "Mail");
        record.set_password(&fx.cipher, Some("hunter2")).unwrap();
        record.set_2fa_secret(&fx.cipher, Some("JBSWY3DP")).unwrap();
        CredentialRepository::new(&fx.store).save(&record).unwrap();

        let revealed = service(&fx).reveal_credential(1, 5, Some("admin")).unwrap();
        assert_eq!(revealed.password.as_deref(), Some("hunter2"));
        assert_eq!(revealed.two_factor_secret.as_deref(), Some("JBSWY3DP"));
        assert_eq!(audit_types(&fx), vec![AuditEventType::CredentialRevealed]);

        assert!(matches!(
            service(&fx).reveal_credential(1, 99, None),
            Err(ExportError::NotFound(_))
        ));
    }

    #[test]
    fn render_single_document() {
        let fx = Fixture::new();
        fx.seed();
        let payload = service(&fx)
            .render_document(1, 100, DocumentFormat::Rtf, None)
            .unwrap();
        assert_eq!(payload.file_name, "Handbook.rtf");
        assert_eq!(payload.content_type, "application/rtf");
        assert!(payload.bytes.starts_with(b"{\\rtf1"));
    }
}
