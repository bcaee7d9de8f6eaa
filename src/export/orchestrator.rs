// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! # Export Orchestrator
//!
//! Runs one export job to a terminal state. The work is split into units:
//! one per document per format, one for the contacts batch, one for the
//! credentials batch and one for the hierarchy outline, so
//! `total = 4 * documents + 3`.
//!
//! After every unit the orchestrator asks its [`JobControl`] whether the job
//! was cancelled, and if not, reports `floor(100 * done / total)`. A cancelled
//! job stops at the next unit boundary and leaves nothing behind: the staging
//! directory is a [`tempfile::TempDir`] and is removed on every exit path.
//!
//! Rendering failures are isolated per document and format. They are
//! recorded on the job and the unit still counts, so one bad document cannot
//! fail the whole export.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::archive;
use super::hierarchy::{build_hierarchy, FolderIndex};
use super::{sanitize_filename, sanitize_folder_name, ExportError, ExportResult};
use crate::crypto::SecretCipher;
use crate::render::{self, DocumentFormat, RenderContext, RenderResult};
use crate::storage::{
    ContactRepository, CredentialRepository, Document, DocumentRepository, ExportLedger,
    ExportStatus, FileStore, FolderRepository, Organization, OrganizationRepository,
    RenderFailure, StoragePaths,
};

/// Work units besides documents: contacts, credentials, hierarchy.
const BATCH_UNITS: usize = 3;

// =============================================================================
// Job Control
// =============================================================================

/// Cancellation and progress hooks for one running job.
pub trait JobControl {
    /// Whether the job was cancelled since the last check.
    fn is_cancelled(&self) -> ExportResult<bool>;

    /// Persist the current progress percentage.
    fn report_progress(&self, progress: u8) -> ExportResult<()>;

    /// Record a document that could not be rendered into one format.
    fn record_failure(&self, failure: RenderFailure) -> ExportResult<()>;
}

/// [`JobControl`] backed by the export ledger row.
///
/// Every check reads the row in a fresh transaction.
pub struct LedgerControl<'a> {
    ledger: &'a ExportLedger,
    job_id: &'a str,
}

impl<'a> LedgerControl<'a> {
    pub fn new(ledger: &'a ExportLedger, job_id: &'a str) -> Self {
        Self { ledger, job_id }
    }
}

impl JobControl for LedgerControl<'_> {
    fn is_cancelled(&self) -> ExportResult<bool> {
        Ok(self.ledger.is_cancelled(self.job_id)?)
    }

    fn report_progress(&self, progress: u8) -> ExportResult<()> {
        // A false return means the row left `processing`; the next
        // cancellation check picks that up.
        self.ledger.update_progress(self.job_id, progress)?;
        Ok(())
    }

    fn record_failure(&self, failure: RenderFailure) -> ExportResult<()> {
        self.ledger.record_render_failure(self.job_id, failure)?;
        Ok(())
    }
}

/// Progress accounting across work units.
struct Progress<'c, C: JobControl> {
    control: &'c C,
    done: usize,
    total: usize,
}

impl<'c, C: JobControl> Progress<'c, C> {
    fn new(control: &'c C, total: usize) -> Self {
        Self {
            control,
            done: 0,
            total: total.max(1),
        }
    }

    /// Finish one unit. Returns `false` once the job has been cancelled.
    fn advance(&mut self) -> ExportResult<bool> {
        self.done += 1;
        if self.control.is_cancelled()? {
            return Ok(false);
        }
        let percent = (self.done * 100 / self.total).min(100) as u8;
        self.control.report_progress(percent)?;
        Ok(true)
    }
}

// =============================================================================
// Export Inputs
// =============================================================================

/// Shared collaborators an export reads from.
#[derive(Clone, Copy)]
pub struct ExportInputs<'a> {
    pub store: &'a FileStore,
    pub cipher: &'a SecretCipher,
    /// Directory that `/static/` image references resolve against
    pub static_root: &'a Path,
}

/// Terminal result of [`run_job`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed {
        archive: PathBuf,
        render_failures: usize,
    },
    Cancelled,
    Failed(String),
    /// The row was missing or no longer pending when the worker picked it up.
    Skipped,
}

#[derive(Serialize)]
struct ContactEntry<'a> {
    id: i64,
    name: &'a str,
    role: Option<&'a str>,
    email: Option<&'a str>,
    phone: Option<&'a str>,
    text_number: Option<&'a str>,
    notes: Option<&'a str>,
    emergency_contact: bool,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct PasswordEntry<'a> {
    id: i64,
    title: &'a str,
    link: Option<&'a str>,
    username: Option<&'a str>,
    email: Option<&'a str>,
    password: Option<String>,
    #[serde(rename = "2fa_secret")]
    two_factor_secret: Option<String>,
    date_added: Option<DateTime<Utc>>,
}

// =============================================================================
// Job Execution
// =============================================================================

/// Run the job identified by `job_id` to a terminal ledger state.
///
/// Never returns an error: anything that goes wrong is written to the ledger
/// row as `failed`.
pub fn run_job(inputs: ExportInputs<'_>, ledger: &ExportLedger, job_id: &str) -> Outcome {
    let job = match ledger.get_job(job_id) {
        Ok(Some(job)) => job,
        Ok(None) => {
            debug!(job_id = %job_id, "Export job no longer exists");
            return Outcome::Skipped;
        }
        Err(e) => return fail(ledger, job_id, &ExportError::from(e)),
    };

    match job.status {
        ExportStatus::Pending => {}
        ExportStatus::Cancelled => {
            info!(job_id = %job_id, org_id = job.org_id, "Export cancelled before start");
            return Outcome::Cancelled;
        }
        other => {
            warn!(job_id = %job_id, status = other.as_str(), "Export job is not pending");
            return Outcome::Skipped;
        }
    }

    match ledger.mark_processing(job_id) {
        Ok(true) => {}
        // Lost a race with cancel
        Ok(false) => return Outcome::Cancelled,
        Err(e) => return fail(ledger, job_id, &ExportError::from(e)),
    }

    info!(job_id = %job_id, org_id = job.org_id, "Export started");

    let organization = match OrganizationRepository::new(inputs.store).get(job.org_id) {
        Ok(org) => org,
        Err(crate::storage::StorageError::NotFound(_)) => {
            return fail(ledger, job_id, &ExportError::NotFound("Organization not found".into()));
        }
        Err(e) => return fail(ledger, job_id, &ExportError::from(e)),
    };

    let control = LedgerControl::new(ledger, job_id);
    let archive = match export_organization(inputs, &organization, job_id, &control) {
        Ok(Some(archive)) => archive,
        Ok(None) => {
            info!(job_id = %job_id, org_id = job.org_id, "Export cancelled");
            return Outcome::Cancelled;
        }
        Err(e) => return fail(ledger, job_id, &e),
    };

    let path = archive.to_string_lossy().into_owned();
    match ledger.mark_completed(job_id, &path) {
        Ok(true) => {
            let render_failures = ledger
                .get_job(job_id)
                .ok()
                .flatten()
                .map(|job| job.render_failures.len())
                .unwrap_or_default();
            info!(
                job_id = %job_id,
                org_id = job.org_id,
                archive = %path,
                render_failures,
                "Export completed"
            );
            Outcome::Completed {
                archive,
                render_failures,
            }
        }
        Ok(false) => {
            // Cancelled between packaging and completion
            let _ = std::fs::remove_file(&archive);
            Outcome::Cancelled
        }
        Err(e) => {
            let _ = std::fs::remove_file(&archive);
            fail(ledger, job_id, &ExportError::from(e))
        }
    }
}

fn fail(ledger: &ExportLedger, job_id: &str, error: &ExportError) -> Outcome {
    let message = error.to_string();
    warn!(job_id = %job_id, error = %message, "Export failed");
    if let Err(e) = ledger.mark_failed(job_id, &message) {
        warn!(job_id = %job_id, error = %e, "Failed to record export failure");
    }
    Outcome::Failed(message)
}

/// Export every document, contact and credential of `organization`.
///
/// Returns the archive path, or `None` if the job was cancelled.
pub fn export_organization<C: JobControl>(
    inputs: ExportInputs<'_>,
    organization: &Organization,
    job_id: &str,
    control: &C,
) -> ExportResult<Option<PathBuf>> {
    let org_id = organization.id;
    let paths = inputs.store.paths();
    let exports_dir = paths.exports_dir();
    std::fs::create_dir_all(&exports_dir)?;

    let staging = tempfile::Builder::new()
        .prefix(&StoragePaths::staging_prefix(org_id, job_id))
        .tempdir_in(&exports_dir)?;
    let staging_root = staging.path();
    let documents_root = staging_root.join("documents");
    std::fs::create_dir_all(&documents_root)?;

    let folders = FolderRepository::new(inputs.store).list_by_org(org_id)?;
    let documents = DocumentRepository::new(inputs.store).list_by_org(org_id)?;
    let index = FolderIndex::new(&folders);

    for folder in &folders {
        std::fs::create_dir_all(folder_dir(&documents_root, &index, folder.id))?;
    }

    let mut progress = Progress::new(control, documents.len() * DocumentFormat::ALL.len() + BATCH_UNITS);
    let render_ctx = RenderContext::new(inputs.static_root, Utc::now());
    let mut taken = HashSet::new();

    debug!(
        job_id = %job_id,
        org_id,
        documents = documents.len(),
        total_units = progress.total,
        "Staging export"
    );

    for document in &documents {
        let dir = match document.folder_id.filter(|id| index.contains(*id)) {
            Some(folder_id) => folder_dir(&documents_root, &index, folder_id),
            None => documents_root.clone(),
        };
        let base = unique_base(&mut taken, &dir, document);

        for format in DocumentFormat::ALL {
            let target = dir.join(format!("{base}.{}", format.extension()));
            let written = isolated(|| render::render(format, document, Some(&organization.name), &render_ctx))
                .and_then(|bytes| {
                    std::fs::write(&target, bytes).map_err(|e| format!("write failed: {e}"))
                });
            if let Err(reason) = written {
                warn!(
                    job_id = %job_id,
                    document_id = document.id,
                    format = format.extension(),
                    reason = %reason,
                    "Document export failed"
                );
                control.record_failure(RenderFailure {
                    document_id: document.id,
                    title: document.title.clone(),
                    format: format.extension().to_string(),
                    reason,
                })?;
            }
            if !progress.advance()? {
                return Ok(None);
            }
        }
    }

    write_contacts(inputs.store, org_id, &staging_root.join("contacts.json"))?;
    if !progress.advance()? {
        return Ok(None);
    }

    write_credentials(inputs, org_id, &staging_root.join("passwords.json"))?;
    if !progress.advance()? {
        return Ok(None);
    }

    std::fs::write(
        staging_root.join("hierarchy.txt"),
        build_hierarchy(&folders, &documents),
    )?;
    if !progress.advance()? {
        return Ok(None);
    }

    if control.is_cancelled()? {
        return Ok(None);
    }

    let destination = paths.export_archive(org_id, job_id);
    archive::write_archive(staging_root, &destination)?;
    staging.close()?;
    Ok(Some(destination))
}

/// Run one renderer, turning errors and panics into a failure reason.
fn isolated<F>(render: F) -> Result<Vec<u8>, String>
where
    F: FnOnce() -> RenderResult<Vec<u8>>,
{
    match panic::catch_unwind(AssertUnwindSafe(render)) {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("renderer panicked: {detail}"))
        }
    }
}

fn folder_dir(documents_root: &Path, index: &FolderIndex<'_>, folder_id: i64) -> PathBuf {
    index
        .chain(folder_id)
        .into_iter()
        .fold(documents_root.to_path_buf(), |dir, folder| {
            dir.join(sanitize_folder_name(&folder.name, folder.id))
        })
}

/// Sanitized base name, suffixed with the id when the folder already has it.
fn unique_base(taken: &mut HashSet<PathBuf>, dir: &Path, document: &Document) -> String {
    let base = sanitize_filename(&document.title, document.id);
    if taken.insert(dir.join(&base)) {
        return base;
    }
    let fallback = format!("{base} ({})", document.id);
    taken.insert(dir.join(&fallback));
    fallback
}

fn write_contacts(store: &FileStore, org_id: i64, target: &Path) -> ExportResult<()> {
    let contacts = ContactRepository::new(store).list_by_org(org_id)?;
    let entries: Vec<ContactEntry<'_>> = contacts
        .iter()
        .map(|c| ContactEntry {
            id: c.id,
            name: &c.name,
            role: c.role.as_deref(),
            email: c.email.as_deref(),
            phone: c.phone.as_deref(),
            text_number: c.text_number.as_deref(),
            notes: c.notes.as_deref(),
            emergency_contact: c.emergency_contact,
            created_at: c.created_at,
        })
        .collect();
    std::fs::write(target, serde_json::to_vec_pretty(&entries).map_err(std::io::Error::from)?)?;
    Ok(())
}

/// Write credentials with decrypted secrets.
///
/// A secret that fails to decrypt is written as `null`; the batch continues.
fn write_credentials(inputs: ExportInputs<'_>, org_id: i64, target: &Path) -> ExportResult<()> {
    let records = CredentialRepository::new(inputs.store).list_by_org(org_id)?;
    let mut entries = Vec::with_capacity(records.len());
    for record in &records {
        let password = record.password(inputs.cipher).unwrap_or_else(|e| {
            warn!(org_id, credential_id = record.id, error = %e, "Password not exported");
            None
        });
        let two_factor_secret = record.two_factor_secret(inputs.cipher).unwrap_or_else(|e| {
            warn!(org_id, credential_id = record.id, error = %e, "2FA secret not exported");
            None
        });
        entries.push(PasswordEntry {
            id: record.id,
            title: &record.title,
            link: record.link.as_deref(),
            username: record.username.as_deref(),
            email: record.email.as_deref(),
            password,
            two_factor_secret,
            date_added: record.date_added,
        });
    }
    std::fs::write(target, serde_json::to_vec_pretty(&entries).map_err(std::io::Error::from)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::test_support::Fixture;
    use crate::render::RenderError;
    use crate::storage::CredentialRecord;
    use std::cell::{Cell, RefCell};
    use std::io::Read;

    /// Records progress and cancels after a fixed number of checks.
    #[derive(Default)]
    struct RecordingControl {
        progress: RefCell<Vec<u8>>,
        failures: RefCell<Vec<RenderFailure>>,
        checks: Cell<usize>,
        cancel_after: Option<usize>,
    }

    impl JobControl for RecordingControl {
        fn is_cancelled(&self) -> ExportResult<bool> {
            self.checks.set(self.checks.get() + 1);
            Ok(self.cancel_after.is_some_and(|n| self.checks.get() > n))
        }

        fn report_progress(&self, progress: u8) -> ExportResult<()> {
            self.progress.borrow_mut().push(progress);
            Ok(())
        }

        fn record_failure(&self, failure: RenderFailure) -> ExportResult<()> {
            self.failures.borrow_mut().push(failure);
            Ok(())
        }
    }

    fn archive_names(path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    fn read_entry(path: &Path, name: &str) -> String {
        let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
        let mut text = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn progress_counts_every_unit_and_reaches_100() {
        let fx = Fixture::new();
        let org = fx.seed();
        let control = RecordingControl::default();

        let archive = export_organization(fx.inputs(), &org, "job-1", &control)
            .unwrap()
            .unwrap();

        let progress = control.progress.borrow();
        assert_eq!(progress.len(), 4 * 2 + 3);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.last(), Some(&100));
        assert!(control.failures.borrow().is_empty());

        assert_eq!(
            archive_names(&archive),
            vec![
                "contacts.json",
                "documents/HR/Handbook.docx",
                "documents/HR/Handbook.md",
                "documents/HR/Handbook.pdf",
                "documents/HR/Handbook.rtf",
                "documents/Welcome.docx",
                "documents/Welcome.md",
                "documents/Welcome.pdf",
                "documents/Welcome.rtf",
                "hierarchy.txt",
                "passwords.json",
            ]
        );

        // Staging directory is gone, only the archive remains
        assert_eq!(fx.exports_dir_entries(), vec!["org_1_export_job-1.zip".to_string()]);
    }

    #[test]
    fn archive_carries_decrypted_credentials_and_contacts() {
        let fx = Fixture::new();
        let org = fx.seed();
        let archive = export_organization(fx.inputs(), &org, "job-1", &RecordingControl::default())
            .unwrap()
            .unwrap();

        let passwords: serde_json::Value =
            serde_json::from_str(&read_entry(&archive, "passwords.json")).unwrap();
        assert_eq!(passwords[0]["title"], "VPN");
        assert_eq!(passwords[0]["password"], "s3cret");
        assert!(passwords[0]["2fa_secret"].is_null());
        assert!(passwords[0].get("date_added").is_some());

        let contacts: serde_json::Value =
            serde_json::from_str(&read_entry(&archive, "contacts.json")).unwrap();
        assert_eq!(contacts[0]["name"], "Ada");
        assert_eq!(contacts[0]["emergency_contact"], true);
        assert!(contacts[0].get("org_id").is_none());

        let hierarchy = read_entry(&archive, "hierarchy.txt");
        assert!(hierarchy.contains("[FOLDER] HR/\n  [DOC] Handbook"));
        assert!(hierarchy.contains("[ROOT DOCUMENTS]\n  [DOC] Welcome"));
    }

    #[test]
    fn undecryptable_secrets_become_null() {
        let fx = Fixture::new();
        let org = fx.seed();
        let mut broken = CredentialRecord::new(2, 1, "Router");
        broken.encrypted_password = Some("not-a-token".into());
        CredentialRepository::new(&fx.store).save(&broken).unwrap();

        let archive = export_organization(fx.inputs(), &org, "job-1", &RecordingControl::default())
            .unwrap()
            .unwrap();
        let passwords: serde_json::Value =
            serde_json::from_str(&read_entry(&archive, "passwords.json")).unwrap();

        assert_eq!(passwords.as_array().unwrap().len(), 2);
        assert_eq!(passwords[0]["password"], "s3cret");
        assert!(passwords[1]["password"].is_null());
    }

    #[test]
    fn without_a_key_the_export_completes_with_null_secrets() {
        let fx = Fixture::new();
        let org = fx.seed();
        let disabled = SecretCipher::disabled();
        let inputs = ExportInputs {
            cipher: &disabled,
            ..fx.inputs()
        };

        let archive = export_organization(inputs, &org, "job-1", &RecordingControl::default())
            .unwrap()
            .unwrap();
        let passwords: serde_json::Value =
            serde_json::from_str(&read_entry(&archive, "passwords.json")).unwrap();
        assert_eq!(passwords[0]["title"], "VPN");
        assert!(passwords[0]["password"].is_null());
    }

    #[test]
    fn cancellation_stops_between_units_and_cleans_up() {
        let fx = Fixture::new();
        let org = fx.seed();
        let control = RecordingControl {
            cancel_after: Some(3),
            ..Default::default()
        };

        let result = export_organization(fx.inputs(), &org, "job-1", &control).unwrap();
        assert!(result.is_none());
        assert_eq!(control.checks.get(), 4);
        assert_eq!(control.progress.borrow().len(), 3);
        assert!(fx.exports_dir_entries().is_empty());
    }

    #[test]
    fn duplicate_titles_in_one_folder_get_the_id_appended() {
        let fx = Fixture::new();
        let org = fx.seed();
        fx.document(102, "Welcome", None);
        fx.document(103, "Notes?", Some(10));
        fx.document(104, "Notes", Some(10));

        let archive = export_organization(fx.inputs(), &org, "job-1", &RecordingControl::default())
            .unwrap()
            .unwrap();
        let names = archive_names(&archive);

        assert!(names.contains(&"documents/Welcome.md".to_string()));
        assert!(names.contains(&"documents/Welcome (102).md".to_string()));
        assert!(names.contains(&"documents/HR/Notes.md".to_string()));
        assert!(names.contains(&"documents/HR/Notes (104).md".to_string()));
    }

    #[test]
    fn renderer_errors_and_panics_are_isolated() {
        assert_eq!(isolated(|| Ok(vec![1, 2])), Ok(vec![1, 2]));
        assert_eq!(
            isolated(|| Err(RenderError::Docx("bad image".into()))),
            Err("DOCX packaging failed: bad image".to_string())
        );

        let reason = isolated(|| -> RenderResult<Vec<u8>> { panic!("boom") }).unwrap_err();
        assert_eq!(reason, "renderer panicked: boom");
    }

    #[test]
    fn run_job_drives_the_ledger_to_completed() {
        let fx = Fixture::new();
        fx.seed();
        let ledger = &fx.ledger;
        let job = ledger.start_export(1, Some("admin".into())).unwrap();

        let outcome = run_job(fx.inputs(), ledger, &job.id);
        let Outcome::Completed { archive, render_failures } = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert_eq!(render_failures, 0);
        assert!(archive.exists());

        let stored = ledger.get_job(&job.id).unwrap().unwrap();
        assert_eq!(stored.status, ExportStatus::Completed);
        assert_eq!(stored.progress, 100);
        assert_eq!(stored.file_path.as_deref(), Some(archive.to_string_lossy().as_ref()));
        assert!(stored.completed_at.is_some());
        assert!(stored.error_message.is_none());
    }

    #[test]
    fn over_long_titles_are_shortened_and_the_job_completes() {
        let fx = Fixture::new();
        fx.seed();
        fx.document(102, &"A".repeat(300), None);
        let job = fx.ledger.start_export(1, None).unwrap();

        let outcome = run_job(fx.inputs(), &fx.ledger, &job.id);
        let Outcome::Completed { archive, render_failures } = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert_eq!(render_failures, 0);

        let names = archive_names(&archive);
        let short = "A".repeat(crate::export::MAX_NAME_BYTES);
        for ext in ["md", "pdf", "docx", "rtf"] {
            assert!(names.contains(&format!("documents/{short}.{ext}")), "{ext}");
        }
        assert!(names.contains(&"documents/HR/Handbook.pdf".to_string()));
        assert!(names.contains(&"documents/Welcome.docx".to_string()));
    }

    #[test]
    fn a_failed_write_is_recorded_and_the_job_still_completes() {
        let fx = Fixture::new();
        fx.seed();
        // A folder occupying the path of the document's markdown file
        FolderRepository::new(&fx.store)
            .save(&crate::storage::DocumentFolder {
                id: 20,
                org_id: 1,
                name: "Notes.md".into(),
                parent_id: None,
            })
            .unwrap();
        fx.document(102, "Notes", None);
        let job = fx.ledger.start_export(1, None).unwrap();

        let outcome = run_job(fx.inputs(), &fx.ledger, &job.id);
        let Outcome::Completed { archive, render_failures } = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert_eq!(render_failures, 1);

        let stored = fx.ledger.get_job(&job.id).unwrap().unwrap();
        assert_eq!(stored.status, ExportStatus::Completed);
        assert_eq!(stored.progress, 100);
        assert_eq!(stored.render_failures.len(), 1);
        let failure = &stored.render_failures[0];
        assert_eq!(failure.document_id, 102);
        assert_eq!(failure.format, "md");
        assert!(failure.reason.starts_with("write failed"), "{}", failure.reason);

        let names = archive_names(&archive);
        assert!(names.contains(&"documents/Notes.pdf".to_string()));
        assert!(names.contains(&"documents/Notes.rtf".to_string()));
        assert!(names.contains(&"documents/HR/Handbook.md".to_string()));
        assert!(names.contains(&"passwords.json".to_string()));
    }

    #[test]
    fn run_job_fails_for_missing_organization() {
        let fx = Fixture::new();
        let ledger = &fx.ledger;
        let job = ledger.start_export(42, None).unwrap();

        assert_eq!(
            run_job(fx.inputs(), ledger, &job.id),
            Outcome::Failed("Organization not found".into())
        );
        let stored = ledger.get_job(&job.id).unwrap().unwrap();
        assert_eq!(stored.status, ExportStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("Organization not found"));
        assert!(stored.file_path.is_none());
    }

    #[test]
    fn run_job_skips_work_when_cancelled_before_start() {
        let fx = Fixture::new();
        fx.seed();
        let ledger = &fx.ledger;
        let job = ledger.start_export(1, None).unwrap();
        ledger.request_cancel(1).unwrap();

        assert_eq!(run_job(fx.inputs(), ledger, &job.id), Outcome::Cancelled);
        let stored = ledger.get_job(&job.id).unwrap().unwrap();
        assert_eq!(stored.status, ExportStatus::Cancelled);
        assert_eq!(stored.progress, 0);
        assert!(fx.exports_dir_entries().is_empty());
    }

    #[test]
    fn run_job_on_a_deleted_row_is_skipped() {
        let fx = Fixture::new();
        let ledger = &fx.ledger;
        assert_eq!(run_job(fx.inputs(), ledger, "missing"), Outcome::Skipped);
    }
}
