// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! # Storage Module
//!
//! Persistent state lives under a single data root:
//!
//! ```text
//! {DATA_DIR}/
//!   ledger.redb                 # Export job ledger (redb)
//!   orgs/{org_id}/
//!     org.json                  # Organization metadata
//!     folders/{id}.json         # Document folders
//!     documents/{id}.json       # Documents (markdown or HTML body)
//!     contacts/{id}.json
//!     credentials/{id}.json     # Secrets stored as encrypted tokens only
//!   exports/
//!     org_{org}_export_{job}.zip
//!     org_{org}_{job}_XXXX/     # Staging directory while a job runs
//!   audit/
//!     {date}/events.jsonl       # Daily audit logs
//! ```
//!
//! Organization records are plain JSON files written atomically. The export
//! ledger is an embedded ACID database so that status transitions can be
//! checked and applied in one transaction.

pub mod audit;
pub mod file_store;
pub mod ledger;
pub mod paths;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use file_store::{FileStore, StorageError, StorageResult};
pub use ledger::{ExportJob, ExportLedger, ExportStatus, LedgerError, LedgerResult, RenderFailure};
pub use paths::StoragePaths;
pub use repository::{
    Contact, ContactRepository, ContentType, CredentialRecord, CredentialRepository, Document,
    DocumentFolder, DocumentRepository, FolderRepository, Organization, OrganizationRepository,
};
