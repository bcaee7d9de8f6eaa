// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! Path constants and utilities for the on-disk storage layout.

use std::path::{Path, PathBuf};

/// Default base directory for all persistent storage.
pub const DATA_ROOT: &str = "./data";

/// File name of the embedded export ledger database.
pub const LEDGER_FILE: &str = "ledger.redb";

/// Storage path utilities for the data directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the redb export ledger.
    pub fn ledger_db(&self) -> PathBuf {
        self.root.join(LEDGER_FILE)
    }

    // ========== Organization Paths ==========

    /// Directory containing all organizations.
    pub fn orgs_dir(&self) -> PathBuf {
        self.root.join("orgs")
    }

    /// Directory for a specific organization.
    pub fn org_dir(&self, org_id: i64) -> PathBuf {
        self.orgs_dir().join(org_id.to_string())
    }

    /// Path to organization metadata file.
    pub fn org_meta(&self, org_id: i64) -> PathBuf {
        self.org_dir(org_id).join("org.json")
    }

    /// Directory holding an organization's document folders.
    pub fn folders_dir(&self, org_id: i64) -> PathBuf {
        self.org_dir(org_id).join("folders")
    }

    pub fn folder(&self, org_id: i64, folder_id: i64) -> PathBuf {
        self.folders_dir(org_id).join(format!("{folder_id}.json"))
    }

    /// Directory holding an organization's documents.
    pub fn documents_dir(&self, org_id: i64) -> PathBuf {
        self.org_dir(org_id).join("documents")
    }

    pub fn document(&self, org_id: i64, document_id: i64) -> PathBuf {
        self.documents_dir(org_id).join(format!("{document_id}.json"))
    }

    /// Directory holding an organization's contacts.
    pub fn contacts_dir(&self, org_id: i64) -> PathBuf {
        self.org_dir(org_id).join("contacts")
    }

    pub fn contact(&self, org_id: i64, contact_id: i64) -> PathBuf {
        self.contacts_dir(org_id).join(format!("{contact_id}.json"))
    }

    /// Directory holding an organization's credential records.
    pub fn credentials_dir(&self, org_id: i64) -> PathBuf {
        self.org_dir(org_id).join("credentials")
    }

    pub fn credential(&self, org_id: i64, credential_id: i64) -> PathBuf {
        self.credentials_dir(org_id)
            .join(format!("{credential_id}.json"))
    }

    // ========== Export Paths ==========

    /// Directory containing export archives and staging directories.
    pub fn exports_dir(&self) -> PathBuf {
        self.root.join("exports")
    }

    /// Prefix of the staging directory for one export job.
    pub fn staging_prefix(org_id: i64, job_id: &str) -> String {
        format!("org_{org_id}_{job_id}_")
    }

    /// Final archive location for a completed export job.
    pub fn export_archive(&self, org_id: i64, job_id: &str) -> PathBuf {
        self.exports_dir()
            .join(format!("org_{org_id}_export_{job_id}.zip"))
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("./data"));
        assert_eq!(paths.ledger_db(), PathBuf::from("./data/ledger.redb"));
    }

    #[test]
    fn org_paths_are_correct() {
        let paths = StoragePaths::new("/tmp/test-data");
        assert_eq!(
            paths.org_meta(7),
            PathBuf::from("/tmp/test-data/orgs/7/org.json")
        );
        assert_eq!(
            paths.folder(7, 3),
            PathBuf::from("/tmp/test-data/orgs/7/folders/3.json")
        );
        assert_eq!(
            paths.document(7, 12),
            PathBuf::from("/tmp/test-data/orgs/7/documents/12.json")
        );
        assert_eq!(
            paths.contact(7, 1),
            PathBuf::from("/tmp/test-data/orgs/7/contacts/1.json")
        );
        assert_eq!(
            paths.credential(7, 9),
            PathBuf::from("/tmp/test-data/orgs/7/credentials/9.json")
        );
    }

    #[test]
    fn export_paths_are_correct() {
        let paths = StoragePaths::new("/srv");
        assert_eq!(paths.exports_dir(), PathBuf::from("/srv/exports"));
        assert_eq!(
            paths.export_archive(4, "abc"),
            PathBuf::from("/srv/exports/org_4_export_abc.zip")
        );
        assert_eq!(StoragePaths::staging_prefix(4, "abc"), "org_4_abc_");
    }

    #[test]
    fn audit_paths_are_correct() {
        let paths = StoragePaths::new("/srv");
        assert_eq!(
            paths.audit_events_file("2026-01-31"),
            PathBuf::from("/srv/audit/2026-01-31/events.jsonl")
        );
    }
}
