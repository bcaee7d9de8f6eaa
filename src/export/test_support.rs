// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! Seeded data root shared by the export tests.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;

use super::orchestrator::ExportInputs;
use crate::crypto::{generate_key, SecretCipher};
use crate::storage::{
    Contact, ContactRepository, ContentType, CredentialRecord, CredentialRepository, Document,
    DocumentFolder, DocumentRepository, ExportLedger, FileStore, FolderRepository, Organization,
    OrganizationRepository, StoragePaths,
};

pub struct Fixture {
    _temp: TempDir,
    pub store: Arc<FileStore>,
    pub cipher: Arc<SecretCipher>,
    pub ledger: Arc<ExportLedger>,
    pub static_root: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::new(StoragePaths::new(temp.path()));
        store.initialize().unwrap();
        let ledger = ExportLedger::open(&store.paths().ledger_db()).unwrap();
        let static_root = temp.path().join("static");
        std::fs::create_dir_all(&static_root).unwrap();
        Self {
            _temp: temp,
            store: Arc::new(store),
            cipher: Arc::new(SecretCipher::new(Some(&generate_key().unwrap()))),
            ledger: Arc::new(ledger),
            static_root,
        }
    }

    pub fn inputs(&self) -> ExportInputs<'_> {
        ExportInputs {
            store: &self.store,
            cipher: &self.cipher,
            static_root: &self.static_root,
        }
    }

    /// Acme (org 1): folder HR with "Handbook", root document "Welcome",
    /// one contact and a VPN credential with password `s3cret`.
    pub fn seed(&self) -> Organization {
        let org = Organization::new(1, "Acme");
        OrganizationRepository::new(&self.store).create(&org).unwrap();
        FolderRepository::new(&self.store)
            .save(&DocumentFolder {
                id: 10,
                org_id: 1,
                name: "HR".into(),
                parent_id: None,
            })
            .unwrap();
        self.document(100, "Handbook", Some(10));
        self.document(101, "Welcome", None);

        ContactRepository::new(&self.store)
            .save(&Contact {
                id: 1,
                org_id: 1,
                name: "Ada".into(),
                role: Some("CTO".into()),
                email: None,
                phone: None,
                text_number: None,
                notes: None,
                emergency_contact: true,
                created_at: None,
            })
            .unwrap();

        let mut vpn = CredentialRecord::new(1, 1, "VPN");
        vpn.set_password(&self.cipher, Some("s3cret")).unwrap();
        CredentialRepository::new(&self.store).save(&vpn).unwrap();
        org
    }

    pub fn document(&self, id: i64, title: &str, folder_id: Option<i64>) {
        DocumentRepository::new(&self.store)
            .save(&Document {
                id,
                org_id: 1,
                folder_id,
                title: title.into(),
                content: Some(format!("# {title}\n\nBody of {title}.")),
                content_type: ContentType::Markdown,
                created_at: Some(Utc::now()),
                updated_at: None,
            })
            .unwrap();
    }

    pub fn exports_dir_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.store.paths().exports_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
