// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! Contact repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStore, StorageResult};
use super::load_all;

/// A person associated with an organization.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Contact {
    pub id: i64,
    pub org_id: i64,
    pub name: String,
    pub role: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub text_number: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub emergency_contact: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Repository for contacts.
pub struct ContactRepository<'a> {
    storage: &'a FileStore,
}

impl<'a> ContactRepository<'a> {
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    /// Create or replace a contact.
    pub fn save(&self, contact: &Contact) -> StorageResult<()> {
        self.storage.write_json(
            self.storage.paths().contact(contact.org_id, contact.id),
            contact,
        )
    }

    pub fn list_by_org(&self, org_id: i64) -> StorageResult<Vec<Contact>> {
        load_all(self.storage, &self.storage.paths().contacts_dir(org_id))
    }
}
