// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! Organization repository.
//!
//! Each organization owns a directory under `orgs/{org_id}/` holding its
//! metadata (`org.json`) and the subdirectories of its records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStore, StorageError, StorageResult};
use super::load_one;

/// Organization metadata.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            created_at: Utc::now(),
        }
    }
}

/// Repository for organization metadata.
pub struct OrganizationRepository<'a> {
    storage: &'a FileStore,
}

impl<'a> OrganizationRepository<'a> {
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    /// Get an organization by ID.
    pub fn get(&self, org_id: i64) -> StorageResult<Organization> {
        let path = self.storage.paths().org_meta(org_id);
        load_one(self.storage, &path, || format!("Organization {org_id}"))
    }

    /// Create a new organization.
    pub fn create(&self, org: &Organization) -> StorageResult<()> {
        let path = self.storage.paths().org_meta(org.id);
        if path.is_file() {
            return Err(StorageError::AlreadyExists(format!("Organization {}", org.id)));
        }
        self.storage.write_json(path, org)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStore) {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStore::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, storage)
    }

    #[test]
    fn create_and_get_organization() {
        let (_temp, storage) = setup();
        let repo = OrganizationRepository::new(&storage);

        let org = Organization::new(1, "Acme");
        repo.create(&org).unwrap();

        assert_eq!(repo.get(1).unwrap(), org);
        assert!(matches!(
            repo.create(&org),
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[test]
    fn missing_organization_is_not_found() {
        let (_temp, storage) = setup();
        let repo = OrganizationRepository::new(&storage);
        assert!(matches!(repo.get(42), Err(StorageError::NotFound(_))));
    }
}
