// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! Credential repository.
//!
//! Passwords and 2FA seeds are persisted only as tokens produced by
//! [`SecretCipher`]. Plaintext is accepted on the way in and produced on the
//! way out, but never written to disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStore, StorageResult};
use super::{load_all, load_one};
use crate::crypto::{CryptoResult, SecretCipher};

/// A stored credential with encrypted secrets.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CredentialRecord {
    pub id: i64,
    pub org_id: i64,
    pub title: String,
    pub link: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    /// Encrypted password token
    pub encrypted_password: Option<String>,
    /// Encrypted 2FA seed token
    pub encrypted_2fa_secret: Option<String>,
    pub date_added: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    pub fn new(id: i64, org_id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            org_id,
            title: title.into(),
            link: None,
            username: None,
            email: None,
            encrypted_password: None,
            encrypted_2fa_secret: None,
            date_added: Some(Utc::now()),
        }
    }

    /// Encrypt and store a password; `None` or empty clears it.
    pub fn set_password(&mut self, cipher: &SecretCipher, password: Option<&str>) -> CryptoResult<()> {
        self.encrypted_password = cipher.encrypt_optional(password)?;
        Ok(())
    }

    /// Encrypt and store a 2FA seed; `None` or empty clears it.
    pub fn set_2fa_secret(&mut self, cipher: &SecretCipher, secret: Option<&str>) -> CryptoResult<()> {
        self.encrypted_2fa_secret = cipher.encrypt_optional(secret)?;
        Ok(())
    }

    pub fn password(&self, cipher: &SecretCipher) -> CryptoResult<Option<String>> {
        cipher.decrypt_optional(self.encrypted_password.as_deref())
    }

    pub fn two_factor_secret(&self, cipher: &SecretCipher) -> CryptoResult<Option<String>> {
        cipher.decrypt_optional(self.encrypted_2fa_secret.as_deref())
    }
}

/// Repository for credential records.
pub struct CredentialRepository<'a> {
    storage: &'a FileStore,
}

impl<'a> CredentialRepository<'a> {
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    pub fn get(&self, org_id: i64, credential_id: i64) -> StorageResult<CredentialRecord> {
        let path = self.storage.paths().credential(org_id, credential_id);
        load_one(self.storage, &path, || format!("Credential {credential_id}"))
    }

    /// Create or replace a credential record.
    pub fn save(&self, record: &CredentialRecord) -> StorageResult<()> {
        self.storage.write_json(
            self.storage.paths().credential(record.org_id, record.id),
            record,
        )
    }

    pub fn list_by_org(&self, org_id: i64) -> StorageResult<Vec<CredentialRecord>> {
        load_all(self.storage, &self.storage.paths().credentials_dir(org_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_key;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    #[test]
    fn secrets_are_stored_encrypted() {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStore::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        let repo = CredentialRepository::new(&storage);
        let cipher = SecretCipher::new(Some(&generate_key().unwrap()));

        let mut record = CredentialRecord::new(1, 3, "VPN");
        record.set_password(&cipher, Some("s3cret")).unwrap();
        record.set_2fa_secret(&cipher, None).unwrap();
        repo.save(&record).unwrap();

        let raw = storage.read_raw(storage.paths().credential(3, 1)).unwrap();
        assert!(!String::from_utf8(raw).unwrap().contains("s3cret"));

        let loaded = repo.get(3, 1).unwrap();
        assert_eq!(loaded.password(&cipher).unwrap().as_deref(), Some("s3cret"));
        assert_eq!(loaded.two_factor_secret(&cipher).unwrap(), None);
        assert_eq!(repo.list_by_org(3).unwrap().len(), 1);
    }
}
