// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! Repository layer providing typed access to organization records.
//!
//! Each repository reads and writes one record type through the
//! [`FileStore`]. Records are scoped by organization.

use std::path::Path;

use serde::de::DeserializeOwned;

use super::{FileStore, StorageError, StorageResult};

pub mod contacts;
pub mod credentials;
pub mod documents;
pub mod organizations;

pub use contacts::{Contact, ContactRepository};
pub use credentials::{CredentialRecord, CredentialRepository};
pub use documents::{ContentType, Document, DocumentFolder, DocumentRepository, FolderRepository};
pub use organizations::{Organization, OrganizationRepository};

/// Read one record, reporting a missing file as `NotFound(label)`.
fn load_one<T: DeserializeOwned>(
    storage: &FileStore,
    path: &Path,
    label: impl FnOnce() -> String,
) -> StorageResult<T> {
    storage.read_json(path).map_err(|e| match e {
        StorageError::NotFound(_) => StorageError::NotFound(label()),
        other => other,
    })
}

/// Load every `<id>.json` record in `dir`, ordered by numeric id.
///
/// Files whose stem is not an integer are skipped. Unreadable records are
/// logged and skipped.
fn load_all<T: DeserializeOwned>(storage: &FileStore, dir: &Path) -> StorageResult<Vec<T>> {
    let mut ids: Vec<i64> = storage
        .list_files(dir, "json")?
        .into_iter()
        .filter_map(|stem| stem.parse().ok())
        .collect();
    ids.sort_unstable();

    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        let path = dir.join(format!("{id}.json"));
        match storage.read_json(&path) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable record");
            }
        }
    }
    Ok(records)
}
