// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! Document and folder repositories.
//!
//! Folders form a tree through `parent_id`; documents optionally sit in a
//! folder. Both are stored one JSON file per record under the organization's
//! `folders/` and `documents/` directories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStore, StorageResult};
use super::{load_all, load_one};

/// Format of a document's stored body.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Markdown,
    Html,
}

/// A folder in an organization's document tree.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DocumentFolder {
    pub id: i64,
    pub org_id: i64,
    pub name: String,
    /// Parent folder; `None` for a root folder
    pub parent_id: Option<i64>,
}

/// A stored document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Document {
    pub id: i64,
    pub org_id: i64,
    pub folder_id: Option<i64>,
    pub title: String,
    pub content: Option<String>,
    #[serde(default)]
    pub content_type: ContentType,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Stored body, empty when absent.
    pub fn body(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

// =============================================================================
// Folders
// =============================================================================

/// Repository for document folders.
pub struct FolderRepository<'a> {
    storage: &'a FileStore,
}

impl<'a> FolderRepository<'a> {
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    /// Create or replace a folder.
    pub fn save(&self, folder: &DocumentFolder) -> StorageResult<()> {
        self.storage
            .write_json(self.storage.paths().folder(folder.org_id, folder.id), folder)
    }

    /// All folders of an organization, ordered by id.
    pub fn list_by_org(&self, org_id: i64) -> StorageResult<Vec<DocumentFolder>> {
        load_all(self.storage, &self.storage.paths().folders_dir(org_id))
    }
}

// =============================================================================
// Documents
// =============================================================================

/// Repository for documents.
pub struct DocumentRepository<'a> {
    storage: &'a FileStore,
}

impl<'a> DocumentRepository<'a> {
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    /// Get a document by ID.
    pub fn get(&self, org_id: i64, document_id: i64) -> StorageResult<Document> {
        let path = self.storage.paths().document(org_id, document_id);
        load_one(self.storage, &path, || format!("Document {document_id}"))
    }

    /// Create or replace a document.
    pub fn save(&self, document: &Document) -> StorageResult<()> {
        self.storage.write_json(
            self.storage.paths().document(document.org_id, document.id),
            document,
        )
    }

    /// All documents of an organization, ordered by id.
    pub fn list_by_org(&self, org_id: i64) -> StorageResult<Vec<Document>> {
        load_all(self.storage, &self.storage.paths().documents_dir(org_id))
    }
}
