// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! # Organization Export
//!
//! An export walks one organization's documents, contacts and credentials,
//! renders every document into all four formats, and packages the result into
//! a single ZIP archive under `exports/`.
//!
//! ## Lifecycle
//!
//! ```text
//! start_export ──► pending ──► processing ──┬──► completed (archive on disk)
//!                     │                     ├──► failed    (error recorded)
//!                     └──── cancel ─────────┴──► cancelled
//! ```
//!
//! - [`service::ExportService`] is the request-facing contract: start, cancel,
//!   status, download, regenerate.
//! - [`runner::ExportRunner`] hands jobs to a bounded pool of blocking workers.
//! - [`orchestrator`] runs one job. It checks for cancellation between every
//!   unit of work and reports progress after each one.
//! - [`sweeper::RetentionSweeper`] removes artifacts and ledger rows once they
//!   pass the retention horizon.

use crate::crypto::CryptoError;
use crate::render::RenderError;
use crate::storage::{LedgerError, StorageError};

pub mod archive;
pub mod hierarchy;
pub mod orchestrator;
pub mod runner;
pub mod service;
pub mod sweeper;
#[cfg(test)]
pub(crate) mod test_support;

pub use hierarchy::build_hierarchy;
pub use orchestrator::{JobControl, LedgerControl, Outcome};
pub use runner::ExportRunner;
pub use service::{ExportService, ExportStatusView, StartedExport};
pub use sweeper::RetentionSweeper;

/// Error type for export operations.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("ledger error: {0}")]
    Ledger(LedgerError),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("encryption error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),
}

pub type ExportResult<T> = Result<T, ExportError>;

impl From<LedgerError> for ExportError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound(msg) => ExportError::NotFound(msg),
            LedgerError::Conflict(msg) => ExportError::Conflict(msg),
            other => ExportError::Ledger(other),
        }
    }
}

impl From<StorageError> for ExportError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(msg) => ExportError::NotFound(msg),
            other => ExportError::Storage(other),
        }
    }
}

impl From<walkdir::Error> for ExportError {
    fn from(e: walkdir::Error) -> Self {
        ExportError::Io(e.into())
    }
}

/// Longest sanitized name in bytes. Leaves room for an id suffix and an
/// extension inside the usual 255-byte filename limit.
pub const MAX_NAME_BYTES: usize = 150;

/// Keep alphanumerics, space, `-`, `_` and `.`, trim, and cap at
/// [`MAX_NAME_BYTES`] on a character boundary.
///
/// An empty result falls back to `document-<id>`.
pub fn sanitize_filename(name: &str, id: i64) -> String {
    sanitize(name).unwrap_or_else(|| format!("document-{id}"))
}

/// Same rules as [`sanitize_filename`], falling back to `folder-<id>`.
pub fn sanitize_folder_name(name: &str, id: i64) -> String {
    sanitize(name).unwrap_or_else(|| format!("folder-{id}"))
}

fn sanitize(name: &str) -> Option<String> {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
        .collect();
    let trimmed = truncate_bytes(kept.trim(), MAX_NAME_BYTES).trim_end();
    // "." and ".." are not usable path segments
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn truncate_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
