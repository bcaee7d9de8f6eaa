// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! InfoGarden - Organization Export Service
//!
//! Background exports of an organization's documents, contacts and
//! credentials into a single ZIP archive, and authenticated encryption of
//! stored credential secrets.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `crypto` - AES-256-GCM credential encryption
//! - `export` - Export jobs: orchestration, workers, retention
//! - `render` - Markdown, PDF, DOCX and RTF renderers
//! - `storage` - Organization records and the export ledger (redb)

pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod export;
pub mod render;
pub mod state;
pub mod storage;
