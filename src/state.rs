// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

use std::sync::Arc;

use crate::config::Config;
use crate::crypto::SecretCipher;
use crate::export::ExportService;
use crate::storage::{ExportLedger, FileStore, LedgerError, StorageError, StoragePaths};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

#[derive(Clone)]
pub struct AppState {
    pub exports: ExportService,
}

impl AppState {
    pub fn new(exports: ExportService) -> Self {
        Self { exports }
    }

    /// Open the data directory and ledger described by `config`.
    pub fn open(config: &Config) -> Result<Self, StateError> {
        let mut store = FileStore::new(StoragePaths::new(&config.data_dir));
        store.initialize()?;
        let ledger = ExportLedger::open(&store.paths().ledger_db())?;
        let cipher = SecretCipher::new(config.encryption_key.as_deref());

        Ok(Self::new(ExportService::new(
            Arc::new(store),
            Arc::new(ledger),
            Arc::new(cipher),
            config.static_dir.clone(),
            config.export_workers,
        )))
    }

    pub fn storage(&self) -> &FileStore {
        self.exports.store()
    }
}
