// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for records, ledger and exports | `./data` |
//! | `STATIC_DIR` | Directory that `/static/...` images resolve against | `<DATA_DIR>/static` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `ENCRYPTION_KEY` | Credential key (base64 of 32 bytes) | Required to reveal or export secrets |
//! | `EXPORT_WORKERS` | Concurrent exports | `2` |
//! | `EXPORT_RETENTION_DAYS` | Age at which exports are swept | `30` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; HTTPS when both are set | HTTP |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable name for the static asset directory.
pub const STATIC_DIR_ENV: &str = "STATIC_DIR";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the credential encryption key.
///
/// Changing it makes every stored secret undecryptable; there is no rotation.
pub const ENCRYPTION_KEY_ENV: &str = "ENCRYPTION_KEY";

pub const EXPORT_WORKERS_ENV: &str = "EXPORT_WORKERS";
pub const EXPORT_RETENTION_DAYS_ENV: &str = "EXPORT_RETENTION_DAYS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_EXPORT_WORKERS: usize = crate::export::runner::DEFAULT_WORKERS;
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Default `RUST_LOG` filter.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("{0} and {1} must be set together")]
    Incomplete(&'static str, &'static str),
}

/// TLS certificate and key locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub static_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub encryption_key: Option<String>,
    pub export_workers: usize,
    pub retention_days: i64,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load using `lookup` to read variables. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = PathBuf::from(var(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()));
        let static_dir = var(STATIC_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("static"));

        let host = var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse(PORT_ENV, var(PORT_ENV), DEFAULT_PORT)?;
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::Invalid {
                name: HOST_ENV,
                value: host.clone(),
            })?;

        let export_workers = parse(EXPORT_WORKERS_ENV, var(EXPORT_WORKERS_ENV), DEFAULT_EXPORT_WORKERS)?;
        if export_workers == 0 {
            return Err(ConfigError::Invalid {
                name: EXPORT_WORKERS_ENV,
                value: "0".to_string(),
            });
        }
        let retention_days = parse(
            EXPORT_RETENTION_DAYS_ENV,
            var(EXPORT_RETENTION_DAYS_ENV),
            DEFAULT_RETENTION_DAYS,
        )?;

        let tls = match (var(TLS_CERT_PATH_ENV), var(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::Incomplete(TLS_CERT_PATH_ENV, TLS_KEY_PATH_ENV)),
        };

        let log_format = match var(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            data_dir,
            static_dir,
            bind_addr,
            encryption_key: var(ENCRYPTION_KEY_ENV),
            export_workers,
            retention_days,
            tls,
            log_format,
        })
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
