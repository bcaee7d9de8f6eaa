// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use infogarden_server::{
    api::router,
    config::{Config, LogFormat, DEFAULT_LOG_FILTER},
    crypto::generate_key,
    state::AppState,
};

/// Time in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    // `--generate-key` prints a fresh ENCRYPTION_KEY value and exits
    if std::env::args().skip(1).any(|arg| arg == "--generate-key") {
        println!("{}", generate_key().expect("Failed to generate key"));
        return;
    }

    let config = Config::from_env().expect("Invalid configuration");
    init_tracing(config.log_format);

    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let state = AppState::open(&config).expect("Failed to open data directory");
    if !state.exports.encryption_configured() {
        warn!("ENCRYPTION_KEY is not set; credential reveal will fail and exports will contain null secrets");
    }

    let shutdown = CancellationToken::new();
    let sweeper = state
        .exports
        .retention_sweeper()
        .with_retention_days(config.retention_days);
    let recovered = sweeper.recover_interrupted();
    if recovered > 0 {
        warn!(jobs = recovered, "Marked interrupted exports as failed");
    }
    tokio::spawn(sweeper.run(shutdown.clone()));

    let handle = Handle::new();
    {
        let handle = handle.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.cancel();
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });
    }

    let app = router(state).into_make_service();
    let addr = config.bind_addr;

    match &config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .expect("Failed to load TLS certificate and key");
            info!(%addr, "InfoGarden server listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app)
                .await
                .expect("HTTPS server failed");
        }
        None => {
            info!(%addr, "InfoGarden server listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app)
                .await
                .expect("HTTP server failed");
        }
    }

    info!("Server stopped");
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

/// Resolves on Ctrl-C. If the signal handler cannot be installed it never
/// resolves, leaving the server running.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
