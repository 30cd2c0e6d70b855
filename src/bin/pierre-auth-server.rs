// ABOUTME: Server binary - wires the credential engines, admission guard, and background tasks
// ABOUTME: Serves the JWKS discovery document and health probe over HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Pierre auth service entry point

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;

use pierre_auth::admission::{BanService, RateLimiter};
use pierre_auth::config::ServerConfig;
use pierre_auth::database::Database;
use pierre_auth::jwks::JwksManager;
use pierre_auth::lifecycle;
use pierre_auth::logging;
use pierre_auth::middleware::{admission_guard, AdmissionState};
use pierre_auth::routes::{self, AppState};
use pierre_auth::tokens::TokenStore;

#[derive(Parser)]
#[command(name = "pierre-auth-server", about = "Pierre authentication service")]
struct Cli {
    /// Override the HTTP port from the environment
    #[arg(long)]
    port: Option<u16>,

    /// Override the database URL from the environment
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::from_env().context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.http_port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database_url = database_url;
    }

    logging::init_logging(&config.log_level)?;
    tracing::info!(port = config.http_port, "Starting pierre-auth-server");

    let database = Database::new(&config.database_url)
        .await
        .context("failed to open database")?;

    let jwks = Arc::new(
        JwksManager::from_config(&config.auth).context("failed to initialize signing keys")?,
    );
    let token_store = TokenStore::new(database.clone(), config.token_ttls);

    // Background timers, isolated from request handling.
    let _rotation_task =
        lifecycle::spawn_key_rotation(Arc::clone(&jwks), config.auth.rotation_interval_secs);
    let _sweep_task = lifecycle::spawn_retention_sweep(
        token_store.clone(),
        config.cleanup.sweep_interval_secs,
        config.cleanup.retention_secs,
    );

    let admission_state = Arc::new(AdmissionState::new(
        RateLimiter::new(),
        BanService::new(database),
        config.admission,
    ));

    let app = routes::router(Arc::new(AppState { jwks }))
        .layer(axum::middleware::from_fn_with_state(
            admission_state,
            admission_guard,
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
