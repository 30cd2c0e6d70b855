// ABOUTME: Background timers - scheduled key rotation and the token retention sweep
// ABOUTME: Each task is failure-isolated; a failed tick is logged and retried next interval
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Async-IO.org

//! # Background Lifecycle Tasks
//!
//! Two periodic jobs run decoupled from request handling:
//!
//! - **Key rotation**: on a fixed schedule, generates a fresh signing key and
//!   makes it active. A failed rotation keeps the current key and retries at
//!   the next tick - request paths are never affected.
//! - **Retention sweep**: bulk-deletes dead token rows older than the
//!   retention window. Idempotent and time-boxed; a failed sweep only delays
//!   cleanup.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::jwks::JwksManager;
use crate::tokens::TokenStore;

/// Spawn the scheduled key rotation task
pub fn spawn_key_rotation(
    jwks: Arc<JwksManager>,
    rotation_interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(rotation_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so startup does not
        // rotate a freshly loaded key.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match jwks.rotate() {
                Ok(kid) => tracing::info!(kid = %kid, "Scheduled key rotation complete"),
                Err(e) => tracing::error!("Scheduled key rotation failed: {e}"),
            }
        }
    })
}

/// Spawn the token retention sweep task
pub fn spawn_retention_sweep(
    store: TokenStore,
    sweep_interval_secs: u64,
    retention_secs: i64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(sweep_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.sweep(retention_secs).await {
                Ok(deleted) => {
                    tracing::debug!(deleted, "Retention sweep tick complete");
                }
                Err(e) => tracing::error!("Retention sweep failed: {e}"),
            }
        }
    })
}
