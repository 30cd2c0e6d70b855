// ABOUTME: Read-only HTTP surface - key discovery document and liveness probe
// ABOUTME: Everything credential-issuing lives in the embedding application, behind the admission guard
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # HTTP Routes
//!
//! The service itself exposes only two read-only endpoints: the JWKS document
//! relying parties use to verify bearer tokens without a per-request call,
//! and a liveness probe. Credential endpoints belong to the embedding
//! application; this crate supplies the engines and the admission guard.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::sync::Arc;

use crate::jwks::JwksManager;

/// Shared route state
pub struct AppState {
    /// Key lifecycle manager backing the JWKS document
    pub jwks: Arc<JwksManager>,
}

/// Build the read-only router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/.well-known/jwks.json", get(jwks_document))
        .route("/api/health", get(health))
        .with_state(state)
}

/// Public key set for bearer-token verification
async fn jwks_document(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.jwks.get_jwks() {
        Ok(jwks) => (StatusCode::OK, Json(json!(jwks))).into_response(),
        Err(e) => {
            tracing::error!("Failed to build JWKS document: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Liveness probe
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": crate::constants::service::SERVICE_NAME }))
}
