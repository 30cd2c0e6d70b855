// ABOUTME: Admission middleware guarding credential-issuing endpoints
// ABOUTME: Buffers the JSON body to rate-limit by identifier, then replays it downstream
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Admission Guard
//!
//! Applied in front of the credential-issuing endpoints (registration, login,
//! refresh, password reset, email/phone verification, account restore). The
//! order is fixed: ban check, coarse per-IP window, then - only for JSON POST
//! bodies carrying an email or phone field - the stricter per-identifier
//! window. A request failing any gate is rejected here, before the credential
//! logic runs, so a limited caller never learns whether an identifier exists.
//!
//! Extracting the identifier requires reading the body, so the guard buffers
//! it fully and reinstates the buffered bytes on the request before handing
//! it downstream - the eventual handler reads the body exactly as sent.

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::admission::{keys, BanService, RateLimiter};
use crate::config::AdmissionConfig;
use crate::constants::admission::MAX_BUFFERED_BODY_BYTES;

/// Shared state for the admission guard
pub struct AdmissionState {
    /// Fixed-window counters
    pub limiter: RateLimiter,
    /// Persisted ban list
    pub bans: BanService,
    /// Window thresholds
    pub config: AdmissionConfig,
}

impl AdmissionState {
    /// Bundle the admission services for the middleware layer
    #[must_use]
    pub fn new(limiter: RateLimiter, bans: BanService, config: AdmissionConfig) -> Self {
        Self {
            limiter,
            bans,
            config,
        }
    }
}

/// Request paths that issue credentials and therefore pass the guard.
/// Everything else flows through untouched.
#[must_use]
pub fn is_protected_path(path: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "/api/v1/auth/register",
        "/api/v1/auth/login",
        "/api/v1/auth/refresh",
        "/api/v1/auth/request-password-reset",
        "/api/v1/auth/confirm-password-reset",
        "/api/v1/auth/request-email-verify",
        "/api/v1/auth/verify-email",
        "/api/v1/auth/request-phone-otp",
        "/api/v1/auth/verify-phone",
        "/api/v1/auth/request-account-restore",
        "/api/v1/auth/restore-account",
    ];
    PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Admission middleware: ban check, per-IP window, per-identifier window.
///
/// Mount with `axum::middleware::from_fn_with_state`.
pub async fn admission_guard(
    State(state): State<Arc<AdmissionState>>,
    request: Request,
    next: Next,
) -> Response {
    if !is_protected_path(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = client_ip(&request);
    let ip_key = format!("{}{ip}", keys::IP);

    match state.bans.is_banned(&ip_key).await {
        Ok(true) => return reject(StatusCode::FORBIDDEN, "banned"),
        Ok(false) => {}
        Err(e) => {
            tracing::error!("Ban lookup failed: {e}");
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "admission_unavailable");
        }
    }

    if !state.limiter.allow(
        &ip_key,
        state.config.ip_max_requests,
        state.config.ip_window_secs,
    ) {
        return reject(StatusCode::TOO_MANY_REQUESTS, "rate_limited");
    }

    // The identifier windows only apply to JSON POST payloads.
    let is_json_post = request.method() == Method::POST
        && request
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
    if !is_json_post {
        return next.run(request).await;
    }

    // Buffer the body so it can be inspected here and still read downstream.
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BUFFERED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return reject(StatusCode::PAYLOAD_TOO_LARGE, "body_too_large"),
    };

    if let Some(identifiers) = extract_identifiers(&bytes) {
        if let Some(phone) = identifiers.phone {
            let phone_key = format!("{}{phone}", keys::PHONE);
            if !state.limiter.allow(
                &phone_key,
                state.config.identifier_max_requests,
                state.config.identifier_window_secs,
            ) {
                return reject(StatusCode::TOO_MANY_REQUESTS, "rate_limited_phone");
            }
        }
        if let Some(email) = identifiers.email {
            let email_key = format!("{}{}", keys::EMAIL, email.to_lowercase());
            if !state.limiter.allow(
                &email_key,
                state.config.identifier_max_requests,
                state.config.identifier_window_secs,
            ) {
                return reject(StatusCode::TOO_MANY_REQUESTS, "rate_limited_email");
            }
        }
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    next.run(request).await
}

/// Identifiers lifted from a credential-request payload
struct PayloadIdentifiers {
    email: Option<String>,
    phone: Option<String>,
}

/// Pull email/phone fields out of the buffered JSON body. An unparseable
/// body yields nothing - the downstream handler owns payload validation.
fn extract_identifiers(bytes: &[u8]) -> Option<PayloadIdentifiers> {
    let value: Value = serde_json::from_slice(bytes).ok()?;

    let field = |name: &str| -> Option<String> {
        value
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let mut email = field("email");
    let phone = field("phone");

    // Login payloads carry a combined field; it counts as the email
    // identifier when it looks like one.
    if email.is_none() {
        if let Some(combined) = field("username_or_email_or_phone") {
            if combined.contains('@') {
                email = Some(combined);
            }
        }
    }

    Some(PayloadIdentifiers { email, phone })
}

/// Best client-IP guess: proxy headers first, then the socket address
fn client_ip(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
    {
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |info| info.0.ip().to_string())
}

fn reject(status: StatusCode, error: &str) -> Response {
    (status, Json(json!({ "error": error }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_path_matching() {
        assert!(is_protected_path("/api/v1/auth/login"));
        assert!(is_protected_path("/api/v1/auth/request-password-reset"));
        assert!(!is_protected_path("/api/v1/users/me"));
        assert!(!is_protected_path("/.well-known/jwks.json"));
    }

    #[test]
    fn test_identifier_extraction() {
        let ids =
            extract_identifiers(br#"{"email":"User@Example.com","password":"x"}"#).unwrap();
        assert_eq!(ids.email.as_deref(), Some("User@Example.com"));
        assert!(ids.phone.is_none());

        let ids = extract_identifiers(br#"{"phone":"+15551234567"}"#).unwrap();
        assert_eq!(ids.phone.as_deref(), Some("+15551234567"));
    }

    #[test]
    fn test_combined_login_field_counts_as_email() {
        let ids = extract_identifiers(
            br#"{"username_or_email_or_phone":"user@example.com","password":"x"}"#,
        )
        .unwrap();
        assert_eq!(ids.email.as_deref(), Some("user@example.com"));

        // A plain username is neither email nor phone.
        let ids =
            extract_identifiers(br#"{"username_or_email_or_phone":"someuser"}"#).unwrap();
        assert!(ids.email.is_none());
        assert!(ids.phone.is_none());
    }

    #[test]
    fn test_garbage_body_yields_no_identifiers() {
        assert!(extract_identifiers(b"not json").is_none());
    }
}
