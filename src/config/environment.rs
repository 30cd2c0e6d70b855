// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses environment variables into typed runtime configuration with sane defaults
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Environment-based configuration management.
//!
//! Every recognized option has a default suitable for development; production
//! deployments override through the environment. Unparseable values fall back
//! to the default with a warning rather than aborting startup - the single
//! fatal configuration condition lives in key loading (no usable signing keys
//! with generation disallowed).

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::warn;

use crate::constants::{admission, cleanup, keys, service, ttl};

/// Top-level server configuration assembled from the environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP port for the read-only endpoints (JWKS, health)
    pub http_port: u16,
    /// Database connection string (SQLite URL)
    pub database_url: String,
    /// Log level passed to the tracing subscriber
    pub log_level: String,
    /// Bearer token and signing-key settings
    pub auth: AuthConfig,
    /// Per-kind opaque token TTLs
    pub token_ttls: TokenTtlConfig,
    /// Admission-control thresholds
    pub admission: AdmissionConfig,
    /// Retention sweep settings
    pub cleanup: CleanupConfig,
}

/// Bearer token issuance and key lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token lifetime in seconds
    pub token_ttl_secs: i64,
    /// Issuer string stamped into bearer tokens
    pub issuer: String,
    /// Directory holding `<kid>.pem` / `<kid>.pub.pem` signing key pairs
    pub key_dir: Option<PathBuf>,
    /// Whether a missing key directory may be papered over with a generated
    /// development key. Must be false in production.
    pub allow_generated_keys: bool,
    /// Seconds between scheduled key rotations
    pub rotation_interval_secs: u64,
}

/// Default TTLs per opaque token kind, in seconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenTtlConfig {
    /// Refresh token lifetime
    pub refresh_secs: i64,
    /// Email verification token lifetime
    pub email_verification_secs: i64,
    /// Password reset token lifetime
    pub password_reset_secs: i64,
    /// Phone OTP lifetime
    pub phone_otp_secs: i64,
    /// Account restore token lifetime
    pub account_restore_secs: i64,
}

/// Admission-control window thresholds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Per-IP window: maximum requests
    pub ip_max_requests: u32,
    /// Per-IP window length in seconds
    pub ip_window_secs: i64,
    /// Per-identifier (email/phone) window: maximum requests
    pub identifier_max_requests: u32,
    /// Per-identifier window length in seconds
    pub identifier_window_secs: i64,
}

/// Retention sweep settings for dead opaque-token rows
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// How long dead rows are retained before deletion, in seconds
    pub retention_secs: i64,
    /// Seconds between sweeps
    pub sweep_interval_secs: u64,
}

impl ServerConfig {
    /// Assemble configuration from the environment.
    ///
    /// # Errors
    ///
    /// Currently infallible beyond type defaults; returns `Result` so future
    /// hard-required options keep the same signature.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            http_port: env_or("AUTH_HTTP_PORT", 8443),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./data/pierre-auth.db".to_string()),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            auth: AuthConfig {
                token_ttl_secs: env_or("AUTH_JWT_EXPIRES_IN", ttl::ACCESS_SECS),
                issuer: env::var("AUTH_JWT_ISSUER")
                    .unwrap_or_else(|_| service::DEFAULT_ISSUER.to_string()),
                key_dir: env::var("AUTH_JWT_KEY_DIR").ok().filter(|v| !v.is_empty()).map(PathBuf::from),
                allow_generated_keys: env_or("AUTH_JWT_ALLOW_DEV_KEYS", true),
                rotation_interval_secs: env_or(
                    "AUTH_JWT_ROTATE_SECS",
                    keys::ROTATION_INTERVAL_SECS,
                ),
            },
            token_ttls: TokenTtlConfig {
                refresh_secs: env_or("AUTH_REFRESH_EXPIRES_IN", ttl::REFRESH_SECS),
                email_verification_secs: env_or(
                    "AUTH_EMAIL_TOKEN_EXPIRES_IN",
                    ttl::EMAIL_VERIFICATION_SECS,
                ),
                password_reset_secs: env_or(
                    "AUTH_PASSWORD_RESET_EXPIRES_IN",
                    ttl::PASSWORD_RESET_SECS,
                ),
                phone_otp_secs: env_or("AUTH_PHONE_OTP_EXPIRES_IN", ttl::PHONE_OTP_SECS),
                account_restore_secs: env_or(
                    "AUTH_ACCOUNT_RESTORE_EXPIRES_IN",
                    ttl::ACCOUNT_RESTORE_SECS,
                ),
            },
            admission: AdmissionConfig {
                ip_max_requests: env_or("AUTH_RATE_IP_MAX", admission::IP_MAX_REQUESTS),
                ip_window_secs: env_or("AUTH_RATE_IP_WINDOW_SECS", admission::IP_WINDOW_SECS),
                identifier_max_requests: env_or(
                    "AUTH_RATE_IDENTIFIER_MAX",
                    admission::IDENTIFIER_MAX_REQUESTS,
                ),
                identifier_window_secs: env_or(
                    "AUTH_RATE_IDENTIFIER_WINDOW_SECS",
                    admission::IDENTIFIER_WINDOW_SECS,
                ),
            },
            cleanup: CleanupConfig {
                retention_secs: env_or("AUTH_TOKEN_RETENTION_SECS", cleanup::RETENTION_SECS),
                sweep_interval_secs: env_or(
                    "AUTH_TOKEN_SWEEP_INTERVAL_SECS",
                    cleanup::SWEEP_INTERVAL_SECS,
                ),
            },
        })
    }
}

impl Default for TokenTtlConfig {
    fn default() -> Self {
        Self {
            refresh_secs: ttl::REFRESH_SECS,
            email_verification_secs: ttl::EMAIL_VERIFICATION_SECS,
            password_reset_secs: ttl::PASSWORD_RESET_SECS,
            phone_otp_secs: ttl::PHONE_OTP_SECS,
            account_restore_secs: ttl::ACCOUNT_RESTORE_SECS,
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            ip_max_requests: admission::IP_MAX_REQUESTS,
            ip_window_secs: admission::IP_WINDOW_SECS,
            identifier_max_requests: admission::IDENTIFIER_MAX_REQUESTS,
            identifier_window_secs: admission::IDENTIFIER_WINDOW_SECS,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            retention_secs: cleanup::RETENTION_SECS,
            sweep_interval_secs: cleanup::SWEEP_INTERVAL_SECS,
        }
    }
}

/// Read an environment variable and parse it, falling back to `default` with
/// a warning when absent or unparseable.
fn env_or<T: std::str::FromStr + std::fmt::Display + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Invalid value for {name}: {raw:?}, using default {default}");
            default
        }),
        Err(_) => default,
    }
}
