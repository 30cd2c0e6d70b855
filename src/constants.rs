// ABOUTME: Application constants and default configuration values
// ABOUTME: Central location for TTLs, limits, and service identifiers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Application-wide constants

/// Service identifiers used in token claims and logging
pub mod service {
    /// Issuer string stamped into bearer tokens
    pub const DEFAULT_ISSUER: &str = "pierre-auth";
    /// Service name for structured logging
    pub const SERVICE_NAME: &str = "pierre-auth-server";
}

/// Default validity windows, in seconds
pub mod ttl {
    /// Bearer (access) token lifetime
    pub const ACCESS_SECS: i64 = 900;
    /// Refresh token lifetime (30 days)
    pub const REFRESH_SECS: i64 = 2_592_000;
    /// Email verification token lifetime
    pub const EMAIL_VERIFICATION_SECS: i64 = 3_600;
    /// Password reset token lifetime
    pub const PASSWORD_RESET_SECS: i64 = 3_600;
    /// Phone one-time-password lifetime
    pub const PHONE_OTP_SECS: i64 = 300;
    /// Account restore token lifetime (24 hours)
    pub const ACCOUNT_RESTORE_SECS: i64 = 86_400;
}

/// Admission-control thresholds
pub mod admission {
    /// Coarse per-IP window: maximum requests
    pub const IP_MAX_REQUESTS: u32 = 30;
    /// Coarse per-IP window length in seconds
    pub const IP_WINDOW_SECS: i64 = 60;
    /// Strict per-identifier (email/phone) window: maximum requests
    pub const IDENTIFIER_MAX_REQUESTS: u32 = 5;
    /// Strict per-identifier window length in seconds
    pub const IDENTIFIER_WINDOW_SECS: i64 = 3_600;
    /// Largest request body the admission layer will buffer for inspection
    pub const MAX_BUFFERED_BODY_BYTES: usize = 64 * 1024;
}

/// Key lifecycle parameters
pub mod keys {
    /// RSA key size in bits for RS256 signing
    pub const RSA_KEY_SIZE: usize = 2048;
    /// Default interval between scheduled key rotations (24 hours)
    pub const ROTATION_INTERVAL_SECS: u64 = 86_400;
}

/// Opaque-token housekeeping
pub mod cleanup {
    /// How long dead (revoked or expired) rows are retained before deletion (7 days)
    pub const RETENTION_SECS: i64 = 604_800;
    /// Interval between retention sweeps (1 hour)
    pub const SWEEP_INTERVAL_SECS: u64 = 3_600;
}

/// Entropy sizes for generated secrets
pub mod entropy {
    /// Random bytes behind an opaque token secret
    pub const OPAQUE_SECRET_BYTES: usize = 48;
    /// Random bytes behind a TOTP shared secret
    pub const TOTP_SECRET_BYTES: usize = 20;
}
