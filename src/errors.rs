// ABOUTME: Unified error taxonomy for credential and admission operations
// ABOUTME: Maps typed failures to HTTP statuses without leaking credential state
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Error Handling
//!
//! Every fallible operation in this crate surfaces one of the typed failures
//! below. Callers decide the wire-level representation; the taxonomy itself
//! never carries secrets or digest preimages.

use thiserror::Error;

/// Typed failures surfaced by the credential and admission engines
#[derive(Debug, Error)]
pub enum AuthError {
    /// Input is structurally invalid (unparseable token, bad encoding)
    #[error("malformed credential: {0}")]
    Malformed(String),

    /// No credential matches the presented secret or identifier
    #[error("credential not found")]
    NotFound,

    /// The credential's validity window has passed
    #[error("credential expired")]
    Expired,

    /// The credential was revoked or already consumed
    #[error("credential revoked")]
    Revoked,

    /// The token header names a signing key this service does not know
    #[error("unknown signing key: {kid}")]
    BadKey {
        /// Key identifier carried in the token header
        kid: String,
    },

    /// Signature verification failed against the named key
    #[error("signature verification failed")]
    BadSignature,

    /// The caller exceeded a rate-limit window; retriable after it resets
    #[error("rate limit exceeded for {key}")]
    RateLimited {
        /// Admission key that tripped the limit
        key: String,
    },

    /// The caller is on the ban list; retriable once the ban lapses
    #[error("banned: {key}")]
    Banned {
        /// Admission key the ban applies to
        key: String,
    },

    /// A time-based one-time code did not match within the skew window
    #[error("invalid one-time code")]
    InvalidCode,

    /// Backing store failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Startup or configuration problem
    #[error("configuration error: {0}")]
    Config(String),

    /// Anything else that should not reach a caller as a typed failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status a boundary layer should translate this failure into
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Malformed(_) => 400,
            Self::NotFound | Self::Expired | Self::Revoked | Self::BadSignature => 401,
            Self::BadKey { .. } => 401,
            Self::Banned { .. } => 403,
            Self::RateLimited { .. } => 429,
            Self::InvalidCode => 401,
            Self::Database(_) | Self::Config(_) | Self::Internal(_) => 500,
        }
    }

    /// Whether the caller may retry after waiting (admission failures only)
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Banned { .. })
    }
}

/// Result type alias for convenience
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(AuthError::Malformed("x".into()).http_status(), 400);
        assert_eq!(AuthError::NotFound.http_status(), 401);
        assert_eq!(AuthError::Revoked.http_status(), 401);
        assert_eq!(
            AuthError::RateLimited { key: "IP:1.2.3.4".into() }.http_status(),
            429
        );
        assert_eq!(AuthError::Banned { key: "IP:1.2.3.4".into() }.http_status(), 403);
    }

    #[test]
    fn test_retriable_split() {
        assert!(AuthError::RateLimited { key: "k".into() }.is_retriable());
        assert!(AuthError::Banned { key: "k".into() }.is_retriable());
        assert!(!AuthError::Expired.is_retriable());
        assert!(!AuthError::InvalidCode.is_retriable());
    }
}
