// ABOUTME: Core data structures for opaque credentials and admission state
// ABOUTME: Row-shaped types shared between the token store and the database layer
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Data Models
//!
//! Row types for the two persisted entities: opaque tokens and bans. Bearer
//! tokens are transient and never persisted; their claims live in
//! [`crate::auth::Claims`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The single-purpose kinds an opaque token can be issued as.
///
/// All kinds share one state machine and storage shape; they differ only in
/// default TTL and the flow that issues them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    /// Companion entry for a bearer token, keyed by the bearer's `jti`
    Access,
    /// Long-lived, single-use session refresh credential
    Refresh,
    /// Email ownership proof delivered via a verification link
    EmailVerification,
    /// Password reset link credential
    PasswordReset,
    /// Short numeric-delivery credential sent over SMS
    PhoneOtp,
    /// Credential allowing a deleted account to be restored
    AccountRestore,
}

impl TokenKind {
    /// Storage representation used in the `kind` column
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "ACCESS",
            Self::Refresh => "REFRESH",
            Self::EmailVerification => "EMAIL_VERIFICATION",
            Self::PasswordReset => "PASSWORD_RESET",
            Self::PhoneOtp => "PHONE_OTP",
            Self::AccountRestore => "ACCOUNT_RESTORE",
        }
    }

    /// Parse the storage representation back into a kind
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACCESS" => Some(Self::Access),
            "REFRESH" => Some(Self::Refresh),
            "EMAIL_VERIFICATION" => Some(Self::EmailVerification),
            "PASSWORD_RESET" => Some(Self::PasswordReset),
            "PHONE_OTP" => Some(Self::PhoneOtp),
            "ACCOUNT_RESTORE" => Some(Self::AccountRestore),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of opaque-token state.
///
/// The secret handed to the caller is never stored; `digest` is its SHA-256
/// hex digest and serves as the lookup key. A row is live while it is neither
/// revoked nor past `expires_at`; every terminal transition sets `revoked`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpaqueToken {
    /// Row identifier
    pub id: i64,
    /// SHA-256 hex digest of the secret (or of the bearer `jti` for ACCESS rows)
    pub digest: String,
    /// Single-purpose kind
    pub kind: TokenKind,
    /// Principal the token was issued to
    pub owner_id: Uuid,
    /// End of the validity window
    pub expires_at: DateTime<Utc>,
    /// Row creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time; drives the retention sweep cutoff
    pub updated_at: DateTime<Utc>,
    /// Terminal flag set on consumption, revocation, or lazy expiry detection
    pub revoked: bool,
}

impl OpaqueToken {
    /// Whether the row is past its validity window at `now`.
    ///
    /// Checked directly against timestamps so a lagging `revoked` flag never
    /// makes an expired row look fresh.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Whether the row is live (not revoked, not expired) at `now`
    #[must_use]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }
}

/// A persisted ban entry.
///
/// Bans survive restarts; a ban is in force while `now < until`. Expired rows
/// are lifted (deleted) lazily the next time the key is checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ban {
    /// Row identifier
    pub id: i64,
    /// Free-form namespaced key, e.g. `IP:203.0.113.7` or `EMAIL:a@b.c`
    pub key: String,
    /// Instant the ban lapses
    pub until: DateTime<Utc>,
    /// Operator-facing reason, if one was recorded
    pub reason: Option<String>,
}

impl Ban {
    /// Whether the ban is still in force at `now`
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.until
    }
}
