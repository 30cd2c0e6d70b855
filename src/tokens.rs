// ABOUTME: Opaque token store - issuance, validation, one-way consumption, rotation, revocation
// ABOUTME: Stores digests only; the conditional UPDATE in the database arbitrates consumption races
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Opaque Token Store
//!
//! Single-purpose random secrets validated by their server-side digest. Each
//! token moves through `ISSUED -> CONSUMED | REVOKED | EXPIRED`, and no
//! transition ever leaves a terminal state.
//!
//! Consumption is at-most-once: two racing `validate_and_consume` calls on
//! the same secret may both read a live row, but the conditional revoke in
//! the store lets exactly one of them claim the transition; the loser sees
//! [`AuthError::Revoked`].
//!
//! Expiry is detected lazily on the read path: finding an expired row marks
//! it revoked before the error is reported. That write is an optimization,
//! not a correctness requirement - liveness always compares timestamps
//! directly.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::config::TokenTtlConfig;
use crate::crypto::{generate_opaque_secret, sha256_hex};
use crate::database::Database;
use crate::errors::{AuthError, AuthResult};
use crate::models::{OpaqueToken, TokenKind};

/// Store for opaque single-purpose tokens
#[derive(Clone)]
pub struct TokenStore {
    db: Database,
    ttls: TokenTtlConfig,
}

impl TokenStore {
    /// Create a store over the given database with per-kind default TTLs
    #[must_use]
    pub const fn new(db: Database, ttls: TokenTtlConfig) -> Self {
        Self { db, ttls }
    }

    // ── Issuance ────────────────────────────────────────────────────────

    /// Issue a token of `kind` for `owner_id` valid for `ttl_secs`.
    ///
    /// Returns the plaintext secret exactly once; only its digest is stored.
    /// Delivering the secret (URL, SMS, ...) is the caller's concern.
    ///
    /// # Errors
    ///
    /// Returns a database error if the row cannot be written.
    pub async fn issue(
        &self,
        owner_id: Uuid,
        kind: TokenKind,
        ttl_secs: i64,
    ) -> AuthResult<String> {
        let secret = generate_opaque_secret();
        let digest = sha256_hex(&secret);
        let expires_at = Utc::now() + Duration::seconds(ttl_secs);

        self.db
            .insert_token(&digest, kind, owner_id, expires_at)
            .await?;

        tracing::debug!(%owner_id, kind = %kind, "Issued opaque token");
        Ok(secret)
    }

    /// Issue a refresh token with the configured default TTL
    ///
    /// # Errors
    /// Returns a database error if the row cannot be written.
    pub async fn issue_refresh(&self, owner_id: Uuid) -> AuthResult<String> {
        self.issue(owner_id, TokenKind::Refresh, self.ttls.refresh_secs)
            .await
    }

    /// Issue an email verification token with the configured default TTL
    ///
    /// # Errors
    /// Returns a database error if the row cannot be written.
    pub async fn issue_email_verification(&self, owner_id: Uuid) -> AuthResult<String> {
        self.issue(
            owner_id,
            TokenKind::EmailVerification,
            self.ttls.email_verification_secs,
        )
        .await
    }

    /// Issue a password reset token with the configured default TTL
    ///
    /// # Errors
    /// Returns a database error if the row cannot be written.
    pub async fn issue_password_reset(&self, owner_id: Uuid) -> AuthResult<String> {
        self.issue(
            owner_id,
            TokenKind::PasswordReset,
            self.ttls.password_reset_secs,
        )
        .await
    }

    /// Issue a phone OTP with the configured default TTL
    ///
    /// # Errors
    /// Returns a database error if the row cannot be written.
    pub async fn issue_phone_otp(&self, owner_id: Uuid) -> AuthResult<String> {
        self.issue(owner_id, TokenKind::PhoneOtp, self.ttls.phone_otp_secs)
            .await
    }

    /// Issue an account restore token with the configured default TTL
    ///
    /// # Errors
    /// Returns a database error if the row cannot be written.
    pub async fn issue_account_restore(&self, owner_id: Uuid) -> AuthResult<String> {
        self.issue(
            owner_id,
            TokenKind::AccountRestore,
            self.ttls.account_restore_secs,
        )
        .await
    }

    // ── Validation and consumption ──────────────────────────────────────

    /// Validate a secret without consuming it.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotFound`] when no row matches the digest (and kind)
    /// - [`AuthError::Revoked`] when the row is revoked or already consumed
    /// - [`AuthError::Expired`] when past `expires_at`; the row is
    ///   opportunistically marked revoked before the error is reported
    pub async fn validate(
        &self,
        secret: &str,
        expected_kind: Option<TokenKind>,
    ) -> AuthResult<OpaqueToken> {
        let digest = sha256_hex(secret);
        let token = self
            .db
            .find_token_by_digest(&digest, expected_kind)
            .await?
            .ok_or(AuthError::NotFound)?;

        if token.revoked {
            return Err(AuthError::Revoked);
        }
        if token.is_expired_at(Utc::now()) {
            // Lazy cleanup; idempotent, and a failure here only delays the
            // retention sweep.
            let _ = self.db.consume_token_by_digest(&digest).await;
            return Err(AuthError::Expired);
        }

        Ok(token)
    }

    /// Validate a secret and atomically consume it.
    ///
    /// At most one caller ever receives the token for a given secret; a
    /// concurrent caller that loses the revoke race gets
    /// [`AuthError::Revoked`].
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Self::validate`].
    pub async fn validate_and_consume(
        &self,
        secret: &str,
        expected_kind: Option<TokenKind>,
    ) -> AuthResult<OpaqueToken> {
        let token = self.validate(secret, expected_kind).await?;

        // The conditional UPDATE is the single point of truth for the race:
        // whoever flips revoked first wins.
        let won = self.db.consume_token_by_digest(&token.digest).await?;
        if !won {
            return Err(AuthError::Revoked);
        }

        tracing::debug!(owner_id = %token.owner_id, kind = %token.kind, "Consumed opaque token");
        Ok(token)
    }

    /// Rotate a refresh token: consume the old secret and issue a new one
    /// for the same owner. Refresh tokens are always single-use; replaying an
    /// already-rotated secret fails with [`AuthError::Revoked`].
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Self::validate`], plus a database error if the
    /// replacement cannot be written.
    pub async fn rotate_refresh(&self, old_secret: &str, ttl_secs: i64) -> AuthResult<String> {
        let old = self
            .validate_and_consume(old_secret, Some(TokenKind::Refresh))
            .await?;
        self.issue(old.owner_id, TokenKind::Refresh, ttl_secs).await
    }

    // ── Revocation ──────────────────────────────────────────────────────

    /// Best-effort revocation by plaintext secret; unknown secrets are a no-op
    ///
    /// # Errors
    /// Returns a database error if the update fails.
    pub async fn revoke(&self, secret: &str) -> AuthResult<()> {
        let digest = sha256_hex(secret);
        self.db.consume_token_by_digest(&digest).await?;
        Ok(())
    }

    /// Revoke every live token for an owner, across all kinds.
    ///
    /// Used on logout, password change, account disable, and deletion.
    /// Returns the number of rows transitioned.
    ///
    /// # Errors
    /// Returns a database error if the bulk update fails.
    pub async fn revoke_all_for_owner(&self, owner_id: Uuid) -> AuthResult<u64> {
        let revoked = self.db.revoke_all_for_owner(owner_id, None).await?;
        tracing::info!(%owner_id, revoked, "Revoked all tokens for owner");
        Ok(revoked)
    }

    /// Revoke only the owner's ACCESS entries, invalidating bearer sessions
    /// while leaving in-flight reset/verification tokens intact.
    ///
    /// # Errors
    /// Returns a database error if the bulk update fails.
    pub async fn revoke_all_access_for_owner(&self, owner_id: Uuid) -> AuthResult<u64> {
        let revoked = self
            .db
            .revoke_all_for_owner(owner_id, Some(TokenKind::Access))
            .await?;
        tracing::info!(%owner_id, revoked, "Revoked access entries for owner");
        Ok(revoked)
    }

    // ── Bearer companion entries ────────────────────────────────────────

    /// Record the companion ACCESS entry for a freshly issued bearer token,
    /// keyed by the bearer's `jti`.
    ///
    /// # Errors
    /// Returns a database error if the row cannot be written.
    pub async fn create_access_entry(
        &self,
        owner_id: Uuid,
        token_id: &str,
        ttl_secs: i64,
    ) -> AuthResult<()> {
        let digest = sha256_hex(token_id);
        let expires_at = Utc::now() + Duration::seconds(ttl_secs);
        self.db
            .insert_token(&digest, TokenKind::Access, owner_id, expires_at)
            .await?;
        Ok(())
    }

    /// Whether the ACCESS entry for `token_id` is live. Backs the bearer
    /// revocation check: a bearer whose companion entry is missing, revoked,
    /// or expired must be treated as invalid even with a good signature.
    ///
    /// # Errors
    /// Returns a database error if the lookup fails.
    pub async fn is_access_valid(&self, token_id: &str) -> AuthResult<bool> {
        let digest = sha256_hex(token_id);
        let Some(token) = self
            .db
            .find_token_by_digest(&digest, Some(TokenKind::Access))
            .await?
        else {
            return Ok(false);
        };
        Ok(token.is_live_at(Utc::now()))
    }

    /// Revoke the ACCESS entry for one bearer token (server-side logout of a
    /// single session)
    ///
    /// # Errors
    /// Returns a database error if the update fails.
    pub async fn revoke_access_by_token_id(&self, token_id: &str) -> AuthResult<()> {
        let digest = sha256_hex(token_id);
        self.db.consume_token_by_digest(&digest).await?;
        Ok(())
    }

    // ── Queries and maintenance ─────────────────────────────────────────

    /// Live refresh tokens currently issued to an owner (diagnostic surface)
    ///
    /// # Errors
    /// Returns a database error if the lookup fails.
    pub async fn find_valid_refresh_tokens_for_owner(
        &self,
        owner_id: Uuid,
    ) -> AuthResult<Vec<OpaqueToken>> {
        let now = Utc::now();
        let tokens = self.db.find_tokens_for_owner(owner_id).await?;
        Ok(tokens
            .into_iter()
            .filter(|t| t.kind == TokenKind::Refresh && t.is_live_at(now))
            .collect())
    }

    /// Retention sweep: delete rows that are dead (revoked or expired) and
    /// last touched longer than `retention_secs` ago. Bulk, idempotent, and
    /// safe to run on any schedule alongside live validation traffic.
    /// Returns the number of rows removed.
    ///
    /// # Errors
    /// Returns a database error if the bulk delete fails.
    pub async fn sweep(&self, retention_secs: i64) -> AuthResult<u64> {
        let now = Utc::now();
        let cutoff = now - Duration::seconds(retention_secs);
        let deleted = self.db.delete_expired_or_revoked_before(now, cutoff).await?;
        if deleted > 0 {
            tracing::info!(deleted, "Retention sweep removed dead token rows");
        }
        Ok(deleted)
    }
}
