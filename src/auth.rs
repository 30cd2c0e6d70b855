// ABOUTME: RS256 bearer token issuance and verification with kid-strict key resolution
// ABOUTME: Stateless over the key ring; revocation rides on companion ACCESS entries
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Async-IO.org

//! # Bearer Token Issuance and Verification
//!
//! Builds and parses signed bearer tokens against the
//! [`JwksManager`](crate::jwks::JwksManager) key ring. Verification is pure
//! computation over the current snapshot and resolves the key strictly by the
//! `kid` carried in the token header - it never tries other known keys, so a
//! token cannot be laundered through key confusion.
//!
//! The verifier holds no revocation state. Callers needing revocable bearers
//! pair each issuance with an ACCESS-kind opaque entry keyed by the token's
//! `jti` (see [`crate::tokens::TokenStore::is_access_valid`]) and treat a
//! bearer as invalid when the companion entry is missing, revoked, or expired.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, decode_header, encode, Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AuthError, AuthResult};
use crate::jwks::JwksManager;

/// Claims carried in a bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal identifier)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
    /// Unique, unpredictable per-issuance token identifier
    pub jti: String,
    /// Ordered role names granted to the subject
    pub roles: Vec<String>,
}

/// A freshly signed bearer token together with the claims it asserts
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact JWS serialization handed to the caller
    pub token: String,
    /// The claims that were signed, including the generated `jti`
    pub claims: Claims,
}

/// Bearer token issuer/verifier
pub struct AuthManager {
    issuer: String,
    token_ttl_secs: i64,
}

impl AuthManager {
    /// Create a new manager with the configured issuer string and TTL
    #[must_use]
    pub fn new(issuer: impl Into<String>, token_ttl_secs: i64) -> Self {
        Self {
            issuer: issuer.into(),
            token_ttl_secs,
        }
    }

    /// Bearer token lifetime in seconds
    #[must_use]
    pub const fn token_ttl_secs(&self) -> i64 {
        self.token_ttl_secs
    }

    /// Issue a signed bearer token for `subject` carrying `roles`.
    ///
    /// Signing always uses the currently active key; the header carries its
    /// `kid`. A caller-supplied `token_id` is honored (used when the caller
    /// pre-creates the companion ACCESS entry), otherwise a fresh UUID is
    /// generated.
    ///
    /// # Errors
    ///
    /// Returns an error if JWT encoding fails.
    pub fn issue(
        &self,
        subject: &str,
        roles: &[String],
        token_id: Option<String>,
        jwks_manager: &JwksManager,
    ) -> AuthResult<IssuedToken> {
        let now = Utc::now();
        let expiry = now + Duration::seconds(self.token_ttl_secs);

        let claims = Claims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expiry.timestamp(),
            jti: token_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            roles: roles.to_vec(),
        };

        let active_key = jwks_manager.active_key();
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(active_key.kid.clone());

        let token = encode(&header, &claims, &active_key.encoding_key())
            .map_err(|e| AuthError::Internal(format!("failed to sign bearer token: {e}")))?;

        Ok(IssuedToken { token, claims })
    }

    /// Verify a bearer token and return its claims.
    ///
    /// The verification key is resolved strictly by the header `kid`:
    /// - a header that cannot be decoded, or carries no `kid`, is [`AuthError::Malformed`]
    /// - a `kid` not present in the key ring is [`AuthError::BadKey`]
    /// - a signature that fails against that one key is [`AuthError::BadSignature`]
    /// - a token past its expiry is [`AuthError::Expired`]
    ///
    /// # Errors
    ///
    /// See above; no other failure modes exist.
    pub fn verify(&self, token: &str, jwks_manager: &JwksManager) -> AuthResult<Claims> {
        let header = decode_header(token)
            .map_err(|e| AuthError::Malformed(format!("token header: {e}")))?;

        let kid = header
            .kid
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AuthError::Malformed("token header missing kid".to_string()))?;

        let key_pair = jwks_manager
            .get_key(&kid)
            .ok_or(AuthError::BadKey { kid })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        // Precise validity windows; the default 60s leeway would let a
        // just-expired token through.
        validation.leeway = 0;

        let data = decode::<Claims>(token, &key_pair.decoding_key(), &validation)
            .map_err(|e| convert_jwt_error(&e))?;

        Ok(data.claims)
    }
}

/// Map `jsonwebtoken` failures onto the crate taxonomy
fn convert_jwt_error(e: &jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;

    match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature => AuthError::BadSignature,
        ErrorKind::InvalidToken => AuthError::Malformed("token format is invalid".to_string()),
        ErrorKind::Base64(err) => AuthError::Malformed(format!("invalid base64: {err}")),
        ErrorKind::Json(err) => AuthError::Malformed(format!("invalid claims JSON: {err}")),
        ErrorKind::Utf8(err) => AuthError::Malformed(format!("invalid UTF-8: {err}")),
        _ => AuthError::BadSignature,
    }
}
