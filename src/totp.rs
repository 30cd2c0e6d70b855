// ABOUTME: Stateless TOTP generation and verification for multi-factor authentication
// ABOUTME: RFC 6238 SHA-1/6-digit codes with a configurable clock-skew window
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # TOTP Engine
//!
//! Pure functions over a base32 shared secret: generate a fresh secret,
//! verify a presented code, and build the `otpauth://` provisioning URL for
//! enrollment. Codes are the standard HMAC-SHA1, 6-digit, 30-second-period
//! variety; verification accepts any counter within `[t - skew, t + skew]`
//! to tolerate clock drift between client and server.
//!
//! Enabling MFA for a principal is a two-step ceremony owned by the caller:
//! setup hands out a secret (not yet enforced), and enablement requires one
//! valid code against that secret before authentication starts demanding it.

use rand::RngCore;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::constants::entropy::TOTP_SECRET_BYTES;
use crate::errors::{AuthError, AuthResult};

/// Standard TOTP period in seconds
pub const DEFAULT_PERIOD_SECS: u64 = 30;
/// Default clock-skew tolerance, in whole periods each direction
pub const DEFAULT_SKEW_WINDOWS: u8 = 1;
/// Code length in digits
const DIGITS: usize = 6;

/// Generate a fresh shared secret: 20 random bytes, base32 without padding
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = vec![0u8; TOTP_SECRET_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    match Secret::Raw(bytes).to_encoded() {
        Secret::Encoded(encoded) => encoded,
        // to_encoded always yields the Encoded variant
        Secret::Raw(_) => unreachable!("Secret::to_encoded returned Raw"),
    }
}

/// Verify `code` against `secret_base32` at the current time
///
/// # Errors
///
/// Returns [`AuthError::Malformed`] when the secret is not valid base32.
pub fn verify(
    secret_base32: &str,
    code: &str,
    period_secs: u64,
    skew_windows: u8,
) -> AuthResult<bool> {
    let totp = build_totp(secret_base32, period_secs, skew_windows)?;
    Ok(totp.check_current(code).unwrap_or(false))
}

/// Verify `code` at an explicit Unix timestamp; the deterministic core of
/// [`verify`], also used by tests exercising skew boundaries.
///
/// # Errors
///
/// Returns [`AuthError::Malformed`] when the secret is not valid base32.
pub fn verify_at(
    secret_base32: &str,
    code: &str,
    period_secs: u64,
    skew_windows: u8,
    timestamp: u64,
) -> AuthResult<bool> {
    let totp = build_totp(secret_base32, period_secs, skew_windows)?;
    Ok(totp.check(code, timestamp))
}

/// The code a well-behaved client derives at `timestamp`. Used by the
/// enablement ceremony's server-side self-check and by tests.
///
/// # Errors
///
/// Returns [`AuthError::Malformed`] when the secret is not valid base32.
pub fn generate_code_at(
    secret_base32: &str,
    period_secs: u64,
    timestamp: u64,
) -> AuthResult<String> {
    let totp = build_totp(secret_base32, period_secs, 0)?;
    Ok(totp.generate(timestamp))
}

/// Provisioning URL (`otpauth://totp/...`) for enrolling an authenticator app
///
/// # Errors
///
/// Returns [`AuthError::Malformed`] when the secret is not valid base32.
pub fn otpauth_url(secret_base32: &str, account: &str, issuer: &str) -> AuthResult<String> {
    let secret = decode_secret(secret_base32)?;
    let totp = TOTP::new(
        Algorithm::SHA1,
        DIGITS,
        DEFAULT_SKEW_WINDOWS,
        DEFAULT_PERIOD_SECS,
        secret,
        Some(issuer.to_string()),
        account.to_string(),
    )
    .map_err(|e| AuthError::Malformed(format!("otpauth parameters: {e}")))?;
    Ok(totp.get_url())
}

fn decode_secret(secret_base32: &str) -> AuthResult<Vec<u8>> {
    Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .map_err(|e| AuthError::Malformed(format!("TOTP secret: {e:?}")))
}

fn build_totp(secret_base32: &str, period_secs: u64, skew_windows: u8) -> AuthResult<TOTP> {
    let secret = decode_secret(secret_base32)?;
    TOTP::new(
        Algorithm::SHA1,
        DIGITS,
        skew_windows,
        period_secs,
        secret,
        None,
        String::new(),
    )
    .map_err(|e| AuthError::Malformed(format!("TOTP parameters: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_shape() {
        let secret = generate_secret();
        // 20 bytes -> 32 base32 characters, no padding
        assert_eq!(secret.len(), 32);
        assert!(secret
            .chars()
            .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c)));
        assert_ne!(secret, generate_secret());
    }

    #[test]
    fn test_correct_code_verifies() {
        let secret = generate_secret();
        let now = 1_700_000_000;
        let code = generate_code_at(&secret, DEFAULT_PERIOD_SECS, now).unwrap();
        assert!(verify_at(&secret, &code, DEFAULT_PERIOD_SECS, 1, now).unwrap());
    }

    #[test]
    fn test_wrong_code_rejected() {
        let secret = generate_secret();
        let now = 1_700_000_000;
        let code = generate_code_at(&secret, DEFAULT_PERIOD_SECS, now).unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };
        assert!(!verify_at(&secret, wrong, DEFAULT_PERIOD_SECS, 1, now).unwrap());
    }

    #[test]
    fn test_skew_boundary_tolerance() {
        let secret = generate_secret();
        // Align to a period boundary so "one full period later" is exact.
        let now = 1_700_000_010 - (1_700_000_010 % DEFAULT_PERIOD_SECS);
        let code = generate_code_at(&secret, DEFAULT_PERIOD_SECS, now).unwrap();
        let one_period_later = now + DEFAULT_PERIOD_SECS;

        // Strict clock: the previous period's code no longer matches.
        assert!(!verify_at(&secret, &code, DEFAULT_PERIOD_SECS, 0, one_period_later).unwrap());
        // One window of skew absorbs the drift.
        assert!(verify_at(&secret, &code, DEFAULT_PERIOD_SECS, 1, one_period_later).unwrap());
    }

    #[test]
    fn test_bad_secret_is_malformed() {
        let result = verify_at("not base32!!", "123456", DEFAULT_PERIOD_SECS, 1, 0);
        assert!(matches!(result, Err(AuthError::Malformed(_))));
    }

    #[test]
    fn test_otpauth_url_carries_issuer_and_account() {
        let secret = generate_secret();
        let url = otpauth_url(&secret, "user@example.com", "PierreAuth").unwrap();
        assert!(url.starts_with("otpauth://totp/"));
        assert!(url.contains("issuer=PierreAuth"));
        assert!(url.contains(&secret));
    }
}
