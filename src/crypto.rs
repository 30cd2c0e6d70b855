// ABOUTME: One-way digests and secret generation for opaque credentials
// ABOUTME: Secrets are handed to callers once; only SHA-256 digests are stored
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Digest and entropy utilities.
//!
//! Opaque tokens are never persisted in plaintext: the store keeps a SHA-256
//! hex digest and compares digests on lookup. A given secret maps to exactly
//! one digest, so the digest column doubles as the lookup key.

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::constants::entropy::OPAQUE_SECRET_BYTES;

/// Lowercase hex SHA-256 digest of `input`
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a fresh opaque-token secret: 48 random bytes, hex-encoded
#[must_use]
pub fn generate_opaque_secret() -> String {
    let mut bytes = [0u8; OPAQUE_SECRET_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
