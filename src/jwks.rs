// ABOUTME: Signing-key lifecycle management with JWKS publication for RS256 bearer tokens
// ABOUTME: Loads PEM key pairs, rotates on schedule, and keeps every historical key verifiable
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Async-IO.org

//! JWKS (JSON Web Key Set) Management
//!
//! This module owns the set of RSA signing key pairs:
//! - startup loading from a configured key directory (PEM pairs), with a
//!   generated development key as an explicitly opted-in fallback
//! - scheduled rotation that adds a fresh active key and never discards old
//!   ones, so tokens signed before a rotation stay verifiable
//! - the public JWKS document for relying parties
//!
//! ## Security Model
//!
//! - Private keys never leave the server
//! - Public keys distributed via `/.well-known/jwks.json`
//! - Verification resolves keys strictly by `kid`; no trial verification
//!
//! ## Concurrency Model
//!
//! Readers observe an immutable [`KeyRing`] snapshot behind an `Arc`.
//! Rotation builds the successor ring off-lock and publishes it with a single
//! pointer swap, so a reader sees either the old ring or the new one, never a
//! half-updated view, and signing calls pick up a new active key the instant
//! rotation completes.

use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::{
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey},
    RsaPrivateKey, RsaPublicKey,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::constants::keys::RSA_KEY_SIZE;
use crate::errors::{AuthError, AuthResult};

/// JWK (JSON Web Key) representation for the JWKS endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type (always "RSA" for RS256)
    pub kty: String,
    /// Public key use (always "sig" for signature)
    #[serde(rename = "use")]
    pub key_use: String,
    /// Key ID for rotation tracking
    pub kid: String,
    /// Algorithm (RS256)
    pub alg: String,
    /// RSA modulus (base64url encoded, unsigned big-endian)
    pub n: String,
    /// RSA exponent (base64url encoded, unsigned big-endian)
    pub e: String,
}

/// JWKS (JSON Web Key Set) container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// Array of public keys
    pub keys: Vec<JsonWebKey>,
}

/// RSA key pair with metadata
#[derive(Clone)]
pub struct RsaKeyPair {
    /// Unique key identifier
    pub kid: String,
    /// Private key for signing
    pub private_key: RsaPrivateKey,
    /// Public key for verification
    pub public_key: RsaPublicKey,
    /// Key creation timestamp
    pub created_at: DateTime<Utc>,
}

impl RsaKeyPair {
    /// Generate a new RSA key pair at the configured production key size
    ///
    /// # Errors
    /// Returns error if key generation fails
    pub fn generate(kid: &str) -> AuthResult<Self> {
        Self::generate_with_key_size(kid, RSA_KEY_SIZE)
    }

    /// Generate an RSA key pair with a configurable key size.
    ///
    /// Smaller sizes are useful for fast test execution.
    ///
    /// # Errors
    /// Returns error if key generation fails
    pub fn generate_with_key_size(kid: &str, key_size_bits: usize) -> AuthResult<Self> {
        use rand::rngs::OsRng;

        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, key_size_bits)
            .map_err(|e| AuthError::Internal(format!("failed to generate RSA key: {e}")))?;
        let public_key = RsaPublicKey::from(&private_key);

        Ok(Self {
            kid: kid.to_string(),
            private_key,
            public_key,
            created_at: Utc::now(),
        })
    }

    /// Parse a key pair from its PEM halves.
    ///
    /// The public half is parsed (not merely derived) so a mismatched or
    /// corrupt `.pub.pem` fails the pair instead of silently shadowing it.
    ///
    /// # Errors
    /// Returns error if either PEM fails to parse
    pub fn from_pem_pair(kid: &str, private_pem: &str, public_pem: &str) -> AuthResult<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_pem)
            .map_err(|e| AuthError::Malformed(format!("private key PEM: {e}")))?;
        let public_key = RsaPublicKey::from_public_key_pem(public_pem)
            .map_err(|e| AuthError::Malformed(format!("public key PEM: {e}")))?;

        Ok(Self {
            kid: kid.to_string(),
            private_key,
            public_key,
            created_at: Utc::now(),
        })
    }

    /// Convert the public key to JWK format
    ///
    /// # Errors
    /// Returns error if key serialization fails
    pub fn to_jwk(&self) -> AuthResult<JsonWebKey> {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        use rsa::traits::PublicKeyParts;

        let n_bytes = self.public_key.n().to_bytes_be();
        let e_bytes = self.public_key.e().to_bytes_be();

        Ok(JsonWebKey {
            kty: "RSA".to_string(),
            key_use: "sig".to_string(),
            kid: self.kid.clone(),
            alg: "RS256".to_string(),
            n: URL_SAFE_NO_PAD.encode(&n_bytes),
            e: URL_SAFE_NO_PAD.encode(&e_bytes),
        })
    }

    /// Export the private key as PKCS#8 PEM
    ///
    /// # Errors
    /// Returns error if PEM encoding fails
    pub fn export_private_key_pem(&self) -> AuthResult<String> {
        self.private_key
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| AuthError::Internal(format!("failed to export private key: {e}")))
    }

    /// Export the public key as SPKI PEM
    ///
    /// # Errors
    /// Returns error if PEM encoding fails
    pub fn export_public_key_pem(&self) -> AuthResult<String> {
        self.public_key
            .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
            .map_err(|e| AuthError::Internal(format!("failed to export public key: {e}")))
    }

    /// Get the encoding key for JWT signing
    ///
    /// # Panics
    /// Panics if PEM export or encoding key creation fails (should never
    /// happen with valid RSA keys)
    #[must_use]
    pub fn encoding_key(&self) -> EncodingKey {
        let pem = self
            .export_private_key_pem()
            .expect("Failed to export private key");
        EncodingKey::from_rsa_pem(pem.as_bytes()).expect("Failed to create encoding key")
    }

    /// Get the decoding key for JWT verification
    ///
    /// # Panics
    /// Panics if PEM export or decoding key creation fails (should never
    /// happen with valid RSA keys)
    #[must_use]
    pub fn decoding_key(&self) -> DecodingKey {
        let pem = self
            .export_public_key_pem()
            .expect("Failed to export public key");
        DecodingKey::from_rsa_pem(pem.as_bytes()).expect("Failed to create decoding key")
    }
}

/// Immutable snapshot of every key known to the manager.
///
/// Shared behind an `Arc`; rotation replaces the whole ring rather than
/// mutating it in place.
pub struct KeyRing {
    keys: HashMap<String, Arc<RsaKeyPair>>,
    active_kid: String,
}

impl KeyRing {
    fn single(pair: RsaKeyPair) -> Self {
        let active_kid = pair.kid.clone();
        let mut keys = HashMap::new();
        keys.insert(active_kid.clone(), Arc::new(pair));
        Self { keys, active_kid }
    }
}

/// JWKS manager for signing-key lifecycle management
pub struct JwksManager {
    ring: RwLock<Arc<KeyRing>>,
    key_size: usize,
}

impl JwksManager {
    /// Initialize from configuration: load the key directory if one is set,
    /// otherwise fall back to a generated development key when allowed.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no usable key exists and generated
    /// keys are disallowed - the service must not start without a signing key.
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        Self::initialize(
            config.key_dir.as_deref(),
            config.allow_generated_keys,
            RSA_KEY_SIZE,
        )
    }

    /// Initialize with explicit parameters; `key_size_bits` lets tests use
    /// smaller (faster) keys.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no usable key exists and generated
    /// keys are disallowed.
    pub fn initialize(
        key_dir: Option<&Path>,
        allow_generated_keys: bool,
        key_size_bits: usize,
    ) -> AuthResult<Self> {
        let mut keys: HashMap<String, Arc<RsaKeyPair>> = HashMap::new();

        if let Some(dir) = key_dir {
            for pair in load_key_dir(dir) {
                keys.insert(pair.kid.clone(), Arc::new(pair));
            }
        }

        if keys.is_empty() {
            if !allow_generated_keys {
                return Err(AuthError::Config(
                    "no signing keys found and generated keys are disallowed; \
                     provide a key directory"
                        .to_string(),
                ));
            }
            let kid = Uuid::new_v4().to_string();
            let pair = RsaKeyPair::generate_with_key_size(&kid, key_size_bits)?;
            tracing::warn!(kid = %kid, "No signing keys configured, generated a development key");
            return Ok(Self {
                ring: RwLock::new(Arc::new(KeyRing::single(pair))),
                key_size: key_size_bits,
            });
        }

        // Deterministic pick among loaded keys; rotation will supersede it.
        let mut kids: Vec<&String> = keys.keys().collect();
        kids.sort();
        let active_kid = (*kids[kids.len() - 1]).clone();
        tracing::info!(
            count = keys.len(),
            active = %active_kid,
            "Loaded signing keys from key directory"
        );

        Ok(Self {
            ring: RwLock::new(Arc::new(KeyRing { keys, active_kid })),
            key_size: key_size_bits,
        })
    }

    /// Current snapshot of the key ring
    fn snapshot(&self) -> Arc<KeyRing> {
        self.ring
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// The pair currently used for signing new bearer tokens.
    ///
    /// # Panics
    /// Panics if the ring invariant (active kid always present) is broken,
    /// which construction and rotation make unreachable.
    #[must_use]
    pub fn active_key(&self) -> Arc<RsaKeyPair> {
        let ring = self.snapshot();
        ring.keys
            .get(&ring.active_kid)
            .cloned()
            .expect("active signing key present after initialization")
    }

    /// Resolve a verification key by its identifier
    #[must_use]
    pub fn get_key(&self, kid: &str) -> Option<Arc<RsaKeyPair>> {
        self.snapshot().keys.get(kid).cloned()
    }

    /// Identifiers of every key this manager has ever published
    #[must_use]
    pub fn kids(&self) -> Vec<String> {
        self.snapshot().keys.keys().cloned().collect()
    }

    /// Snapshot of every known public key, keyed by identifier. Verifiers
    /// that cache keys out-of-process should prefer the JWKS document.
    #[must_use]
    pub fn public_keys_by_id(&self) -> HashMap<String, RsaPublicKey> {
        self.snapshot()
            .keys
            .iter()
            .map(|(kid, pair)| (kid.clone(), pair.public_key.clone()))
            .collect()
    }

    /// Generate a new key pair, make it the active signing key, and keep all
    /// previous keys available for verification. Returns the new `kid`.
    ///
    /// Runs on the rotation timer; readers are never blocked while the
    /// replacement ring is generated.
    ///
    /// # Errors
    /// Returns error if key generation fails
    pub fn rotate(&self) -> AuthResult<String> {
        let kid = Uuid::new_v4().to_string();
        let pair = RsaKeyPair::generate_with_key_size(&kid, self.key_size)?;

        // Clone the current ring outside the write lock; the lock is held
        // only for the pointer swap.
        let current = self.snapshot();
        let mut keys = current.keys.clone();
        keys.insert(kid.clone(), Arc::new(pair));
        let next = Arc::new(KeyRing {
            keys,
            active_kid: kid.clone(),
        });

        *self
            .ring
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = next;

        tracing::info!(kid = %kid, "Rotated signing key");
        Ok(kid)
    }

    /// JWKS document covering every known public key
    ///
    /// # Errors
    /// Returns error if JWK conversion fails
    pub fn get_jwks(&self) -> AuthResult<JsonWebKeySet> {
        let ring = self.snapshot();
        let mut keys = Vec::with_capacity(ring.keys.len());
        for pair in ring.keys.values() {
            keys.push(pair.to_jwk()?);
        }
        Ok(JsonWebKeySet { keys })
    }

    /// JWKS document serialized for the discovery endpoint
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn get_jwks_json(&self) -> AuthResult<String> {
        let jwks = self.get_jwks()?;
        serde_json::to_string_pretty(&jwks)
            .map_err(|e| AuthError::Internal(format!("failed to serialize JWKS: {e}")))
    }
}

/// Load every usable `<kid>.pem` / `<kid>.pub.pem` pair from a directory.
///
/// Individual bad files are skipped with a warning; the caller decides whether
/// an empty result is fatal.
fn load_key_dir(dir: &Path) -> Vec<RsaKeyPair> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), "Failed to read key directory: {e}");
            return Vec::new();
        }
    };

    let mut pairs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".pem") || name.ends_with(".pub.pem") {
            continue;
        }
        let kid = name.trim_end_matches(".pem").to_string();
        let public_path = dir.join(format!("{kid}.pub.pem"));
        if !public_path.exists() {
            tracing::warn!(kid = %kid, "Skipping key without a public half");
            continue;
        }

        let read_pair = || -> AuthResult<RsaKeyPair> {
            let private_pem = std::fs::read_to_string(&path)
                .map_err(|e| AuthError::Internal(format!("key file read failed: {e}")))?;
            let public_pem = std::fs::read_to_string(&public_path)
                .map_err(|e| AuthError::Internal(format!("key file read failed: {e}")))?;
            RsaKeyPair::from_pem_pair(&kid, &private_pem, &public_pem)
        };

        match read_pair() {
            Ok(pair) => pairs.push(pair),
            Err(e) => tracing::warn!(kid = %kid, "Skipping malformed key pair: {e}"),
        }
    }
    pairs
}
