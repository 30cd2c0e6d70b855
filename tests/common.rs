// ABOUTME: Shared helpers for integration tests
// ABOUTME: Small RSA keys and in-memory SQLite keep the suite fast
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)] // each test binary uses a subset of these helpers

use pierre_auth::auth::AuthManager;
use pierre_auth::config::TokenTtlConfig;
use pierre_auth::database::Database;
use pierre_auth::jwks::JwksManager;
use pierre_auth::tokens::TokenStore;

/// 2048-bit keys keep RSA generation fast in tests
pub const TEST_KEY_SIZE: usize = 2048;

/// Key manager with one generated test key
pub fn test_jwks() -> JwksManager {
    JwksManager::initialize(None, true, TEST_KEY_SIZE).expect("test key generation")
}

/// Bearer issuer/verifier with a 15 minute TTL
pub fn test_auth_manager() -> AuthManager {
    AuthManager::new("pierre-auth-test", 900)
}

/// Fresh in-memory database
pub async fn test_database() -> Database {
    Database::new("sqlite::memory:")
        .await
        .expect("in-memory database")
}

/// Token store over a fresh in-memory database with default TTLs
pub async fn test_token_store() -> (Database, TokenStore) {
    let db = test_database().await;
    let store = TokenStore::new(db.clone(), TokenTtlConfig::default());
    (db, store)
}
