// ABOUTME: End-to-end credential lifecycle scenarios across the engines
// ABOUTME: Refresh rotation, owner-wide revocation, and the bearer/ACCESS two-layer check
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use pierre_auth::errors::AuthError;
use pierre_auth::models::TokenKind;
use uuid::Uuid;

#[tokio::test]
async fn test_refresh_lifecycle_through_owner_revocation() {
    let (_db, store) = common::test_token_store().await;
    let owner = Uuid::new_v4();

    // Issue a refresh token and consume it exactly once.
    let refresh = store.issue_refresh(owner).await.unwrap();
    let consumed = store
        .validate_and_consume(&refresh, Some(TokenKind::Refresh))
        .await
        .unwrap();
    assert_eq!(consumed.owner_id, owner);

    // The consumed secret cannot be rotated.
    assert!(matches!(
        store.rotate_refresh(&refresh, 3600).await,
        Err(AuthError::Revoked)
    ));

    // A separately issued verification token is still live...
    let email = store.issue_email_verification(owner).await.unwrap();
    store
        .validate(&email, Some(TokenKind::EmailVerification))
        .await
        .unwrap();

    // ...until the owner-wide revocation sweeps it up too.
    store.revoke_all_for_owner(owner).await.unwrap();
    assert!(matches!(
        store.validate(&email, Some(TokenKind::EmailVerification)).await,
        Err(AuthError::Revoked)
    ));
}

#[tokio::test]
async fn test_bearer_with_access_companion_supports_server_side_logout() {
    let (_db, store) = common::test_token_store().await;
    let jwks = common::test_jwks();
    let manager = common::test_auth_manager();
    let owner = Uuid::new_v4();

    // Login flow: mint the bearer, then record its companion ACCESS entry
    // keyed by the bearer's jti.
    let issued = manager
        .issue(&owner.to_string(), &["USER".to_string()], None, &jwks)
        .unwrap();
    store
        .create_access_entry(owner, &issued.claims.jti, manager.token_ttl_secs())
        .await
        .unwrap();

    // Both layers pass for a live session.
    let claims = manager.verify(&issued.token, &jwks).unwrap();
    assert!(store.is_access_valid(&claims.jti).await.unwrap());

    // Server-side logout revokes the companion entry. The signature still
    // verifies - revocation is the opaque layer's job - but the session is
    // now invalid.
    store.revoke_all_access_for_owner(owner).await.unwrap();
    let claims = manager.verify(&issued.token, &jwks).unwrap();
    assert!(!store.is_access_valid(&claims.jti).await.unwrap());
}

#[tokio::test]
async fn test_refresh_rotation_chain_survives_key_rotation() {
    let (_db, store) = common::test_token_store().await;
    let jwks = common::test_jwks();
    let manager = common::test_auth_manager();
    let owner = Uuid::new_v4();

    // Session start: bearer + refresh.
    let first_bearer = manager
        .issue(&owner.to_string(), &["USER".to_string()], None, &jwks)
        .unwrap();
    let refresh_1 = store.issue_refresh(owner).await.unwrap();

    // Signing key rotates on schedule between refreshes.
    jwks.rotate().unwrap();

    // Refresh flow: rotate the refresh secret, mint a new bearer with the
    // now-active key.
    let refresh_2 = store.rotate_refresh(&refresh_1, 3600).await.unwrap();
    let second_bearer = manager
        .issue(&owner.to_string(), &["USER".to_string()], None, &jwks)
        .unwrap();

    // Old and new bearers both verify; the old refresh secret is spent.
    manager.verify(&first_bearer.token, &jwks).unwrap();
    manager.verify(&second_bearer.token, &jwks).unwrap();
    assert!(matches!(
        store.validate(&refresh_1, Some(TokenKind::Refresh)).await,
        Err(AuthError::Revoked)
    ));
    store.validate(&refresh_2, Some(TokenKind::Refresh)).await.unwrap();
}
