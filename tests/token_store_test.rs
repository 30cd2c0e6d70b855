// ABOUTME: Integration tests for the opaque token store
// ABOUTME: One-way consumption, refresh rotation, bulk revocation, access entries, retention sweep
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
async fn test_issue_and_validate() {
    let (_db, store) = common::test_token_store().await;
    let owner = Uuid::new_v4();

    let secret = store.issue(owner, TokenKind::Refresh, 3600).await.unwrap();
    // 48 bytes of entropy, hex-encoded
    assert_eq!(secret.len(), 96);

    let token = store.validate(&secret, Some(TokenKind::Refresh)).await.unwrap();
    assert_eq!(token.owner_id, owner);
    assert_eq!(token.kind, TokenKind::Refresh);
    assert!(!token.revoked);
}

#[tokio::test]
async fn test_validate_with_wrong_kind_is_not_found() {
    let (_db, store) = common::test_token_store().await;
    let secret = store
        .issue(Uuid::new_v4(), TokenKind::Refresh, 3600)
        .await
        .unwrap();

    let result = store.validate(&secret, Some(TokenKind::PasswordReset)).await;
    assert!(matches!(result, Err(AuthError::NotFound)));
}

#[tokio::test]
async fn test_unknown_secret_is_not_found() {
    let (_db, store) = common::test_token_store().await;
    let result = store.validate("deadbeef", None).await;
    assert!(matches!(result, Err(AuthError::NotFound)));
}

#[tokio::test]
async fn test_consume_is_at_most_once() {
    let (_db, store) = common::test_token_store().await;
    let secret = store
        .issue(Uuid::new_v4(), TokenKind::Refresh, 3600)
        .await
        .unwrap();

    store
        .validate_and_consume(&secret, Some(TokenKind::Refresh))
        .await
        .unwrap();
    // The second consumption of the same secret loses.
    let second = store.validate_and_consume(&secret, Some(TokenKind::Refresh)).await;
    assert!(matches!(second, Err(AuthError::Revoked)));
    // Plain validation agrees.
    let read = store.validate(&secret, Some(TokenKind::Refresh)).await;
    assert!(matches!(read, Err(AuthError::Revoked)));
}

#[tokio::test]
async fn test_concurrent_consumption_has_single_winner() {
    let (_db, store) = common::test_token_store().await;
    let secret = store
        .issue(Uuid::new_v4(), TokenKind::PhoneOtp, 300)
        .await
        .unwrap();

    let attempts = (0..5).map(|_| {
        let store = store.clone();
        let secret = secret.clone();
        tokio::spawn(async move {
            store
                .validate_and_consume(&secret, Some(TokenKind::PhoneOtp))
                .await
        })
    });

    let mut winners = 0;
    for handle in attempts {
        if handle.await.unwrap().is_ok() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_best_effort_revoke_by_secret() {
    let (_db, store) = common::test_token_store().await;
    let secret = store
        .issue(Uuid::new_v4(), TokenKind::Refresh, 3600)
        .await
        .unwrap();

    store.revoke(&secret).await.unwrap();
    assert!(matches!(
        store.validate(&secret, Some(TokenKind::Refresh)).await,
        Err(AuthError::Revoked)
    ));

    // Revoking an unknown secret is a quiet no-op.
    store.revoke("never-issued").await.unwrap();
}

#[tokio::test]
async fn test_rotate_refresh_semantics() {
    let (_db, store) = common::test_token_store().await;
    let owner = Uuid::new_v4();
    let old = store.issue(owner, TokenKind::Refresh, 3600).await.unwrap();

    let new = store.rotate_refresh(&old, 3600).await.unwrap();
    assert_ne!(old, new);

    // The rotated-out secret is spent; the replacement is live and belongs
    // to the same owner.
    assert!(matches!(
        store.validate(&old, Some(TokenKind::Refresh)).await,
        Err(AuthError::Revoked)
    ));
    let token = store.validate(&new, Some(TokenKind::Refresh)).await.unwrap();
    assert_eq!(token.owner_id, owner);

    // Replaying rotation on the consumed secret fails as well.
    assert!(matches!(
        store.rotate_refresh(&old, 3600).await,
        Err(AuthError::Revoked)
    ));
}

#[tokio::test]
async fn test_revoke_all_for_owner_spans_kinds() {
    let (_db, store) = common::test_token_store().await;
    let owner = Uuid::new_v4();
    let other = Uuid::new_v4();

    let refresh = store.issue_refresh(owner).await.unwrap();
    let email = store.issue_email_verification(owner).await.unwrap();
    let unaffected = store.issue_refresh(other).await.unwrap();

    let revoked = store.revoke_all_for_owner(owner).await.unwrap();
    assert_eq!(revoked, 2);

    assert!(matches!(
        store.validate(&refresh, Some(TokenKind::Refresh)).await,
        Err(AuthError::Revoked)
    ));
    assert!(matches!(
        store.validate(&email, Some(TokenKind::EmailVerification)).await,
        Err(AuthError::Revoked)
    ));
    // Another owner's tokens are untouched.
    store.validate(&unaffected, Some(TokenKind::Refresh)).await.unwrap();
}

#[tokio::test]
async fn test_revoke_all_access_leaves_other_kinds_live() {
    let (_db, store) = common::test_token_store().await;
    let owner = Uuid::new_v4();

    store.create_access_entry(owner, "jti-1", 900).await.unwrap();
    let reset = store.issue_password_reset(owner).await.unwrap();

    assert!(store.is_access_valid("jti-1").await.unwrap());
    store.revoke_all_access_for_owner(owner).await.unwrap();

    assert!(!store.is_access_valid("jti-1").await.unwrap());
    // The in-flight password reset survives session invalidation.
    store.validate(&reset, Some(TokenKind::PasswordReset)).await.unwrap();
}

#[tokio::test]
async fn test_access_entry_lifecycle() {
    let (_db, store) = common::test_token_store().await;
    let owner = Uuid::new_v4();

    assert!(!store.is_access_valid("unknown-jti").await.unwrap());

    store.create_access_entry(owner, "jti-2", 900).await.unwrap();
    assert!(store.is_access_valid("jti-2").await.unwrap());

    store.revoke_access_by_token_id("jti-2").await.unwrap();
    assert!(!store.is_access_valid("jti-2").await.unwrap());

    // An expired entry is invalid even before any revocation write.
    store.create_access_entry(owner, "jti-3", -1).await.unwrap();
    assert!(!store.is_access_valid("jti-3").await.unwrap());
}

#[tokio::test]
async fn test_expired_token_is_lazily_revoked() {
    let (_db, store) = common::test_token_store().await;
    let secret = store
        .issue(Uuid::new_v4(), TokenKind::EmailVerification, -5)
        .await
        .unwrap();

    // First read detects expiry and flags the row.
    assert!(matches!(
        store.validate(&secret, Some(TokenKind::EmailVerification)).await,
        Err(AuthError::Expired)
    ));
    // Second read sees the terminal revoked state.
    assert!(matches!(
        store.validate(&secret, Some(TokenKind::EmailVerification)).await,
        Err(AuthError::Revoked)
    ));
}

#[tokio::test]
async fn test_find_valid_refresh_tokens_for_owner() {
    let (_db, store) = common::test_token_store().await;
    let owner = Uuid::new_v4();

    let live = store.issue(owner, TokenKind::Refresh, 3600).await.unwrap();
    let spent = store.issue(owner, TokenKind::Refresh, 3600).await.unwrap();
    store.validate_and_consume(&spent, Some(TokenKind::Refresh)).await.unwrap();
    // Wrong kind and expired rows don't count.
    store.issue(owner, TokenKind::PasswordReset, 3600).await.unwrap();
    store.issue(owner, TokenKind::Refresh, -1).await.unwrap();

    let valid = store.find_valid_refresh_tokens_for_owner(owner).await.unwrap();
    assert_eq!(valid.len(), 1);
    assert!(store.validate(&live, Some(TokenKind::Refresh)).await.is_ok());
}

#[tokio::test]
async fn test_retention_sweep_removes_only_old_dead_rows() {
    let (_db, store) = common::test_token_store().await;
    let owner = Uuid::new_v4();

    let expired = store.issue(owner, TokenKind::Refresh, -10).await.unwrap();
    let consumed = store.issue(owner, TokenKind::Refresh, 3600).await.unwrap();
    store.validate_and_consume(&consumed, Some(TokenKind::Refresh)).await.unwrap();
    let live = store.issue(owner, TokenKind::Refresh, 3600).await.unwrap();

    // Generous retention: dead rows are younger than the cutoff, all kept.
    assert_eq!(store.sweep(3600).await.unwrap(), 0);

    // Zero retention: both dead rows go, the live one stays.
    let deleted = store.sweep(0).await.unwrap();
    assert_eq!(deleted, 2);
    assert!(matches!(
        store.validate(&expired, Some(TokenKind::Refresh)).await,
        Err(AuthError::NotFound)
    ));
    store.validate(&live, Some(TokenKind::Refresh)).await.unwrap();

    // The sweep is idempotent.
    assert_eq!(store.sweep(0).await.unwrap(), 0);
}
