// ABOUTME: Outbound notification seam for delivering opaque-token secrets
// ABOUTME: The engines only produce secrets; surrounding flows embed them in messages
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Notification Interface
//!
//! Delivery of opaque-token secrets (verification links, OTP codes) is an
//! external concern. The credential engines never send anything themselves;
//! surrounding flows take the secret they were handed and push it through
//! this seam. The no-op implementation backs tests and deployments where
//! delivery is wired elsewhere.

use async_trait::async_trait;

use crate::errors::AuthResult;

/// Outbound message delivery (email, SMS) consumed by credential flows
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `body` to `destination` under `subject`.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying channel rejects the message.
    async fn send_message(&self, destination: &str, subject: &str, body: &str) -> AuthResult<()>;
}

/// Notifier that logs instead of sending; secrets are not logged
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send_message(&self, destination: &str, subject: &str, _body: &str) -> AuthResult<()> {
        tracing::info!(destination, subject, "Notification suppressed (noop notifier)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_notifier_accepts_messages() {
        let notifier = NoopNotifier;
        notifier
            .send_message("user@example.com", "Verify your email", "https://example.com/x")
            .await
            .unwrap();
    }
}
