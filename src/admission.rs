// ABOUTME: Admission control - fixed-window rate limiting and a persisted ban list
// ABOUTME: Consulted before any credential operation; composed ban check first, then rate limit
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Admission Control
//!
//! Two independent gates in front of the credential-issuing endpoints:
//!
//! 1. **Ban list** - persisted, coarse-grained, survives restarts. A ban is
//!    in force while `now < until`; expired entries are lifted on read.
//! 2. **Rate limiter** - process-local fixed-window counters. On first use
//!    of a key, or once its window has elapsed, the counter resets to 1 and
//!    a new boundary is set; otherwise it increments, and the call is
//!    allowed only while the post-increment count stays within the limit.
//!
//! The fixed-window scheme permits bursts of up to twice the nominal limit
//! across a window boundary. That is the accepted tradeoff for a lock-free
//! counter, and it is covered by tests rather than papered over.

use chrono::{Duration, Utc};
use dashmap::DashMap;

use crate::database::Database;
use crate::errors::AuthResult;

/// Admission key prefixes; keys are free-form strings namespaced by caller
pub mod keys {
    /// Client-IP derived admission key prefix
    pub const IP: &str = "IP:";
    /// Normalized email admission key prefix
    pub const EMAIL: &str = "EMAIL:";
    /// Phone number admission key prefix
    pub const PHONE: &str = "PHONE:";
}

/// One fixed-window counter
struct Bucket {
    count: u32,
    reset_at: i64,
}

/// Process-local fixed-window rate limiter.
///
/// Counters live in a concurrent map; the per-key entry guard makes the
/// read-modify-write atomic, so two simultaneous requests for the same key
/// are both counted.
#[derive(Default)]
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
}

impl RateLimiter {
    /// Create an empty limiter
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    /// Count a hit against `key` and report whether it is within `max` for
    /// the current `window_secs` window.
    #[must_use]
    pub fn allow(&self, key: &str, max: u32, window_secs: i64) -> bool {
        self.allow_at(key, max, window_secs, Utc::now().timestamp())
    }

    /// Window logic with an explicit clock, the deterministic core of
    /// [`Self::allow`].
    #[must_use]
    pub fn allow_at(&self, key: &str, max: u32, window_secs: i64, now_epoch: i64) -> bool {
        let count = {
            let mut bucket = self.buckets.entry(key.to_string()).or_insert(Bucket {
                count: 0,
                reset_at: now_epoch + window_secs,
            });
            if bucket.reset_at <= now_epoch {
                bucket.count = 1;
                bucket.reset_at = now_epoch + window_secs;
            } else {
                bucket.count += 1;
            }
            bucket.count
        };
        count <= max
    }

    /// Number of keys currently tracked (stale windows included)
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}

/// Persisted ban list guarding against brute-force callers.
///
/// Reads and writes go through the backing store; eventual consistency is
/// tolerable because bans are minutes-to-days coarse.
#[derive(Clone)]
pub struct BanService {
    db: Database,
}

impl BanService {
    /// Create a ban service over the given database
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Whether `key` is currently banned. An expired ban is lifted (deleted)
    /// on the way out and reported as not banned.
    ///
    /// # Errors
    /// Returns a database error if the lookup fails.
    pub async fn is_banned(&self, key: &str) -> AuthResult<bool> {
        let Some(ban) = self.db.find_ban(key).await? else {
            return Ok(false);
        };
        if !ban.is_active_at(Utc::now()) {
            self.db.delete_ban(key).await?;
            return Ok(false);
        }
        Ok(true)
    }

    /// Upsert a ban for `key`, setting or extending its expiry
    ///
    /// # Errors
    /// Returns a database error if the write fails.
    pub async fn ban(&self, key: &str, duration_secs: i64, reason: &str) -> AuthResult<()> {
        let until = Utc::now() + Duration::seconds(duration_secs);
        self.db.upsert_ban(key, until, reason).await?;
        tracing::warn!(key, duration_secs, reason, "Banned admission key");
        Ok(())
    }

    /// Remove a ban unconditionally
    ///
    /// # Errors
    /// Returns a database error if the delete fails.
    pub async fn unban(&self, key: &str) -> AuthResult<()> {
        self.db.delete_ban(key).await?;
        Ok(())
    }
}
