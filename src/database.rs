// ABOUTME: Database management for opaque-token and ban persistence
// ABOUTME: SQLite-backed CRUD queries; the UPDATE row count is the consumption race arbiter
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Database Management
//!
//! All durable state lives here: opaque-token rows and ban rows. The store is
//! the single point where conflicting writes serialize - in particular, the
//! conditional `UPDATE ... WHERE revoked = 0` used for token consumption
//! reports through its row count which of two racing consumers won.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use crate::models::{Ban, OpaqueToken, TokenKind};

/// Database handle for token and ban storage
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open a connection pool and run migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be opened or migrations fail.
    pub async fn new(database_url: &str) -> Result<Self> {
        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if database_url.starts_with("sqlite:") {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_string()
        };

        // An in-memory database is per-connection; a pool wider than one
        // connection would hand each checkout its own empty database.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(database_url)
                .await?
        } else {
            SqlitePoolOptions::new().connect(&connection_options).await?
        };

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS auth_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                digest TEXT NOT NULL,
                kind TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                revoked BOOLEAN NOT NULL DEFAULT 0
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_auth_tokens_digest ON auth_tokens(digest)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_auth_tokens_owner ON auth_tokens(owner_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_auth_tokens_expires ON auth_tokens(expires_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS bans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT UNIQUE NOT NULL,
                until TEXT NOT NULL,
                reason TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_bans_key ON bans(key)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ── Opaque tokens ───────────────────────────────────────────────────

    /// Insert a fresh token row and return it
    pub async fn insert_token(
        &self,
        digest: &str,
        kind: TokenKind,
        owner_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<OpaqueToken, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(
            r"
            INSERT INTO auth_tokens (digest, kind, owner_id, expires_at, created_at, updated_at, revoked)
            VALUES (?, ?, ?, ?, ?, ?, 0)
            ",
        )
        .bind(digest)
        .bind(kind.as_str())
        .bind(owner_id.to_string())
        .bind(expires_at)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(OpaqueToken {
            id: result.last_insert_rowid(),
            digest: digest.to_string(),
            kind,
            owner_id,
            expires_at,
            created_at: now,
            updated_at: now,
            revoked: false,
        })
    }

    /// Look up a token by digest, optionally restricted to one kind
    pub async fn find_token_by_digest(
        &self,
        digest: &str,
        kind: Option<TokenKind>,
    ) -> Result<Option<OpaqueToken>, sqlx::Error> {
        let row = match kind {
            Some(kind) => {
                sqlx::query("SELECT * FROM auth_tokens WHERE digest = ? AND kind = ?")
                    .bind(digest)
                    .bind(kind.as_str())
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM auth_tokens WHERE digest = ?")
                    .bind(digest)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        row.map(|r| row_to_token(&r)).transpose()
    }

    /// All token rows belonging to one owner
    pub async fn find_tokens_for_owner(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<OpaqueToken>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM auth_tokens WHERE owner_id = ?")
            .bind(owner_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_token).collect()
    }

    /// Conditionally flip a row to revoked.
    ///
    /// Returns `true` only when this call performed the transition - a `false`
    /// result means another writer got there first (or the row is gone), which
    /// is what makes `validate_and_consume` at-most-once.
    pub async fn consume_token_by_digest(&self, digest: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE auth_tokens SET revoked = 1, updated_at = ? WHERE digest = ? AND revoked = 0",
        )
        .bind(Utc::now())
        .bind(digest)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark every non-revoked row for an owner revoked, optionally one kind only.
    /// Returns the number of rows transitioned.
    pub async fn revoke_all_for_owner(
        &self,
        owner_id: Uuid,
        kind: Option<TokenKind>,
    ) -> Result<u64, sqlx::Error> {
        let now = Utc::now();
        let result = match kind {
            Some(kind) => {
                sqlx::query(
                    "UPDATE auth_tokens SET revoked = 1, updated_at = ? WHERE owner_id = ? AND kind = ? AND revoked = 0",
                )
                .bind(now)
                .bind(owner_id.to_string())
                .bind(kind.as_str())
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "UPDATE auth_tokens SET revoked = 1, updated_at = ? WHERE owner_id = ? AND revoked = 0",
                )
                .bind(now)
                .bind(owner_id.to_string())
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected())
    }

    /// Delete rows that are dead (revoked or expired) and last touched before
    /// `cutoff`. Returns the number of rows removed.
    pub async fn delete_expired_or_revoked_before(
        &self,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM auth_tokens WHERE (revoked = 1 OR expires_at < ?) AND updated_at < ?",
        )
        .bind(now)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // ── Bans ────────────────────────────────────────────────────────────

    /// Look up a ban by key
    pub async fn find_ban(&self, key: &str) -> Result<Option<Ban>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM bans WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| row_to_ban(&r)))
    }

    /// Insert or update a ban, setting or extending its expiry
    pub async fn upsert_ban(
        &self,
        key: &str,
        until: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            INSERT INTO bans (key, until, reason) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET until = excluded.until, reason = excluded.reason
            ",
        )
        .bind(key)
        .bind(until)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove a ban unconditionally
    pub async fn delete_ban(&self, key: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM bans WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Map a SQLite row onto an `OpaqueToken`
fn row_to_token(row: &SqliteRow) -> Result<OpaqueToken, sqlx::Error> {
    let kind_raw: String = row.get("kind");
    let kind = TokenKind::parse(&kind_raw).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "kind".into(),
        source: format!("unknown token kind: {kind_raw}").into(),
    })?;

    let owner_raw: String = row.get("owner_id");
    let owner_id = Uuid::parse_str(&owner_raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: "owner_id".into(),
        source: Box::new(e),
    })?;

    Ok(OpaqueToken {
        id: row.get("id"),
        digest: row.get("digest"),
        kind,
        owner_id,
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        revoked: row.get("revoked"),
    })
}

/// Map a SQLite row onto a `Ban`
fn row_to_ban(row: &SqliteRow) -> Ban {
    Ban {
        id: row.get("id"),
        key: row.get("key"),
        until: row.get("until"),
        reason: row.get("reason"),
    }
}
