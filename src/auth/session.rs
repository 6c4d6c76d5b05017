//! Server-side session records keyed by an opaque cookie token.
//!
//! A session only ever carries an authenticated identity plus pending flash
//! messages. Creating one is "set current identity", destroying one is
//! "clear current identity".

use anyhow::Context;
use async_trait::async_trait;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppResult;

pub const TOKEN_LEN: usize = 43;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

/// One-shot message shown on the next request of the same session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub text: String,
}

impl Flash {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: Uuid,
    pub flash: Vec<Flash>,
    pub expires_at: OffsetDateTime,
    pub touched_at: OffsetDateTime,
}

impl SessionRecord {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

/// 43 alphanumeric characters, roughly 256 bits of entropy.
pub fn generate_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

pub fn is_well_formed_token(token: &str) -> bool {
    token.len() == TOKEN_LEN && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Mint a fresh token bound to `user_id`.
    async fn create(&self, user_id: Uuid, expires_at: OffsetDateTime) -> AppResult<SessionRecord>;

    async fn load(&self, token: &str) -> AppResult<Option<SessionRecord>>;

    async fn push_flash(&self, token: &str, flash: Flash) -> AppResult<()>;

    /// Return and clear the pending flash messages.
    async fn take_flash(&self, token: &str) -> AppResult<Vec<Flash>>;

    /// Extend the expiry and record the touch time.
    async fn touch(&self, token: &str, expires_at: OffsetDateTime) -> AppResult<()>;

    /// Removing an unknown token is not an error.
    async fn destroy(&self, token: &str) -> AppResult<()>;

    async fn purge_expired(&self, now: OffsetDateTime) -> AppResult<u64>;
}

#[derive(FromRow)]
struct SessionRow {
    token: String,
    user_id: Uuid,
    flash: Json<Vec<Flash>>,
    expires_at: OffsetDateTime,
    touched_at: OffsetDateTime,
}

impl From<SessionRow> for SessionRecord {
    fn from(r: SessionRow) -> Self {
        Self {
            token: r.token,
            user_id: r.user_id,
            flash: r.flash.0,
            expires_at: r.expires_at,
            touched_at: r.touched_at,
        }
    }
}

#[derive(Clone)]
pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, user_id: Uuid, expires_at: OffsetDateTime) -> AppResult<SessionRecord> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO sessions (token, user_id, flash, expires_at, touched_at)
            VALUES ($1, $2, '[]'::jsonb, $3, now())
            RETURNING token, user_id, flash, expires_at, touched_at
            "#,
        )
        .bind(generate_token())
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await
        .context("insert session")?;
        Ok(row.into())
    }

    async fn load(&self, token: &str) -> AppResult<Option<SessionRecord>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT token, user_id, flash, expires_at, touched_at
              FROM sessions
             WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await
        .context("load session")?;
        Ok(row.map(Into::into))
    }

    async fn push_flash(&self, token: &str, flash: Flash) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE sessions
               SET flash = flash || jsonb_build_array($2::jsonb)
             WHERE token = $1
            "#,
        )
        .bind(token)
        .bind(Json(&flash))
        .execute(&self.db)
        .await
        .context("push flash")?;
        Ok(())
    }

    async fn take_flash(&self, token: &str) -> AppResult<Vec<Flash>> {
        let taken = sqlx::query_scalar::<_, Json<Vec<Flash>>>(
            r#"
            UPDATE sessions s
               SET flash = '[]'::jsonb
              FROM (SELECT token, flash FROM sessions WHERE token = $1 FOR UPDATE) old
             WHERE s.token = old.token
            RETURNING old.flash
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await
        .context("take flash")?;
        Ok(taken.map(|j| j.0).unwrap_or_default())
    }

    async fn touch(&self, token: &str, expires_at: OffsetDateTime) -> AppResult<()> {
        sqlx::query("UPDATE sessions SET expires_at = $2, touched_at = now() WHERE token = $1")
            .bind(token)
            .bind(expires_at)
            .execute(&self.db)
            .await
            .context("touch session")?;
        Ok(())
    }

    async fn destroy(&self, token: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.db)
            .await
            .context("delete session")?;
        Ok(())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> AppResult<u64> {
        let res = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.db)
            .await
            .context("purge sessions")?;
        Ok(res.rows_affected())
    }
}
