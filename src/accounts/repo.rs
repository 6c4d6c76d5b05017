use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::accounts::repo_types::{NewUser, User};
use crate::error::{AppError, AppResult};

/// Persistence seam for user records and follow edges.
///
/// A follow edge is stored once; `followers` and `following` on [`User`] are
/// both projections of it, so one write updates both sides.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. Fails with [`AppError::DuplicateIdentity`] when the
    /// email or username is taken.
    async fn insert(&self, new: NewUser) -> AppResult<User>;

    /// Exact, case-sensitive username match.
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Users with the given ids, in storage order. Unknown ids are skipped.
    async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<User>>;

    /// Every user, in storage order.
    async fn list_all(&self) -> AppResult<Vec<User>>;

    /// Record `follower` as following `target`. Returns false when the edge
    /// already existed.
    async fn add_follower(&self, target: Uuid, follower: Uuid) -> AppResult<bool>;

    /// Drop the edge. Returns false when there was nothing to drop.
    async fn remove_follower(&self, target: Uuid, follower: Uuid) -> AppResult<bool>;
}

const SELECT_USER: &str = r#"
    SELECT u.id, u.email, u.username, u.password_hash, u.created_at,
           ARRAY(SELECT f.follower_id FROM follows f
                  WHERE f.followee_id = u.id ORDER BY f.created_at) AS followers,
           ARRAY(SELECT f.followee_id FROM follows f
                  WHERE f.follower_id = u.id ORDER BY f.created_at) AS following
      FROM users u
"#;

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, new: NewUser) -> AppResult<User> {
        let res = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, username, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, username, password_hash, created_at,
                      '{}'::uuid[] AS followers, '{}'::uuid[] AS following
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.email)
        .bind(&new.username)
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AppError::DuplicateIdentity)
            }
            Err(e) => Err(anyhow::Error::new(e).context("insert user").into()),
        }
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE u.username = $1"))
            .bind(username)
            .fetch_optional(&self.db)
            .await
            .context("find user by username")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE u.id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let users = sqlx::query_as::<_, User>(&format!(
            "{SELECT_USER} WHERE u.id = ANY($1) ORDER BY u.created_at, u.id"
        ))
        .bind(ids)
        .fetch_all(&self.db)
        .await
        .context("find users by id")?;
        Ok(users)
    }

    async fn list_all(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "{SELECT_USER} ORDER BY u.created_at, u.id"
        ))
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(users)
    }

    async fn add_follower(&self, target: Uuid, follower: Uuid) -> AppResult<bool> {
        let res = sqlx::query(
            r#"
            INSERT INTO follows (follower_id, followee_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(follower)
        .bind(target)
        .execute(&self.db)
        .await
        .context("insert follow")?;
        Ok(res.rows_affected() == 1)
    }

    async fn remove_follower(&self, target: Uuid, follower: Uuid) -> AppResult<bool> {
        let res = sqlx::query(
            r#"
            DELETE FROM follows
             WHERE follower_id = $1 AND followee_id = $2
            "#,
        )
        .bind(follower)
        .bind(target)
        .execute(&self.db)
        .await
        .context("delete follow")?;
        Ok(res.rows_affected() == 1)
    }
}
