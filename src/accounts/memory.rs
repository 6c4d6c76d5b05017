//! In-memory user store, used by the `memory` backend and by tests.

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::accounts::repo::UserStore;
use crate::accounts::repo_types::{NewUser, User};
use crate::error::{AppError, AppResult};

struct StoredUser {
    id: Uuid,
    email: String,
    username: String,
    password_hash: String,
    created_at: OffsetDateTime,
}

/// Follow edges are kept in insertion order as (follower, followee).
#[derive(Default)]
struct State {
    users: Vec<StoredUser>,
    follows: Vec<(Uuid, Uuid)>,
}

impl State {
    fn resolve(&self, stored: &StoredUser) -> User {
        let followers = self
            .follows
            .iter()
            .filter(|(_, followee)| *followee == stored.id)
            .map(|(follower, _)| *follower)
            .collect();
        let following = self
            .follows
            .iter()
            .filter(|(follower, _)| *follower == stored.id)
            .map(|(_, followee)| *followee)
            .collect();
        User {
            id: stored.id,
            email: stored.email.clone(),
            username: stored.username.clone(),
            password_hash: stored.password_hash.clone(),
            followers,
            following,
            created_at: stored.created_at,
        }
    }

    fn exists(&self, id: Uuid) -> bool {
        self.users.iter().any(|u| u.id == id)
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    state: RwLock<State>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, new: NewUser) -> AppResult<User> {
        let mut state = self.state.write().await;
        if state
            .users
            .iter()
            .any(|u| u.email == new.email || u.username == new.username)
        {
            return Err(AppError::DuplicateIdentity);
        }
        let stored = StoredUser {
            id: Uuid::new_v4(),
            email: new.email,
            username: new.username,
            password_hash: new.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        let user = state.resolve(&stored);
        state.users.push(stored);
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| state.resolve(u)))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.id == id)
            .map(|u| state.resolve(u)))
    }

    async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .map(|u| state.resolve(u))
            .collect())
    }

    async fn list_all(&self) -> AppResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().map(|u| state.resolve(u)).collect())
    }

    async fn add_follower(&self, target: Uuid, follower: Uuid) -> AppResult<bool> {
        let mut state = self.state.write().await;
        // mirrors the foreign keys on `follows`
        if !state.exists(target) || !state.exists(follower) {
            return Err(AppError::NotFound);
        }
        if state.follows.contains(&(follower, target)) {
            return Ok(false);
        }
        state.follows.push((follower, target));
        Ok(true)
    }

    async fn remove_follower(&self, target: Uuid, follower: Uuid) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let before = state.follows.len();
        state.follows.retain(|edge| *edge != (follower, target));
        Ok(state.follows.len() != before)
    }
}
