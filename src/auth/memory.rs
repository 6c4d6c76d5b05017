use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::session::{generate_token, Flash, SessionRecord, SessionStore};
use crate::error::AppResult;

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, user_id: Uuid, expires_at: OffsetDateTime) -> AppResult<SessionRecord> {
        let record = SessionRecord {
            token: generate_token(),
            user_id,
            flash: Vec::new(),
            expires_at,
            touched_at: OffsetDateTime::now_utc(),
        };
        self.sessions
            .write()
            .await
            .insert(record.token.clone(), record.clone());
        Ok(record)
    }

    async fn load(&self, token: &str) -> AppResult<Option<SessionRecord>> {
        Ok(self.sessions.read().await.get(token).cloned())
    }

    async fn push_flash(&self, token: &str, flash: Flash) -> AppResult<()> {
        if let Some(record) = self.sessions.write().await.get_mut(token) {
            record.flash.push(flash);
        }
        Ok(())
    }

    async fn take_flash(&self, token: &str) -> AppResult<Vec<Flash>> {
        Ok(self
            .sessions
            .write()
            .await
            .get_mut(token)
            .map(|record| std::mem::take(&mut record.flash))
            .unwrap_or_default())
    }

    async fn touch(&self, token: &str, expires_at: OffsetDateTime) -> AppResult<()> {
        if let Some(record) = self.sessions.write().await.get_mut(token) {
            record.expires_at = expires_at;
            record.touched_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn destroy(&self, token: &str) -> AppResult<()> {
        self.sessions.write().await.remove(token);
        Ok(())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> AppResult<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[tokio::test]
    async fn flash_is_read_once() {
        let store = MemorySessionStore::new();
        let later = OffsetDateTime::now_utc() + Duration::hours(1);
        let s = store.create(Uuid::new_v4(), later).await.unwrap();

        store.push_flash(&s.token, Flash::success("one")).await.unwrap();
        store.push_flash(&s.token, Flash::error("two")).await.unwrap();

        let taken = store.take_flash(&s.token).await.unwrap();
        assert_eq!(taken, vec![Flash::success("one"), Flash::error("two")]);
        assert!(store.take_flash(&s.token).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn purge_drops_only_expired() {
        let store = MemorySessionStore::new();
        let now = OffsetDateTime::now_utc();
        let live = store.create(Uuid::new_v4(), now + Duration::hours(1)).await.unwrap();
        let dead = store.create(Uuid::new_v4(), now - Duration::hours(1)).await.unwrap();

        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert!(store.load(&live.token).await.unwrap().is_some());
        assert!(store.load(&dead.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn destroy_unknown_token_is_ok() {
        let store = MemorySessionStore::new();
        store.destroy("missing").await.unwrap();
    }
}
