//! In-memory store used by tests and `SAFEQUEST_STORE=memory` local runs.

use std::{sync::Arc, time::SystemTime};

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BestScope, ScoreStore, SessionStore};
use crate::{
    dao::{
        models::{ScoreEntity, SessionEntity, SessionListItemEntity},
        storage::StorageResult,
    },
    state::{
        lifecycle::SessionStatus,
        session::{GameMode, GameType},
    },
};

/// Non-durable store keeping everything in process memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    sessions: DashMap<Uuid, SessionEntity>,
    scores: RwLock<Vec<ScoreEntity>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of score records held, used by tests to assert no orphan writes.
    pub async fn score_count(&self) -> usize {
        self.inner.scores.read().await.len()
    }
}

impl SessionStore for MemoryStore {
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.sessions.insert(session.id, session);
            Ok(())
        })
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.sessions.get(&id).map(|entry| entry.clone())) })
    }

    fn list_sessions(&self) -> BoxFuture<'static, StorageResult<Vec<SessionListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .sessions
                .iter()
                .map(|entry| SessionListItemEntity::from(entry.value()))
                .collect())
        })
    }

    fn stale_waiting(&self, cutoff: SystemTime) -> BoxFuture<'static, StorageResult<Vec<Uuid>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .sessions
                .iter()
                .filter(|entry| {
                    entry.status == SessionStatus::Waiting && entry.created_at < cutoff
                })
                .map(|entry| entry.id)
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

impl ScoreStore for MemoryStore {
    fn insert_score(&self, score: ScoreEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.scores.write().await.push(score);
            Ok(())
        })
    }

    fn best_score(
        &self,
        scope: BestScope,
        game_type: GameType,
        mode: GameMode,
    ) -> BoxFuture<'static, StorageResult<Option<u32>>> {
        let store = self.clone();
        Box::pin(async move {
            let scores = store.inner.scores.read().await;
            Ok(scores
                .iter()
                .filter(|record| record.game_type == game_type && record.mode == mode)
                .filter(|record| match &scope {
                    BestScope::User(user_id) => record.user_id == *user_id,
                    BestScope::School(school) => record.school.as_deref() == Some(school),
                    BestScope::Global => true,
                })
                .map(|record| record.score)
                .max())
        })
    }
}
