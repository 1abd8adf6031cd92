//! MongoDB implementation of the session and score stores.

use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database,
    bson::{DateTime, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{ScoreDocument, SessionDocument, doc_id, uuid_as_binary},
};
use crate::{
    dao::{
        models::{ScoreEntity, SessionEntity, SessionListItemEntity},
        session_store::{BestScope, ScoreStore, SessionStore},
        storage::StorageResult,
    },
    state::session::{GameMode, GameType},
};

const SESSION_COLLECTION_NAME: &str = "sessions";
const SCORE_COLLECTION_NAME: &str = "scores";

/// Store handle shared by the supervisor and the service layer.
#[derive(Clone)]
pub struct MongoStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (_, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.database = database;
        Ok(())
    }
}

impl MongoStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    /// Re-establish the connection after a failed health check.
    pub async fn try_reconnect(&self) -> MongoResult<()> {
        self.inner.reconnect().await
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        // Sweep scans filter on status and creation time.
        let sessions = database.collection::<SessionDocument>(SESSION_COLLECTION_NAME);
        let session_index = mongodb::IndexModel::builder()
            .keys(doc! {"status": 1, "created_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("session_status_created_idx".to_owned()))
                    .build(),
            )
            .build();
        sessions
            .create_index(session_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION_NAME,
                index: "status,created_at",
                source,
            })?;

        // Best-score lookups sort by score within a {game_type, mode} scope.
        let scores = database.collection::<ScoreDocument>(SCORE_COLLECTION_NAME);
        for (name, keys) in [
            (
                "score_global_idx",
                doc! {"game_type": 1, "mode": 1, "score": -1},
            ),
            (
                "score_user_idx",
                doc! {"user_id": 1, "game_type": 1, "mode": 1, "score": -1},
            ),
            (
                "score_school_idx",
                doc! {"school": 1, "game_type": 1, "mode": 1, "score": -1},
            ),
        ] {
            let index = mongodb::IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(Some(name.to_owned())).build())
                .build();
            scores
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: SCORE_COLLECTION_NAME,
                    index: name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn session_collection(&self) -> Collection<SessionDocument> {
        self.database()
            .await
            .collection::<SessionDocument>(SESSION_COLLECTION_NAME)
    }

    async fn score_collection(&self) -> Collection<ScoreDocument> {
        self.database()
            .await
            .collection::<ScoreDocument>(SCORE_COLLECTION_NAME)
    }

    async fn save_session(&self, session: SessionEntity) -> MongoResult<()> {
        let id = session.id;
        let document: SessionDocument = session.into();
        let collection = self.session_collection().await;
        collection
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSession { id, source })?;
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> MongoResult<Option<SessionEntity>> {
        let collection = self.session_collection().await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadSession { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn list_sessions(&self) -> MongoResult<Vec<SessionListItemEntity>> {
        let collection = self.session_collection().await;
        let documents: Vec<SessionDocument> = collection
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListSessions { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListSessions { source })?;

        Ok(documents
            .into_iter()
            .map(|document| {
                let entity: SessionEntity = document.into();
                SessionListItemEntity::from(&entity)
            })
            .collect())
    }

    async fn stale_waiting(&self, cutoff: SystemTime) -> MongoResult<Vec<Uuid>> {
        let collection = self.session_collection().await;
        let filter = doc! {
            "status": "waiting",
            "created_at": doc! { "$lt": DateTime::from_system_time(cutoff) },
        };
        let documents: Vec<SessionDocument> = collection
            .find(filter)
            .await
            .map_err(|source| MongoDaoError::SweepScan { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::SweepScan { source })?;

        Ok(documents
            .into_iter()
            .map(|document| SessionEntity::from(document).id)
            .collect())
    }

    async fn insert_score(&self, score: ScoreEntity) -> MongoResult<()> {
        let id = score.id;
        let document: ScoreDocument = score.into();
        let collection = self.score_collection().await;
        collection
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::InsertScore { id, source })?;
        Ok(())
    }

    async fn best_score(
        &self,
        scope: BestScope,
        game_type: GameType,
        mode: GameMode,
    ) -> MongoResult<Option<u32>> {
        let mut filter = doc! {
            "game_type": game_type.as_str(),
            "mode": mode.as_str(),
        };
        match scope {
            BestScope::User(user_id) => {
                filter.insert("user_id", uuid_as_binary(user_id));
            }
            BestScope::School(school) => {
                filter.insert("school", school);
            }
            BestScope::Global => {}
        }

        let collection = self.score_collection().await;
        let document = collection
            .find_one(filter)
            .sort(doc! {"score": -1})
            .await
            .map_err(|source| MongoDaoError::QueryBestScore { source })?;

        Ok(document.map(|record| record.score))
    }
}

impl SessionStore for MongoStore {
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_session(session).await.map_err(Into::into) })
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_session(id).await.map_err(Into::into) })
    }

    fn list_sessions(&self) -> BoxFuture<'static, StorageResult<Vec<SessionListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_sessions().await.map_err(Into::into) })
    }

    fn stale_waiting(&self, cutoff: SystemTime) -> BoxFuture<'static, StorageResult<Vec<Uuid>>> {
        let store = self.clone();
        Box::pin(async move { store.stale_waiting(cutoff).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }
}

impl ScoreStore for MongoStore {
    fn insert_score(&self, score: ScoreEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_score(score).await.map_err(Into::into) })
    }

    fn best_score(
        &self,
        scope: BestScope,
        game_type: GameType,
        mode: GameMode,
    ) -> BoxFuture<'static, StorageResult<Option<u32>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .best_score(scope, game_type, mode)
                .await
                .map_err(Into::into)
        })
    }
}
