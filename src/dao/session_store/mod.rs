//! Store traits plus the available backends.

pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    dao::{
        models::{ScoreEntity, SessionEntity, SessionListItemEntity},
        storage::StorageResult,
    },
    state::session::{GameMode, GameType},
};

/// Scope a best-score lookup is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestScope {
    /// All prior records of one user.
    User(Uuid),
    /// All prior records of one school.
    School(String),
    /// All prior records, platform-wide.
    Global,
}

/// Abstraction over the durable session records.
///
/// The session manager is the sole writer; saves replace the whole document,
/// and callers serialize writes per session.
pub trait SessionStore: Send + Sync {
    /// Upsert a session document.
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a session by id.
    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// List reduced session projections.
    fn list_sessions(&self) -> BoxFuture<'static, StorageResult<Vec<SessionListItemEntity>>>;
    /// Ids of sessions still `waiting` that were created before `cutoff`.
    fn stale_waiting(&self, cutoff: SystemTime) -> BoxFuture<'static, StorageResult<Vec<Uuid>>>;
    /// Backend connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Abstraction over the append-only score records.
///
/// The score reconciler is the sole writer; records are immutable after
/// insertion, best flags included.
pub trait ScoreStore: Send + Sync {
    /// Append a score record.
    fn insert_score(&self, score: ScoreEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Maximum prior score within `scope` for a {game type, mode} pair, or
    /// `None` when the scope has no history.
    fn best_score(
        &self,
        scope: BestScope,
        game_type: GameType,
        mode: GameMode,
    ) -> BoxFuture<'static, StorageResult<Option<u32>>>;
}
