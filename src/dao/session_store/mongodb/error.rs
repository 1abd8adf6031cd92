//! Error surface of the MongoDB backend.

use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

use crate::dao::storage::StorageError;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Errors raised by the MongoDB store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// URI as supplied.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Required environment variable absent.
    #[error("missing environment variable `{var}`")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// Client construction from options failed.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Initial connectivity probe never succeeded.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Number of ping attempts made.
        attempts: u32,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Health-check ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Index bootstrap failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection the index belongs to.
        collection: &'static str,
        /// Index description.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Session upsert failed.
    #[error("failed to save session `{id}`")]
    SaveSession {
        /// Session id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Session lookup failed.
    #[error("failed to load session `{id}`")]
    LoadSession {
        /// Session id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Session listing failed.
    #[error("failed to list sessions")]
    ListSessions {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Stale-session scan failed.
    #[error("failed to scan for stale waiting sessions")]
    SweepScan {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Score insertion failed.
    #[error("failed to insert score `{id}`")]
    InsertScore {
        /// Score record id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Best-score lookup failed.
    #[error("failed to query best score")]
    QueryBestScore {
        /// Driver error.
        #[source]
        source: MongoError,
    },
}

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        let message = err.to_string();
        StorageError::Unavailable {
            message,
            source: Box::new(err),
        }
    }
}
