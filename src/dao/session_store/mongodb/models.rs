//! BSON document shapes for the session and score collections.

use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    dao::models::{
        ParticipantEntity, ResultEntryEntity, ScoreEntity, SessionEntity, SessionSettingsEntity,
    },
    state::{
        lifecycle::SessionStatus,
        session::{Difficulty, GameMode, GameType, ParticipantStatus, Visibility},
    },
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    name: String,
    description: Option<String>,
    game_type: GameType,
    mode: GameMode,
    host_id: Uuid,
    host_name: String,
    participants: Vec<ParticipantDocument>,
    max_participants: u8,
    status: SessionStatus,
    settings: SettingsDocument,
    game_state: serde_json::Value,
    created_at: DateTime,
    updated_at: DateTime,
    started_at: Option<DateTime>,
    ended_at: Option<DateTime>,
    #[serde(default)]
    results: Vec<ResultEntryDocument>,
    school: Option<String>,
    region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantDocument {
    user_id: Uuid,
    name: String,
    joined_at: DateTime,
    score: u32,
    targets_hit: u32,
    total_targets: u32,
    status: ParticipantStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsDocument {
    duration_secs: u32,
    difficulty: Difficulty,
    visibility: Visibility,
    allow_spectators: bool,
    password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEntryDocument {
    user_id: Uuid,
    name: String,
    rank: u32,
    final_score: u32,
    accuracy: f64,
    time_bonus: u32,
    survival_bonus: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    session_id: Uuid,
    user_id: Uuid,
    user_name: String,
    game_type: GameType,
    mode: GameMode,
    pub(super) score: u32,
    targets_hit: u32,
    total_targets: u32,
    school: Option<String>,
    region: Option<String>,
    difficulty: Difficulty,
    is_personal_best: bool,
    is_school_best: bool,
    is_global_best: bool,
    created_at: DateTime,
}

impl From<SessionEntity> for SessionDocument {
    fn from(value: SessionEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            game_type: value.game_type,
            mode: value.mode,
            host_id: value.host_id,
            host_name: value.host_name,
            participants: value.participants.into_iter().map(Into::into).collect(),
            max_participants: value.max_participants,
            status: value.status,
            settings: value.settings.into(),
            game_state: value.game_state,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
            started_at: value.started_at.map(DateTime::from_system_time),
            ended_at: value.ended_at.map(DateTime::from_system_time),
            results: value.results.into_iter().map(Into::into).collect(),
            school: value.school,
            region: value.region,
        }
    }
}

impl From<SessionDocument> for SessionEntity {
    fn from(value: SessionDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            game_type: value.game_type,
            mode: value.mode,
            host_id: value.host_id,
            host_name: value.host_name,
            participants: value.participants.into_iter().map(Into::into).collect(),
            max_participants: value.max_participants,
            status: value.status,
            settings: value.settings.into(),
            game_state: value.game_state,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
            started_at: value.started_at.map(|ts| ts.to_system_time()),
            ended_at: value.ended_at.map(|ts| ts.to_system_time()),
            results: value.results.into_iter().map(Into::into).collect(),
            school: value.school,
            region: value.region,
        }
    }
}

impl From<ParticipantEntity> for ParticipantDocument {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            user_id: value.user_id,
            name: value.name,
            joined_at: DateTime::from_system_time(value.joined_at),
            score: value.score,
            targets_hit: value.targets_hit,
            total_targets: value.total_targets,
            status: value.status,
        }
    }
}

impl From<ParticipantDocument> for ParticipantEntity {
    fn from(value: ParticipantDocument) -> Self {
        Self {
            user_id: value.user_id,
            name: value.name,
            joined_at: value.joined_at.to_system_time(),
            score: value.score,
            targets_hit: value.targets_hit,
            total_targets: value.total_targets,
            status: value.status,
        }
    }
}

impl From<SessionSettingsEntity> for SettingsDocument {
    fn from(value: SessionSettingsEntity) -> Self {
        Self {
            duration_secs: value.duration_secs,
            difficulty: value.difficulty,
            visibility: value.visibility,
            allow_spectators: value.allow_spectators,
            password: value.password,
        }
    }
}

impl From<SettingsDocument> for SessionSettingsEntity {
    fn from(value: SettingsDocument) -> Self {
        Self {
            duration_secs: value.duration_secs,
            difficulty: value.difficulty,
            visibility: value.visibility,
            allow_spectators: value.allow_spectators,
            password: value.password,
        }
    }
}

impl From<ResultEntryEntity> for ResultEntryDocument {
    fn from(value: ResultEntryEntity) -> Self {
        Self {
            user_id: value.user_id,
            name: value.name,
            rank: value.rank,
            final_score: value.final_score,
            accuracy: value.accuracy,
            time_bonus: value.time_bonus,
            survival_bonus: value.survival_bonus,
        }
    }
}

impl From<ResultEntryDocument> for ResultEntryEntity {
    fn from(value: ResultEntryDocument) -> Self {
        Self {
            user_id: value.user_id,
            name: value.name,
            rank: value.rank,
            final_score: value.final_score,
            accuracy: value.accuracy,
            time_bonus: value.time_bonus,
            survival_bonus: value.survival_bonus,
        }
    }
}

impl From<ScoreEntity> for ScoreDocument {
    fn from(value: ScoreEntity) -> Self {
        Self {
            id: value.id,
            session_id: value.session_id,
            user_id: value.user_id,
            user_name: value.user_name,
            game_type: value.game_type,
            mode: value.mode,
            score: value.score,
            targets_hit: value.targets_hit,
            total_targets: value.total_targets,
            school: value.school,
            region: value.region,
            difficulty: value.difficulty,
            is_personal_best: value.is_personal_best,
            is_school_best: value.is_school_best,
            is_global_best: value.is_global_best,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<ScoreDocument> for ScoreEntity {
    fn from(value: ScoreDocument) -> Self {
        Self {
            id: value.id,
            session_id: value.session_id,
            user_id: value.user_id,
            user_name: value.user_name,
            game_type: value.game_type,
            mode: value.mode,
            score: value.score,
            targets_hit: value.targets_hit,
            total_targets: value.total_targets,
            school: value.school,
            region: value.region,
            difficulty: value.difficulty,
            is_personal_best: value.is_personal_best,
            is_school_best: value.is_school_best,
            is_global_best: value.is_global_best,
            created_at: value.created_at.to_system_time(),
        }
    }
}

pub(super) fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub(super) fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
