//! Backend-agnostic entity definitions exchanged with the store traits.

use std::time::SystemTime;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::state::{
    lifecycle::SessionStatus,
    session::{
        Difficulty, GameMode, GameType, Participant, ParticipantStatus, ResultEntry, Session,
        SessionSettings, Visibility,
    },
};

/// Durable representation of a session.
#[derive(Debug, Clone)]
pub struct SessionEntity {
    /// Primary key.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Drill game type.
    pub game_type: GameType,
    /// Client platform mode.
    pub mode: GameMode,
    /// Identity of the creating host.
    pub host_id: Uuid,
    /// Host display name.
    pub host_name: String,
    /// Participants in join order.
    pub participants: Vec<ParticipantEntity>,
    /// Capacity bound.
    pub max_participants: u8,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Host-chosen settings.
    pub settings: SessionSettingsEntity,
    /// Mutable game-state payload.
    pub game_state: serde_json::Value,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last mutation timestamp.
    pub updated_at: SystemTime,
    /// Set on the transition into `active`.
    pub started_at: Option<SystemTime>,
    /// Set on reaching a terminal state.
    pub ended_at: Option<SystemTime>,
    /// Final ranked results.
    pub results: Vec<ResultEntryEntity>,
    /// Owning school tag.
    pub school: Option<String>,
    /// Owning region tag.
    pub region: Option<String>,
}

/// Durable representation of one participant entry.
#[derive(Debug, Clone)]
pub struct ParticipantEntity {
    /// Identity of the participant.
    pub user_id: Uuid,
    /// Display name captured at join time.
    pub name: String,
    /// Join timestamp.
    pub joined_at: SystemTime,
    /// Running score.
    pub score: u32,
    /// Targets hit.
    pub targets_hit: u32,
    /// Total targets presented.
    pub total_targets: u32,
    /// Per-participant status.
    pub status: ParticipantStatus,
}

/// Durable representation of the session settings.
#[derive(Debug, Clone)]
pub struct SessionSettingsEntity {
    /// Planned duration in seconds.
    pub duration_secs: u32,
    /// Difficulty preset.
    pub difficulty: Difficulty,
    /// Listing visibility.
    pub visibility: Visibility,
    /// Spectator policy.
    pub allow_spectators: bool,
    /// Optional join password.
    pub password: Option<String>,
}

/// Durable representation of a final results row.
#[derive(Debug, Clone)]
pub struct ResultEntryEntity {
    /// Identity of the ranked participant.
    pub user_id: Uuid,
    /// Display name.
    pub name: String,
    /// 1-based rank.
    pub rank: u32,
    /// Score at session end.
    pub final_score: u32,
    /// Hit/total accuracy, 0 when no targets were presented.
    pub accuracy: f64,
    /// Placeholder bonus column.
    pub time_bonus: u32,
    /// Placeholder bonus column.
    pub survival_bonus: u32,
}

/// Reduced projection used by session listings.
#[derive(Debug, Clone)]
pub struct SessionListItemEntity {
    /// Primary key.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Drill game type.
    pub game_type: GameType,
    /// Client platform mode.
    pub mode: GameMode,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Current participant count.
    pub participant_count: usize,
    /// Capacity bound.
    pub max_participants: u8,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Immutable score record written once per submission.
#[derive(Debug, Clone)]
pub struct ScoreEntity {
    /// Primary key.
    pub id: Uuid,
    /// Session the score was produced in.
    pub session_id: Uuid,
    /// Identity of the submitting participant.
    pub user_id: Uuid,
    /// Display name at submission time.
    pub user_name: String,
    /// Drill game type the score applies to.
    pub game_type: GameType,
    /// Client platform mode.
    pub mode: GameMode,
    /// Submitted score.
    pub score: u32,
    /// Targets hit.
    pub targets_hit: u32,
    /// Total targets presented.
    pub total_targets: u32,
    /// School scope tag.
    pub school: Option<String>,
    /// Region scope tag.
    pub region: Option<String>,
    /// Difficulty the session was played at.
    pub difficulty: Difficulty,
    /// Highest ever for this user in {game type, mode} at write time.
    pub is_personal_best: bool,
    /// Highest ever for this school in {game type, mode} at write time.
    pub is_school_best: bool,
    /// Highest ever overall in {game type, mode} at write time.
    pub is_global_best: bool,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

impl From<Session> for SessionEntity {
    fn from(value: Session) -> Self {
        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            game_type: value.game_type,
            mode: value.mode,
            host_id: value.host_id,
            host_name: value.host_name,
            participants: value
                .participants
                .into_iter()
                .map(|(_, participant)| participant.into())
                .collect(),
            max_participants: value.max_participants,
            status: value.status,
            settings: value.settings.into(),
            game_state: value.game_state,
            created_at: value.created_at,
            updated_at: value.updated_at,
            started_at: value.started_at,
            ended_at: value.ended_at,
            results: value.results.into_iter().map(Into::into).collect(),
            school: value.school,
            region: value.region,
        }
    }
}

impl From<SessionEntity> for Session {
    fn from(value: SessionEntity) -> Self {
        let participants: IndexMap<Uuid, Participant> = value
            .participants
            .into_iter()
            .map(|participant| (participant.user_id, participant.into()))
            .collect();
        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            game_type: value.game_type,
            mode: value.mode,
            host_id: value.host_id,
            host_name: value.host_name,
            participants,
            max_participants: value.max_participants,
            status: value.status,
            settings: value.settings.into(),
            game_state: value.game_state,
            created_at: value.created_at,
            updated_at: value.updated_at,
            started_at: value.started_at,
            ended_at: value.ended_at,
            results: value.results.into_iter().map(Into::into).collect(),
            school: value.school,
            region: value.region,
        }
    }
}

impl From<Participant> for ParticipantEntity {
    fn from(value: Participant) -> Self {
        Self {
            user_id: value.user_id,
            name: value.name,
            joined_at: value.joined_at,
            score: value.score,
            targets_hit: value.targets_hit,
            total_targets: value.total_targets,
            status: value.status,
        }
    }
}

impl From<ParticipantEntity> for Participant {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            user_id: value.user_id,
            name: value.name,
            joined_at: value.joined_at,
            score: value.score,
            targets_hit: value.targets_hit,
            total_targets: value.total_targets,
            status: value.status,
        }
    }
}

impl From<SessionSettings> for SessionSettingsEntity {
    fn from(value: SessionSettings) -> Self {
        Self {
            duration_secs: value.duration_secs,
            difficulty: value.difficulty,
            visibility: value.visibility,
            allow_spectators: value.allow_spectators,
            password: value.password,
        }
    }
}

impl From<SessionSettingsEntity> for SessionSettings {
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

impl From<ResultEntry> for ResultEntryEntity {
    fn from(value: ResultEntry) -> Self {
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

impl From<ResultEntryEntity> for ResultEntry {
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

impl From<&SessionEntity> for SessionListItemEntity {
    fn from(value: &SessionEntity) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
            game_type: value.game_type,
            mode: value.mode,
            status: value.status,
            participant_count: value.participants.len(),
            max_participants: value.max_participants,
            created_at: value.created_at,
        }
    }
}
