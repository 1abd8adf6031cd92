//! Session payloads shared by the REST routes and the WebSocket commands.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::SessionListItemEntity,
    dto::format_system_time,
    state::{
        lifecycle::SessionStatus,
        session::{
            Difficulty, GameMode, GameType, Participant, ParticipantStatus, ResultEntry, Session,
            SessionSettings, Visibility,
        },
    },
};

/// Payload accepted by `POST /sessions` and the `createSession` command.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Display name of the session.
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    /// Optional free-text description.
    #[validate(length(max = 500))]
    pub description: Option<String>,
    /// Drill game type to run.
    pub game_type: GameType,
    /// Client platform mode.
    pub mode: GameMode,
    /// Participant capacity; defaults when omitted, rejected when out of range.
    #[validate(range(min = 2, max = 50, message = "maxParticipants must be between 2 and 50"))]
    pub max_participants: Option<u8>,
    /// Optional settings overrides; unset fields keep their defaults.
    #[validate(nested)]
    pub settings: Option<SessionSettingsInput>,
}

/// Partial settings object; every field is optional.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettingsInput {
    /// Planned duration in seconds.
    #[validate(range(min = 30, max = 3600))]
    pub duration_secs: Option<u32>,
    /// Difficulty preset.
    pub difficulty: Option<Difficulty>,
    /// Listing visibility.
    pub visibility: Option<Visibility>,
    /// Whether non-participants may subscribe to the session room.
    pub allow_spectators: Option<bool>,
    /// Join password for private sessions.
    #[validate(length(min = 4, max = 64))]
    pub password: Option<String>,
}

impl SessionSettingsInput {
    /// Merge the overrides onto the default settings.
    pub fn into_settings(self) -> SessionSettings {
        let defaults = SessionSettings::default();
        SessionSettings {
            duration_secs: self.duration_secs.unwrap_or(defaults.duration_secs),
            difficulty: self.difficulty.unwrap_or(defaults.difficulty),
            visibility: self.visibility.unwrap_or(defaults.visibility),
            allow_spectators: self.allow_spectators.unwrap_or(defaults.allow_spectators),
            password: self.password,
        }
    }
}

/// Full session view returned by the detail endpoint and realtime events.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Session identifier.
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
    pub participants: Vec<ParticipantSummary>,
    /// Capacity bound.
    pub max_participants: u8,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Host-chosen settings (join password withheld).
    pub settings: SettingsSummary,
    /// Creation timestamp, RFC 3339.
    pub created_at: String,
    /// Start timestamp, RFC 3339, set once on entering `active`.
    pub started_at: Option<String>,
    /// End timestamp, RFC 3339, set on reaching a terminal state.
    pub ended_at: Option<String>,
    /// Final ranked results; empty until the session completes.
    pub results: Vec<ResultEntrySummary>,
    /// Owning school tag.
    pub school: Option<String>,
    /// Owning region tag.
    pub region: Option<String>,
}

/// Settings view with the join password withheld.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSummary {
    /// Planned duration in seconds.
    pub duration_secs: u32,
    /// Difficulty preset.
    pub difficulty: Difficulty,
    /// Listing visibility.
    pub visibility: Visibility,
    /// Spectator policy.
    pub allow_spectators: bool,
    /// Whether a join password is set.
    pub has_password: bool,
}

/// Participant view embedded in [`SessionSummary`].
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    /// Identity of the participant.
    pub user_id: Uuid,
    /// Display name.
    pub name: String,
    /// Join timestamp, RFC 3339.
    pub joined_at: String,
    /// Running score.
    pub score: u32,
    /// Targets hit.
    pub targets_hit: u32,
    /// Total targets presented.
    pub total_targets: u32,
    /// Per-participant status.
    pub status: ParticipantStatus,
}

/// One row of the final ranked results.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntrySummary {
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

/// Reduced session view returned by the listing endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionListItem {
    /// Session identifier.
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
    /// Creation timestamp, RFC 3339.
    pub created_at: String,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            name: session.name.clone(),
            description: session.description.clone(),
            game_type: session.game_type,
            mode: session.mode,
            host_id: session.host_id,
            host_name: session.host_name.clone(),
            participants: session.participants.values().map(Into::into).collect(),
            max_participants: session.max_participants,
            status: session.status,
            settings: SettingsSummary {
                duration_secs: session.settings.duration_secs,
                difficulty: session.settings.difficulty,
                visibility: session.settings.visibility,
                allow_spectators: session.settings.allow_spectators,
                has_password: session.settings.password.is_some(),
            },
            created_at: format_system_time(session.created_at),
            started_at: session.started_at.map(format_system_time),
            ended_at: session.ended_at.map(format_system_time),
            results: session.results.iter().map(Into::into).collect(),
            school: session.school.clone(),
            region: session.region.clone(),
        }
    }
}

impl From<&Participant> for ParticipantSummary {
    fn from(participant: &Participant) -> Self {
        Self {
            user_id: participant.user_id,
            name: participant.name.clone(),
            joined_at: format_system_time(participant.joined_at),
            score: participant.score,
            targets_hit: participant.targets_hit,
            total_targets: participant.total_targets,
            status: participant.status,
        }
    }
}

impl From<&ResultEntry> for ResultEntrySummary {
    fn from(entry: &ResultEntry) -> Self {
        Self {
            user_id: entry.user_id,
            name: entry.name.clone(),
            rank: entry.rank,
            final_score: entry.final_score,
            accuracy: entry.accuracy,
            time_bonus: entry.time_bonus,
            survival_bonus: entry.survival_bonus,
        }
    }
}

impl From<SessionListItemEntity> for SessionListItem {
    fn from(entity: SessionListItemEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            game_type: entity.game_type,
            mode: entity.mode,
            status: entity.status,
            participant_count: entity.participant_count,
            max_participants: entity.max_participants,
            created_at: format_system_time(entity.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_outside_bounds_fails_validation() {
        let request = CreateSessionRequest {
            name: "Fire drill".into(),
            description: None,
            game_type: GameType::HazardHunt,
            mode: GameMode::Mobile,
            max_participants: Some(1),
            settings: None,
        };
        assert!(request.validate().is_err());

        let request = CreateSessionRequest {
            max_participants: Some(51),
            ..request
        };
        assert!(request.validate().is_err());

        let request = CreateSessionRequest {
            max_participants: Some(50),
            ..request
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn summary_withholds_the_join_password() {
        let host = crate::auth::AuthContext {
            user_id: Uuid::new_v4(),
            name: "Host".into(),
            role: crate::auth::Role::Teacher,
            school: "Northview High".into(),
            region: "Pacific".into(),
        };
        let settings = SessionSettingsInput {
            duration_secs: None,
            difficulty: None,
            visibility: Some(Visibility::Private),
            allow_spectators: None,
            password: Some("s3cret".into()),
        }
        .into_settings();
        let session = Session::new(
            &host,
            "Private drill".into(),
            None,
            GameType::QuizBattle,
            GameMode::Desktop,
            10,
            settings,
        );

        let summary = SessionSummary::from(&session);
        assert!(summary.settings.has_password);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("s3cret"));
        assert!(json.contains("\"hasPassword\":true"));
    }
}
