//! Score submission payloads and the persisted-score view.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::ScoreEntity,
    dto::format_system_time,
    state::session::{Difficulty, GameMode, GameType},
};

/// Payload accepted by `POST /sessions/{id}/scores` and the `playerScore`
/// command.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitScoreRequest {
    /// Running score to record for the submitting participant.
    pub score: u32,
    /// Optional accuracy counters from the client game loop.
    #[validate(nested)]
    pub game_data: Option<GameDataInput>,
}

/// Accuracy counters attached to a score submission.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameDataInput {
    /// Targets the player hit.
    pub targets_hit: u32,
    /// Targets the game presented.
    pub total_targets: u32,
}

/// Persisted score record as returned to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    /// Record identifier.
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
    /// Strictly above every prior score of this user in {game type, mode}.
    pub is_personal_best: bool,
    /// Strictly above every prior score of this school in {game type, mode}.
    pub is_school_best: bool,
    /// Strictly above every prior score in {game type, mode}.
    pub is_global_best: bool,
    /// Creation timestamp, RFC 3339.
    pub created_at: String,
}

impl From<&ScoreEntity> for ScoreSummary {
    fn from(entity: &ScoreEntity) -> Self {
        Self {
            id: entity.id,
            session_id: entity.session_id,
            user_id: entity.user_id,
            user_name: entity.user_name.clone(),
            game_type: entity.game_type,
            mode: entity.mode,
            score: entity.score,
            targets_hit: entity.targets_hit,
            total_targets: entity.total_targets,
            school: entity.school.clone(),
            region: entity.region.clone(),
            difficulty: entity.difficulty,
            is_personal_best: entity.is_personal_best,
            is_school_best: entity.is_school_best,
            is_global_best: entity.is_global_best,
            created_at: format_system_time(entity.created_at),
        }
    }
}
