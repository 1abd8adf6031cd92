//! Runtime representation of a multiplayer drill session.

use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{auth::AuthContext, state::lifecycle::SessionStatus};

/// Lowest allowed participant capacity.
pub const MIN_PARTICIPANTS: u8 = 2;
/// Highest allowed participant capacity.
pub const MAX_PARTICIPANTS: u8 = 50;
/// Capacity used when the creator does not specify one.
pub const DEFAULT_PARTICIPANTS: u8 = 10;

/// Closed set of playable drill game types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum GameType {
    /// Timed quiz duel on preparedness knowledge.
    QuizBattle,
    /// Arcade rescue drill: reach and free trapped victims.
    RescueRush,
    /// Spot-the-hazard exploration drill.
    HazardHunt,
    /// Race along a safe evacuation route.
    EvacuationRace,
}

impl GameType {
    /// Stable kebab-case name matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::QuizBattle => "quiz-battle",
            GameType::RescueRush => "rescue-rush",
            GameType::HazardHunt => "hazard-hunt",
            GameType::EvacuationRace => "evacuation-race",
        }
    }
}

/// Client platform the session is tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Keyboard/mouse clients.
    Desktop,
    /// Touch clients.
    Mobile,
}

impl GameMode {
    /// Stable lowercase name matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Desktop => "desktop",
            GameMode::Mobile => "mobile",
        }
    }
}

/// Difficulty selected in the session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Relaxed pacing for younger learners.
    Easy,
    /// Default pacing.
    Normal,
    /// Shorter timers, more hazards.
    Hard,
}

/// Whether the session shows up in public listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Listed for everyone.
    Public,
    /// Reachable only by id (and optional password).
    Private,
}

/// Per-participant lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    /// Joined, session not started.
    Waiting,
    /// Actively playing.
    Playing,
    /// Finished the drill.
    Completed,
    /// Connection lost mid-session.
    Disconnected,
}

/// Tunable settings chosen by the host at creation time.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Planned drill duration in seconds.
    pub duration_secs: u32,
    /// Difficulty preset.
    pub difficulty: Difficulty,
    /// Listing visibility.
    pub visibility: Visibility,
    /// Whether non-participants may subscribe to the session room.
    pub allow_spectators: bool,
    /// Optional join password for private sessions.
    pub password: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            duration_secs: 300,
            difficulty: Difficulty::Normal,
            visibility: Visibility::Public,
            allow_spectators: true,
            password: None,
        }
    }
}

/// Participant entry tracked inside a session.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Identity of the participant.
    pub user_id: Uuid,
    /// Display name captured at join time.
    pub name: String,
    /// When the participant joined.
    pub joined_at: SystemTime,
    /// Running score, overwritten by each submission.
    pub score: u32,
    /// Targets hit, used for the accuracy column of the results.
    pub targets_hit: u32,
    /// Total targets presented.
    pub total_targets: u32,
    /// Per-participant status.
    pub status: ParticipantStatus,
}

/// One row of the final ranked results.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEntry {
    /// Identity of the ranked participant.
    pub user_id: Uuid,
    /// Display name.
    pub name: String,
    /// 1-based rank, contiguous, ordered by descending final score.
    pub rank: u32,
    /// Score at the moment the session ended.
    pub final_score: u32,
    /// targets_hit / total_targets, 0 when no targets were presented.
    pub accuracy: f64,
    /// Placeholder for score-type-specific extensions.
    pub time_bonus: u32,
    /// Placeholder for score-type-specific extensions.
    pub survival_bonus: u32,
}

/// Aggregated state for a multiplayer drill session.
///
/// Participants are keyed by user id in an [`IndexMap`], which gives identity
/// uniqueness and stable join order by construction.
#[derive(Debug, Clone)]
pub struct Session {
    /// Primary key of the session.
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
    /// Ordered participant list keyed by user id.
    pub participants: IndexMap<Uuid, Participant>,
    /// Capacity bound, within [[`MIN_PARTICIPANTS`], [`MAX_PARTICIPANTS`]].
    pub max_participants: u8,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Host-chosen settings.
    pub settings: SessionSettings,
    /// Mutable game-state payload (current level, hazard positions, ...).
    pub game_state: serde_json::Value,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last mutation timestamp.
    pub updated_at: SystemTime,
    /// Set exactly once, on the transition into `active`.
    pub started_at: Option<SystemTime>,
    /// Set when the session reaches a terminal state.
    pub ended_at: Option<SystemTime>,
    /// Final ranked results, populated exactly once on entering `completed`.
    pub results: Vec<ResultEntry>,
    /// Owning school tag, taken from the host identity.
    pub school: Option<String>,
    /// Owning region tag, taken from the host identity.
    pub region: Option<String>,
}

impl Session {
    /// Build a new session in the `waiting` state, hosted by `host`.
    pub fn new(
        host: &AuthContext,
        name: String,
        description: Option<String>,
        game_type: GameType,
        mode: GameMode,
        max_participants: u8,
        settings: SessionSettings,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            game_type,
            mode,
            host_id: host.user_id,
            host_name: host.name.clone(),
            participants: IndexMap::new(),
            max_participants,
            status: SessionStatus::Waiting,
            settings,
            game_state: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
            started_at: None,
            ended_at: None,
            results: Vec::new(),
            school: Some(host.school.clone()),
            region: Some(host.region.clone()),
        }
    }

    /// Whether the participant list is at capacity.
    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.max_participants as usize
    }

    /// Overwrite a participant's running score and accuracy counters.
    ///
    /// Returns the updated participant, or `None` when the identity is not a
    /// current participant.
    pub fn update_score(
        &mut self,
        user_id: Uuid,
        score: u32,
        targets_hit: u32,
        total_targets: u32,
    ) -> Option<&Participant> {
        let participant = self.participants.get_mut(&user_id)?;
        participant.score = score;
        participant.targets_hit = targets_hit;
        participant.total_targets = total_targets;
        self.updated_at = SystemTime::now();
        Some(&*participant)
    }
}

/// Rank participants by descending score, stable on ties (join order wins).
///
/// Ranks form the contiguous sequence 1..=N. Accuracy is targets hit over
/// total targets, 0 when nothing was presented. Time and survival bonuses are
/// fixed at 0 until score-type-specific extensions land.
pub fn compute_results(participants: &IndexMap<Uuid, Participant>) -> Vec<ResultEntry> {
    let mut ranked: Vec<&Participant> = participants.values().collect();
    // Vec::sort_by is stable, so equal scores keep their join order.
    ranked.sort_by(|a, b| b.score.cmp(&a.score));

    ranked
        .into_iter()
        .enumerate()
        .map(|(position, participant)| {
            let accuracy = if participant.total_targets == 0 {
                0.0
            } else {
                f64::from(participant.targets_hit) / f64::from(participant.total_targets)
            };
            ResultEntry {
                user_id: participant.user_id,
                name: participant.name.clone(),
                rank: position as u32 + 1,
                final_score: participant.score,
                accuracy,
                time_bonus: 0,
                survival_bonus: 0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(name: &str, score: u32, hit: u32, total: u32) -> Participant {
        Participant {
            user_id: Uuid::new_v4(),
            name: name.to_string(),
            joined_at: SystemTime::now(),
            score,
            targets_hit: hit,
            total_targets: total,
            status: ParticipantStatus::Playing,
        }
    }

    fn roster(entries: Vec<Participant>) -> IndexMap<Uuid, Participant> {
        entries.into_iter().map(|p| (p.user_id, p)).collect()
    }

    #[test]
    fn results_ordered_by_descending_score() {
        let participants = roster(vec![
            participant("a", 50, 5, 10),
            participant("b", 80, 8, 10),
            participant("c", 10, 0, 0),
        ]);
        let results = compute_results(&participants);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].name, "b");
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[0].final_score, 80);
        assert_eq!(results[1].name, "a");
        assert_eq!(results[1].rank, 2);
        assert_eq!(results[2].name, "c");
        assert_eq!(results[2].rank, 3);
    }

    #[test]
    fn ties_preserve_join_order() {
        let participants = roster(vec![
            participant("first", 40, 0, 0),
            participant("second", 40, 0, 0),
            participant("third", 40, 0, 0),
        ]);
        let results = compute_results(&participants);
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["first", "second", "third"]);
        let ranks: Vec<u32> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, [1, 2, 3]);
    }

    #[test]
    fn accuracy_handles_zero_targets() {
        let participants = roster(vec![
            participant("a", 10, 3, 4),
            participant("b", 5, 0, 0),
        ]);
        let results = compute_results(&participants);
        assert_eq!(results[0].accuracy, 0.75);
        assert_eq!(results[1].accuracy, 0.0);
        assert_eq!(results[0].time_bonus, 0);
        assert_eq!(results[0].survival_bonus, 0);
    }

    #[test]
    fn update_score_requires_membership() {
        let host = AuthContext {
            user_id: Uuid::new_v4(),
            name: "Host".into(),
            role: crate::auth::Role::Teacher,
            school: "Northview High".into(),
            region: "Pacific".into(),
        };
        let mut session = Session::new(
            &host,
            "Quake drill".into(),
            None,
            GameType::RescueRush,
            GameMode::Desktop,
            DEFAULT_PARTICIPANTS,
            SessionSettings::default(),
        );

        assert!(session.update_score(Uuid::new_v4(), 10, 0, 0).is_none());

        let player = participant("a", 0, 0, 0);
        let player_id = player.user_id;
        session.participants.insert(player_id, player);
        let updated = session.update_score(player_id, 42, 4, 5).unwrap();
        assert_eq!(updated.score, 42);
        assert_eq!(updated.targets_hit, 4);
    }
}
