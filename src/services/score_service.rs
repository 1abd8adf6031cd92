//! Score reconciliation: running-score updates, immutable score records and
//! write-time best flags.
//!
//! Submission order matters: the session's running score is updated first and
//! the submission aborts before any write when the user is not a participant,
//! so the score collection never contains orphaned records.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthContext,
    dao::{models::ScoreEntity, session_store::BestScope},
    dto::score::SubmitScoreRequest,
    error::ServiceError,
    services::{events, session_service},
    state::{SharedState, lifecycle::SessionStatus},
};

/// Record a score submission for `user` in `session_id`.
///
/// Persists the updated session, writes an immutable score record carrying
/// the three write-time best flags, and fans the result out to the session
/// room and the leaderboard rooms.
pub async fn submit_score(
    state: &SharedState,
    session_id: Uuid,
    user: &AuthContext,
    request: SubmitScoreRequest,
) -> Result<ScoreEntity, ServiceError> {
    request.validate()?;

    let gate = state.session_gate(session_id);
    let _guard = gate.lock().await;

    let stores = state.require_stores().await?;
    let mut session = session_service::load_session(&stores, session_id).await?;

    // Scores only flow while the drill runs; terminal sessions have frozen
    // results and waiting rooms have no gameplay to score.
    if !matches!(
        session.status,
        SessionStatus::Active | SessionStatus::Paused
    ) {
        return Err(ServiceError::InvalidState(format!(
            "session `{session_id}` is not accepting score submissions"
        )));
    }

    let (targets_hit, total_targets) = request
        .game_data
        .map(|data| (data.targets_hit, data.total_targets))
        .unwrap_or((0, 0));

    let participant = session
        .update_score(user.user_id, request.score, targets_hit, total_targets)
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "user `{}` is not a participant of session `{session_id}`",
                user.user_id
            ))
        })?
        .clone();
    stores.sessions.save_session(session.clone().into()).await?;

    // Best flags are decided at write time against the prior maxima and are
    // never revisited. Strict comparison: a tie is not a new best.
    let score = request.score;
    let is_personal_best = beats_prior(
        stores
            .scores
            .best_score(BestScope::User(user.user_id), session.game_type, session.mode)
            .await?,
        score,
    );
    let is_school_best = beats_prior(
        stores
            .scores
            .best_score(
                BestScope::School(user.school.clone()),
                session.game_type,
                session.mode,
            )
            .await?,
        score,
    );
    let is_global_best = beats_prior(
        stores
            .scores
            .best_score(BestScope::Global, session.game_type, session.mode)
            .await?,
        score,
    );

    let record = ScoreEntity {
        id: Uuid::new_v4(),
        session_id,
        user_id: user.user_id,
        user_name: user.name.clone(),
        game_type: session.game_type,
        mode: session.mode,
        score,
        targets_hit,
        total_targets,
        school: Some(user.school.clone()),
        region: Some(user.region.clone()),
        difficulty: session.settings.difficulty,
        is_personal_best,
        is_school_best,
        is_global_best,
        created_at: SystemTime::now(),
    };
    stores.scores.insert_score(record.clone()).await?;

    info!(
        %session_id,
        user = %user.user_id,
        score,
        personal_best = is_personal_best,
        "score recorded"
    );
    events::score_updated(state.hub(), session_id, &participant);
    events::leaderboard_update(state.hub(), &record);
    Ok(record)
}

fn beats_prior(prior_max: Option<u32>, score: u32) -> bool {
    match prior_max {
        // Empty history: the first record is a best by definition.
        None => true,
        Some(max) => score > max,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        auth::{Role, TokenTableAuthProvider},
        config::AppConfig,
        dao::session_store::memory::MemoryStore,
        dto::{
            score::GameDataInput,
            session::CreateSessionRequest,
        },
        state::{
            AppState, StoreHandles,
            rooms::RoomKey,
            session::{GameMode, GameType},
        },
    };

    async fn test_state() -> (SharedState, MemoryStore) {
        let auth = Arc::new(TokenTableAuthProvider::new(Vec::new()));
        let state = AppState::new(AppConfig::default(), auth);
        let store = MemoryStore::new();
        state
            .install_stores(StoreHandles {
                sessions: Arc::new(store.clone()),
                scores: Arc::new(store.clone()),
            })
            .await;
        (state, store)
    }

    fn identity(name: &str, role: Role, school: &str) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            name: name.into(),
            role,
            school: school.into(),
            region: "Pacific".into(),
        }
    }

    async fn active_session(
        state: &SharedState,
        host: &AuthContext,
        players: &[&AuthContext],
    ) -> Uuid {
        let session = session_service::create_session(
            state,
            host,
            CreateSessionRequest {
                name: "Quake drill".into(),
                description: None,
                game_type: GameType::RescueRush,
                mode: GameMode::Desktop,
                max_participants: Some(10),
                settings: None,
            },
        )
        .await
        .unwrap();
        for player in players {
            session_service::join_session(state, session.id, player)
                .await
                .unwrap();
        }
        session_service::start_session(state, session.id, host)
            .await
            .unwrap();
        session.id
    }

    fn submission(score: u32, hit: u32, total: u32) -> SubmitScoreRequest {
        SubmitScoreRequest {
            score,
            game_data: Some(GameDataInput {
                targets_hit: hit,
                total_targets: total,
            }),
        }
    }

    #[tokio::test]
    async fn non_participant_submission_writes_nothing() {
        let (state, store) = test_state().await;
        let host = identity("Ms. Reyes", Role::Teacher, "Northview High");
        let a = identity("A", Role::Student, "Northview High");
        let b = identity("B", Role::Student, "Northview High");
        let session_id = active_session(&state, &host, &[&a, &b]).await;

        let outsider = identity("X", Role::Student, "Northview High");
        let err = submit_score(&state, session_id, &outsider, submission(99, 0, 0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert_eq!(store.score_count().await, 0);
    }

    #[tokio::test]
    async fn submissions_stop_once_the_session_ends() {
        let (state, store) = test_state().await;
        let host = identity("Ms. Reyes", Role::Teacher, "Northview High");
        let a = identity("A", Role::Student, "Northview High");
        let b = identity("B", Role::Student, "Northview High");
        let session_id = active_session(&state, &host, &[&a, &b]).await;

        session_service::end_session(&state, session_id, &host)
            .await
            .unwrap();

        // No record and no best flags for a finished drill.
        let err = submit_score(&state, session_id, &a, submission(999, 9, 9))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "state");
        assert_eq!(store.score_count().await, 0);
    }

    #[tokio::test]
    async fn submissions_are_rejected_before_the_start() {
        let (state, store) = test_state().await;
        let host = identity("Ms. Reyes", Role::Teacher, "Northview High");
        let a = identity("A", Role::Student, "Northview High");
        let session = session_service::create_session(
            &state,
            &host,
            CreateSessionRequest {
                name: "Quake drill".into(),
                description: None,
                game_type: GameType::RescueRush,
                mode: GameMode::Desktop,
                max_participants: Some(10),
                settings: None,
            },
        )
        .await
        .unwrap();
        session_service::join_session(&state, session.id, &a)
            .await
            .unwrap();

        let err = submit_score(&state, session.id, &a, submission(10, 1, 2))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "state");
        assert_eq!(store.score_count().await, 0);
    }

    #[tokio::test]
    async fn submission_updates_the_running_score() {
        let (state, _) = test_state().await;
        let host = identity("Ms. Reyes", Role::Teacher, "Northview High");
        let a = identity("A", Role::Student, "Northview High");
        let b = identity("B", Role::Student, "Northview High");
        let session_id = active_session(&state, &host, &[&a, &b]).await;

        submit_score(&state, session_id, &a, submission(120, 9, 12))
            .await
            .unwrap();
        let session = session_service::get_session(&state, session_id)
            .await
            .unwrap();
        let participant = session.participants.get(&a.user_id).unwrap();
        assert_eq!(participant.score, 120);
        assert_eq!(participant.targets_hit, 9);
        assert_eq!(participant.total_targets, 12);
    }

    #[tokio::test]
    async fn first_record_is_best_in_every_scope() {
        let (state, _) = test_state().await;
        let host = identity("Ms. Reyes", Role::Teacher, "Northview High");
        let a = identity("A", Role::Student, "Northview High");
        let b = identity("B", Role::Student, "Northview High");
        let session_id = active_session(&state, &host, &[&a, &b]).await;

        let record = submit_score(&state, session_id, &a, submission(100, 8, 10))
            .await
            .unwrap();
        assert!(record.is_personal_best);
        assert!(record.is_school_best);
        assert!(record.is_global_best);
    }

    #[tokio::test]
    async fn ties_never_flip_a_best_flag() {
        let (state, _) = test_state().await;
        let host = identity("Ms. Reyes", Role::Teacher, "Northview High");
        let a = identity("A", Role::Student, "Northview High");
        let b = identity("B", Role::Student, "Northview High");
        let session_id = active_session(&state, &host, &[&a, &b]).await;

        submit_score(&state, session_id, &a, submission(100, 8, 10))
            .await
            .unwrap();

        // Same school, equal score: personal best for b (first record in the
        // user scope), but neither a school nor a global best.
        let record = submit_score(&state, session_id, &b, submission(100, 7, 10))
            .await
            .unwrap();
        assert!(record.is_personal_best);
        assert!(!record.is_school_best);
        assert!(!record.is_global_best);
    }

    #[tokio::test]
    async fn best_flags_scope_by_school() {
        let (state, _) = test_state().await;
        let host = identity("Ms. Reyes", Role::Teacher, "Northview High");
        let a = identity("A", Role::Student, "Northview High");
        let b = identity("B", Role::Student, "Eastside Middle");
        let session_id = active_session(&state, &host, &[&a, &b]).await;

        submit_score(&state, session_id, &a, submission(100, 8, 10))
            .await
            .unwrap();

        // Lower score but the first record for a different school.
        let record = submit_score(&state, session_id, &b, submission(60, 5, 10))
            .await
            .unwrap();
        assert!(record.is_personal_best);
        assert!(record.is_school_best);
        assert!(!record.is_global_best);
    }

    #[tokio::test]
    async fn leaderboard_updates_reach_lobby_and_school_rooms() {
        let (state, _) = test_state().await;
        let host = identity("Ms. Reyes", Role::Teacher, "Northview High");
        let a = identity("A", Role::Student, "Northview High");
        let b = identity("B", Role::Student, "Northview High");
        let session_id = active_session(&state, &host, &[&a, &b]).await;

        // A same-school listener gets lobby + school + region copies; a
        // different-school listener only the lobby + region copies.
        let (same_tx, mut same_rx) = tokio::sync::mpsc::unbounded_channel();
        state
            .hub()
            .register(identity("L1", Role::Student, "Northview High"), same_tx);
        let (other_tx, mut other_rx) = tokio::sync::mpsc::unbounded_channel();
        state
            .hub()
            .register(identity("L2", Role::Student, "Eastside Middle"), other_tx);

        submit_score(&state, session_id, &a, submission(100, 8, 10))
            .await
            .unwrap();

        let mut same_count = 0;
        while same_rx.try_recv().is_ok() {
            same_count += 1;
        }
        let mut other_count = 0;
        while other_rx.try_recv().is_ok() {
            other_count += 1;
        }
        assert_eq!(same_count, 3);
        assert_eq!(other_count, 2);

        // Neither listener was in the game room, so no score:updated copies.
        assert_eq!(state.hub().room_size(&RoomKey::Game(session_id)), 0);
    }
}
