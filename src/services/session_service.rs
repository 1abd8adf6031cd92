//! Session lifecycle and membership control.
//!
//! Every mutating operation runs under the per-session gate: it re-reads the
//! committed state, validates all preconditions on an in-memory copy and only
//! persists when everything passed, so a failed operation never leaves a
//! partial mutation behind.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthContext,
    dao::models::SessionListItemEntity,
    dto::session::CreateSessionRequest,
    error::ServiceError,
    services::events,
    state::{
        SharedState, StoreHandles,
        lifecycle::{SessionEvent, SessionStatus, transition},
        session::{
            DEFAULT_PARTICIPANTS, MIN_PARTICIPANTS, Participant, ParticipantStatus, Session,
            compute_results,
        },
    },
};

/// Create a session in the `waiting` state, hosted by `host`.
///
/// Requires a host-eligible role. Capacity defaults to
/// [`DEFAULT_PARTICIPANTS`] and out-of-range values are rejected by payload
/// validation before anything is persisted.
pub async fn create_session(
    state: &SharedState,
    host: &AuthContext,
    request: CreateSessionRequest,
) -> Result<Session, ServiceError> {
    request.validate()?;
    if !host.role.is_host_eligible() {
        return Err(ServiceError::Forbidden(
            "only teachers and admins may create sessions".into(),
        ));
    }

    let stores = state.require_stores().await?;
    let capacity = request.max_participants.unwrap_or(DEFAULT_PARTICIPANTS);
    let settings = request
        .settings
        .map(|input| input.into_settings())
        .unwrap_or_default();

    let session = Session::new(
        host,
        request.name,
        request.description,
        request.game_type,
        request.mode,
        capacity,
        settings,
    );
    stores.sessions.save_session(session.clone().into()).await?;

    info!(
        session_id = %session.id,
        host = %host.user_id,
        game_type = session.game_type.as_str(),
        "session created"
    );
    events::session_created(state.hub(), &session);
    Ok(session)
}

/// List all stored sessions.
pub async fn list_sessions(state: &SharedState) -> Result<Vec<SessionListItemEntity>, ServiceError> {
    let stores = state.require_stores().await?;
    Ok(stores.sessions.list_sessions().await?)
}

/// Fetch one session by id.
pub async fn get_session(state: &SharedState, session_id: Uuid) -> Result<Session, ServiceError> {
    let stores = state.require_stores().await?;
    load_session(&stores, session_id).await
}

/// Add `user` to the participant list of a `waiting` session.
pub async fn join_session(
    state: &SharedState,
    session_id: Uuid,
    user: &AuthContext,
) -> Result<Session, ServiceError> {
    let gate = state.session_gate(session_id);
    let _guard = gate.lock().await;

    let stores = state.require_stores().await?;
    let mut session = load_session(&stores, session_id).await?;

    if session.status != SessionStatus::Waiting {
        return Err(ServiceError::InvalidState(format!(
            "session `{session_id}` is no longer accepting participants"
        )));
    }
    if session.participants.contains_key(&user.user_id) {
        return Err(ServiceError::AlreadyJoined { session_id });
    }
    if session.is_full() {
        return Err(ServiceError::SessionFull {
            current: session.participants.len(),
            max: session.max_participants,
        });
    }

    session.participants.insert(
        user.user_id,
        Participant {
            user_id: user.user_id,
            name: user.name.clone(),
            joined_at: SystemTime::now(),
            score: 0,
            targets_hit: 0,
            total_targets: 0,
            status: ParticipantStatus::Waiting,
        },
    );
    session.updated_at = SystemTime::now();
    stores.sessions.save_session(session.clone().into()).await?;

    info!(%session_id, user = %user.user_id, "participant joined");
    events::player_joined(state.hub(), &session, user.user_id, &user.name);
    Ok(session)
}

/// Remove `user` from the participant list. Silent no-op when absent.
pub async fn leave_session(
    state: &SharedState,
    session_id: Uuid,
    user: &AuthContext,
) -> Result<Session, ServiceError> {
    let gate = state.session_gate(session_id);
    let _guard = gate.lock().await;

    let stores = state.require_stores().await?;
    let mut session = load_session(&stores, session_id).await?;

    // shift_remove keeps the join order of the remaining participants.
    if session.participants.shift_remove(&user.user_id).is_some() {
        session.updated_at = SystemTime::now();
        stores.sessions.save_session(session.clone().into()).await?;
        info!(%session_id, user = %user.user_id, "participant left");
        events::player_left(state.hub(), &session, user.user_id, &user.name);
    }
    Ok(session)
}

/// Handle a participant's socket dropping.
///
/// While the session is still gathering players the participant is removed,
/// as an explicit leave would. Mid-game the roster entry is kept and marked
/// [`ParticipantStatus::Disconnected`] so the final results still rank the
/// dropped player on their last submitted score.
pub async fn disconnect_participant(
    state: &SharedState,
    session_id: Uuid,
    user: &AuthContext,
) -> Result<(), ServiceError> {
    let gate = state.session_gate(session_id);
    let _guard = gate.lock().await;

    let stores = state.require_stores().await?;
    let mut session = load_session(&stores, session_id).await?;

    match session.status {
        SessionStatus::Waiting | SessionStatus::Starting => {
            if session.participants.shift_remove(&user.user_id).is_some() {
                session.updated_at = SystemTime::now();
                stores.sessions.save_session(session.clone().into()).await?;
                info!(%session_id, user = %user.user_id, "participant left on disconnect");
                events::player_left(state.hub(), &session, user.user_id, &user.name);
            }
        }
        SessionStatus::Active | SessionStatus::Paused => {
            if let Some(participant) = session.participants.get_mut(&user.user_id) {
                participant.status = ParticipantStatus::Disconnected;
                session.updated_at = SystemTime::now();
                stores.sessions.save_session(session.clone().into()).await?;
                info!(%session_id, user = %user.user_id, "participant disconnected mid-game");
                events::player_left(state.hub(), &session, user.user_id, &user.name);
            }
        }
        SessionStatus::Completed | SessionStatus::Cancelled => {}
    }
    Ok(())
}

/// Start gameplay. Host only, needs at least [`MIN_PARTICIPANTS`] and a
/// startable status. `started_at` is set exactly once.
pub async fn start_session(
    state: &SharedState,
    session_id: Uuid,
    caller: &AuthContext,
) -> Result<Session, ServiceError> {
    let gate = state.session_gate(session_id);
    let _guard = gate.lock().await;

    let stores = state.require_stores().await?;
    let mut session = load_session(&stores, session_id).await?;

    ensure_host(&session, caller, "start")?;
    let next = transition(session.status, SessionEvent::Start)?;
    if session.participants.len() < MIN_PARTICIPANTS as usize {
        return Err(ServiceError::InvalidState(format!(
            "at least {MIN_PARTICIPANTS} participants are required to start"
        )));
    }

    session.status = next;
    if session.started_at.is_none() {
        session.started_at = Some(SystemTime::now());
    }
    for participant in session.participants.values_mut() {
        participant.status = ParticipantStatus::Playing;
    }
    session.updated_at = SystemTime::now();
    stores.sessions.save_session(session.clone().into()).await?;

    info!(%session_id, participants = session.participants.len(), "session started");
    events::game_started(state.hub(), &session);
    Ok(session)
}

/// End gameplay and publish the final ranked results. Host only; valid from
/// `active` and `paused`.
pub async fn end_session(
    state: &SharedState,
    session_id: Uuid,
    caller: &AuthContext,
) -> Result<Session, ServiceError> {
    let gate = state.session_gate(session_id);
    let _guard = gate.lock().await;

    let stores = state.require_stores().await?;
    let mut session = load_session(&stores, session_id).await?;

    ensure_host(&session, caller, "end")?;
    session.status = transition(session.status, SessionEvent::End)?;
    session.ended_at = Some(SystemTime::now());
    session.results = compute_results(&session.participants);
    for participant in session.participants.values_mut() {
        // Dropped players keep their disconnected marker in the final record.
        if participant.status != ParticipantStatus::Disconnected {
            participant.status = ParticipantStatus::Completed;
        }
    }
    session.updated_at = SystemTime::now();
    stores.sessions.save_session(session.clone().into()).await?;
    state.discard_session_gate(session_id);

    info!(%session_id, "session completed");
    events::game_ended(state.hub(), &session);
    Ok(session)
}

/// Force-cancel a session from any non-terminal state. Internal operation
/// used by the inactivity sweep; not exposed as a client command.
pub async fn cancel_session(
    state: &SharedState,
    session_id: Uuid,
    reason: &str,
) -> Result<Session, ServiceError> {
    let gate = state.session_gate(session_id);
    let _guard = gate.lock().await;

    let stores = state.require_stores().await?;
    let mut session = load_session(&stores, session_id).await?;

    session.status = transition(session.status, SessionEvent::Cancel)?;
    session.ended_at = Some(SystemTime::now());
    session.updated_at = SystemTime::now();
    stores.sessions.save_session(session.clone().into()).await?;
    state.discard_session_gate(session_id);

    info!(%session_id, reason, "session cancelled");
    events::game_cancelled(state.hub(), session_id, reason);
    Ok(session)
}

pub(crate) async fn load_session(
    stores: &StoreHandles,
    session_id: Uuid,
) -> Result<Session, ServiceError> {
    let entity = stores
        .sessions
        .find_session(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}`")))?;
    Ok(entity.into())
}

fn ensure_host(
    session: &Session,
    caller: &AuthContext,
    action: &str,
) -> Result<(), ServiceError> {
    if session.host_id != caller.user_id {
        return Err(ServiceError::Forbidden(format!(
            "only the host may {action} the session"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        auth::{Role, TokenTableAuthProvider},
        config::AppConfig,
        dao::session_store::{SessionStore, memory::MemoryStore},
        dto::session::{CreateSessionRequest, SessionSettingsInput},
        state::{
            AppState,
            session::{GameMode, GameType, Visibility},
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

    fn identity(name: &str, role: Role) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            name: name.into(),
            role,
            school: "Northview High".into(),
            region: "Pacific".into(),
        }
    }

    fn create_request(capacity: Option<u8>) -> CreateSessionRequest {
        CreateSessionRequest {
            name: "Quake drill".into(),
            description: None,
            game_type: GameType::RescueRush,
            mode: GameMode::Desktop,
            max_participants: capacity,
            settings: None,
        }
    }

    #[tokio::test]
    async fn students_cannot_create_sessions() {
        let (state, _) = test_state().await;
        let student = identity("Sam", Role::Student);
        let err = create_session(&state, &student, create_request(None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "authorization");
    }

    #[tokio::test]
    async fn capacity_defaults_and_rejects_out_of_range() {
        let (state, _) = test_state().await;
        let host = identity("Ms. Reyes", Role::Teacher);

        let session = create_session(&state, &host, create_request(None))
            .await
            .unwrap();
        assert_eq!(session.max_participants, DEFAULT_PARTICIPANTS);
        assert_eq!(session.status, SessionStatus::Waiting);

        let err = create_session(&state, &host, create_request(Some(1)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        let err = create_session(&state, &host, create_request(Some(51)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn join_enforces_state_identity_and_capacity() {
        let (state, _) = test_state().await;
        let host = identity("Ms. Reyes", Role::Teacher);
        let session = create_session(&state, &host, create_request(Some(2)))
            .await
            .unwrap();

        let a = identity("A", Role::Student);
        let b = identity("B", Role::Student);
        let c = identity("C", Role::Student);

        join_session(&state, session.id, &a).await.unwrap();
        let err = join_session(&state, session.id, &a).await.unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(matches!(err, ServiceError::AlreadyJoined { .. }));

        join_session(&state, session.id, &b).await.unwrap();
        let err = join_session(&state, session.id, &c).await.unwrap_err();
        assert_eq!(err.kind(), "capacity");

        let err = join_session(&state, Uuid::new_v4(), &c).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn join_is_rejected_after_start() {
        let (state, _) = test_state().await;
        let host = identity("Ms. Reyes", Role::Teacher);
        let session = create_session(&state, &host, create_request(Some(5)))
            .await
            .unwrap();
        let a = identity("A", Role::Student);
        let b = identity("B", Role::Student);
        join_session(&state, session.id, &a).await.unwrap();
        join_session(&state, session.id, &b).await.unwrap();
        start_session(&state, session.id, &host).await.unwrap();

        let late = identity("Late", Role::Student);
        let err = join_session(&state, session.id, &late).await.unwrap_err();
        assert_eq!(err.kind(), "state");
    }

    #[tokio::test]
    async fn leave_is_a_silent_noop_when_absent() {
        let (state, _) = test_state().await;
        let host = identity("Ms. Reyes", Role::Teacher);
        let session = create_session(&state, &host, create_request(None))
            .await
            .unwrap();
        let a = identity("A", Role::Student);

        join_session(&state, session.id, &a).await.unwrap();
        let after_first = leave_session(&state, session.id, &a).await.unwrap();
        assert!(after_first.participants.is_empty());

        // Leaving again must not error.
        let after_second = leave_session(&state, session.id, &a).await.unwrap();
        assert!(after_second.participants.is_empty());
    }

    #[tokio::test]
    async fn disconnect_removes_waiting_and_marks_playing_participants() {
        let (state, _) = test_state().await;
        let host = identity("Ms. Reyes", Role::Teacher);
        let session = create_session(&state, &host, create_request(None))
            .await
            .unwrap();
        let a = identity("A", Role::Student);
        let b = identity("B", Role::Student);
        join_session(&state, session.id, &a).await.unwrap();
        join_session(&state, session.id, &b).await.unwrap();

        // Before the start a dropped socket behaves like an explicit leave.
        disconnect_participant(&state, session.id, &b)
            .await
            .unwrap();
        let current = get_session(&state, session.id).await.unwrap();
        assert!(!current.participants.contains_key(&b.user_id));

        join_session(&state, session.id, &b).await.unwrap();
        start_session(&state, session.id, &host).await.unwrap();

        disconnect_participant(&state, session.id, &a)
            .await
            .unwrap();
        let current = get_session(&state, session.id).await.unwrap();
        let dropped = current.participants.get(&a.user_id).unwrap();
        assert_eq!(dropped.status, ParticipantStatus::Disconnected);

        // The dropped player still ranks in the final results and keeps the
        // disconnected marker through the end of the session.
        let ended = end_session(&state, session.id, &host).await.unwrap();
        assert!(ended.results.iter().any(|r| r.user_id == a.user_id));
        assert_eq!(
            ended.participants.get(&a.user_id).unwrap().status,
            ParticipantStatus::Disconnected
        );
        assert_eq!(
            ended.participants.get(&b.user_id).unwrap().status,
            ParticipantStatus::Completed
        );
    }

    #[tokio::test]
    async fn start_requires_host_and_two_participants() {
        let (state, _) = test_state().await;
        let host = identity("Ms. Reyes", Role::Teacher);
        let session = create_session(&state, &host, create_request(None))
            .await
            .unwrap();
        let a = identity("A", Role::Student);
        join_session(&state, session.id, &a).await.unwrap();

        let err = start_session(&state, session.id, &a).await.unwrap_err();
        assert_eq!(err.kind(), "authorization");

        let err = start_session(&state, session.id, &host).await.unwrap_err();
        assert_eq!(err.kind(), "state");

        let b = identity("B", Role::Student);
        join_session(&state, session.id, &b).await.unwrap();
        let started = start_session(&state, session.id, &host).await.unwrap();
        assert_eq!(started.status, SessionStatus::Active);
        assert!(started.started_at.is_some());
        assert!(
            started
                .participants
                .values()
                .all(|p| p.status == ParticipantStatus::Playing)
        );

        // Starting twice is a state error, not a second startedAt write.
        let err = start_session(&state, session.id, &host).await.unwrap_err();
        assert_eq!(err.kind(), "state");
    }

    #[tokio::test]
    async fn end_computes_ranked_results() {
        let (state, store) = test_state().await;
        let host = identity("Ms. Reyes", Role::Teacher);
        let session = create_session(&state, &host, create_request(Some(2)))
            .await
            .unwrap();
        let a = identity("A", Role::Student);
        let b = identity("B", Role::Student);
        join_session(&state, session.id, &a).await.unwrap();
        join_session(&state, session.id, &b).await.unwrap();
        start_session(&state, session.id, &host).await.unwrap();

        // Seed scores through the store, the way the reconciler persists them.
        let stores = state.require_stores().await.unwrap();
        let mut current = load_session(&stores, session.id).await.unwrap();
        current.update_score(a.user_id, 50, 5, 10).unwrap();
        current.update_score(b.user_id, 80, 8, 10).unwrap();
        store
            .save_session(current.into())
            .await
            .unwrap();

        let err = end_session(&state, session.id, &a).await.unwrap_err();
        assert_eq!(err.kind(), "authorization");

        let ended = end_session(&state, session.id, &host).await.unwrap();
        assert_eq!(ended.status, SessionStatus::Completed);
        assert!(ended.ended_at.is_some());
        assert_eq!(ended.results.len(), 2);
        assert_eq!(ended.results[0].user_id, b.user_id);
        assert_eq!(ended.results[0].rank, 1);
        assert_eq!(ended.results[0].final_score, 80);
        assert_eq!(ended.results[1].user_id, a.user_id);
        assert_eq!(ended.results[1].rank, 2);
        assert_eq!(ended.results[1].final_score, 50);

        // Terminal: nothing else applies.
        let err = end_session(&state, session.id, &host).await.unwrap_err();
        assert_eq!(err.kind(), "state");
        let err = cancel_session(&state, session.id, "late").await.unwrap_err();
        assert_eq!(err.kind(), "state");
    }

    #[tokio::test]
    async fn cancel_works_from_waiting() {
        let (state, _) = test_state().await;
        let host = identity("Ms. Reyes", Role::Teacher);
        let session = create_session(&state, &host, create_request(None))
            .await
            .unwrap();

        let cancelled = cancel_session(&state, session.id, "inactivity")
            .await
            .unwrap();
        assert_eq!(cancelled.status, SessionStatus::Cancelled);
        assert!(cancelled.ended_at.is_some());
    }

    #[tokio::test]
    async fn private_sessions_are_not_announced_to_the_lobby() {
        let (state, _) = test_state().await;
        let host = identity("Ms. Reyes", Role::Teacher);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let listener = identity("Listener", Role::Student);
        state.hub().register(listener, tx);

        let mut request = create_request(None);
        request.settings = Some(SessionSettingsInput {
            duration_secs: None,
            difficulty: None,
            visibility: Some(Visibility::Private),
            allow_spectators: None,
            password: None,
        });
        create_session(&state, &host, request).await.unwrap();
        assert!(rx.try_recv().is_err());

        create_session(&state, &host, create_request(None))
            .await
            .unwrap();
        let frame = rx.try_recv().unwrap();
        let text = match frame {
            axum::extract::ws::Message::Text(text) => text.to_string(),
            other => panic!("expected text frame, got {other:?}"),
        };
        assert!(text.contains("game:created"));
    }
}
