//! Background sweep cancelling sessions abandoned in the `waiting` state.

use std::time::{Duration, SystemTime};

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::state::SharedState;

use super::session_service;

const CANCEL_REASON: &str = "cancelled after waiting-room inactivity";

/// Periodically scan for stale `waiting` sessions and force-cancel them.
/// Interval and inactivity window come from the application config.
pub async fn run(state: SharedState) {
    let mut ticker = interval(state.config().sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately, which also cleans up sessions left
    // over from a previous run.
    loop {
        ticker.tick().await;
        sweep_once(&state, state.config().waiting_timeout).await;
    }
}

/// One sweep pass; factored out of the loop for tests.
pub async fn sweep_once(state: &SharedState, waiting_timeout: Duration) {
    let Some(stores) = state.stores().await else {
        debug!("sweep skipped: storage degraded");
        return;
    };

    let cutoff = SystemTime::now() - waiting_timeout;
    let stale = match stores.sessions.stale_waiting(cutoff).await {
        Ok(ids) => ids,
        Err(err) => {
            warn!(error = %err, "sweep scan failed");
            return;
        }
    };
    if stale.is_empty() {
        return;
    }

    info!(count = stale.len(), "cancelling stale waiting sessions");
    for session_id in stale {
        // A session may have been started or cancelled between the scan and
        // this point; the per-session gate makes the loser see a state error.
        if let Err(err) = session_service::cancel_session(state, session_id, CANCEL_REASON).await {
            debug!(%session_id, error = %err, "stale session already transitioned");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::{
        auth::{AuthContext, Role, TokenTableAuthProvider},
        config::AppConfig,
        dao::session_store::{SessionStore, memory::MemoryStore},
        dto::session::CreateSessionRequest,
        error::ServiceError,
        state::{
            AppState, StoreHandles,
            lifecycle::SessionStatus,
            rooms::RoomKey,
            session::{GameMode, GameType},
        },
    };

    async fn test_state() -> (crate::state::SharedState, MemoryStore) {
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

    fn host() -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            name: "Ms. Reyes".into(),
            role: Role::Teacher,
            school: "Northview High".into(),
            region: "Pacific".into(),
        }
    }

    async fn waiting_session(state: &crate::state::SharedState) -> Uuid {
        session_service::create_session(
            state,
            &host(),
            CreateSessionRequest {
                name: "Quake drill".into(),
                description: None,
                game_type: GameType::RescueRush,
                mode: GameMode::Desktop,
                max_participants: None,
                settings: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn stale_waiting_sessions_are_cancelled() {
        let (state, store) = test_state().await;
        let stale_id = waiting_session(&state).await;
        let fresh_id = waiting_session(&state).await;

        // Age the first session past the inactivity window.
        let mut entity = store.find_session(stale_id).await.unwrap().unwrap();
        entity.created_at = SystemTime::now() - Duration::from_secs(45 * 60);
        store.save_session(entity).await.unwrap();

        // Subscribe a connection to the stale session room.
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let (connection_id, _) = state.hub().register(host(), tx);
        state.hub().join(connection_id, RoomKey::Game(stale_id));

        sweep_once(&state, Duration::from_secs(30 * 60)).await;

        let stale = session_service::get_session(&state, stale_id).await.unwrap();
        assert_eq!(stale.status, SessionStatus::Cancelled);
        assert!(stale.ended_at.is_some());
        let fresh = session_service::get_session(&state, fresh_id).await.unwrap();
        assert_eq!(fresh.status, SessionStatus::Waiting);

        let frame = rx.try_recv().unwrap();
        let text = match frame {
            axum::extract::ws::Message::Text(text) => text.to_string(),
            other => panic!("expected text frame, got {other:?}"),
        };
        assert!(text.contains("game:cancelled"));
        assert!(text.contains("inactivity"));
    }

    #[tokio::test]
    async fn sweep_is_a_noop_in_degraded_mode() {
        let (state, _) = test_state().await;
        state.clear_stores().await;
        // Must not panic or error.
        sweep_once(&state, Duration::from_secs(60)).await;
        assert!(matches!(
            state.require_stores().await,
            Err(ServiceError::Degraded)
        ));
    }
}
