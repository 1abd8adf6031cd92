//! WebSocket connection lifecycle: handshake, command dispatch, cleanup.
//!
//! The first frame on every connection must be an `authenticate` command and
//! must arrive within the configured handshake window; anything else closes
//! the connection. After the handshake each command is dispatched to the
//! service layer and failures come back as `error` events on the same
//! connection, never as a closed socket.

use std::time::SystemTime;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt, stream::SplitStream};
use tokio::{sync::mpsc, time::timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    auth::AuthContext,
    dto::{
        format_system_time,
        score::SubmitScoreRequest,
        ws::{ClientCommand, ServerEvent},
    },
    error::ServiceError,
    services::{score_service, session_service},
    state::{
        SharedState,
        rooms::{RoomKey, is_valid_room_id},
    },
};

const MAX_CHAT_MESSAGE_LEN: usize = 2000;

/// Drive one upgraded WebSocket connection to completion.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    let Some(identity) = handshake(&state, &tx, &mut stream).await else {
        drop(tx);
        let _ = writer.await;
        return;
    };

    let (connection_id, rooms) = state.hub().register(identity.clone(), tx.clone());
    info!(%connection_id, user = %identity.user_id, "websocket authenticated");
    state.hub().send_to_connection(
        connection_id,
        &ServerEvent::Authenticated {
            user_id: identity.user_id,
            name: identity.name.clone(),
            role: identity.role,
            rooms: rooms.iter().map(|room| room.to_string()).collect(),
        },
    );

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => dispatch(&state, connection_id, &identity, text.as_str()).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    finalize(&state, connection_id).await;
    drop(tx);
    let _ = writer.await;
}

/// Wait for the `authenticate` command and resolve the credential.
async fn handshake(
    state: &SharedState,
    tx: &mpsc::UnboundedSender<Message>,
    stream: &mut SplitStream<WebSocket>,
) -> Option<AuthContext> {
    let first = match timeout(state.config().handshake_timeout, stream.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(_) => {
            debug!("connection closed before authenticating");
            return None;
        }
        Err(_) => {
            debug!("handshake timed out");
            send_error(tx, "authentication", "authentication timed out");
            return None;
        }
    };

    let token = match serde_json::from_str::<ClientCommand>(first.as_str()) {
        Ok(ClientCommand::Authenticate { token }) => token,
        Ok(_) => {
            send_error(
                tx,
                "authentication",
                "the first command must be authenticate",
            );
            return None;
        }
        Err(err) => {
            send_error(tx, "validation", &format!("malformed command: {err}"));
            return None;
        }
    };

    match state.auth().authenticate(&token).await {
        Ok(identity) => Some(identity),
        Err(err) => {
            warn!(error = %err, "websocket authentication failed");
            send_error(tx, "authentication", &err.to_string());
            None
        }
    }
}

/// Error delivery before the connection is registered with the hub.
fn send_error(tx: &mpsc::UnboundedSender<Message>, kind: &str, message: &str) {
    let event = ServerEvent::Error {
        kind: kind.to_owned(),
        message: message.to_owned(),
    };
    if let Ok(payload) = serde_json::to_string(&event) {
        let _ = tx.send(Message::Text(payload.into()));
    }
}

async fn dispatch(state: &SharedState, connection_id: Uuid, identity: &AuthContext, raw: &str) {
    let command = match serde_json::from_str::<ClientCommand>(raw) {
        Ok(command) => command,
        Err(err) => {
            state.hub().send_to_connection(
                connection_id,
                &ServerEvent::Error {
                    kind: "validation".into(),
                    message: format!("malformed command: {err}"),
                },
            );
            return;
        }
    };

    if let Err(err) = run_command(state, connection_id, identity, command).await {
        state.hub().send_to_connection(
            connection_id,
            &ServerEvent::Error {
                kind: err.kind().to_owned(),
                message: err.to_string(),
            },
        );
    }
}

async fn run_command(
    state: &SharedState,
    connection_id: Uuid,
    identity: &AuthContext,
    command: ClientCommand,
) -> Result<(), ServiceError> {
    match command {
        ClientCommand::Authenticate { .. } => {
            warn!(%connection_id, "duplicate authenticate command ignored");
            Ok(())
        }
        ClientCommand::JoinRoom { room } => join_room(state, connection_id, identity, &room),
        ClientCommand::LeaveRoom { room } => leave_room(state, connection_id, identity, &room),
        ClientCommand::CreateSession(request) => {
            let session = session_service::create_session(state, identity, request).await?;
            state.hub().join(connection_id, RoomKey::Game(session.id));
            state.hub().send_to_connection(
                connection_id,
                &ServerEvent::SessionCreated {
                    session: (&session).into(),
                },
            );
            Ok(())
        }
        ClientCommand::JoinSession { session_id } => {
            // Subscribe before mutating so the joiner receives the
            // player:joined fan-out; roll back when the join is refused.
            let room = RoomKey::Game(session_id);
            let newly_subscribed = state.hub().join(connection_id, room.clone());
            match session_service::join_session(state, session_id, identity).await {
                Ok(session) => {
                    state.hub().send_to_connection(
                        connection_id,
                        &ServerEvent::SessionJoined {
                            session: (&session).into(),
                        },
                    );
                    Ok(())
                }
                Err(err) => {
                    if newly_subscribed && !matches!(err, ServiceError::AlreadyJoined { .. }) {
                        state.hub().leave(connection_id, &room);
                    }
                    Err(err)
                }
            }
        }
        ClientCommand::LeaveSession { session_id } => {
            session_service::leave_session(state, session_id, identity).await?;
            state
                .hub()
                .leave(connection_id, &RoomKey::Game(session_id));
            Ok(())
        }
        ClientCommand::StartSession { session_id } => {
            session_service::start_session(state, session_id, identity).await?;
            Ok(())
        }
        ClientCommand::EndSession { session_id } => {
            session_service::end_session(state, session_id, identity).await?;
            Ok(())
        }
        ClientCommand::PlayerScore {
            session_id,
            score,
            game_data,
        } => {
            let record = score_service::submit_score(
                state,
                session_id,
                identity,
                SubmitScoreRequest { score, game_data },
            )
            .await?;
            state.hub().send_to_connection(
                connection_id,
                &ServerEvent::ScoreSaved {
                    score: (&record).into(),
                },
            );
            Ok(())
        }
        ClientCommand::ChatMessage {
            room_id,
            message,
            kind,
        } => {
            if !is_valid_room_id(&room_id) {
                return Err(ServiceError::InvalidInput(format!(
                    "invalid chat room id `{room_id}`"
                )));
            }
            if message.trim().is_empty() || message.len() > MAX_CHAT_MESSAGE_LEN {
                return Err(ServiceError::InvalidInput(
                    "chat message must be 1-2000 characters".into(),
                ));
            }
            let room = RoomKey::Chat(room_id);
            if !state.hub().is_member(connection_id, &room) {
                return Err(ServiceError::Forbidden(
                    "join the chat room before sending messages".into(),
                ));
            }
            state.hub().emit(
                &room,
                &ServerEvent::ChatMessage {
                    room: room.to_string(),
                    user_id: identity.user_id,
                    name: identity.name.clone(),
                    message,
                    kind,
                    sent_at: format_system_time(SystemTime::now()),
                },
            );
            Ok(())
        }
    }
}

fn join_room(
    state: &SharedState,
    connection_id: Uuid,
    identity: &AuthContext,
    raw: &str,
) -> Result<(), ServiceError> {
    let room = parse_joinable(raw)?;
    if state.hub().join(connection_id, room.clone()) {
        state.hub().emit(
            &room,
            &ServerEvent::RoomJoined {
                room: room.to_string(),
                user_id: identity.user_id,
                name: identity.name.clone(),
            },
        );
    }
    Ok(())
}

fn leave_room(
    state: &SharedState,
    connection_id: Uuid,
    identity: &AuthContext,
    raw: &str,
) -> Result<(), ServiceError> {
    let room = parse_joinable(raw)?;
    if state.hub().leave(connection_id, &room) {
        let event = ServerEvent::RoomLeft {
            room: room.to_string(),
            user_id: identity.user_id,
            name: identity.name.clone(),
        };
        state.hub().emit(&room, &event);
        state.hub().send_to_connection(connection_id, &event);
    }
    Ok(())
}

fn parse_joinable(raw: &str) -> Result<RoomKey, ServiceError> {
    let room = RoomKey::parse(raw)
        .ok_or_else(|| ServiceError::InvalidInput(format!("unknown room key `{raw}`")))?;
    if !room.is_explicitly_joinable() {
        return Err(ServiceError::Forbidden(format!(
            "room `{room}` cannot be joined explicitly"
        )));
    }
    Ok(room)
}

/// Disconnect cleanup: drop all subscriptions and run participant cleanup
/// for every session room the identity had joined.
async fn finalize(state: &SharedState, connection_id: Uuid) {
    let Some((identity, rooms)) = state.hub().unregister(connection_id) else {
        return;
    };
    info!(%connection_id, user = %identity.user_id, "websocket disconnected");

    for room in rooms {
        match &room {
            RoomKey::Game(session_id) => {
                // Waiting rooms drop the participant like an explicit leave;
                // running sessions keep the roster entry marked disconnected.
                if let Err(err) =
                    session_service::disconnect_participant(state, *session_id, &identity).await
                {
                    debug!(session_id = %session_id, error = %err, "disconnect cleanup skipped");
                }
            }
            RoomKey::Chat(_) => {
                state.hub().emit(
                    &room,
                    &ServerEvent::RoomLeft {
                        room: room.to_string(),
                        user_id: identity.user_id,
                        name: identity.name.clone(),
                    },
                );
            }
            _ => {}
        }
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
        state::{AppState, StoreHandles},
    };

    async fn test_state() -> SharedState {
        let auth = Arc::new(TokenTableAuthProvider::new(Vec::new()));
        let state = AppState::new(AppConfig::default(), auth);
        let store = MemoryStore::new();
        state
            .install_stores(StoreHandles {
                sessions: Arc::new(store.clone()),
                scores: Arc::new(store),
            })
            .await;
        state
    }

    fn identity(name: &str) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            name: name.into(),
            role: Role::Student,
            school: "Northview High".into(),
            region: "Pacific".into(),
        }
    }

    fn connect(
        state: &SharedState,
        identity: AuthContext,
    ) -> (Uuid, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (connection_id, _) = state.hub().register(identity, tx);
        (connection_id, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let Message::Text(text) = message {
                frames.push(text.to_string());
            }
        }
        frames
    }

    #[tokio::test]
    async fn auto_subscribed_rooms_cannot_be_joined_or_left_explicitly() {
        let state = test_state().await;
        let me = identity("A");
        let (connection_id, _rx) = connect(&state, me.clone());

        let err = run_command(
            &state,
            connection_id,
            &me,
            ClientCommand::JoinRoom {
                room: "lobby".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "authorization");

        let err = run_command(
            &state,
            connection_id,
            &me,
            ClientCommand::LeaveRoom {
                room: format!("user:{}", me.user_id),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "authorization");

        let err = run_command(
            &state,
            connection_id,
            &me,
            ClientCommand::JoinRoom {
                room: "nonsense".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn join_session_replies_with_the_session() {
        let state = test_state().await;
        let mut host = identity("Ms. Reyes");
        host.role = Role::Teacher;
        let session = session_service::create_session(
            &state,
            &host,
            crate::dto::session::CreateSessionRequest {
                name: "Quake drill".into(),
                description: None,
                game_type: crate::state::session::GameType::RescueRush,
                mode: crate::state::session::GameMode::Desktop,
                max_participants: Some(5),
                settings: None,
            },
        )
        .await
        .unwrap();

        let me = identity("A");
        let (connection_id, mut rx) = connect(&state, me.clone());
        run_command(
            &state,
            connection_id,
            &me,
            ClientCommand::JoinSession {
                session_id: session.id,
            },
        )
        .await
        .unwrap();

        let frames = drain(&mut rx);
        // The caller gets the session back directly, on top of the room
        // fan-out every member receives.
        assert!(
            frames
                .iter()
                .any(|frame| frame.contains("session:joined") && frame.contains("Quake drill"))
        );
        assert!(frames.iter().any(|frame| frame.contains("player:joined")));
    }

    #[tokio::test]
    async fn chat_requires_membership_and_relays_to_members() {
        let state = test_state().await;
        let alice = identity("Alice");
        let bob = identity("Bob");
        let (alice_conn, mut alice_rx) = connect(&state, alice.clone());
        let (bob_conn, mut bob_rx) = connect(&state, bob.clone());

        let err = run_command(
            &state,
            alice_conn,
            &alice,
            ClientCommand::ChatMessage {
                room_id: "general".into(),
                message: "hi".into(),
                kind: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "authorization");

        for (conn, ctx) in [(alice_conn, &alice), (bob_conn, &bob)] {
            run_command(
                &state,
                conn,
                ctx,
                ClientCommand::JoinRoom {
                    room: "chat:general".into(),
                },
            )
            .await
            .unwrap();
        }
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        run_command(
            &state,
            alice_conn,
            &alice,
            ClientCommand::ChatMessage {
                room_id: "general".into(),
                message: "drill starts in 5".into(),
                kind: None,
            },
        )
        .await
        .unwrap();

        let bob_frames = drain(&mut bob_rx);
        assert_eq!(bob_frames.len(), 1);
        assert!(bob_frames[0].contains("chat:message"));
        assert!(bob_frames[0].contains("drill starts in 5"));
        // Sender is a member too, so the relay reaches them as well.
        assert_eq!(drain(&mut alice_rx).len(), 1);
    }

    #[tokio::test]
    async fn empty_chat_messages_are_rejected() {
        let state = test_state().await;
        let me = identity("A");
        let (connection_id, _rx) = connect(&state, me.clone());
        run_command(
            &state,
            connection_id,
            &me,
            ClientCommand::JoinRoom {
                room: "chat:general".into(),
            },
        )
        .await
        .unwrap();

        let err = run_command(
            &state,
            connection_id,
            &me,
            ClientCommand::ChatMessage {
                room_id: "general".into(),
                message: "   ".into(),
                kind: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }
}
