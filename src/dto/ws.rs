//! WebSocket wire format: client commands and server events.
//!
//! Commands are internally tagged on `type`; events carry their name in
//! `event` and their payload in `data`. Field names are camelCase on the
//! wire, matching the REST payloads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::Role,
    dto::{
        score::{GameDataInput, ScoreSummary},
        session::{CreateSessionRequest, ResultEntrySummary, SessionSummary},
    },
};

/// Commands a connected client may send after the handshake.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    /// First frame on every connection; resolves the bearer token.
    Authenticate {
        /// Bearer credential.
        token: String,
    },
    /// Subscribe to a `game:` or `chat:` room.
    JoinRoom {
        /// Room key in wire syntax.
        room: String,
    },
    /// Unsubscribe from a `game:` or `chat:` room.
    LeaveRoom {
        /// Room key in wire syntax.
        room: String,
    },
    /// Create a session; same payload as `POST /sessions`.
    CreateSession(CreateSessionRequest),
    /// Join a session as a participant.
    JoinSession {
        /// Target session.
        session_id: Uuid,
    },
    /// Leave a session; no-op when not a participant.
    LeaveSession {
        /// Target session.
        session_id: Uuid,
    },
    /// Start a session (host only).
    StartSession {
        /// Target session.
        session_id: Uuid,
    },
    /// End a session and compute results (host only).
    EndSession {
        /// Target session.
        session_id: Uuid,
    },
    /// Submit a running score for the sending participant.
    PlayerScore {
        /// Target session.
        session_id: Uuid,
        /// Running score.
        score: u32,
        /// Optional accuracy counters.
        game_data: Option<GameDataInput>,
    },
    /// Relay a chat line to a chat room the sender is a member of.
    #[serde(rename = "chat:message")]
    ChatMessage {
        /// Chat room identifier (without the `chat:` prefix).
        room_id: String,
        /// Message body.
        message: String,
        /// Optional client-defined message kind.
        #[serde(default)]
        kind: Option<String>,
    },
}

/// Events pushed to clients over room fan-out or as direct replies.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Handshake succeeded; lists the auto-subscribed rooms.
    #[serde(rename = "authenticated")]
    Authenticated {
        /// Resolved user identifier.
        user_id: Uuid,
        /// Display name.
        name: String,
        /// Resolved role.
        role: Role,
        /// Rooms the connection was auto-subscribed to.
        rooms: Vec<String>,
    },
    /// Direct reply to `createSession`.
    #[serde(rename = "session:created")]
    SessionCreated {
        /// The created session.
        session: SessionSummary,
    },
    /// Direct reply to `joinSession`.
    #[serde(rename = "session:joined")]
    SessionJoined {
        /// The joined session.
        session: SessionSummary,
    },
    /// Lobby broadcast announcing a new public session.
    #[serde(rename = "game:created")]
    GameCreated {
        /// The created session.
        session: SessionSummary,
    },
    /// A participant joined the session.
    #[serde(rename = "player:joined")]
    PlayerJoined {
        /// Session the participant joined.
        session_id: Uuid,
        /// Joining identity.
        user_id: Uuid,
        /// Display name.
        name: String,
        /// Participant count after the join.
        participant_count: usize,
    },
    /// A participant left the session.
    #[serde(rename = "player:left")]
    PlayerLeft {
        /// Session the participant left.
        session_id: Uuid,
        /// Leaving identity.
        user_id: Uuid,
        /// Display name.
        name: String,
        /// Participant count after the leave.
        participant_count: usize,
    },
    /// The host started the session.
    #[serde(rename = "game:started")]
    GameStarted {
        /// Started session.
        session_id: Uuid,
        /// Start timestamp, RFC 3339.
        started_at: String,
    },
    /// The session completed; carries the final ranked results.
    #[serde(rename = "game:ended")]
    GameEnded {
        /// Completed session.
        session_id: Uuid,
        /// Final ranked results.
        results: Vec<ResultEntrySummary>,
    },
    /// The session was cancelled (administratively or by the sweep).
    #[serde(rename = "game:cancelled")]
    GameCancelled {
        /// Cancelled session.
        session_id: Uuid,
        /// Human-readable cancellation reason.
        reason: String,
    },
    /// A participant's running score changed.
    #[serde(rename = "score:updated")]
    ScoreUpdated {
        /// Session the score belongs to.
        session_id: Uuid,
        /// Scoring identity.
        user_id: Uuid,
        /// Display name.
        name: String,
        /// New running score.
        score: u32,
        /// Targets hit.
        targets_hit: u32,
        /// Total targets presented.
        total_targets: u32,
    },
    /// Direct reply to `playerScore` with the persisted record.
    #[serde(rename = "score:saved")]
    ScoreSaved {
        /// Persisted score record.
        score: ScoreSummary,
    },
    /// Leaderboard-relevant score broadcast to lobby/school/region rooms.
    #[serde(rename = "leaderboard:update")]
    LeaderboardUpdate {
        /// Persisted score record.
        entry: ScoreSummary,
    },
    /// Someone joined a room the recipient is a member of.
    #[serde(rename = "room:joined")]
    RoomJoined {
        /// Room key in wire syntax.
        room: String,
        /// Joining identity.
        user_id: Uuid,
        /// Display name.
        name: String,
    },
    /// Someone left a room the recipient is a member of.
    #[serde(rename = "room:left")]
    RoomLeft {
        /// Room key in wire syntax.
        room: String,
        /// Leaving identity.
        user_id: Uuid,
        /// Display name.
        name: String,
    },
    /// Chat line relayed to a chat room. Fan-out only, never persisted.
    #[serde(rename = "chat:message")]
    ChatMessage {
        /// Room key in wire syntax.
        room: String,
        /// Sending identity.
        user_id: Uuid,
        /// Display name.
        name: String,
        /// Message body.
        message: String,
        /// Optional client-defined message kind.
        kind: Option<String>,
        /// Relay timestamp, RFC 3339.
        sent_at: String,
    },
    /// Command failed; the connection stays open.
    #[serde(rename = "error")]
    Error {
        /// Stable error-kind discriminant.
        kind: String,
        /// Human-readable description.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_from_tagged_json() {
        let command: ClientCommand =
            serde_json::from_str(r#"{"type":"authenticate","token":"tok-1"}"#).unwrap();
        assert!(matches!(command, ClientCommand::Authenticate { token } if token == "tok-1"));

        let command: ClientCommand =
            serde_json::from_str(r#"{"type":"joinRoom","room":"chat:general"}"#).unwrap();
        assert!(matches!(command, ClientCommand::JoinRoom { room } if room == "chat:general"));

        let id = Uuid::new_v4();
        let raw = format!(
            r#"{{"type":"playerScore","sessionId":"{id}","score":120,"gameData":{{"targetsHit":9,"totalTargets":12}}}}"#
        );
        let command: ClientCommand = serde_json::from_str(&raw).unwrap();
        match command {
            ClientCommand::PlayerScore {
                session_id,
                score,
                game_data,
            } => {
                assert_eq!(session_id, id);
                assert_eq!(score, 120);
                assert_eq!(game_data.unwrap().targets_hit, 9);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn create_session_command_carries_the_rest_payload() {
        let raw = r#"{
            "type": "createSession",
            "name": "Quake drill",
            "gameType": "rescue-rush",
            "mode": "desktop",
            "maxParticipants": 4
        }"#;
        let command: ClientCommand = serde_json::from_str(raw).unwrap();
        match command {
            ClientCommand::CreateSession(request) => {
                assert_eq!(request.name, "Quake drill");
                assert_eq!(request.max_participants, Some(4));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn chat_command_uses_the_colon_tag() {
        let raw = r#"{"type":"chat:message","roomId":"general","message":"hi"}"#;
        let command: ClientCommand = serde_json::from_str(raw).unwrap();
        assert!(matches!(command, ClientCommand::ChatMessage { .. }));
    }

    #[test]
    fn events_serialize_with_event_and_data_envelope() {
        let event = ServerEvent::GameCancelled {
            session_id: Uuid::nil(),
            reason: "inactivity".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "game:cancelled");
        assert_eq!(json["data"]["reason"], "inactivity");
        assert!(json["data"]["sessionId"].is_string());
    }
}
