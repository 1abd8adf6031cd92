//! Realtime hub mapping logical rooms to connected WebSocket clients.
//!
//! Each connection owns a thin subscription set, and a per-room member set is
//! maintained incrementally on join/leave/disconnect so fan-out only iterates
//! the members of the target room. Delivery is best-effort fire-and-forget
//! through per-connection writer channels; within one room the emission order
//! is the delivery order because a single task drives each fan-out.

use std::collections::HashSet;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{auth::AuthContext, dto::ws::ServerEvent, state::rooms::RoomKey};

/// Handle used to push messages to a connected client.
#[derive(Clone)]
pub struct ClientConnection {
    /// Connection identifier, unrelated to the user identity.
    pub id: Uuid,
    /// Authenticated identity tagged onto the connection.
    pub identity: AuthContext,
    /// Writer channel feeding the connection's outbound task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Room registry and fan-out engine for all live connections.
#[derive(Default)]
pub struct RealtimeHub {
    connections: DashMap<Uuid, ClientConnection>,
    subscriptions: DashMap<Uuid, HashSet<RoomKey>>,
    members: DashMap<RoomKey, HashSet<Uuid>>,
}

impl RealtimeHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit an authenticated connection and auto-subscribe its room set:
    /// school, region, role, the global lobby, and its private user room.
    pub fn register(
        &self,
        identity: AuthContext,
        tx: mpsc::UnboundedSender<Message>,
    ) -> (Uuid, Vec<RoomKey>) {
        let connection_id = Uuid::new_v4();
        let auto_rooms = vec![
            RoomKey::School(identity.school.clone()),
            RoomKey::Region(identity.region.clone()),
            RoomKey::Role(identity.role),
            RoomKey::Lobby,
            RoomKey::User(identity.user_id),
        ];

        self.connections.insert(
            connection_id,
            ClientConnection {
                id: connection_id,
                identity,
                tx,
            },
        );
        self.subscriptions
            .insert(connection_id, auto_rooms.iter().cloned().collect());
        for room in &auto_rooms {
            self.members
                .entry(room.clone())
                .or_default()
                .insert(connection_id);
        }

        (connection_id, auto_rooms)
    }

    /// Drop a connection and every subscription it held.
    ///
    /// Returns the identity and the room set the connection was subscribed to
    /// so the caller can run participant cleanup for session rooms.
    pub fn unregister(&self, connection_id: Uuid) -> Option<(AuthContext, HashSet<RoomKey>)> {
        let (_, connection) = self.connections.remove(&connection_id)?;
        let rooms = self
            .subscriptions
            .remove(&connection_id)
            .map(|(_, rooms)| rooms)
            .unwrap_or_default();

        for room in &rooms {
            if let Some(mut members) = self.members.get_mut(room) {
                members.remove(&connection_id);
                if members.is_empty() {
                    drop(members);
                    self.members
                        .remove_if(room, |_, members| members.is_empty());
                }
            }
        }

        Some((connection.identity, rooms))
    }

    /// Subscribe a connection to a room. Returns `false` when the connection
    /// is unknown or was already a member.
    pub fn join(&self, connection_id: Uuid, room: RoomKey) -> bool {
        if !self.connections.contains_key(&connection_id) {
            return false;
        }
        let Some(mut subscriptions) = self.subscriptions.get_mut(&connection_id) else {
            return false;
        };
        if !subscriptions.insert(room.clone()) {
            return false;
        }
        drop(subscriptions);
        self.members.entry(room).or_default().insert(connection_id);
        true
    }

    /// Unsubscribe a connection from a room. Returns `false` when it was not
    /// a member.
    pub fn leave(&self, connection_id: Uuid, room: &RoomKey) -> bool {
        let removed = self
            .subscriptions
            .get_mut(&connection_id)
            .is_some_and(|mut subscriptions| subscriptions.remove(room));
        if removed
            && let Some(mut members) = self.members.get_mut(room)
        {
            members.remove(&connection_id);
            if members.is_empty() {
                drop(members);
                self.members
                    .remove_if(room, |_, members| members.is_empty());
            }
        }
        removed
    }

    /// Whether the connection is currently subscribed to the room.
    pub fn is_member(&self, connection_id: Uuid, room: &RoomKey) -> bool {
        self.subscriptions
            .get(&connection_id)
            .is_some_and(|subscriptions| subscriptions.contains(room))
    }

    /// Identity tagged onto a connection at authentication time.
    pub fn identity(&self, connection_id: Uuid) -> Option<AuthContext> {
        self.connections
            .get(&connection_id)
            .map(|connection| connection.identity.clone())
    }

    /// Number of connections currently subscribed to a room.
    pub fn room_size(&self, room: &RoomKey) -> usize {
        self.members
            .get(room)
            .map(|members| members.len())
            .unwrap_or(0)
    }

    /// Deliver an event to every connection subscribed to `room`.
    pub fn emit(&self, room: &RoomKey, event: &ServerEvent) {
        self.fan_out(room, event, None);
    }

    /// Deliver an event to every room member except `skip` (used for
    /// membership-changed notifications, which only target other members).
    pub fn emit_except(&self, room: &RoomKey, skip: Uuid, event: &ServerEvent) {
        self.fan_out(room, event, Some(skip));
    }

    /// Deliver an event to a single connection.
    pub fn send_to_connection(&self, connection_id: Uuid, event: &ServerEvent) {
        let Some(message) = encode(event) else {
            return;
        };
        if let Some(connection) = self.connections.get(&connection_id)
            && connection.tx.send(message).is_err()
        {
            debug!(%connection_id, "writer channel closed; dropping direct event");
        }
    }

    fn fan_out(&self, room: &RoomKey, event: &ServerEvent, skip: Option<Uuid>) {
        let Some(message) = encode(event) else {
            return;
        };
        let Some(members) = self.members.get(room) else {
            return;
        };

        for member in members.iter() {
            if skip == Some(*member) {
                continue;
            }
            if let Some(connection) = self.connections.get(member)
                && connection.tx.send(message.clone()).is_err()
            {
                // Closed writer; the socket task removes the connection on exit.
                debug!(connection_id = %member, room = %room, "writer channel closed during fan-out");
            }
        }
    }
}

/// Serialize an event once per fan-out. Serialization failure is a bug in the
/// event definitions, so it is logged and the event is dropped.
fn encode(event: &ServerEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(payload) => Some(Message::Text(payload.into())),
        Err(err) => {
            warn!(error = %err, "failed to serialize server event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn identity(school: &str, region: &str, role: Role) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            name: "P".into(),
            role,
            school: school.into(),
            region: region.into(),
        }
    }

    fn text_of(message: Message) -> String {
        match message {
            Message::Text(text) => text.to_string(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[test]
    fn register_auto_subscribes_expected_rooms() {
        let hub = RealtimeHub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let ctx = identity("Northview High", "Pacific", Role::Student);
        let user_id = ctx.user_id;
        let (connection_id, rooms) = hub.register(ctx, tx);

        assert_eq!(rooms.len(), 5);
        assert!(hub.is_member(connection_id, &RoomKey::Lobby));
        assert!(hub.is_member(connection_id, &RoomKey::School("Northview High".into())));
        assert!(hub.is_member(connection_id, &RoomKey::Region("Pacific".into())));
        assert!(hub.is_member(connection_id, &RoomKey::Role(Role::Student)));
        assert!(hub.is_member(connection_id, &RoomKey::User(user_id)));
    }

    #[test]
    fn game_room_events_do_not_reach_lobby_only_connections() {
        let hub = RealtimeHub::new();
        let (player_tx, mut player_rx) = mpsc::unbounded_channel();
        let (bystander_tx, mut bystander_rx) = mpsc::unbounded_channel();

        let (player, _) = hub.register(identity("A", "R", Role::Student), player_tx);
        let (_bystander, _) = hub.register(identity("B", "R", Role::Student), bystander_tx);

        // Drain nothing yet; no events have been emitted.
        let session_id = Uuid::new_v4();
        let room = RoomKey::Game(session_id);
        assert!(hub.join(player, room.clone()));

        hub.emit(
            &room,
            &ServerEvent::GameCancelled {
                session_id,
                reason: "test".into(),
            },
        );

        let delivered = text_of(player_rx.try_recv().unwrap());
        assert!(delivered.contains("game:cancelled"));
        assert!(bystander_rx.try_recv().is_err());
    }

    #[test]
    fn join_is_idempotent_and_leave_removes_membership() {
        let hub = RealtimeHub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (connection_id, _) = hub.register(identity("A", "R", Role::Teacher), tx);

        let room = RoomKey::Chat("general".into());
        assert!(hub.join(connection_id, room.clone()));
        assert!(!hub.join(connection_id, room.clone()));
        assert_eq!(hub.room_size(&room), 1);

        assert!(hub.leave(connection_id, &room));
        assert!(!hub.leave(connection_id, &room));
        assert_eq!(hub.room_size(&room), 0);
    }

    #[test]
    fn leave_drops_empty_room_entries() {
        let hub = RealtimeHub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (connection_id, _) = hub.register(identity("A", "R", Role::Student), tx);

        let room = RoomKey::Chat("general".into());
        hub.join(connection_id, room.clone());
        hub.leave(connection_id, &room);
        assert!(!hub.members.contains_key(&room));

        // Re-joining recreates the entry.
        hub.join(connection_id, room.clone());
        assert_eq!(hub.room_size(&room), 1);
    }

    #[test]
    fn unregister_discards_all_subscriptions() {
        let hub = RealtimeHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = identity("A", "R", Role::Student);
        let (connection_id, _) = hub.register(ctx, tx);
        let room = RoomKey::Game(Uuid::new_v4());
        hub.join(connection_id, room.clone());

        let (_identity, rooms) = hub.unregister(connection_id).unwrap();
        assert!(rooms.contains(&room));
        assert!(rooms.contains(&RoomKey::Lobby));
        assert_eq!(hub.room_size(&RoomKey::Lobby), 0);

        hub.emit(
            &RoomKey::Lobby,
            &ServerEvent::GameCancelled {
                session_id: Uuid::new_v4(),
                reason: "noop".into(),
            },
        );
        assert!(rx.try_recv().is_err());
        assert!(hub.unregister(connection_id).is_none());
    }

    #[test]
    fn emit_except_skips_the_acting_connection() {
        let hub = RealtimeHub::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let (a, _) = hub.register(identity("A", "R", Role::Student), tx_a);
        let (b, _) = hub.register(identity("A", "R", Role::Student), tx_b);

        let room = RoomKey::Chat("drills".into());
        hub.join(a, room.clone());
        hub.join(b, room.clone());

        hub.emit_except(
            &room,
            a,
            &ServerEvent::RoomJoined {
                room: room.to_string(),
                user_id: Uuid::new_v4(),
                name: "P".into(),
            },
        );

        assert!(rx_a.try_recv().is_err());
        assert!(text_of(rx_b.try_recv().unwrap()).contains("room:joined"));
    }
}
