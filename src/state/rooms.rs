//! Logical room keys used by the realtime hub.
//!
//! Rooms are broadcast groups, not persisted entities. The wire syntax is
//! `school:<name>`, `region:<name>`, `role:<name>`, `lobby`, `user:<id>`,
//! `game:<sessionId>` and `chat:<roomId>`.

use std::fmt;

use uuid::Uuid;

use crate::auth::Role;

/// Closed set of room namespaces a connection can subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomKey {
    /// Everyone from the same school.
    School(String),
    /// Everyone from the same region.
    Region(String),
    /// Everyone holding the same role.
    Role(Role),
    /// Global room every authenticated connection joins automatically.
    Lobby,
    /// Private per-identity room for targeted delivery.
    User(Uuid),
    /// Per-session room joined explicitly by participants and spectators.
    Game(Uuid),
    /// Ad hoc chat room joined explicitly.
    Chat(String),
}

impl RoomKey {
    /// Parse the wire representation of a room key.
    pub fn parse(value: &str) -> Option<Self> {
        if value == "lobby" {
            return Some(RoomKey::Lobby);
        }

        let (namespace, rest) = value.split_once(':')?;
        if rest.is_empty() {
            return None;
        }

        match namespace {
            "school" => Some(RoomKey::School(rest.to_string())),
            "region" => Some(RoomKey::Region(rest.to_string())),
            "role" => Role::parse(rest).map(RoomKey::Role),
            "user" => Uuid::parse_str(rest).ok().map(RoomKey::User),
            "game" => Uuid::parse_str(rest).ok().map(RoomKey::Game),
            "chat" => is_valid_room_id(rest).then(|| RoomKey::Chat(rest.to_string())),
            _ => None,
        }
    }

    /// Whether clients may subscribe to this room with an explicit join command.
    ///
    /// School, region, role, lobby and user rooms are only ever populated by
    /// auto-subscription at authentication time.
    pub fn is_explicitly_joinable(&self) -> bool {
        matches!(self, RoomKey::Game(_) | RoomKey::Chat(_))
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomKey::School(name) => write!(f, "school:{name}"),
            RoomKey::Region(name) => write!(f, "region:{name}"),
            RoomKey::Role(role) => write!(f, "role:{}", role.as_str()),
            RoomKey::Lobby => write!(f, "lobby"),
            RoomKey::User(id) => write!(f, "user:{id}"),
            RoomKey::Game(id) => write!(f, "game:{id}"),
            RoomKey::Chat(id) => write!(f, "chat:{id}"),
        }
    }
}

/// Chat room identifiers: 1-64 chars, alphanumeric plus `-` and `_`.
pub fn is_valid_room_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 64
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}
