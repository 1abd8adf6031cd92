//! Room fan-out helpers translating domain changes into server events.
//!
//! All delivery is best-effort: a slow or gone subscriber never fails the
//! operation that produced the event.

use uuid::Uuid;

use crate::{
    dao::models::ScoreEntity,
    dto::{
        format_system_time,
        score::ScoreSummary,
        ws::ServerEvent,
    },
    state::{
        RealtimeHub,
        rooms::RoomKey,
        session::{Participant, Session, Visibility},
    },
};

/// Announce a freshly created public session to the lobby.
pub fn session_created(hub: &RealtimeHub, session: &Session) {
    if session.settings.visibility != Visibility::Public {
        return;
    }
    hub.emit(
        &RoomKey::Lobby,
        &ServerEvent::GameCreated {
            session: session.into(),
        },
    );
}

/// Notify the session room that a participant joined.
pub fn player_joined(hub: &RealtimeHub, session: &Session, user_id: Uuid, name: &str) {
    hub.emit(
        &RoomKey::Game(session.id),
        &ServerEvent::PlayerJoined {
            session_id: session.id,
            user_id,
            name: name.to_owned(),
            participant_count: session.participants.len(),
        },
    );
}

/// Notify the session room that a participant left.
pub fn player_left(hub: &RealtimeHub, session: &Session, user_id: Uuid, name: &str) {
    hub.emit(
        &RoomKey::Game(session.id),
        &ServerEvent::PlayerLeft {
            session_id: session.id,
            user_id,
            name: name.to_owned(),
            participant_count: session.participants.len(),
        },
    );
}

/// Notify the session room that gameplay started.
pub fn game_started(hub: &RealtimeHub, session: &Session) {
    let started_at = session
        .started_at
        .map(format_system_time)
        .unwrap_or_default();
    hub.emit(
        &RoomKey::Game(session.id),
        &ServerEvent::GameStarted {
            session_id: session.id,
            started_at,
        },
    );
}

/// Publish the final ranked results to the session room.
pub fn game_ended(hub: &RealtimeHub, session: &Session) {
    hub.emit(
        &RoomKey::Game(session.id),
        &ServerEvent::GameEnded {
            session_id: session.id,
            results: session.results.iter().map(Into::into).collect(),
        },
    );
}

/// Notify the session room that the session was cancelled.
pub fn game_cancelled(hub: &RealtimeHub, session_id: Uuid, reason: &str) {
    hub.emit(
        &RoomKey::Game(session_id),
        &ServerEvent::GameCancelled {
            session_id,
            reason: reason.to_owned(),
        },
    );
}

/// Notify the session room about a running-score change.
pub fn score_updated(hub: &RealtimeHub, session_id: Uuid, participant: &Participant) {
    hub.emit(
        &RoomKey::Game(session_id),
        &ServerEvent::ScoreUpdated {
            session_id,
            user_id: participant.user_id,
            name: participant.name.clone(),
            score: participant.score,
            targets_hit: participant.targets_hit,
            total_targets: participant.total_targets,
        },
    );
}

/// Push a persisted score to the leaderboard rooms: the lobby plus the
/// submitter's school and region rooms.
pub fn leaderboard_update(hub: &RealtimeHub, record: &ScoreEntity) {
    let event = ServerEvent::LeaderboardUpdate {
        entry: ScoreSummary::from(record),
    };
    hub.emit(&RoomKey::Lobby, &event);
    if let Some(school) = &record.school {
        hub.emit(&RoomKey::School(school.clone()), &event);
    }
    if let Some(region) = &record.region {
        hub.emit(&RoomKey::Region(region.clone()), &event);
    }
}
