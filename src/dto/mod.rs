//! Request and response payloads for the REST and WebSocket surfaces.

pub mod health;
pub mod score;
pub mod session;
pub mod ws;

use std::time::SystemTime;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Render a timestamp as RFC 3339 for the JSON surfaces.
pub(crate) fn format_system_time(timestamp: SystemTime) -> String {
    OffsetDateTime::from(timestamp)
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("invalid-timestamp"))
}
