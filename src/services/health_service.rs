//! Liveness reporting for the health endpoint.

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report `ok` while a storage backend is installed, `degraded` otherwise.
/// The process keeps serving reads of the realtime surface either way.
pub async fn check(state: &SharedState) -> HealthResponse {
    if state.is_degraded().await {
        HealthResponse::degraded()
    } else {
        HealthResponse::ok()
    }
}
