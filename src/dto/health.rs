//! Health endpoint payload.

use serde::Serialize;
use utoipa::ToSchema;

/// Body of the health endpoint response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` when storage is reachable, `degraded` otherwise.
    pub status: &'static str,
}

impl HealthResponse {
    /// Storage reachable, all features available.
    pub fn ok() -> Self {
        Self { status: "ok" }
    }

    /// Storage unreachable; mutating operations will fail.
    pub fn degraded() -> Self {
        Self { status: "degraded" }
    }
}
