//! REST mirror of the score submission command.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use uuid::Uuid;

use crate::{
    auth::AuthedUser,
    dto::score::{ScoreSummary, SubmitScoreRequest},
    error::AppError,
    services::score_service,
    state::SharedState,
};

/// Submit a running score for the authenticated participant.
#[utoipa::path(
    post,
    path = "/sessions/{id}/scores",
    tag = "scores",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = SubmitScoreRequest,
    responses(
        (status = CREATED, description = "Score recorded", body = ScoreSummary),
        (status = NOT_FOUND, description = "Unknown session or not a participant"),
        (status = BAD_REQUEST, description = "Validation failed"),
        (status = CONFLICT, description = "Session is not accepting submissions"),
        (status = UNAUTHORIZED, description = "Missing or invalid credential"),
        (status = SERVICE_UNAVAILABLE, description = "Storage degraded"),
    )
)]
pub async fn submit_score(
    State(state): State<SharedState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitScoreRequest>,
) -> Result<(StatusCode, Json<ScoreSummary>), AppError> {
    let record = score_service::submit_score(&state, id, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(ScoreSummary::from(&record))))
}

/// Score routes.
pub fn router() -> Router<SharedState> {
    Router::new().route("/sessions/{id}/scores", post(submit_score))
}
