//! REST mirror of the session commands.
//!
//! Every route authenticates through the `Authorization: Bearer` header and
//! shares its semantics with the corresponding WebSocket command.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    auth::AuthedUser,
    dto::session::{CreateSessionRequest, SessionListItem, SessionSummary},
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Create a session. Host-eligible roles only.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    security(("bearer" = [])),
    request_body = CreateSessionRequest,
    responses(
        (status = CREATED, description = "Session created", body = SessionSummary),
        (status = BAD_REQUEST, description = "Validation failed"),
        (status = UNAUTHORIZED, description = "Missing or invalid credential"),
        (status = FORBIDDEN, description = "Caller may not host sessions"),
        (status = SERVICE_UNAVAILABLE, description = "Storage degraded"),
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    AuthedUser(user): AuthedUser,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionSummary>), AppError> {
    let session = session_service::create_session(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(SessionSummary::from(&session))))
}

/// List all sessions.
#[utoipa::path(
    get,
    path = "/sessions",
    tag = "sessions",
    security(("bearer" = [])),
    responses(
        (status = OK, description = "All stored sessions", body = [SessionListItem]),
        (status = UNAUTHORIZED, description = "Missing or invalid credential"),
        (status = SERVICE_UNAVAILABLE, description = "Storage degraded"),
    )
)]
pub async fn list_sessions(
    State(state): State<SharedState>,
    AuthedUser(_user): AuthedUser,
) -> Result<Json<Vec<SessionListItem>>, AppError> {
    let sessions = session_service::list_sessions(&state).await?;
    Ok(Json(sessions.into_iter().map(Into::into).collect()))
}

/// Fetch one session.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = OK, description = "The session", body = SessionSummary),
        (status = NOT_FOUND, description = "Unknown session"),
        (status = UNAUTHORIZED, description = "Missing or invalid credential"),
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    AuthedUser(_user): AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    let session = session_service::get_session(&state, id).await?;
    Ok(Json(SessionSummary::from(&session)))
}

/// Join a waiting session as a participant.
#[utoipa::path(
    post,
    path = "/sessions/{id}/join",
    tag = "sessions",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = OK, description = "Joined", body = SessionSummary),
        (status = NOT_FOUND, description = "Unknown session"),
        (status = BAD_REQUEST, description = "Already joined"),
        (status = CONFLICT, description = "Full or not accepting participants"),
        (status = UNAUTHORIZED, description = "Missing or invalid credential"),
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    let session = session_service::join_session(&state, id, &user).await?;
    Ok(Json(SessionSummary::from(&session)))
}

/// Leave a session. No-op when the caller is not a participant.
#[utoipa::path(
    post,
    path = "/sessions/{id}/leave",
    tag = "sessions",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = OK, description = "Left (or was not a participant)", body = SessionSummary),
        (status = NOT_FOUND, description = "Unknown session"),
        (status = UNAUTHORIZED, description = "Missing or invalid credential"),
    )
)]
pub async fn leave_session(
    State(state): State<SharedState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    let session = session_service::leave_session(&state, id, &user).await?;
    Ok(Json(SessionSummary::from(&session)))
}

/// Start a session. Host only.
#[utoipa::path(
    post,
    path = "/sessions/{id}/start",
    tag = "sessions",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = OK, description = "Started", body = SessionSummary),
        (status = FORBIDDEN, description = "Caller is not the host"),
        (status = CONFLICT, description = "Not startable in the current state"),
        (status = NOT_FOUND, description = "Unknown session"),
        (status = UNAUTHORIZED, description = "Missing or invalid credential"),
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    let session = session_service::start_session(&state, id, &user).await?;
    Ok(Json(SessionSummary::from(&session)))
}

/// End a session and compute the final results. Host only.
#[utoipa::path(
    post,
    path = "/sessions/{id}/end",
    tag = "sessions",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = OK, description = "Completed, results included", body = SessionSummary),
        (status = FORBIDDEN, description = "Caller is not the host"),
        (status = CONFLICT, description = "Not endable in the current state"),
        (status = NOT_FOUND, description = "Unknown session"),
        (status = UNAUTHORIZED, description = "Missing or invalid credential"),
    )
)]
pub async fn end_session(
    State(state): State<SharedState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    let session = session_service::end_session(&state, id, &user).await?;
    Ok(Json(SessionSummary::from(&session)))
}

/// Session routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/join", post(join_session))
        .route("/sessions/{id}/leave", post(leave_session))
        .route("/sessions/{id}/start", post(start_session))
        .route("/sessions/{id}/end", post(end_session))
}
