//! Error types shared by the service and HTTP layers.
//!
//! Service-layer failures keep their kind (authentication, authorization,
//! validation, state, capacity, not-found, storage) so the WebSocket error
//! acknowledgement and the HTTP status mapping can both react per kind.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::lifecycle::InvalidTransition};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Credential missing or not resolvable to an identity.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Valid identity with insufficient privilege.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// User identity is already on the participant list.
    #[error("already joined session `{session_id}`")]
    AlreadyJoined {
        /// Session the duplicate join targeted.
        session_id: uuid::Uuid,
    },
    /// Participant list is at capacity.
    #[error("session is full ({current}/{max} participants)")]
    SessionFull {
        /// Current participant count.
        current: usize,
        /// Configured capacity bound.
        max: u8,
    },
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl ServiceError {
    /// Stable error-kind discriminant surfaced to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Unavailable(_) | ServiceError::Degraded => "storage",
            ServiceError::Unauthenticated(_) => "authentication",
            ServiceError::Forbidden(_) => "authorization",
            ServiceError::InvalidInput(_) | ServiceError::AlreadyJoined { .. } => "validation",
            ServiceError::InvalidState(_) => "state",
            ServiceError::SessionFull { .. } => "capacity",
            ServiceError::NotFound(_) => "not_found",
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {err}"))
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing or invalid credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Authenticated identity lacks the required privilege.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current lifecycle state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Participant list is at capacity.
    #[error("session full: {0}")]
    CapacityExceeded(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {err}"))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Unauthenticated(message) => AppError::Unauthorized(message),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            err @ ServiceError::AlreadyJoined { .. } => AppError::BadRequest(err.to_string()),
            err @ ServiceError::SessionFull { .. } => AppError::CapacityExceeded(err.to_string()),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

/// Structured error envelope returned on every failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Stable error-kind discriminant (`validation`, `state`, `capacity`, ...).
    pub kind: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "validation",
            AppError::Unauthorized(_) => "authentication",
            AppError::Forbidden(_) => "authorization",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "state",
            AppError::CapacityExceeded(_) => "capacity",
            AppError::ServiceUnavailable(_) => "storage",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::CapacityExceeded(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
