//! Connection authentication: credential resolution and role checks.
//!
//! Identity management is an external concern; the backend only needs a way
//! to turn a bearer credential into an [`AuthContext`]. The shipped
//! [`TokenTableAuthProvider`] resolves tokens against the config-file token
//! table, while tests install their own providers.

use std::collections::HashMap;

use axum::{extract::FromRequestParts, http::request::Parts};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{config::AuthTokenEntry, error::AppError, state::SharedState};

/// Role carried by an authenticated identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular learner; may join sessions but not create them.
    Student,
    /// May host sessions for their school.
    Teacher,
    /// Platform administrator; same privileges as a teacher plus cleanup.
    Admin,
}

impl Role {
    /// Stable lowercase name used in room keys and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }

    /// Whether this role may create (and therefore host) sessions.
    pub fn is_host_eligible(&self) -> bool {
        matches!(self, Role::Teacher | Role::Admin)
    }

    /// Parse the lowercase role name used in `role:<name>` room keys.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Resolved identity attached to a connection or request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthContext {
    /// Stable user identifier.
    pub user_id: Uuid,
    /// Display name shown to other participants.
    pub name: String,
    /// Role driving authorization decisions.
    pub role: Role,
    /// School the user belongs to.
    pub school: String,
    /// Region the school is located in.
    pub region: String,
}

/// Errors raised while resolving a credential.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential was supplied.
    #[error("missing credential")]
    MissingCredential,
    /// The supplied credential does not resolve to an identity.
    #[error("invalid credential")]
    InvalidCredential,
}

/// Abstraction over the external identity service.
pub trait AuthProvider: Send + Sync {
    /// Resolve a bearer credential into an identity, or fail.
    fn authenticate(&self, credential: &str) -> BoxFuture<'static, Result<AuthContext, AuthError>>;
}

/// Provider backed by the static token table from the config file.
pub struct TokenTableAuthProvider {
    tokens: HashMap<String, AuthContext>,
}

impl TokenTableAuthProvider {
    /// Build the provider from config token entries.
    pub fn new(entries: Vec<AuthTokenEntry>) -> Self {
        let tokens = entries
            .into_iter()
            .map(|entry| {
                (
                    entry.token,
                    AuthContext {
                        user_id: entry.user_id,
                        name: entry.name,
                        role: entry.role,
                        school: entry.school,
                        region: entry.region,
                    },
                )
            })
            .collect();
        Self { tokens }
    }
}

impl AuthProvider for TokenTableAuthProvider {
    fn authenticate(&self, credential: &str) -> BoxFuture<'static, Result<AuthContext, AuthError>> {
        let resolved = self.tokens.get(credential).cloned();
        Box::pin(async move { resolved.ok_or(AuthError::InvalidCredential) })
    }
}

/// Extractor resolving the `Authorization: Bearer` header for REST handlers.
#[derive(Debug, Clone)]
pub struct AuthedUser(pub AuthContext);

impl FromRequestParts<SharedState> for AuthedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing authorization header".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("expected bearer credential".into()))?;

        let context = state
            .auth()
            .authenticate(token)
            .await
            .map_err(|err| AppError::Unauthorized(err.to_string()))?;

        Ok(AuthedUser(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(token: &str, role: Role) -> AuthTokenEntry {
        AuthTokenEntry {
            token: token.to_string(),
            user_id: Uuid::new_v4(),
            name: "Avery".into(),
            role,
            school: "Northview High".into(),
            region: "Pacific".into(),
        }
    }

    #[tokio::test]
    async fn resolves_known_token() {
        let provider = TokenTableAuthProvider::new(vec![entry("tok-1", Role::Teacher)]);
        let ctx = provider.authenticate("tok-1").await.unwrap();
        assert_eq!(ctx.role, Role::Teacher);
        assert_eq!(ctx.school, "Northview High");
    }

    #[tokio::test]
    async fn rejects_unknown_token() {
        let provider = TokenTableAuthProvider::new(vec![entry("tok-1", Role::Student)]);
        assert!(matches!(
            provider.authenticate("nope").await,
            Err(AuthError::InvalidCredential)
        ));
    }

    #[test]
    fn host_eligibility() {
        assert!(!Role::Student.is_host_eligible());
        assert!(Role::Teacher.is_host_eligible());
        assert!(Role::Admin.is_host_eligible());
    }
}
