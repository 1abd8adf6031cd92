//! OpenAPI document for the REST surface.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

/// Aggregated OpenAPI description served by the Swagger UI route.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::create_session,
        crate::routes::session::list_sessions,
        crate::routes::session::get_session,
        crate::routes::session::join_session,
        crate::routes::session::leave_session,
        crate::routes::session::start_session,
        crate::routes::session::end_session,
        crate::routes::score::submit_score,
    ),
    components(schemas(
        crate::dto::health::HealthResponse,
        crate::dto::session::CreateSessionRequest,
        crate::dto::session::SessionSettingsInput,
        crate::dto::session::SessionSummary,
        crate::dto::session::SettingsSummary,
        crate::dto::session::ParticipantSummary,
        crate::dto::session::ResultEntrySummary,
        crate::dto::session::SessionListItem,
        crate::dto::score::SubmitScoreRequest,
        crate::dto::score::GameDataInput,
        crate::dto::score::ScoreSummary,
        crate::error::ErrorBody,
        crate::state::lifecycle::SessionStatus,
        crate::state::session::GameType,
        crate::state::session::GameMode,
        crate::state::session::Difficulty,
        crate::state::session::Visibility,
        crate::state::session::ParticipantStatus,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Service liveness"),
        (name = "sessions", description = "Multiplayer drill session lifecycle"),
        (name = "scores", description = "Score submission and best flags"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}
