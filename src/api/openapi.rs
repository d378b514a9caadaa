//! OpenAPI documentation configuration.
//!
//! Provides Swagger UI for API exploration and testing.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::auth_handler;
use crate::domain::{IdentityState, UserResponse};
use crate::services::TokenResponse;
use crate::types::MessageResponse;

/// OpenAPI documentation for the estate-auth service
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Estate Auth",
        version = "0.1.0",
        description = "Identity and session service of the real-estate marketplace: local accounts, Google sign-in and account linking"
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        auth_handler::register,
        auth_handler::login,
        auth_handler::check_username,
        auth_handler::google_login,
        auth_handler::google_callback,
        auth_handler::logout,
        auth_handler::me,
    ),
    components(
        schemas(
            IdentityState,
            UserResponse,
            TokenResponse,
            MessageResponse,
            auth_handler::RegisterRequest,
            auth_handler::LoginRequest,
            auth_handler::RegisteredResponse,
            auth_handler::NeedsLinkingResponse,
            auth_handler::AuthResponse,
            auth_handler::GoogleLoginResponse,
            auth_handler::UsernameAvailability,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, login and Google sign-in"),
        (name = "Session", description = "Operations on the current bearer token")
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for JWT Bearer authentication
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT token obtained from /auth/login"))
                        .build(),
                ),
            );
        }
    }
}
