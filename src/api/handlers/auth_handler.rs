//! Authentication handlers.
//!
//! Each handler invokes one identity operation and turns its user record
//! into tokens.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::config::MAX_PASSWORD_LENGTH;
use crate::domain::credentials::normalize_username;
use crate::domain::UserResponse;
use crate::errors::{AppError, AppResult};
use crate::services::{LocalRegistration, Registration, TokenResponse};
use crate::types::MessageResponse;

/// Local registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// 3-20 characters: letters, digits, `_` or `-`
    #[schema(example = "alice")]
    pub username: String,
    /// At least 8 characters with upper, lower, digit and symbol
    #[validate(length(max = MAX_PASSWORD_LENGTH, message = "Password is too long"))]
    #[schema(example = "Abc12345!", min_length = 8)]
    pub password: String,
    #[schema(example = "Alice")]
    pub first_name: String,
    #[schema(example = "Wonderland")]
    pub last_name: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
    /// Link token from a Google sign-in, consenting to merge into that account
    pub link_token: Option<String>,
}

/// Local login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    #[schema(example = "alice")]
    pub username: String,
    #[validate(length(
        min = 1,
        max = MAX_PASSWORD_LENGTH,
        message = "Password is required"
    ))]
    #[schema(example = "Abc12345!")]
    pub password: String,
}

/// Successful registration
#[derive(Debug, Serialize, ToSchema)]
pub struct RegisteredResponse {
    pub user: UserResponse,
    /// Whether the credential was merged into an existing Google account
    pub linked: bool,
    pub token: TokenResponse,
}

/// The email already belongs to a Google account
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NeedsLinkingResponse {
    /// Always true
    pub needs_linking: bool,
    pub email: String,
    pub name: String,
}

/// Successful local login
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: TokenResponse,
}

/// Successful Google sign-in
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginResponse {
    pub user: UserResponse,
    pub token: TokenResponse,
    /// Short-lived proof of this Google identity, accepted by `/auth/register`
    pub link_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsernameAvailability {
    pub username: String,
    pub available: bool,
}

/// Query parameters of the provider redirect
#[derive(Debug, Deserialize, IntoParams)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user declined
    pub error: Option<String>,
}

/// Routes that need no session
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/check-username/:username", get(check_username))
        .route("/google", get(google_login))
        .route("/google/callback", get(google_callback))
}

/// Routes that need a bearer token
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/// Register a local username/password credential
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = RegisteredResponse),
        (status = 200, description = "Email belongs to a Google account; resend with a link token", body = NeedsLinkingResponse),
        (status = 400, description = "Invalid field, username taken or email already registered"),
        (status = 403, description = "Link token rejected")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> AppResult<Response> {
    let link = payload
        .link_token
        .as_deref()
        .map(|token| state.tokens.verify_link_token(token))
        .transpose()?;

    let form = LocalRegistration {
        username: payload.username,
        password: payload.password,
        first_name: payload.first_name,
        last_name: payload.last_name,
        email: payload.email,
    };

    match state.identity.register_local(form, link).await? {
        Registration::Registered { user, linked } => {
            let token = state.tokens.issue_token(&user)?;
            let body = RegisteredResponse {
                user: UserResponse::from(user),
                linked,
                token,
            };
            Ok((StatusCode::CREATED, Json(body)).into_response())
        }
        Registration::NeedsLinking { email, name } => Ok(Json(NeedsLinkingResponse {
            needs_linking: true,
            email,
            name,
        })
        .into_response()),
    }
}

/// Login with username and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = state
        .identity
        .authenticate_local(payload.username, payload.password)
        .await?;
    let token = state.tokens.issue_token(&user)?;

    Ok(Json(AuthResponse {
        user: UserResponse::from(user),
        token,
    }))
}

/// Check whether a username can be registered
#[utoipa::path(
    get,
    path = "/auth/check-username/{username}",
    tag = "Authentication",
    params(("username" = String, Path, description = "Candidate username")),
    responses(
        (status = 200, description = "Availability", body = UsernameAvailability),
        (status = 400, description = "Malformed username")
    )
)]
pub async fn check_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<UsernameAvailability>> {
    let available = state.identity.check_username(username.clone()).await?;

    Ok(Json(UsernameAvailability {
        username: normalize_username(&username),
        available,
    }))
}

/// Start Google sign-in
#[utoipa::path(
    get,
    path = "/auth/google",
    tag = "Authentication",
    responses((status = 303, description = "Redirect to Google"))
)]
pub async fn google_login(State(state): State<AppState>) -> AppResult<Redirect> {
    let url = state.oauth.begin().await?;
    Ok(Redirect::to(&url))
}

/// Google redirect target
#[utoipa::path(
    get,
    path = "/auth/google/callback",
    tag = "Authentication",
    params(CallbackParams),
    responses(
        (status = 200, description = "Signed in", body = GoogleLoginResponse),
        (status = 401, description = "Declined, expired state or rejected code"),
        (status = 403, description = "Google email not verified"),
        (status = 502, description = "Google unreachable")
    )
)]
pub async fn google_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> AppResult<Json<GoogleLoginResponse>> {
    if let Some(error) = params.error {
        tracing::info!(error = %error, "Google sign-in declined");
        return Err(AppError::Unauthorized);
    }

    let (code, oauth_state) = match (params.code, params.state) {
        (Some(code), Some(oauth_state)) => (code, oauth_state),
        _ => return Err(AppError::validation("code and state are required")),
    };

    let profile = state.oauth.complete(&code, &oauth_state).await?;
    let user = state.identity.resolve_external_login(profile).await?;

    let token = state.tokens.issue_token(&user)?;
    let link_token = state.tokens.issue_link_token(&user)?;

    Ok(Json(GoogleLoginResponse {
        user: UserResponse::from(user),
        token,
        link_token,
    }))
}

/// Revoke the presented token
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Session",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Missing, invalid or revoked token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<MessageResponse>> {
    state.tokens.revoke(&current_user.claims).await?;
    Ok(Json(MessageResponse::new("Logged out")))
}

/// Get the signed-in user
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Session",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing, invalid or revoked token"),
        (status = 404, description = "User no longer exists")
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<UserResponse>> {
    let user = state.users.get_user(current_user.id).await?;
    Ok(Json(UserResponse::from(user)))
}
