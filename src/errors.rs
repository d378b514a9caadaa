//! Centralized error handling.
//!
//! Provides a unified error type for the entire application,
//! with automatic HTTP response conversion.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::domain::CredentialError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication & Authorization
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account linking requires a fresh sign-in with the linked provider")]
    LinkRejected,

    #[error("The identity provider has not verified this email address")]
    EmailNotVerified,

    // Resource errors
    #[error("Resource not found")]
    NotFound,

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("An account with this email already exists")]
    EmailAlreadyRegistered,

    #[error("{0} already exists")]
    Conflict(String),

    // Validation
    #[error(transparent)]
    InvalidField(#[from] CredentialError),

    #[error("{0}")]
    Validation(String),

    // External service errors
    #[error("Database error")]
    Database(#[from] sea_orm::DbErr),

    #[error("Authentication error")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Identity provider error")]
    Provider(String),

    // Internal
    #[error("Internal server error")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl AppError {
    /// Get error code for client
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::LinkRejected => "LINK_REJECTED",
            AppError::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            AppError::NotFound => "NOT_FOUND",
            AppError::UsernameTaken => "USERNAME_TAKEN",
            AppError::EmailAlreadyRegistered => "EMAIL_ALREADY_REGISTERED",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InvalidField(_) | AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Database(_) => "PERSISTENCE_ERROR",
            AppError::Jwt(_) => "AUTH_ERROR",
            AppError::Provider(_) => "PROVIDER_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::InvalidCredentials | AppError::Jwt(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::LinkRejected | AppError::EmailNotVerified => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidField(_)
            | AppError::Validation(_)
            | AppError::UsernameTaken
            | AppError::EmailAlreadyRegistered => StatusCode::BAD_REQUEST,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get user-facing message (hides internal details)
    fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),

            // Storage details stay in the server log outside debug builds
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                if cfg!(debug_assertions) {
                    format!("A database error occurred: {}", e)
                } else {
                    "A database error occurred".to_string()
                }
            }
            AppError::Jwt(e) => {
                tracing::debug!("JWT error: {:?}", e);
                "Invalid or expired token".to_string()
            }
            AppError::Provider(msg) => {
                tracing::error!("Identity provider error: {}", msg);
                "Sign-in with the identity provider failed".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }

            _ => self.to_string(),
        }
    }

    fn field(&self) -> Option<&'static str> {
        match self {
            AppError::InvalidField(e) => Some(e.field()),
            AppError::UsernameTaken => Some("username"),
            AppError::EmailAlreadyRegistered => Some("email"),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.user_message(),
                field: self.field(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_not_found(self) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self) -> AppResult<T> {
        self.ok_or(AppError::NotFound)
    }
}

/// Convenience constructors
impl AppError {
    pub fn conflict(entity: impl Into<String>) -> Self {
        AppError::Conflict(entity.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        AppError::Provider(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}
