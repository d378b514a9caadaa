//! External identity provider client (Google OAuth2 / OpenID Connect).

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{
    GoogleSettings, GOOGLE_AUTH_URL, GOOGLE_SCOPES, GOOGLE_TOKEN_URL, GOOGLE_USERINFO_URL,
};
use crate::domain::ExternalProfile;
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Authorization-code flow against an external identity provider.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to, carrying the given state nonce
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange an authorization code for the signed-in user's profile
    async fn fetch_profile(&self, code: &str) -> AppResult<ExternalProfile>;
}

#[derive(Debug, Deserialize)]
struct TokenExchange {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
}

/// Google implementation over reqwest
pub struct GoogleProvider {
    http: reqwest::Client,
    settings: GoogleSettings,
}

impl GoogleProvider {
    pub fn new(settings: GoogleSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    async fn exchange_code(&self, code: &str) -> AppResult<String> {
        let params = [
            ("code", code),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret()),
            ("redirect_uri", self.settings.redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_client_error() {
            // Expired, reused or forged authorization code
            tracing::warn!(status = %response.status(), "Google rejected authorization code");
            return Err(AppError::Unauthorized);
        }

        let token: TokenExchange = response
            .error_for_status()
            .map_err(transport_error)?
            .json()
            .await
            .map_err(transport_error)?;

        Ok(token.access_token)
    }

    async fn user_info(&self, access_token: &str) -> AppResult<UserInfo> {
        self.http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?
            .error_for_status()
            .map_err(transport_error)?
            .json()
            .await
            .map_err(transport_error)
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&prompt=select_account",
            GOOGLE_AUTH_URL,
            urlencoding::encode(&self.settings.client_id),
            urlencoding::encode(&self.settings.redirect_url),
            urlencoding::encode(GOOGLE_SCOPES),
            urlencoding::encode(state),
        )
    }

    async fn fetch_profile(&self, code: &str) -> AppResult<ExternalProfile> {
        let access_token = self.exchange_code(code).await?;
        let info = self.user_info(&access_token).await?;
        into_profile(info)
    }
}

fn into_profile(info: UserInfo) -> AppResult<ExternalProfile> {
    let email = info
        .email
        .ok_or_else(|| AppError::provider("profile has no email"))?;

    if !info.email_verified {
        return Err(AppError::EmailNotVerified);
    }

    let display_name = info
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

    Ok(ExternalProfile::new(
        info.sub,
        &email,
        display_name,
        info.picture,
    ))
}

fn transport_error(e: reqwest::Error) -> AppError {
    AppError::provider(e.to_string())
}
