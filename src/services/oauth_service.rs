//! OAuth service - authorization-code flow with single-use state nonces.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::OAUTH_STATE_TTL_SECONDS;
use crate::domain::ExternalProfile;
use crate::errors::{AppError, AppResult};
use crate::infra::{IdentityProvider, SessionStore};

#[async_trait]
pub trait OAuthService: Send + Sync {
    /// Start a login: store a fresh state nonce and return the provider URL
    async fn begin(&self) -> AppResult<String>;

    /// Finish a login: consume the nonce and fetch the verified profile
    async fn complete(&self, code: &str, state: &str) -> AppResult<ExternalProfile>;
}

pub struct OAuthFlow {
    provider: Arc<dyn IdentityProvider>,
    sessions: Arc<dyn SessionStore>,
}

impl OAuthFlow {
    pub fn new(provider: Arc<dyn IdentityProvider>, sessions: Arc<dyn SessionStore>) -> Self {
        Self { provider, sessions }
    }
}

#[async_trait]
impl OAuthService for OAuthFlow {
    async fn begin(&self) -> AppResult<String> {
        let state = Uuid::new_v4().simple().to_string();
        self.sessions
            .save_oauth_state(&state, OAUTH_STATE_TTL_SECONDS)
            .await?;

        Ok(self.provider.authorization_url(&state))
    }

    async fn complete(&self, code: &str, state: &str) -> AppResult<ExternalProfile> {
        if !self.sessions.take_oauth_state(state).await? {
            tracing::warn!("Unknown or expired OAuth state");
            return Err(AppError::Unauthorized);
        }

        let profile = self.provider.fetch_profile(code).await?;
        tracing::debug!(external_id = %profile.external_id, "Fetched provider profile");
        Ok(profile)
    }
}
