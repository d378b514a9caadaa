//! Token service - access tokens, logout revocation and account-link tokens.
//!
//! The identity resolver never sees tokens; handlers turn its user records
//! into tokens here.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{
    JwtSettings, LINK_TOKEN_AUDIENCE, LINK_TOKEN_TTL_SECONDS, SECONDS_PER_HOUR, TOKEN_TYPE_BEARER,
};
use crate::domain::{ExternalAssertion, User};
use crate::errors::{AppError, AppResult};
use crate::infra::SessionStore;

/// JWT claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    /// Token id, the revocation key
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

/// Claims of a link token: proof of a fresh external login
#[derive(Debug, Serialize, Deserialize)]
struct LinkClaims {
    /// External subject id
    sub: String,
    email: String,
    aud: String,
    exp: i64,
    iat: i64,
}

/// Token response returned after successful authentication
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenResponse {
    /// JWT access token
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    /// Token type (always "Bearer")
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Token expiration time in seconds
    #[schema(example = 86400)]
    pub expires_in: i64,
}

#[async_trait]
pub trait TokenService: Send + Sync {
    /// Sign an access token for a user
    fn issue_token(&self, user: &User) -> AppResult<TokenResponse>;

    /// Verify signature and expiry, then reject revoked tokens
    async fn verify_token(&self, token: &str) -> AppResult<Claims>;

    /// Revoke a token until it would have expired anyway
    async fn revoke(&self, claims: &Claims) -> AppResult<()>;

    /// Sign a short-lived assertion of the user's external identity
    fn issue_link_token(&self, user: &User) -> AppResult<String>;

    /// Check a link token and return the identity it asserts
    fn verify_link_token(&self, token: &str) -> AppResult<ExternalAssertion>;
}

/// HS256 implementation backed by a session store for revocations.
pub struct TokenIssuer {
    settings: JwtSettings,
    sessions: Arc<dyn SessionStore>,
}

impl TokenIssuer {
    pub fn new(settings: JwtSettings, sessions: Arc<dyn SessionStore>) -> Self {
        Self { settings, sessions }
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.settings.secret_bytes())
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.settings.secret_bytes())
    }
}

#[async_trait]
impl TokenService for TokenIssuer {
    fn issue_token(&self, user: &User) -> AppResult<TokenResponse> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.settings.expiration_hours);

        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            jti: Uuid::new_v4().to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key())?;

        Ok(TokenResponse {
            access_token: token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.settings.expiration_hours * SECONDS_PER_HOUR,
        })
    }

    async fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let claims = decode::<Claims>(token, &self.decoding_key(), &Validation::default())?.claims;

        if self.sessions.is_token_revoked(&claims.jti).await? {
            return Err(AppError::Unauthorized);
        }

        Ok(claims)
    }

    async fn revoke(&self, claims: &Claims) -> AppResult<()> {
        let remaining = (claims.exp - Utc::now().timestamp()).max(0) as u64;
        self.sessions.revoke_token(&claims.jti, remaining).await?;

        tracing::debug!(user_id = %claims.sub, "Token revoked");
        Ok(())
    }

    fn issue_link_token(&self, user: &User) -> AppResult<String> {
        let external_id = user
            .external_id
            .clone()
            .ok_or_else(|| AppError::internal("Link token requested for a user without external identity"))?;

        let now = Utc::now();
        let claims = LinkClaims {
            sub: external_id,
            email: user.email.clone(),
            aud: LINK_TOKEN_AUDIENCE.to_string(),
            exp: (now + Duration::seconds(LINK_TOKEN_TTL_SECONDS)).timestamp(),
            iat: now.timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key())?)
    }

    fn verify_link_token(&self, token: &str) -> AppResult<ExternalAssertion> {
        let mut validation = Validation::default();
        validation.set_audience(&[LINK_TOKEN_AUDIENCE]);

        let claims = decode::<LinkClaims>(token, &self.decoding_key(), &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Link token rejected");
                AppError::LinkRejected
            })?
            .claims;

        Ok(ExternalAssertion {
            external_id: claims.sub,
            email: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExternalProfile;
    use crate::infra::{MemorySessionStore, MockSessionStore};

    fn settings() -> JwtSettings {
        JwtSettings::new("test-secret-that-is-at-least-32-characters", 24)
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(settings(), Arc::new(MemorySessionStore::new()))
    }

    fn external_user() -> User {
        User::from_profile(&ExternalProfile::new("g-001", "alice@x.com", "Alice W", None))
    }

    #[tokio::test]
    async fn test_issue_and_verify() {
        let issuer = issuer();
        let user = external_user();

        let token = issuer.issue_token(&user).unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, 24 * 3600);

        let claims = issuer.verify_token(&token.access_token).await.unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "alice@x.com");
    }

    #[tokio::test]
    async fn test_revoked_token_is_rejected() {
        let issuer = issuer();
        let token = issuer.issue_token(&external_user()).unwrap();

        let claims = issuer.verify_token(&token.access_token).await.unwrap();
        issuer.revoke(&claims).await.unwrap();

        let result = issuer.verify_token(&token.access_token).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_revocation_lookup_failure_propagates() {
        let mut sessions = MockSessionStore::new();
        sessions
            .expect_is_token_revoked()
            .returning(|_| Err(AppError::internal("Cache error")));
        let issuer = TokenIssuer::new(settings(), Arc::new(sessions));

        let token = issuer.issue_token(&external_user()).unwrap();
        let result = issuer.verify_token(&token.access_token).await;

        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_rejected() {
        let other = TokenIssuer::new(
            JwtSettings::new("another-secret-that-is-at-least-32-chars", 24),
            Arc::new(MemorySessionStore::new()),
        );
        let token = other.issue_token(&external_user()).unwrap();

        let result = issuer().verify_token(&token.access_token).await;
        assert!(matches!(result, Err(AppError::Jwt(_))));
    }

    #[test]
    fn test_link_token_round_trip() {
        let issuer = issuer();
        let token = issuer.issue_link_token(&external_user()).unwrap();

        let assertion = issuer.verify_link_token(&token).unwrap();
        assert_eq!(assertion.external_id, "g-001");
        assert_eq!(assertion.email, "alice@x.com");
    }

    #[test]
    fn test_link_token_requires_external_identity() {
        let local = User::local(
            "alice".into(),
            "hash".into(),
            "A".into(),
            "B".into(),
            "alice@x.com".into(),
        );
        assert!(issuer().issue_link_token(&local).is_err());
    }

    #[tokio::test]
    async fn test_tokens_are_not_interchangeable() {
        let issuer = issuer();
        let user = external_user();

        let access = issuer.issue_token(&user).unwrap().access_token;
        assert!(matches!(
            issuer.verify_link_token(&access),
            Err(AppError::LinkRejected)
        ));

        let link = issuer.issue_link_token(&user).unwrap();
        assert!(issuer.verify_token(&link).await.is_err());
    }
}
