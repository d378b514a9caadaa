//! Service Container - Centralized service access.
//!
//! Wires the services over one unit of work, one session store and one
//! identity provider, so the HTTP layer depends on service traits only.

use std::sync::Arc;

use super::{
    IdentityResolver, IdentityService, OAuthFlow, OAuthService, TokenIssuer, TokenService,
    UserManager, UserService,
};
use crate::config::JwtSettings;
use crate::infra::{IdentityProvider, SessionStore, UnitOfWork};

/// Service container trait for dependency injection.
pub trait ServiceContainer: Send + Sync {
    /// Identity resolution (register, login, external login)
    fn identity(&self) -> Arc<dyn IdentityService>;

    /// Access and link tokens
    fn tokens(&self) -> Arc<dyn TokenService>;

    fn users(&self) -> Arc<dyn UserService>;

    /// OAuth authorization-code flow
    fn oauth(&self) -> Arc<dyn OAuthService>;
}

/// Concrete implementation of ServiceContainer
#[derive(Clone)]
pub struct Services {
    identity: Arc<dyn IdentityService>,
    tokens: Arc<dyn TokenService>,
    users: Arc<dyn UserService>,
    oauth: Arc<dyn OAuthService>,
}

impl Services {
    /// Create a container from already built services
    pub fn new(
        identity: Arc<dyn IdentityService>,
        tokens: Arc<dyn TokenService>,
        users: Arc<dyn UserService>,
        oauth: Arc<dyn OAuthService>,
    ) -> Self {
        Self {
            identity,
            tokens,
            users,
            oauth,
        }
    }

    /// Build every service over the given backends.
    pub fn build<U: UnitOfWork>(
        uow: Arc<U>,
        sessions: Arc<dyn SessionStore>,
        provider: Arc<dyn IdentityProvider>,
        jwt: JwtSettings,
    ) -> Self {
        Self {
            identity: Arc::new(IdentityResolver::new(uow.clone())),
            tokens: Arc::new(TokenIssuer::new(jwt, sessions.clone())),
            users: Arc::new(UserManager::new(uow)),
            oauth: Arc::new(OAuthFlow::new(provider, sessions)),
        }
    }
}

impl ServiceContainer for Services {
    fn identity(&self) -> Arc<dyn IdentityService> {
        self.identity.clone()
    }

    fn tokens(&self) -> Arc<dyn TokenService> {
        self.tokens.clone()
    }

    fn users(&self) -> Arc<dyn UserService> {
        self.users.clone()
    }

    fn oauth(&self) -> Arc<dyn OAuthService> {
        self.oauth.clone()
    }
}
