//! Application state - Dependency injection container.
//!
//! Provides centralized access to all application services and infrastructure.

use std::sync::Arc;

use crate::infra::{Database, SessionStore};
use crate::services::{
    IdentityService, OAuthService, ServiceContainer, TokenService, UserService,
};

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Identity resolver
    pub identity: Arc<dyn IdentityService>,
    /// Access and link tokens
    pub tokens: Arc<dyn TokenService>,
    pub users: Arc<dyn UserService>,
    /// OAuth authorization-code flow
    pub oauth: Arc<dyn OAuthService>,
    /// Session store (rate limits, revocations)
    pub sessions: Arc<dyn SessionStore>,
    /// Database handle for health checks; `None` when running in memory
    pub database: Option<Arc<Database>>,
    /// Whether a reverse proxy in front of us sets `X-Forwarded-For`
    pub trust_forwarded_for: bool,
}

impl AppState {
    /// Create application state from a service container.
    pub fn new(
        services: &dyn ServiceContainer,
        sessions: Arc<dyn SessionStore>,
        database: Option<Arc<Database>>,
    ) -> Self {
        Self {
            identity: services.identity(),
            tokens: services.tokens(),
            users: services.users(),
            oauth: services.oauth(),
            sessions,
            database,
            trust_forwarded_for: false,
        }
    }

    /// Identify rate-limited clients by the proxy-appended forwarding hop.
    pub fn trusting_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}
