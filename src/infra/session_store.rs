//! Short-lived session state: revoked tokens, OAuth state nonces and
//! rate-limit counters.

use async_trait::async_trait;

use crate::errors::AppResult;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Mark a token id as revoked until `ttl_seconds` from now
    async fn revoke_token(&self, jti: &str, ttl_seconds: u64) -> AppResult<()>;

    async fn is_token_revoked(&self, jti: &str) -> AppResult<bool>;

    /// Remember an OAuth state nonce
    async fn save_oauth_state(&self, state: &str, ttl_seconds: u64) -> AppResult<()>;

    /// Remove a state nonce, returning whether it was present and unexpired
    async fn take_oauth_state(&self, state: &str) -> AppResult<bool>;

    /// Count a request against a fixed window.
    /// Returns (current_count, is_allowed).
    async fn check_rate_limit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<(u64, bool)>;

    /// Check backend connectivity
    async fn ping(&self) -> AppResult<()>;
}
