//! Redis cache implementation.
//!
//! Backs the session store: token revocation list, OAuth state nonces and
//! rate-limit counters, all stored with TTLs so Redis does the expiry.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};

use super::session_store::SessionStore;
use crate::config::{
    Config, CACHE_PREFIX_OAUTH_STATE, CACHE_PREFIX_RATE_LIMIT, CACHE_PREFIX_REVOKED,
};
use crate::errors::{AppError, AppResult};

/// Redis cache wrapper with connection pooling.
#[derive(Clone)]
pub struct Cache {
    connection: ConnectionManager,
}

impl Cache {
    /// Connect to Redis.
    pub async fn connect(config: &Config) -> Result<Self, RedisError> {
        let client = Client::open(config.redis_url.as_str())?;
        let connection = ConnectionManager::new(client).await?;

        tracing::info!("Redis cache connected");

        Ok(Self { connection })
    }

    // =========================================================================
    // Generic Cache Operations
    // =========================================================================

    /// Set a string value with a TTL (in seconds).
    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> AppResult<()> {
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds)
            .await
            .map_err(cache_error)?;
        Ok(())
    }

    /// Check if a key exists in cache.
    pub async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.connection.clone();
        let exists: bool = conn.exists(key).await.map_err(cache_error)?;
        Ok(exists)
    }

    /// Delete a key, returning whether it existed.
    pub async fn take(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.connection.clone();
        let removed: i64 = conn.del(key).await.map_err(cache_error)?;
        Ok(removed > 0)
    }
}

#[async_trait]
impl SessionStore for Cache {
    async fn revoke_token(&self, jti: &str, ttl_seconds: u64) -> AppResult<()> {
        let key = format!("{}{}", CACHE_PREFIX_REVOKED, jti);
        // SETEX rejects a zero TTL
        self.set_with_ttl(&key, "1", ttl_seconds.max(1)).await
    }

    async fn is_token_revoked(&self, jti: &str) -> AppResult<bool> {
        let key = format!("{}{}", CACHE_PREFIX_REVOKED, jti);
        self.exists(&key).await
    }

    async fn save_oauth_state(&self, state: &str, ttl_seconds: u64) -> AppResult<()> {
        let key = format!("{}{}", CACHE_PREFIX_OAUTH_STATE, state);
        self.set_with_ttl(&key, "1", ttl_seconds).await
    }

    async fn take_oauth_state(&self, state: &str) -> AppResult<bool> {
        let key = format!("{}{}", CACHE_PREFIX_OAUTH_STATE, state);
        self.take(&key).await
    }

    async fn check_rate_limit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<(u64, bool)> {
        let key = format!("{}{}", CACHE_PREFIX_RATE_LIMIT, identifier);
        let mut conn = self.connection.clone();

        let count: i64 = conn.incr(&key, 1).await.map_err(cache_error)?;
        if count == 1 {
            // First request opens the window
            let _: () = conn
                .expire(&key, window_seconds as i64)
                .await
                .map_err(cache_error)?;
        }

        let count = count as u64;
        Ok((count, count <= max_requests))
    }

    async fn ping(&self) -> AppResult<()> {
        self.exists("health:ping").await.map(|_| ())
    }
}

/// Convert Redis error to AppError.
fn cache_error(e: RedisError) -> AppError {
    tracing::error!("Redis error: {}", e);
    AppError::internal(format!("Cache error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_prefixes() {
        assert_eq!(CACHE_PREFIX_REVOKED, "revoked:");
        assert_eq!(CACHE_PREFIX_OAUTH_STATE, "oauth_state:");
        assert_eq!(CACHE_PREFIX_RATE_LIMIT, "rate_limit:");
    }
}
