//! Serve command - Starts the HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::api::{create_router, AppState};
use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::infra::{
    Cache, Database, GoogleProvider, IdentityProvider, InMemoryPersistence, MemorySessionStore,
    Persistence, SessionStore,
};
use crate::services::Services;

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: Config) -> AppResult<()> {
    tracing::info!("Starting server...");

    let provider: Arc<dyn IdentityProvider> = Arc::new(GoogleProvider::new(config.google.clone()));

    let app_state = if args.in_memory {
        tracing::warn!("Running with in-memory storage; nothing survives a restart");

        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let uow = Arc::new(InMemoryPersistence::new());
        let services = Services::build(uow, sessions.clone(), provider, config.jwt());

        AppState::new(&services, sessions, None)
    } else {
        let db = Database::connect(&config)
            .await
            .map_err(|e| AppError::internal(format!("Database connection failed: {}", e)))?;
        tracing::info!("Database connected");

        let cache = Cache::connect(&config)
            .await
            .map_err(|e| AppError::internal(format!("Redis connection failed: {}", e)))?;

        let sessions: Arc<dyn SessionStore> = Arc::new(cache);
        let uow = Arc::new(Persistence::new(db.get_connection()));
        let services = Services::build(uow, sessions.clone(), provider, config.jwt());

        AppState::new(&services, sessions, Some(Arc::new(db)))
    };

    if config.trust_forwarded_for {
        tracing::info!("Rate limits keyed on the X-Forwarded-For proxy hop");
    }
    let app = create_router(app_state.trusting_forwarded_for(config.trust_forwarded_for));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("Server running on http://{}", addr);

    // Peer addresses feed the rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    Ok(())
}
