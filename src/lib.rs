//! Estate auth - identity and session service of a real-estate marketplace
//!
//! Resolves every sign-in event (Google login, local registration, local
//! login) to exactly one user record, linking local and Google identities
//! that belong together, and issues the bearer tokens the rest of the
//! marketplace trusts.
//!
//! # Architecture Layers
//!
//! - **cli**: Command-line interface
//! - **commands**: CLI command implementations
//! - **config**: Application configuration and constants
//! - **domain**: Users, identity states, credential rules, passwords
//! - **services**: Identity resolver, tokens, OAuth flow
//! - **infra**: Postgres, Redis, Google client, in-memory backends
//! - **api**: HTTP handlers, middleware, and routes
//! - **types**: Shared response types
//! - **errors**: Centralized error handling
//!
//! # CLI Usage
//!
//! ```bash
//! # Start the server
//! cargo run -- serve
//!
//! # Start without Postgres or Redis
//! cargo run -- serve --in-memory
//!
//! # Run migrations
//! cargo run -- migrate up
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod services;
pub mod types;

// Re-export commonly used types at crate root
pub use api::AppState;
pub use config::Config;
pub use domain::{ExternalProfile, Password, User};
pub use errors::{AppError, AppResult};
pub use services::{IdentityResolver, IdentityService, Registration};
