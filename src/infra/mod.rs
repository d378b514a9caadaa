//! Infrastructure layer - External systems integration
//!
//! This module handles all external system concerns:
//! - Database connections and repositories
//! - Session state in Redis (revocations, OAuth state, rate limits)
//! - The Google identity provider client
//! - Unit of Work for transaction management
//! - In-memory backends for tests and local runs

pub mod cache;
pub mod db;
pub mod identity_provider;
pub mod memory;
pub mod repositories;
pub mod session_store;
pub mod unit_of_work;

pub use cache::Cache;
pub use db::{Database, Migrator};
pub use identity_provider::{GoogleProvider, IdentityProvider};
pub use memory::{InMemoryPersistence, InMemoryUserStore, MemorySessionStore};
pub use repositories::{TxUserStore, UserRepository, UserStore};
pub use session_store::SessionStore;
pub use unit_of_work::{Persistence, TransactionContext, TxFuture, UnitOfWork};

#[cfg(any(test, feature = "test-utils"))]
pub use identity_provider::MockIdentityProvider;
#[cfg(any(test, feature = "test-utils"))]
pub use repositories::MockUserRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use session_store::MockSessionStore;
