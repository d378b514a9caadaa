//! Domain layer - Core business entities and logic
//!
//! This module contains the core domain models that represent
//! business concepts independent of infrastructure concerns.

pub mod credentials;
pub mod password;
pub mod profile;
pub mod user;

pub use credentials::CredentialError;
pub use password::Password;
pub use profile::{DisplayName, ExternalAssertion, ExternalProfile};
pub use user::{IdentityState, User, UserResponse};
