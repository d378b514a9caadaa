//! Application services layer - Use cases and business logic.
//!
//! Services orchestrate domain logic and infrastructure to fulfill
//! application use cases. They depend on abstractions (traits) for
//! dependency inversion.
//!
//! Operations that read then write run inside a Unit of Work transaction.

pub mod container;
mod identity_service;
mod oauth_service;
mod token_service;
mod user_service;

// Service Container
pub use container::{ServiceContainer, Services};

// Service traits and implementations
pub use identity_service::{IdentityResolver, IdentityService, LocalRegistration, Registration};
pub use oauth_service::{OAuthFlow, OAuthService};
pub use token_service::{Claims, TokenIssuer, TokenResponse, TokenService};
pub use user_service::{UserManager, UserService};
