//! Identity resolver - decides which user row an authentication event
//! creates, refreshes or links.
//!
//! Each operation runs its reads and its single write inside one unit-of-work
//! transaction. Uniqueness under races is enforced by the store, whose
//! violations arrive here already translated (`UsernameTaken`, `Conflict`).

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::credentials::{
    normalize_email, normalize_username, validate_email, validate_name, validate_password,
    validate_username,
};
use crate::domain::{CredentialError, ExternalAssertion, ExternalProfile, Password, User};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;
use crate::with_transaction;

/// Local registration form as submitted.
#[derive(Debug, Clone)]
pub struct LocalRegistration {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl LocalRegistration {
    /// Lower-case username and email, trim names. The password is untouched.
    fn normalized(self) -> Self {
        Self {
            username: normalize_username(&self.username),
            password: self.password,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: normalize_email(&self.email),
        }
    }

    /// First violated rule, checked field by field on the submitted text.
    ///
    /// Runs before lower-casing: case folding maps some non-ASCII letters
    /// (KELVIN SIGN to `k`) into the allowed charset.
    fn validate(&self) -> Result<(), CredentialError> {
        validate_username(self.username.trim())?;
        validate_password(&self.password)?;
        validate_name(&self.first_name, CredentialError::FirstNameRequired)?;
        validate_name(&self.last_name, CredentialError::LastNameRequired)?;
        validate_email(self.email.trim())
    }
}

/// Outcome of a local registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// A credential was stored, on a new row or merged into an external one
    Registered { user: User, linked: bool },
    /// The email belongs to an external account; nothing was written
    NeedsLinking { email: String, name: String },
}

/// Identity resolution use cases.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Create, refresh or link the user behind an external-provider login
    async fn resolve_external_login(&self, profile: ExternalProfile) -> AppResult<User>;

    /// Register a username/password credential.
    ///
    /// `link` must be a verified assertion of the external identity that
    /// already owns the email; without it such a registration only reports
    /// `NeedsLinking`.
    async fn register_local(
        &self,
        form: LocalRegistration,
        link: Option<ExternalAssertion>,
    ) -> AppResult<Registration>;

    /// Verify a username/password pair
    async fn authenticate_local(&self, username: String, password: String) -> AppResult<User>;

    /// Whether a username is well-formed and unclaimed
    async fn check_username(&self, username: String) -> AppResult<bool>;
}

/// IdentityService over a unit of work.
pub struct IdentityResolver<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> IdentityResolver<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<U: UnitOfWork> IdentityService for IdentityResolver<U> {
    async fn resolve_external_login(&self, profile: ExternalProfile) -> AppResult<User> {
        with_transaction!(self.uow, |ctx| {
            let users = ctx.users();

            if let Some(mut user) = users.find_by_external_id(&profile.external_id).await? {
                user.refresh_from_profile(&profile);
                tracing::debug!(user_id = %user.id, "Refreshing external identity");
                return users.update(user).await;
            }

            if let Some(mut user) = users.find_local_by_email(&profile.email).await? {
                if user.external_id.is_some() {
                    // The lookup excludes linked rows; never rebind one
                    tracing::warn!(
                        user_id = %user.id,
                        "Email match already bound to an external identity, refreshing only"
                    );
                    user.refresh_from_profile(&profile);
                    return users.update(user).await;
                }

                user.link_external(&profile);
                tracing::info!(user_id = %user.id, "Linking external identity to local account");
                return users.update(user).await;
            }

            let user = users.create(User::from_profile(&profile)).await?;
            tracing::info!(user_id = %user.id, "Created user from external identity");
            Ok(user)
        })
    }

    async fn register_local(
        &self,
        form: LocalRegistration,
        link: Option<ExternalAssertion>,
    ) -> AppResult<Registration> {
        form.validate()?;
        let form = form.normalized();

        with_transaction!(self.uow, |ctx| {
            let users = ctx.users();

            if users.username_exists(&form.username, None).await? {
                return Err(AppError::UsernameTaken);
            }

            if let Some(assertion) = link {
                // The assertion names the row; the email only has to agree
                let existing = users.find_by_external_id(&assertion.external_id).await?;
                let Some(mut existing) = existing.filter(|u| {
                    u.email == assertion.email && assertion.email == form.email
                }) else {
                    tracing::warn!(
                        username = %form.username,
                        "Link assertion does not match an account for this email"
                    );
                    return Err(AppError::LinkRejected);
                };

                if existing.has_local_credential() {
                    return Err(AppError::EmailAlreadyRegistered);
                }
                if users.username_exists(&form.username, Some(existing.id)).await? {
                    return Err(AppError::UsernameTaken);
                }

                let hash = Password::new(&form.password)?.into_string();
                existing.attach_local_credential(
                    form.username,
                    hash,
                    &form.first_name,
                    &form.last_name,
                );
                let user = users.update(existing).await?;
                tracing::info!(user_id = %user.id, "Linked local credential to external account");

                return Ok(Registration::Registered { user, linked: true });
            }

            if let Some(existing) = users.find_linked_by_email(&form.email).await? {
                tracing::info!(
                    username = %form.username,
                    "Email bound to an external account, linking required"
                );
                return Ok(Registration::NeedsLinking {
                    email: existing.email,
                    name: existing.name,
                });
            }

            if users.find_local_by_email(&form.email).await?.is_some() {
                return Err(AppError::EmailAlreadyRegistered);
            }

            let hash = Password::new(&form.password)?.into_string();
            let user = users
                .create(User::local(
                    form.username,
                    hash,
                    form.first_name,
                    form.last_name,
                    form.email,
                ))
                .await?;
            tracing::info!(user_id = %user.id, "Registered local user");

            Ok(Registration::Registered {
                user,
                linked: false,
            })
        })
    }

    async fn authenticate_local(&self, username: String, password: String) -> AppResult<User> {
        let username = normalize_username(&username);
        let user = self.uow.users().find_by_username(&username).await?;

        let stored = user
            .as_ref()
            .and_then(|u| u.password_hash.clone())
            .map(Password::from_hash);

        // Equal work whether or not a hash exists
        let valid = match &stored {
            Some(hash) => hash.verify(&password),
            None => Password::verify_dummy(&password),
        };

        match user {
            Some(user) if valid => Ok(user),
            _ => {
                tracing::debug!(username = %username, "Local authentication failed");
                Err(AppError::InvalidCredentials)
            }
        }
    }

    async fn check_username(&self, username: String) -> AppResult<bool> {
        validate_username(username.trim())?;
        let username = normalize_username(&username);

        let taken = self.uow.users().username_exists(&username, None).await?;
        Ok(!taken)
    }
}
