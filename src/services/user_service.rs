//! User service - reads of the signed-in user.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::User;
use crate::errors::{AppResult, OptionExt};
use crate::infra::UnitOfWork;

#[async_trait]
pub trait UserService: Send + Sync {
    /// Get user by ID
    async fn get_user(&self, id: Uuid) -> AppResult<User>;
}

/// Concrete implementation of UserService using Unit of Work.
pub struct UserManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> UserManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<U: UnitOfWork> UserService for UserManager<U> {
    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.uow.users().find_by_id(id).await?.ok_or_not_found()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExternalProfile;
    use crate::errors::AppError;
    use crate::infra::{InMemoryPersistence, UserRepository};

    #[tokio::test]
    async fn test_get_user() {
        let uow = Arc::new(InMemoryPersistence::new());
        let user = User::from_profile(&ExternalProfile::new("g-1", "a@x.com", "A B", None));
        uow.store().create(user.clone()).await.unwrap();

        let service = UserManager::new(uow);

        assert_eq!(service.get_user(user.id).await.unwrap(), user);
        assert!(matches!(
            service.get_user(Uuid::new_v4()).await,
            Err(AppError::NotFound)
        ));
    }
}
