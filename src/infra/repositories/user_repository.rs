//! User repository: identity lookups and single-row writes.
//!
//! `UserStore` runs on the pooled connection (autocommit); `TxUserStore` runs
//! every statement on a borrowed transaction and takes row locks on the
//! lookups that precede a write.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, SqlErr,
};
use uuid::Uuid;

use super::entities::user::{self, ActiveModel, Entity as UserEntity};
use crate::domain::User;
use crate::errors::{AppError, AppResult};
use crate::infra::db::migrations::{EXTERNAL_ID_INDEX, LOCAL_EMAIL_INDEX, USERNAME_INDEX};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// User repository trait for dependency injection.
///
/// Usernames and emails are expected already normalized by the caller.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find user by ID
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Find the user bound to an external identity
    async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<User>>;

    /// Find user by (lower-cased) username
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// Find a user with this email and no external identity
    async fn find_local_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Oldest user with this email and an external identity
    async fn find_linked_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Whether a non-empty username is held by any row other than `excluding`
    async fn username_exists(&self, username: &str, excluding: Option<Uuid>) -> AppResult<bool>;

    /// Insert a new row
    async fn create(&self, user: User) -> AppResult<User>;

    /// Overwrite an existing row
    async fn update(&self, user: User) -> AppResult<User>;
}

/// Concrete implementation of UserRepository on the connection pool
pub struct UserStore {
    db: DatabaseConnection,
}

impl UserStore {
    /// Create new repository instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Transaction-scoped UserRepository.
pub struct TxUserStore<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxUserStore<'a> {
    pub fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        find_one(&self.db, UserEntity::find_by_id(id), false).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<User>> {
        find_one(&self.db, by_external_id(external_id), false).await
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        find_one(&self.db, by_username(username), false).await
    }

    async fn find_local_by_email(&self, email: &str) -> AppResult<Option<User>> {
        find_one(&self.db, local_by_email(email), false).await
    }

    async fn find_linked_by_email(&self, email: &str) -> AppResult<Option<User>> {
        find_one(&self.db, linked_by_email(email), false).await
    }

    async fn username_exists(&self, username: &str, excluding: Option<Uuid>) -> AppResult<bool> {
        username_exists(&self.db, username, excluding).await
    }

    async fn create(&self, user: User) -> AppResult<User> {
        insert(&self.db, user).await
    }

    async fn update(&self, user: User) -> AppResult<User> {
        update(&self.db, user).await
    }
}

#[async_trait]
impl<'a> UserRepository for TxUserStore<'a> {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        find_one(self.txn, UserEntity::find_by_id(id), true).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<User>> {
        find_one(self.txn, by_external_id(external_id), true).await
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        find_one(self.txn, by_username(username), true).await
    }

    async fn find_local_by_email(&self, email: &str) -> AppResult<Option<User>> {
        find_one(self.txn, local_by_email(email), true).await
    }

    async fn find_linked_by_email(&self, email: &str) -> AppResult<Option<User>> {
        find_one(self.txn, linked_by_email(email), true).await
    }

    async fn username_exists(&self, username: &str, excluding: Option<Uuid>) -> AppResult<bool> {
        username_exists(self.txn, username, excluding).await
    }

    async fn create(&self, user: User) -> AppResult<User> {
        insert(self.txn, user).await
    }

    async fn update(&self, user: User) -> AppResult<User> {
        update(self.txn, user).await
    }
}

// =============================================================================
// Queries shared by both stores
// =============================================================================

fn by_external_id(external_id: &str) -> Select<UserEntity> {
    UserEntity::find().filter(user::Column::ExternalId.eq(external_id))
}

fn by_username(username: &str) -> Select<UserEntity> {
    UserEntity::find().filter(user::Column::Username.eq(username))
}

fn local_by_email(email: &str) -> Select<UserEntity> {
    UserEntity::find()
        .filter(user::Column::Email.eq(email))
        .filter(user::Column::ExternalId.is_null())
}

/// Several external accounts may share an email; the oldest one answers.
fn linked_by_email(email: &str) -> Select<UserEntity> {
    UserEntity::find()
        .filter(user::Column::Email.eq(email))
        .filter(user::Column::ExternalId.is_not_null())
        .order_by_asc(user::Column::CreatedAt)
        .order_by_asc(user::Column::Id)
}

async fn find_one<C: ConnectionTrait>(
    db: &C,
    query: Select<UserEntity>,
    lock: bool,
) -> AppResult<Option<User>> {
    let query = if lock { query.lock_exclusive() } else { query };
    let result = query.one(db).await.map_err(AppError::from)?;
    Ok(result.map(User::from))
}

async fn username_exists<C: ConnectionTrait>(
    db: &C,
    username: &str,
    excluding: Option<Uuid>,
) -> AppResult<bool> {
    let mut query = UserEntity::find()
        .filter(user::Column::Username.eq(username))
        .filter(user::Column::Username.ne(""));

    if let Some(id) = excluding {
        query = query.filter(user::Column::Id.ne(id));
    }

    let count = query.count(db).await.map_err(AppError::from)?;
    Ok(count > 0)
}

async fn insert<C: ConnectionTrait>(db: &C, user: User) -> AppResult<User> {
    let model = ActiveModel::from(user)
        .insert(db)
        .await
        .map_err(write_error)?;
    Ok(User::from(model))
}

async fn update<C: ConnectionTrait>(db: &C, user: User) -> AppResult<User> {
    let model = ActiveModel::from(user)
        .update(db)
        .await
        .map_err(write_error)?;
    Ok(User::from(model))
}

/// Translate constraint violations into the identity conflicts they encode.
fn write_error(err: DbErr) -> AppError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
        if let Some(conflict) = unique_violation(&detail) {
            return conflict;
        }
    }

    match err {
        DbErr::RecordNotUpdated => AppError::NotFound,
        other => AppError::Database(other),
    }
}

/// Map the violated index, named in the driver message, to its error.
fn unique_violation(detail: &str) -> Option<AppError> {
    if detail.contains(USERNAME_INDEX) {
        Some(AppError::UsernameTaken)
    } else if detail.contains(EXTERNAL_ID_INDEX) {
        Some(AppError::conflict("External identity"))
    } else if detail.contains(LOCAL_EMAIL_INDEX) {
        Some(AppError::EmailAlreadyRegistered)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrelated_db_errors_stay_persistence_errors() {
        let err = write_error(DbErr::Custom("disk full".into()));
        assert!(matches!(err, AppError::Database(_)));
    }

    #[test]
    fn test_unique_violations_map_by_index_name() {
        let postgres = |index: &str| {
            format!(
                "duplicate key value violates unique constraint \"{}\"",
                index
            )
        };

        assert!(matches!(
            unique_violation(&postgres(USERNAME_INDEX)),
            Some(AppError::UsernameTaken)
        ));
        assert!(matches!(
            unique_violation(&postgres(EXTERNAL_ID_INDEX)),
            Some(AppError::Conflict(_))
        ));
        assert!(matches!(
            unique_violation(&postgres(LOCAL_EMAIL_INDEX)),
            Some(AppError::EmailAlreadyRegistered)
        ));
        assert!(unique_violation(&postgres("users_pkey")).is_none());
    }

    #[test]
    fn test_missing_row_on_update_is_not_found() {
        assert!(matches!(
            write_error(DbErr::RecordNotUpdated),
            AppError::NotFound
        ));
    }
}
