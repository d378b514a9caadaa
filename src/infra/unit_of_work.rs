//! Unit of Work pattern implementation.
//!
//! Centralizes repository access and owns the transaction lifecycle: a
//! closure runs against transaction-scoped repositories and is committed on
//! `Ok`, rolled back on `Err`.

use async_trait::async_trait;
use sea_orm::{AccessMode, DatabaseConnection, IsolationLevel, TransactionTrait};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::repositories::{TxUserStore, UserRepository, UserStore};
use crate::errors::{AppError, AppResult};

/// Boxed future returned by transaction closures.
pub type TxFuture<'a, T> = Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>;

/// Unit of Work trait for dependency injection.
///
/// Not object safe because of the generic transaction methods; services are
/// generic over it instead.
#[async_trait]
pub trait UnitOfWork: Send + Sync + 'static {
    /// Get user repository (autocommit)
    fn users(&self) -> Arc<dyn UserRepository>;

    /// Execute a closure within a transaction.
    ///
    /// Uses ReadCommitted; the partial unique indexes on external id,
    /// username and local email settle concurrent writers.
    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send;
}

/// Transaction context providing repository access within a transaction.
///
/// Every repository reached through the context runs on the same
/// transaction.
#[derive(Clone, Copy)]
pub struct TransactionContext<'a> {
    users: &'a dyn UserRepository,
}

impl<'a> TransactionContext<'a> {
    /// Create a new transaction context
    pub fn new(users: &'a dyn UserRepository) -> Self {
        Self { users }
    }

    /// Get user repository for this transaction
    pub fn users(&self) -> &'a dyn UserRepository {
        self.users
    }
}

/// SeaORM implementation of UnitOfWork
pub struct Persistence {
    db: DatabaseConnection,
    user_repo: Arc<UserStore>,
}

impl Persistence {
    /// Create new UnitOfWork instance
    pub fn new(db: DatabaseConnection) -> Self {
        let user_repo = Arc::new(UserStore::new(db.clone()));
        Self { db, user_repo }
    }

    async fn execute_transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        let txn = self
            .db
            .begin_with_config(
                Some(IsolationLevel::ReadCommitted),
                Some(AccessMode::ReadWrite),
            )
            .await
            .map_err(AppError::from)?;

        let result = {
            let users = TxUserStore::new(&txn);
            f(TransactionContext::new(&users)).await
        };

        match result {
            Ok(value) => {
                txn.commit().await.map_err(AppError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl UnitOfWork for Persistence {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.user_repo.clone()
    }

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        self.execute_transaction(f).await
    }
}

/// Run a block inside a unit-of-work transaction.
///
/// ```rust,ignore
/// let user = with_transaction!(uow, |ctx| {
///     ctx.users().find_by_id(id).await
/// })?;
/// ```
#[macro_export]
macro_rules! with_transaction {
    ($uow:expr, |$ctx:ident| $body:expr) => {
        $uow.transaction(move |$ctx| Box::pin(async move { $body })).await
    };
}
