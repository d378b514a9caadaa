//! In-memory storage implementations.
//!
//! Same contracts and uniqueness rules as the Postgres and Redis backends,
//! for tests and local runs without infrastructure.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use super::repositories::UserRepository;
use super::session_store::SessionStore;
use super::unit_of_work::{TransactionContext, TxFuture, UnitOfWork};
use crate::domain::User;
use crate::errors::{AppError, AppResult};

type Rows = HashMap<Uuid, User>;

/// In-memory user table
#[derive(Default)]
pub struct InMemoryUserStore {
    rows: Mutex<Rows>,
    /// Rows written inside a transaction, replayed on commit
    journal: Option<Mutex<Vec<User>>>,
    writes: AtomicUsize,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn transactional(rows: Rows) -> Self {
        Self {
            rows: Mutex::new(rows),
            journal: Some(Mutex::new(Vec::new())),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of rows
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    /// Every stored row, in no particular order
    pub async fn all(&self) -> Vec<User> {
        self.rows.lock().await.values().cloned().collect()
    }

    /// Committed row writes (inserts and updates) so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn find_where<P>(&self, predicate: P) -> AppResult<Option<User>>
    where
        P: Fn(&User) -> bool + Send,
    {
        let rows = self.rows.lock().await;
        Ok(rows.values().find(|u| predicate(u)).cloned())
    }

    async fn write(&self, user: User, is_insert: bool) -> AppResult<User> {
        let mut rows = self.rows.lock().await;

        match (is_insert, rows.contains_key(&user.id)) {
            (true, true) => return Err(AppError::conflict("User")),
            (false, false) => return Err(AppError::NotFound),
            _ => {}
        }
        check_unique(&rows, &user)?;

        rows.insert(user.id, user.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(journal) = &self.journal {
            journal.lock().await.push(user.clone());
        }

        Ok(user)
    }

    async fn commit(&self, working: InMemoryUserStore) {
        let journal = match working.journal {
            Some(journal) => journal.into_inner(),
            None => return,
        };

        let mut rows = self.rows.lock().await;
        for user in journal {
            rows.insert(user.id, user);
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Same rules as the partial unique indexes in the schema.
fn check_unique(rows: &Rows, candidate: &User) -> AppResult<()> {
    let username = candidate
        .username
        .as_deref()
        .filter(|u| !u.is_empty())
        .map(str::to_lowercase);

    for other in rows.values().filter(|u| u.id != candidate.id) {
        if let (Some(mine), Some(theirs)) = (&username, other.username.as_deref()) {
            if *mine == theirs.to_lowercase() {
                return Err(AppError::UsernameTaken);
            }
        }
        if candidate.external_id.is_some() && candidate.external_id == other.external_id {
            return Err(AppError::conflict("External identity"));
        }
        if candidate.external_id.is_none()
            && other.external_id.is_none()
            && candidate.email == other.email
        {
            return Err(AppError::EmailAlreadyRegistered);
        }
    }

    Ok(())
}

#[async_trait]
impl UserRepository for InMemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.rows.lock().await.get(&id).cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<User>> {
        self.find_where(|u| u.external_id.as_deref() == Some(external_id))
            .await
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        self.find_where(|u| u.username.as_deref() == Some(username))
            .await
    }

    async fn find_local_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.find_where(|u| u.email == email && u.external_id.is_none())
            .await
    }

    async fn find_linked_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .values()
            .filter(|u| u.email == email && u.external_id.is_some())
            .min_by_key(|u| (u.created_at, u.id))
            .cloned())
    }

    async fn username_exists(&self, username: &str, excluding: Option<Uuid>) -> AppResult<bool> {
        let rows = self.rows.lock().await;
        Ok(rows.values().any(|u| {
            Some(u.id) != excluding
                && u.username
                    .as_deref()
                    .is_some_and(|name| !name.is_empty() && name == username)
        }))
    }

    async fn create(&self, user: User) -> AppResult<User> {
        self.write(user, true).await
    }

    async fn update(&self, user: User) -> AppResult<User> {
        self.write(user, false).await
    }
}

/// In-memory UnitOfWork.
///
/// Transactions are serialized and run against a copy of the table; the
/// copy's writes are replayed onto the table only on commit.
#[derive(Default)]
pub struct InMemoryPersistence {
    store: Arc<InMemoryUserStore>,
    tx_lock: Mutex<()>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed table, for assertions
    pub fn store(&self) -> Arc<InMemoryUserStore> {
        self.store.clone()
    }

    async fn execute_transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        let _serialized = self.tx_lock.lock().await;

        let snapshot = self.store.rows.lock().await.clone();
        let working = InMemoryUserStore::transactional(snapshot);

        let result = f(TransactionContext::new(&working)).await;

        if result.is_ok() {
            self.store.commit(working).await;
        }
        result
    }
}

#[async_trait]
impl UnitOfWork for InMemoryPersistence {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.store.clone()
    }

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        self.execute_transaction(f).await
    }
}

/// In-memory SessionStore with expiring entries
#[derive(Default)]
pub struct MemorySessionStore {
    revoked: Mutex<HashMap<String, Instant>>,
    oauth_states: Mutex<HashMap<String, Instant>>,
    counters: Mutex<HashMap<String, (u64, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entries across all maps
    pub async fn len(&self) -> usize {
        self.revoked.lock().await.len()
            + self.oauth_states.lock().await.len()
            + self.counters.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn expiry(ttl_seconds: u64) -> Instant {
    Instant::now() + Duration::from_secs(ttl_seconds)
}

/// Drop lapsed entries so the maps stay bounded by live keys.
fn prune<V>(entries: &mut HashMap<String, V>, expires: impl Fn(&V) -> Instant) {
    let now = Instant::now();
    entries.retain(|_, v| expires(v) > now);
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn revoke_token(&self, jti: &str, ttl_seconds: u64) -> AppResult<()> {
        let mut revoked = self.revoked.lock().await;
        prune(&mut *revoked, |expires| *expires);
        revoked.insert(jti.to_string(), expiry(ttl_seconds));
        Ok(())
    }

    async fn is_token_revoked(&self, jti: &str) -> AppResult<bool> {
        let revoked = self.revoked.lock().await;
        Ok(revoked
            .get(jti)
            .is_some_and(|expires| *expires > Instant::now()))
    }

    async fn save_oauth_state(&self, state: &str, ttl_seconds: u64) -> AppResult<()> {
        let mut states = self.oauth_states.lock().await;
        prune(&mut *states, |expires| *expires);
        states.insert(state.to_string(), expiry(ttl_seconds));
        Ok(())
    }

    async fn take_oauth_state(&self, state: &str) -> AppResult<bool> {
        let removed = self.oauth_states.lock().await.remove(state);
        Ok(removed.is_some_and(|expires| expires > Instant::now()))
    }

    async fn check_rate_limit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<(u64, bool)> {
        let mut counters = self.counters.lock().await;
        let now = Instant::now();
        prune(&mut *counters, |(_, window_end)| *window_end);

        let entry = counters
            .entry(identifier.to_string())
            .or_insert((0, expiry(window_seconds)));
        if entry.1 <= now {
            *entry = (0, expiry(window_seconds));
        }
        entry.0 += 1;

        Ok((entry.0, entry.0 <= max_requests))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
