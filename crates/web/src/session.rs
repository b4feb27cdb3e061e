//! Sessions and their storage contract.
//!
//! A [`SessionStorage`] keeps session data by opaque string id. Data is only
//! reachable while the session is locked, and only a write lock may change and
//! commit it. Both lock modes are exclusive: a second locker waits until the
//! first one releases.
//!
//! [`Session`] wraps a storage and an id and does the lock bookkeeping:
//!
//! ```
//! # async fn demo() -> Result<(), tern_web::session::SessionError> {
//! use std::sync::Arc;
//! use tern_web::session::{MemorySessionStorage, Session};
//!
//! let storage = Arc::new(MemorySessionStorage::new());
//! let session = Session::open(storage, None).await?;
//!
//! session.set("user_id", 42).await?;
//! assert_eq!(session.get::<u32>("user_id").await?, Some(42));
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::WebError;

pub type SessionData = HashMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    Write,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {id}")]
    NotFound { id: String },

    #[error("session {id} must be locked first")]
    NotLocked { id: String },

    #[error("session {id} is locked for reading only")]
    ReadOnly { id: String },

    #[error("can't convert session value: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl SessionError {
    fn not_found(id: &str) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    fn not_locked(id: &str) -> Self {
        Self::NotLocked { id: id.to_string() }
    }

    fn read_only(id: &str) -> Self {
        Self::ReadOnly { id: id.to_string() }
    }
}

impl From<SessionError> for WebError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound { id } => WebError::SessionNotFound { id },
            e => WebError::internal(e),
        }
    }
}

/// Where session data lives.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Creates an empty session and returns its id.
    async fn init(&self) -> Result<String, SessionError>;

    /// Waits for exclusive access to session `id`.
    async fn lock(&self, id: &str, mode: LockMode) -> Result<(), SessionError>;

    /// Gives up the lock, uncommitted changes are dropped.
    async fn release(&self, id: &str) -> Result<(), SessionError>;

    /// Persists the changes made under a write lock.
    async fn commit(&self, id: &str) -> Result<(), SessionError>;

    async fn destroy(&self, id: &str) -> Result<(), SessionError>;

    /// Marks the session as used.
    async fn touch(&self, id: &str) -> Result<(), SessionError>;

    /// The data of a locked session.
    async fn data(&self, id: &str) -> Result<SessionData, SessionError>;

    /// Replaces the data of a write-locked session until the next commit.
    async fn store(&self, id: &str, data: SessionData) -> Result<(), SessionError>;
}

#[derive(Debug)]
struct StoredSession {
    semaphore: Arc<Semaphore>,
    committed: SessionData,
    touched: Instant,
}

#[derive(Debug)]
struct HeldLock {
    mode: LockMode,
    working: SessionData,
    _permit: OwnedSemaphorePermit,
}

/// Keeps sessions in process memory.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    sessions: Mutex<HashMap<String, StoredSession>>,
    held: Mutex<HashMap<String, HeldLock>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops sessions untouched for longer than `max_idle`, returns how many.
    pub fn purge_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, session| {
            let keep = session.touched.elapsed() < max_idle;
            if !keep {
                session.semaphore.close();
            }
            keep
        });
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, StoredSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn held(&self) -> MutexGuard<'_, HashMap<String, HeldLock>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn init(&self) -> Result<String, SessionError> {
        let id = Uuid::new_v4().simple().to_string();
        let session = StoredSession { semaphore: Arc::new(Semaphore::new(1)), committed: SessionData::new(), touched: Instant::now() };
        self.sessions().insert(id.clone(), session);
        debug!(session = %id, "session created");
        Ok(id)
    }

    async fn lock(&self, id: &str, mode: LockMode) -> Result<(), SessionError> {
        let semaphore = self.sessions().get(id).map(|session| session.semaphore.clone()).ok_or_else(|| SessionError::not_found(id))?;

        // closed once the session is destroyed
        let permit = semaphore.acquire_owned().await.map_err(|_| SessionError::not_found(id))?;

        let working = {
            let mut sessions = self.sessions();
            let session = sessions.get_mut(id).ok_or_else(|| SessionError::not_found(id))?;
            session.touched = Instant::now();
            session.committed.clone()
        };

        trace!(session = id, ?mode, "session locked");
        self.held().insert(id.to_string(), HeldLock { mode, working, _permit: permit });
        Ok(())
    }

    async fn release(&self, id: &str) -> Result<(), SessionError> {
        self.held().remove(id).ok_or_else(|| SessionError::not_locked(id))?;
        trace!(session = id, "session released");
        Ok(())
    }

    async fn commit(&self, id: &str) -> Result<(), SessionError> {
        let working = match self.held().get(id) {
            None => return Err(SessionError::not_locked(id)),
            Some(held) if held.mode == LockMode::Read => return Err(SessionError::read_only(id)),
            Some(held) => held.working.clone(),
        };

        let mut sessions = self.sessions();
        let session = sessions.get_mut(id).ok_or_else(|| SessionError::not_found(id))?;
        session.committed = working;
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), SessionError> {
        let session = self.sessions().remove(id).ok_or_else(|| SessionError::not_found(id))?;
        session.semaphore.close();
        self.held().remove(id);
        debug!(session = id, "session destroyed");
        Ok(())
    }

    async fn touch(&self, id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions();
        let session = sessions.get_mut(id).ok_or_else(|| SessionError::not_found(id))?;
        session.touched = Instant::now();
        Ok(())
    }

    async fn data(&self, id: &str) -> Result<SessionData, SessionError> {
        self.held().get(id).map(|held| held.working.clone()).ok_or_else(|| SessionError::not_locked(id))
    }

    async fn store(&self, id: &str, data: SessionData) -> Result<(), SessionError> {
        let mut held = self.held();
        match held.get_mut(id) {
            None => Err(SessionError::not_locked(id)),
            Some(held) if held.mode == LockMode::Read => Err(SessionError::read_only(id)),
            Some(held) => {
                held.working = data;
                Ok(())
            }
        }
    }
}

/// One client's session.
pub struct Session {
    storage: Arc<dyn SessionStorage>,
    id: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Session {
    /// Continues session `id`, or starts a new one if it is `None` or unknown.
    pub async fn open(storage: Arc<dyn SessionStorage>, id: Option<&str>) -> Result<Self, SessionError> {
        if let Some(id) = id {
            match storage.touch(id).await {
                Ok(()) => return Ok(Self { storage, id: id.to_string() }),
                Err(SessionError::NotFound { .. }) => debug!(session = id, "unknown session, starting a new one"),
                Err(e) => return Err(e),
            }
        }

        let id = storage.init().await?;
        Ok(Self { storage, id })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Runs `f` on the session data under a read lock.
    pub async fn read<T, F>(&self, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&SessionData) -> T + Send,
        T: Send,
    {
        self.storage.lock(&self.id, LockMode::Read).await?;
        let result = self.storage.data(&self.id).await.map(|data| f(&data));
        let released = self.storage.release(&self.id).await;

        let value = result?;
        released?;
        Ok(value)
    }

    /// Runs `f` on the session data under a write lock and commits the changes.
    pub async fn write<T, F>(&self, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&mut SessionData) -> T + Send,
        T: Send,
    {
        self.storage.lock(&self.id, LockMode::Write).await?;
        let result = self.update(f).await;
        let released = self.storage.release(&self.id).await;

        let value = result?;
        released?;
        Ok(value)
    }

    async fn update<T, F>(&self, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&mut SessionData) -> T + Send,
        T: Send,
    {
        let mut data = self.storage.data(&self.id).await?;
        let value = f(&mut data);
        self.storage.store(&self.id, data).await?;
        self.storage.commit(&self.id).await?;
        Ok(value)
    }

    pub async fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, SessionError> {
        let value = self.read(|data| data.get(name).cloned()).await?;
        Ok(value.map(serde_json::from_value).transpose()?)
    }

    pub async fn set<T: Serialize>(&self, name: &str, value: T) -> Result<(), SessionError> {
        let value = serde_json::to_value(value)?;
        self.write(|data| {
            data.insert(name.to_string(), value);
        })
        .await
    }

    pub async fn remove(&self, name: &str) -> Result<Option<Value>, SessionError> {
        self.write(|data| data.remove(name)).await
    }

    /// Moves the data to a fresh id and destroys the old session.
    pub async fn regenerate(&mut self) -> Result<(), SessionError> {
        let data = self.read(SessionData::clone).await?;

        let id = self.storage.init().await?;
        let fresh = Session { storage: self.storage.clone(), id };
        fresh.write(|fresh_data| *fresh_data = data).await?;

        self.storage.destroy(&self.id).await?;
        debug!(old = %self.id, new = %fresh.id, "session regenerated");
        self.id = fresh.id;
        Ok(())
    }
}
