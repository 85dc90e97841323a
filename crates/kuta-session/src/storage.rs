//! Storage backends for session records.
//!
//! [`SessionStorage`] decouples the session manager from any particular
//! database. Lookups by digest and by id report [`StorageError::NotFound`]
//! separately from backend failures so callers can tell "no such session"
//! from "the database is down".

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::trace;

use crate::error::StorageError;
use crate::session::Session;

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Trait for session persistence backends.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Persist a new session.
    async fn create_session(&self, session: &Session) -> StorageResult<()>;

    /// Fetch a session by token digest.
    async fn get_session_by_hash(&self, token_hash: &str) -> StorageResult<Session>;

    /// Fetch a session by id.
    async fn get_session_by_id(&self, id: &str) -> StorageResult<Session>;

    /// All sessions owned by a user, expired ones included.
    async fn get_user_sessions(&self, user_id: &str) -> StorageResult<Vec<Session>>;

    /// Delete the session with the given token digest.
    async fn delete_session_by_hash(&self, token_hash: &str) -> StorageResult<()>;

    /// Delete the session with the given id.
    async fn delete_session_by_id(&self, id: &str) -> StorageResult<()>;

    /// Delete every session owned by a user, returning how many were removed.
    async fn delete_user_sessions(&self, user_id: &str) -> StorageResult<usize>;

    /// Delete every session past its expiry, returning how many were removed.
    async fn delete_expired_sessions(&self) -> StorageResult<usize>;
}

/// In-process session storage.
///
/// Keeps sessions in a map keyed by token digest. Intended for tests,
/// development and tooling; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired ones included.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn create_session(&self, session: &Session) -> StorageResult<()> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&session.token_hash) {
            return Err(StorageError::Backend(
                "a session with this token digest already exists".to_string(),
            ));
        }
        sessions.insert(session.token_hash.clone(), session.clone());
        trace!(session_id = %session.id, "session stored");
        Ok(())
    }

    async fn get_session_by_hash(&self, token_hash: &str) -> StorageResult<Session> {
        self.sessions
            .read()
            .get(token_hash)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn get_session_by_id(&self, id: &str) -> StorageResult<Session> {
        self.sessions
            .read()
            .values()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn get_user_sessions(&self, user_id: &str) -> StorageResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn delete_session_by_hash(&self, token_hash: &str) -> StorageResult<()> {
        self.sessions
            .write()
            .remove(token_hash)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn delete_session_by_id(&self, id: &str) -> StorageResult<()> {
        let mut sessions = self.sessions.write();
        let key = sessions
            .iter()
            .find(|(_, s)| s.id == id)
            .map(|(k, _)| k.clone())
            .ok_or(StorageError::NotFound)?;
        sessions.remove(&key);
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: &str) -> StorageResult<usize> {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        Ok(before - sessions.len())
    }

    async fn delete_expired_sessions(&self) -> StorageResult<usize> {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        Ok(before - sessions.len())
    }
}
