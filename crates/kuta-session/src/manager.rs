//! Session lifecycle orchestration.

use std::sync::Arc;

use chrono::Utc;
use kuta_crypto::{NanoId, OsRandom, RandomSource, generate_hashed_token_with, hash_token, verify_token};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::SessionCache;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError, StorageError};
use crate::session::{CreatedSession, Session};
use crate::storage::SessionStorage;

/// Number of digest characters that may appear in logs.
const DIGEST_LOG_PREFIX: usize = 8;

fn digest_prefix(hash: &str) -> &str {
    hash.get(..DIGEST_LOG_PREFIX).unwrap_or(hash)
}

/// Creates, verifies, destroys and refreshes sessions.
///
/// Storage is the source of truth and its failures always propagate. The
/// optional cache is best-effort: its errors are logged and treated as a
/// miss, so a manager with a broken cache behaves exactly like one without.
///
/// Every removal from storage bumps a fill generation before touching the
/// cache. A cache fill only lands if the generation it read before going to
/// storage is still current, so a session that was deleted while a `verify`
/// was reading it is never written back into the cache.
///
/// `SessionManager` is `Send + Sync`; share it behind an `Arc`.
pub struct SessionManager {
    config: SessionConfig,
    storage: Arc<dyn SessionStorage>,
    cache: Option<Arc<dyn SessionCache>>,
    fill_generation: Mutex<u64>,
    ids: NanoId,
    source: Arc<dyn RandomSource>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("cache", &self.cache.is_some())
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager over the given storage, without a cache.
    pub fn new(config: SessionConfig, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            config,
            storage,
            cache: None,
            fill_generation: Mutex::new(0),
            ids: NanoId::new(),
            source: Arc::new(OsRandom),
        }
    }

    /// Put a cache in front of storage.
    pub fn with_cache(mut self, cache: Arc<dyn SessionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replace the session id generator.
    pub fn with_id_generator(mut self, ids: NanoId) -> Self {
        self.ids = ids;
        self
    }

    /// Replace the random source for tokens and ids.
    pub fn with_random_source(mut self, source: Arc<dyn RandomSource>) -> Self {
        self.ids = self.ids.with_random_source(Arc::clone(&source));
        self.source = source;
        self
    }

    /// Get the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether a cache is configured.
    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// Issue a new session for a user.
    ///
    /// The returned [`CreatedSession`] carries the raw token; it is not
    /// recoverable afterwards.
    pub async fn create(
        &self,
        user_id: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<CreatedSession> {
        let pair = generate_hashed_token_with(self.source.as_ref(), self.config.token_bytes)?;
        let id = self.ids.generate(Some(self.config.id_length))?;

        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.config.max_age)
            .ok_or(SessionError::LifetimeOutOfRange(self.config.max_age))?;
        let session = Session {
            id,
            user_id: user_id.to_string(),
            token_hash: pair.hash,
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
            created_at: now,
            updated_at: now,
            expires_at,
        };

        let generation = self.current_generation().await;
        self.storage
            .create_session(&session)
            .await
            .map_err(|e| SessionError::storage("create session", e))?;

        self.cache_fill(generation, &session.token_hash, &session)
            .await;

        info!(
            session_id = %session.id,
            user_id = %session.user_id,
            expires_at = %session.expires_at,
            "session created"
        );

        Ok(CreatedSession {
            session,
            token: pair.token,
        })
    }

    /// Resolve a raw token to its active session.
    ///
    /// # Errors
    /// - [`SessionError::InvalidToken`] for an empty or mismatched token
    /// - [`SessionError::NotFound`] when no session has this token
    /// - [`SessionError::Expired`] when the session is past its expiry; the
    ///   session is removed from cache and storage before returning
    pub async fn verify(&self, token: &str) -> Result<Session> {
        if token.is_empty() {
            return Err(SessionError::InvalidToken);
        }
        let hash = hash_token(token);

        if let Some(session) = self.cache_get(&hash).await {
            if session.is_expired() {
                debug!(session_id = %session.id, "cached session expired");
                let removed = self.remove_expired(&hash).await;
                self.invalidate(&hash).await;
                removed?;
                return Err(SessionError::Expired);
            }
            return Ok(session);
        }

        let generation = self.current_generation().await;
        let session = match self.storage.get_session_by_hash(&hash).await {
            Ok(session) => session,
            Err(StorageError::NotFound) => return Err(SessionError::NotFound),
            Err(e) => return Err(SessionError::storage("look up session", e)),
        };

        if !matches!(verify_token(token, &session.token_hash), Ok(true)) {
            warn!(
                session_id = %session.id,
                digest = digest_prefix(&hash),
                "stored digest does not match token"
            );
            return Err(SessionError::InvalidToken);
        }

        if session.is_expired() {
            debug!(session_id = %session.id, "stored session expired");
            self.remove_expired(&hash).await?;
            return Err(SessionError::Expired);
        }

        self.cache_fill(generation, &hash, &session).await;
        Ok(session)
    }

    /// End the session holding `token`.
    ///
    /// The cache entry is dropped even when the storage delete fails.
    pub async fn destroy(&self, token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(SessionError::InvalidToken);
        }
        let hash = hash_token(token);

        let result = self.storage.delete_session_by_hash(&hash).await;
        self.invalidate(&hash).await;

        match result {
            Ok(()) => {
                info!(digest = digest_prefix(&hash), "session destroyed");
                Ok(())
            }
            Err(StorageError::NotFound) => Err(SessionError::NotFound),
            Err(e) => Err(SessionError::storage("delete session", e)),
        }
    }

    /// End a session by its id. An unknown id is not an error.
    pub async fn destroy_by_session_id(&self, session_id: &str) -> Result<()> {
        // Only needed to find the cache key.
        let cached_hash = self
            .storage
            .get_session_by_id(session_id)
            .await
            .ok()
            .map(|session| session.token_hash);

        let result = self.storage.delete_session_by_id(session_id).await;
        if let Some(hash) = &cached_hash {
            self.invalidate(hash).await;
        }

        match result {
            Ok(()) => {
                info!(session_id, "session destroyed");
                Ok(())
            }
            Err(StorageError::NotFound) => {
                debug!(session_id, "no session to destroy");
                Ok(())
            }
            Err(e) => Err(SessionError::storage("delete session by id", e)),
        }
    }

    /// End every session a user holds, returning how many were removed.
    ///
    /// The cache has no per-user index, so it is cleared entirely when
    /// anything was removed.
    pub async fn destroy_all_user_sessions(&self, user_id: &str) -> Result<usize> {
        let removed = self
            .storage
            .delete_user_sessions(user_id)
            .await
            .map_err(|e| SessionError::storage("delete user sessions", e))?;

        if removed > 0 {
            self.invalidate_all().await;
        }

        info!(user_id, removed, "user sessions destroyed");
        Ok(removed)
    }

    /// Replace the session behind `token` with a fresh one.
    ///
    /// The new session keeps the user, IP address and user agent, and gets a
    /// new token, id and expiry. The old token stops working.
    pub async fn refresh(&self, token: &str) -> Result<CreatedSession> {
        let current = self.verify(token).await?;
        self.destroy(token).await?;

        let created = self
            .create(&current.user_id, &current.ip_address, &current.user_agent)
            .await?;

        info!(
            old_session_id = %current.id,
            session_id = %created.session.id,
            user_id = %current.user_id,
            "session refreshed"
        );
        Ok(created)
    }

    /// Active sessions for a user, newest first.
    pub async fn list_user_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        let now = Utc::now();
        let mut sessions: Vec<Session> = self
            .storage
            .get_user_sessions(user_id)
            .await
            .map_err(|e| SessionError::storage("list user sessions", e))?
            .into_iter()
            .filter(|s| !s.is_expired_at(now))
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    /// Fetch a session by id, expired or not.
    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        match self.storage.get_session_by_id(session_id).await {
            Ok(session) => Ok(session),
            Err(StorageError::NotFound) => Err(SessionError::NotFound),
            Err(e) => Err(SessionError::storage("get session", e)),
        }
    }

    /// Delete every expired session from storage, returning how many went.
    pub async fn purge_expired(&self) -> Result<usize> {
        let removed = self
            .storage
            .delete_expired_sessions()
            .await
            .map_err(|e| SessionError::storage("purge expired sessions", e))?;

        if removed > 0 {
            self.invalidate_all().await;
        }

        info!(removed, "expired sessions purged");
        Ok(removed)
    }

    async fn remove_expired(&self, hash: &str) -> Result<()> {
        match self.storage.delete_session_by_hash(hash).await {
            Ok(()) | Err(StorageError::NotFound) => Ok(()),
            Err(e) => Err(SessionError::storage("delete expired session", e)),
        }
    }

    async fn current_generation(&self) -> u64 {
        if self.cache.is_none() {
            return 0;
        }
        *self.fill_generation.lock().await
    }

    /// Cache a session read from storage, unless something was removed from
    /// storage since `generation` was taken.
    async fn cache_fill(&self, generation: u64, hash: &str, session: &Session) {
        if self.cache.is_none() {
            return;
        }
        let current = self.fill_generation.lock().await;
        if *current != generation {
            debug!(
                session_id = %session.id,
                "storage changed during lookup, not caching"
            );
            return;
        }
        self.cache_set(hash, session).await;
    }

    async fn invalidate(&self, hash: &str) {
        if self.cache.is_none() {
            return;
        }
        let mut generation = self.fill_generation.lock().await;
        *generation = generation.wrapping_add(1);
        self.cache_delete(hash).await;
    }

    async fn invalidate_all(&self) {
        if self.cache.is_none() {
            return;
        }
        let mut generation = self.fill_generation.lock().await;
        *generation = generation.wrapping_add(1);
        self.cache_clear().await;
    }

    async fn cache_get(&self, hash: &str) -> Option<Session> {
        let cache = self.cache.as_ref()?;
        match cache.get(hash).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(digest = digest_prefix(hash), error = %e, "session cache read failed");
                None
            }
        }
    }

    async fn cache_set(&self, hash: &str, session: &Session) {
        if let Some(cache) = &self.cache
            && let Err(e) = cache.set(hash, session.clone()).await
        {
            warn!(session_id = %session.id, error = %e, "session cache write failed");
        }
    }

    async fn cache_delete(&self, hash: &str) {
        if let Some(cache) = &self.cache
            && let Err(e) = cache.delete(hash).await
        {
            warn!(digest = digest_prefix(hash), error = %e, "session cache delete failed");
        }
    }

    async fn cache_clear(&self) {
        if let Some(cache) = &self.cache
            && let Err(e) = cache.clear().await
        {
            warn!(error = %e, "session cache clear failed");
        }
    }
}
