//! End-to-end session lifecycle tests against the in-memory adapters, plus
//! fault-injecting storage, cache and random sources.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kuta_crypto::{CryptoError, RandomSource, hash_token};
use kuta_session::{
    CacheConfig, CacheError, CacheResult, MemoryCache, MemoryStorage, Session, SessionCache,
    SessionConfig, SessionError, SessionManager, SessionStorage, StorageError, StorageResult,
};
use tokio::sync::Notify;

// ─────────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────────

struct Harness {
    manager: SessionManager,
    storage: Arc<MemoryStorage>,
    cache: Option<MemoryCache>,
}

fn harness(config: SessionConfig, cached: bool) -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    let mut manager = SessionManager::new(config, storage.clone());
    let cache = cached.then(|| MemoryCache::new(CacheConfig::default()));
    if let Some(cache) = &cache {
        manager = manager.with_cache(Arc::new(cache.clone()));
    }
    Harness {
        manager,
        storage,
        cache,
    }
}

fn both() -> [Harness; 2] {
    [
        harness(SessionConfig::default(), true),
        harness(SessionConfig::default(), false),
    ]
}

/// Storage whose every call fails with a backend error.
struct DownStorage;

#[async_trait]
impl SessionStorage for DownStorage {
    async fn create_session(&self, _: &Session) -> StorageResult<()> {
        Err(StorageError::Backend("connection refused".into()))
    }
    async fn get_session_by_hash(&self, _: &str) -> StorageResult<Session> {
        Err(StorageError::Backend("connection refused".into()))
    }
    async fn get_session_by_id(&self, _: &str) -> StorageResult<Session> {
        Err(StorageError::Backend("connection refused".into()))
    }
    async fn get_user_sessions(&self, _: &str) -> StorageResult<Vec<Session>> {
        Err(StorageError::Backend("connection refused".into()))
    }
    async fn delete_session_by_hash(&self, _: &str) -> StorageResult<()> {
        Err(StorageError::Backend("connection refused".into()))
    }
    async fn delete_session_by_id(&self, _: &str) -> StorageResult<()> {
        Err(StorageError::Backend("connection refused".into()))
    }
    async fn delete_user_sessions(&self, _: &str) -> StorageResult<usize> {
        Err(StorageError::Backend("connection refused".into()))
    }
    async fn delete_expired_sessions(&self) -> StorageResult<usize> {
        Err(StorageError::Backend("connection refused".into()))
    }
}

/// Cache that fails every call and counts attempts.
#[derive(Default)]
struct BrokenCache {
    calls: AtomicUsize,
}

impl BrokenCache {
    fn fail<T>(&self) -> CacheResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Backend("cache unreachable".into()))
    }
}

#[async_trait]
impl SessionCache for BrokenCache {
    async fn get(&self, _: &str) -> CacheResult<Option<Session>> {
        self.fail()
    }
    async fn set(&self, _: &str, _: Session) -> CacheResult<()> {
        self.fail()
    }
    async fn delete(&self, _: &str) -> CacheResult<()> {
        self.fail()
    }
    async fn clear(&self) -> CacheResult<()> {
        self.fail()
    }
}

/// In-memory storage that can park one `get_session_by_hash` call until the
/// test lets it continue.
#[derive(Default)]
struct GatedStorage {
    inner: MemoryStorage,
    gate_next: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedStorage {
    fn gate_next_lookup(&self) {
        self.gate_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStorage for GatedStorage {
    async fn create_session(&self, session: &Session) -> StorageResult<()> {
        self.inner.create_session(session).await
    }
    async fn get_session_by_hash(&self, hash: &str) -> StorageResult<Session> {
        let found = self.inner.get_session_by_hash(hash).await;
        if self.gate_next.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        found
    }
    async fn get_session_by_id(&self, id: &str) -> StorageResult<Session> {
        self.inner.get_session_by_id(id).await
    }
    async fn get_user_sessions(&self, user_id: &str) -> StorageResult<Vec<Session>> {
        self.inner.get_user_sessions(user_id).await
    }
    async fn delete_session_by_hash(&self, hash: &str) -> StorageResult<()> {
        self.inner.delete_session_by_hash(hash).await
    }
    async fn delete_session_by_id(&self, id: &str) -> StorageResult<()> {
        self.inner.delete_session_by_id(id).await
    }
    async fn delete_user_sessions(&self, user_id: &str) -> StorageResult<usize> {
        self.inner.delete_user_sessions(user_id).await
    }
    async fn delete_expired_sessions(&self) -> StorageResult<usize> {
        self.inner.delete_expired_sessions().await
    }
}

#[derive(Debug)]
struct DeadRandom;

impl RandomSource for DeadRandom {
    fn fill_bytes(&self, _dest: &mut [u8]) -> kuta_crypto::Result<()> {
        Err(CryptoError::Random("entropy source unavailable".into()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Create / verify
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_then_verify_returns_same_user() {
    for h in both() {
        let created = h
            .manager
            .create("user-42", "192.168.1.10", "Mozilla/5.0")
            .await
            .unwrap();

        // Twice: once via storage or cache, once more via whatever is warm.
        for _ in 0..2 {
            let session = h.manager.verify(&created.token).await.unwrap();
            assert_eq!(session.user_id, "user-42");
            assert_eq!(session.id, created.session.id);
            assert_eq!(session.ip_address, "192.168.1.10");
            assert_eq!(session.user_agent, "Mozilla/5.0");
        }
    }
}

#[tokio::test]
async fn test_tokens_and_ids_are_unique() {
    let h = harness(SessionConfig::default(), true);
    let a = h.manager.create("u", "ip", "ua").await.unwrap();
    let b = h.manager.create("u", "ip", "ua").await.unwrap();

    assert_ne!(a.token, b.token);
    assert_ne!(a.session.id, b.session.id);
    assert_ne!(a.session.token_hash, b.session.token_hash);
}

#[tokio::test]
async fn test_storage_holds_digest_not_token() {
    let h = harness(SessionConfig::default(), false);
    let created = h.manager.create("u", "ip", "ua").await.unwrap();

    let stored = h
        .storage
        .get_session_by_hash(&hash_token(&created.token))
        .await
        .unwrap();
    assert_ne!(stored.token_hash, created.token);
    assert_eq!(stored.token_hash.len(), 64);
    assert!(h.storage.get_session_by_hash(&created.token).await.is_err());
}

#[tokio::test]
async fn test_verify_rejects_mutated_token() {
    for h in both() {
        let created = h.manager.create("u", "ip", "ua").await.unwrap();
        let mut mutated = created.token.clone();
        let last = mutated.pop().unwrap();
        mutated.push(if last == 'A' { 'B' } else { 'A' });

        assert!(matches!(
            h.manager.verify(&mutated).await,
            Err(SessionError::NotFound)
        ));
    }
}

#[tokio::test]
async fn test_verify_warm_cache_from_storage_lookup() {
    let storage = Arc::new(MemoryStorage::new());
    let cache = MemoryCache::new(CacheConfig::default());

    // Created by a manager without a cache, verified by one with.
    let writer = SessionManager::new(SessionConfig::default(), storage.clone());
    let created = writer.create("u", "ip", "ua").await.unwrap();

    let reader = SessionManager::new(SessionConfig::default(), storage.clone())
        .with_cache(Arc::new(cache.clone()));
    reader.verify(&created.token).await.unwrap();
    assert!(cache.contains(&created.session.token_hash).await);

    reader.verify(&created.token).await.unwrap();
    let stats = cache.stats().await;
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Expiry
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_negative_max_age_is_expired_and_purged() {
    for cached in [true, false] {
        let h = harness(
            SessionConfig::new().with_max_age(chrono::Duration::seconds(-1)),
            cached,
        );
        let created = h.manager.create("u", "ip", "ua").await.unwrap();
        assert!(created.session.expires_at < created.session.created_at);

        assert!(matches!(
            h.manager.verify(&created.token).await,
            Err(SessionError::Expired)
        ));
        assert!(matches!(
            h.storage.get_session_by_hash(&created.session.token_hash).await,
            Err(StorageError::NotFound)
        ));
        if let Some(cache) = &h.cache {
            assert!(!cache.contains(&created.session.token_hash).await);
        }

        // Gone for good afterwards.
        assert!(matches!(
            h.manager.verify(&created.token).await,
            Err(SessionError::NotFound)
        ));
    }
}

#[tokio::test]
async fn test_expiry_after_short_lifetime() {
    let h = harness(
        SessionConfig::new().with_max_age(chrono::Duration::milliseconds(50)),
        true,
    );
    let created = h.manager.create("u", "ip", "ua").await.unwrap();
    assert!(h.manager.verify(&created.token).await.is_ok());

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(matches!(
        h.manager.verify(&created.token).await,
        Err(SessionError::Expired)
    ));
    assert!(h.storage.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Destroy
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_destroy_then_verify_not_found() {
    for h in both() {
        let created = h.manager.create("u", "ip", "ua").await.unwrap();
        h.manager.verify(&created.token).await.unwrap();

        h.manager.destroy(&created.token).await.unwrap();

        assert!(matches!(
            h.manager.verify(&created.token).await,
            Err(SessionError::NotFound)
        ));
    }
}

#[tokio::test]
async fn test_destroy_errors() {
    for h in both() {
        assert!(matches!(
            h.manager.destroy("").await,
            Err(SessionError::InvalidToken)
        ));
        assert!(matches!(
            h.manager.destroy("never-issued").await,
            Err(SessionError::NotFound)
        ));
    }
}

#[tokio::test]
async fn test_destroy_by_session_id() {
    for h in both() {
        let created = h.manager.create("u", "ip", "ua").await.unwrap();
        h.manager.verify(&created.token).await.unwrap();

        h.manager
            .destroy_by_session_id(&created.session.id)
            .await
            .unwrap();

        assert!(matches!(
            h.manager.verify(&created.token).await,
            Err(SessionError::NotFound)
        ));
        // Unknown ids are fine.
        h.manager
            .destroy_by_session_id(&created.session.id)
            .await
            .unwrap();
        h.manager.destroy_by_session_id("nope").await.unwrap();
    }
}

#[tokio::test]
async fn test_destroy_all_user_sessions() {
    for h in both() {
        let mut alice = Vec::new();
        for _ in 0..3 {
            alice.push(h.manager.create("alice", "ip", "ua").await.unwrap());
        }
        let bob = h.manager.create("bob", "ip", "ua").await.unwrap();
        for s in alice.iter().chain(std::iter::once(&bob)) {
            h.manager.verify(&s.token).await.unwrap();
        }

        assert_eq!(h.manager.destroy_all_user_sessions("alice").await.unwrap(), 3);

        for s in &alice {
            assert!(matches!(
                h.manager.verify(&s.token).await,
                Err(SessionError::NotFound)
            ));
        }
        if let Some(cache) = &h.cache {
            assert!(!cache.contains(&bob.session.token_hash).await);
        }
        assert_eq!(
            h.manager.verify(&bob.token).await.unwrap().user_id,
            "bob"
        );
        assert_eq!(h.storage.len(), 1);
    }
}

#[tokio::test]
async fn test_destroy_all_for_unknown_user_keeps_cache() {
    let h = harness(SessionConfig::default(), true);
    let created = h.manager.create("alice", "ip", "ua").await.unwrap();

    assert_eq!(h.manager.destroy_all_user_sessions("nobody").await.unwrap(), 0);

    let cache = h.cache.as_ref().unwrap();
    assert!(cache.contains(&created.session.token_hash).await);
    assert_eq!(cache.stats().await.deletes, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_destroys_of_absent_digest() {
    let h = harness(SessionConfig::default(), true);
    let manager = Arc::new(h.manager);

    let mut handles = Vec::new();
    for _ in 0..32 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager.destroy("token-that-was-never-issued").await
        }));
    }

    for handle in handles {
        let result = handle.await.expect("task panicked");
        assert!(matches!(result, Err(SessionError::NotFound)));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_destroy_of_live_session() {
    let h = harness(SessionConfig::default(), true);
    let manager = Arc::new(h.manager);
    let created = manager.create("u", "ip", "ua").await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let manager = Arc::clone(&manager);
        let token = created.token.clone();
        handles.push(tokio::spawn(async move { manager.destroy(&token).await }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(()) => ok += 1,
            Err(SessionError::NotFound) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
    assert!(h.storage.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_destroy_during_verify_lookup_is_not_recached() {
    let storage = Arc::new(GatedStorage::default());
    let cache = MemoryCache::new(CacheConfig::default());
    let manager = Arc::new(
        SessionManager::new(SessionConfig::default(), storage.clone())
            .with_cache(Arc::new(cache.clone())),
    );
    let created = manager.create("grace", "ip", "ua").await.unwrap();

    // Send the next verify to storage and hold it there.
    cache.clear().await.unwrap();
    storage.gate_next_lookup();
    let verifying = {
        let manager = Arc::clone(&manager);
        let token = created.token.clone();
        tokio::spawn(async move { manager.verify(&token).await })
    };
    storage.entered.notified().await;

    manager.destroy(&created.token).await.unwrap();
    storage.release.notify_one();

    // The lookup read the session before it was deleted, so reporting it is
    // fine; caching it is not.
    let in_flight = verifying.await.expect("task panicked");
    assert!(matches!(in_flight, Ok(ref s) if s.id == created.session.id));

    assert!(!cache.contains(&created.session.token_hash).await);
    assert!(matches!(
        manager.verify(&created.token).await,
        Err(SessionError::NotFound)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_verify_racing_destroy_never_outlives_it() {
    for _ in 0..50 {
        let h = harness(SessionConfig::default(), true);
        let cache = h.cache.clone().unwrap();
        let manager = Arc::new(h.manager);
        let created = manager.create("heidi", "ip", "ua").await.unwrap();
        cache.clear().await.unwrap();

        let mut verifiers = Vec::new();
        for _ in 0..4 {
            let manager = Arc::clone(&manager);
            let token = created.token.clone();
            verifiers.push(tokio::spawn(async move { manager.verify(&token).await }));
        }
        manager.destroy(&created.token).await.unwrap();

        for verifier in verifiers {
            match verifier.await.expect("task panicked") {
                Ok(_) | Err(SessionError::NotFound) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(matches!(
            manager.verify(&created.token).await,
            Err(SessionError::NotFound)
        ));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Refresh
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_rotates_token() {
    for h in both() {
        let old = h.manager.create("carol", "10.1.1.1", "ua/1").await.unwrap();
        h.manager.verify(&old.token).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let new = h.manager.refresh(&old.token).await.unwrap();

        assert_ne!(new.token, old.token);
        assert_ne!(new.session.id, old.session.id);
        assert!(new.session.expires_at > old.session.expires_at);
        assert_eq!(new.session.user_id, "carol");
        assert_eq!(new.session.ip_address, "10.1.1.1");
        assert_eq!(new.session.user_agent, "ua/1");

        assert!(matches!(
            h.manager.verify(&old.token).await,
            Err(SessionError::NotFound)
        ));
        assert_eq!(h.manager.verify(&new.token).await.unwrap().user_id, "carol");
        assert_eq!(h.storage.len(), 1);
    }
}

#[tokio::test]
async fn test_refresh_errors() {
    let h = harness(SessionConfig::default(), true);
    assert!(matches!(
        h.manager.refresh("").await,
        Err(SessionError::InvalidToken)
    ));
    assert!(matches!(
        h.manager.refresh("unknown").await,
        Err(SessionError::NotFound)
    ));

    let expired = harness(
        SessionConfig::new().with_max_age(chrono::Duration::seconds(-1)),
        true,
    );
    let created = expired.manager.create("u", "ip", "ua").await.unwrap();
    assert!(matches!(
        expired.manager.refresh(&created.token).await,
        Err(SessionError::Expired)
    ));
    assert!(expired.storage.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Listing and purge
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_user_sessions_active_newest_first() {
    let storage = Arc::new(MemoryStorage::new());
    let live = SessionManager::new(SessionConfig::default(), storage.clone());
    let dead = SessionManager::new(
        SessionConfig::new().with_max_age(chrono::Duration::seconds(-1)),
        storage.clone(),
    );

    let first = live.create("dave", "ip", "ua").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = live.create("dave", "ip", "ua").await.unwrap();
    dead.create("dave", "ip", "ua").await.unwrap();
    live.create("erin", "ip", "ua").await.unwrap();

    let listed = live.list_user_sessions("dave").await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec![second.session.id.as_str(), first.session.id.as_str()]);
    assert!(live.list_user_sessions("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_purge_expired() {
    let storage = Arc::new(MemoryStorage::new());
    let cache = MemoryCache::new(CacheConfig::default());
    let live = SessionManager::new(SessionConfig::default(), storage.clone())
        .with_cache(Arc::new(cache.clone()));
    let dead = SessionManager::new(
        SessionConfig::new().with_max_age(chrono::Duration::seconds(-1)),
        storage.clone(),
    );

    let kept = live.create("u", "ip", "ua").await.unwrap();
    dead.create("u", "ip", "ua").await.unwrap();
    dead.create("u", "ip", "ua").await.unwrap();

    assert_eq!(live.purge_expired().await.unwrap(), 2);
    assert_eq!(storage.len(), 1);
    assert!(cache.is_empty().await);
    assert!(live.verify(&kept.token).await.is_ok());

    assert_eq!(live.purge_expired().await.unwrap(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure semantics
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_storage_failures_propagate() {
    let manager = SessionManager::new(SessionConfig::default(), Arc::new(DownStorage))
        .with_cache(Arc::new(MemoryCache::new(CacheConfig::default())));

    let is_storage = |r: Result<(), SessionError>| {
        matches!(
            r,
            Err(SessionError::Storage {
                source: StorageError::Backend(_),
                ..
            })
        )
    };

    assert!(is_storage(manager.create("u", "ip", "ua").await.map(|_| ())));
    assert!(is_storage(manager.verify("some-token").await.map(|_| ())));
    assert!(is_storage(manager.destroy("some-token").await));
    assert!(is_storage(manager.destroy_by_session_id("id").await));
    assert!(is_storage(
        manager.destroy_all_user_sessions("u").await.map(|_| ())
    ));
    assert!(is_storage(manager.list_user_sessions("u").await.map(|_| ())));
    assert!(is_storage(manager.get_session("id").await.map(|_| ())));
    assert!(is_storage(manager.purge_expired().await.map(|_| ())));
}

#[tokio::test]
async fn test_failed_create_is_not_cached() {
    let cache = MemoryCache::new(CacheConfig::default());
    let manager = SessionManager::new(SessionConfig::default(), Arc::new(DownStorage))
        .with_cache(Arc::new(cache.clone()));

    assert!(manager.create("u", "ip", "ua").await.is_err());
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_cache_failures_are_absorbed() {
    let storage = Arc::new(MemoryStorage::new());
    let broken = Arc::new(BrokenCache::default());
    let manager =
        SessionManager::new(SessionConfig::default(), storage.clone()).with_cache(broken.clone());

    let created = manager.create("frank", "ip", "ua").await.unwrap();
    assert_eq!(manager.verify(&created.token).await.unwrap().user_id, "frank");

    let refreshed = manager.refresh(&created.token).await.unwrap();
    manager.destroy(&refreshed.token).await.unwrap();

    manager.create("frank", "ip", "ua").await.unwrap();
    assert_eq!(manager.destroy_all_user_sessions("frank").await.unwrap(), 1);

    assert!(broken.calls.load(Ordering::SeqCst) > 0);
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_unrepresentable_lifetime_fails_create() {
    for cached in [true, false] {
        let h = harness(
            SessionConfig::new().with_max_age_secs(9_000_000_000_000),
            cached,
        );
        assert!(matches!(
            h.manager.create("ivan", "ip", "ua").await,
            Err(SessionError::LifetimeOutOfRange(_))
        ));
        assert!(h.storage.is_empty());

        let h = harness(SessionConfig::new().with_max_age_secs(i64::MAX), cached);
        assert!(matches!(
            h.manager.create("ivan", "ip", "ua").await,
            Err(SessionError::LifetimeOutOfRange(_))
        ));
    }
}

#[tokio::test]
async fn test_random_failure_fails_create_only() {
    let storage = Arc::new(MemoryStorage::new());
    let manager = SessionManager::new(SessionConfig::default(), storage.clone())
        .with_random_source(Arc::new(DeadRandom));

    assert!(matches!(
        manager.create("u", "ip", "ua").await,
        Err(SessionError::Generation(CryptoError::Random(_)))
    ));
    assert!(storage.is_empty());
    assert!(matches!(
        manager.verify("anything").await,
        Err(SessionError::NotFound)
    ));
}
