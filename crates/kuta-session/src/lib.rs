//! Session lifecycle management with a cache-aside TTL cache.
//!
//! This crate provides:
//! - [`SessionManager`] to create, verify, destroy and refresh sessions
//! - [`SessionStorage`], the seam to whatever database holds sessions
//! - [`SessionCache`], an optional fast path in front of storage, with
//!   [`MemoryCache`] as the bundled implementation
//! - [`MemoryStorage`], an in-process storage adapter for tests and tooling
//!
//! Clients only ever hold the raw token. Storage and cache are keyed by its
//! SHA-256 digest.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kuta_session::{CacheConfig, MemoryCache, MemoryStorage, SessionConfig, SessionManager};
//!
//! let manager = SessionManager::new(SessionConfig::default(), Arc::new(MemoryStorage::new()))
//!     .with_cache(Arc::new(MemoryCache::new(CacheConfig::default())));
//!
//! let created = manager.create("user-1", "127.0.0.1", "curl/8.0").await?;
//! let session = manager.verify(&created.token).await?;
//! ```

mod cache;
mod config;
mod error;
mod manager;
mod session;
mod storage;

pub use cache::{CacheResult, CacheStats, MemoryCache, SessionCache};
pub use config::{
    CacheConfig, DEFAULT_CACHE_MAX_SIZE, DEFAULT_CACHE_TTL, DEFAULT_SESSION_MAX_AGE_SECS,
    MAX_SESSION_MAX_AGE_SECS, SessionConfig,
};
pub use error::{CacheError, Error, Result, SessionError, StorageError};
pub use manager::SessionManager;
pub use session::{CreatedSession, Session};
pub use storage::{MemoryStorage, SessionStorage, StorageResult};
