//! Credential store: where refresh entries live.
//!
//! Values are opaque strings with a store-enforced TTL. A missing key and an
//! expired key look the same to callers. Each subject additionally owns a
//! set of its live refresh keys so all of its sessions can be found without
//! scanning.

mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Errors reaching the backing store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("unexpected store reply: {0}")]
    UnexpectedReply(String),
}

/// Key-value store for refresh entries and per-subject key sets.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Store `value` under `key` for `ttl`, replacing any previous value.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Get the value under `key`. `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Atomically get and remove the value under `key`.
    ///
    /// Of two concurrent callers at most one receives the value.
    async fn take(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remove `key`. Returns whether something was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Add `member` to the set `set` and push the set's expiry out to `ttl`.
    async fn add_member(&self, set: &str, member: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn remove_member(&self, set: &str, member: &str) -> Result<(), StoreError>;

    /// Atomically read and remove a whole set.
    async fn take_members(&self, set: &str) -> Result<Vec<String>, StoreError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}
