//! In-process credential store on moka.

use std::collections::HashSet;
use std::future::ready;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Entry;
use moka::Expiry;
use moka::future::Cache;
use moka::ops::compute::Op;

use super::{CredentialStore, StoreError};

/// A cached value together with the instant it stops being valid.
#[derive(Clone)]
struct Stamped<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Stamped<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    // `remove` can hand back an entry that lapsed but was not evicted yet.
    fn live(self) -> Option<T> {
        (Instant::now() < self.expires_at).then_some(self.value)
    }
}

/// Expires every entry at its own `expires_at`, on insert and on replace.
struct Deadline;

impl<T> Expiry<String, Stamped<T>> for Deadline {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Stamped<T>,
        created_at: Instant,
    ) -> Option<Duration> {
        Some(value.expires_at.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Stamped<T>,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.expires_at.saturating_duration_since(updated_at))
    }
}

/// Store backed by moka caches. Only valid for a single process.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Cache<String, Stamped<String>>,
    sets: Cache<String, Stamped<HashSet<String>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            entries: Cache::builder().expire_after(Deadline).build(),
            sets: Cache::builder().expire_after(Deadline).build(),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries (excluding subject sets).
    pub fn len(&self) -> usize {
        self.entries.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.entries
            .insert(key.to_string(), Stamped::new(value.to_string(), ttl))
            .await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).await.map(|e| e.value))
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.remove(key).await.and_then(Stamped::live))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .entries
            .remove(key)
            .await
            .and_then(Stamped::live)
            .is_some())
    }

    async fn add_member(&self, set: &str, member: &str, ttl: Duration) -> Result<(), StoreError> {
        let _ = self
            .sets
            .entry_by_ref(set)
            .and_compute_with(|current| {
                let mut members = current
                    .map(Entry::into_value)
                    .and_then(Stamped::live)
                    .unwrap_or_default();
                members.insert(member.to_string());
                ready(Op::Put(Stamped::new(members, ttl)))
            })
            .await;
        Ok(())
    }

    async fn remove_member(&self, set: &str, member: &str) -> Result<(), StoreError> {
        let _ = self
            .sets
            .entry_by_ref(set)
            .and_compute_with(|current| {
                let op = match current.map(Entry::into_value) {
                    Some(mut stamped) => {
                        stamped.value.remove(member);
                        if stamped.value.is_empty() {
                            Op::Remove
                        } else {
                            // Keeps the set's original deadline.
                            Op::Put(stamped)
                        }
                    }
                    None => Op::Nop,
                };
                ready(op)
            })
            .await;
        Ok(())
    }

    async fn take_members(&self, set: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .sets
            .remove(set)
            .await
            .and_then(Stamped::live)
            .map(|members| members.into_iter().collect())
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
