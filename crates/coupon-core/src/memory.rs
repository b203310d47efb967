//! In-process store backends
//!
//! Sharded `DashSet` for membership, a single `AtomicU64` for the quota
//! counter. Both give the same single-operation atomicity a shared
//! key-value server would, so every engine clone in the process can use them
//! concurrently.

use crate::domain::RequesterId;
use crate::error::StoreError;
use crate::ports::{Membership, MembershipStore, QuotaCounter};
use async_trait::async_trait;
use dashmap::DashSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory membership set
#[derive(Debug)]
pub struct InMemoryMembershipStore {
    key: String,
    members: DashSet<RequesterId>,
}

impl InMemoryMembershipStore {
    /// Empty set under `key`
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            members: DashSet::new(),
        }
    }

    /// Set key namespace
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether `id` holds a membership entry
    pub fn contains(&self, id: &RequesterId) -> bool {
        self.members.contains(id)
    }
}

impl Default for InMemoryMembershipStore {
    fn default() -> Self {
        Self::new("applied_user")
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn add_if_absent(&self, id: &RequesterId) -> Result<Membership, StoreError> {
        // insert takes the shard write lock, so check and set are one step
        if self.members.insert(id.clone()) {
            Ok(Membership::Added)
        } else {
            Ok(Membership::AlreadyPresent)
        }
    }

    async fn len(&self) -> Result<u64, StoreError> {
        Ok(self.members.len() as u64)
    }

    async fn reset(&self) -> Result<(), StoreError> {
        self.members.clear();
        Ok(())
    }
}

/// In-memory quota counter
#[derive(Debug)]
pub struct InMemoryQuotaCounter {
    key: String,
    value: AtomicU64,
}

impl InMemoryQuotaCounter {
    /// Counter at zero under `key`
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: AtomicU64::new(0),
        }
    }

    /// Counter key name
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current value, for diagnostics and tests. Never used for decisions.
    pub fn current(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }
}

impl Default for InMemoryQuotaCounter {
    fn default() -> Self {
        Self::new("coupon_count")
    }
}

#[async_trait]
impl QuotaCounter for InMemoryQuotaCounter {
    async fn increment(&self) -> Result<u64, StoreError> {
        Ok(self.value.fetch_add(1, Ordering::AcqRel) + 1)
    }

    async fn reset(&self) -> Result<(), StoreError> {
        self.value.store(0, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_add_if_absent() {
        let store = InMemoryMembershipStore::default();
        let id = RequesterId::from(1u64);

        assert_eq!(store.add_if_absent(&id).await.unwrap(), Membership::Added);
        assert_eq!(store.add_if_absent(&id).await.unwrap(), Membership::AlreadyPresent);
        assert_eq!(store.len().await.unwrap(), 1);
        assert_eq!(store.key(), "applied_user");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_single_winner_per_key() {
        let store = Arc::new(InMemoryMembershipStore::default());
        let id = RequesterId::new("same");

        let handles: Vec<_> = (0..500)
            .map(|_| {
                let store = store.clone();
                let id = id.clone();
                tokio::spawn(async move { store.add_if_absent(&id).await.unwrap() })
            })
            .collect();

        let mut added = 0;
        for handle in handles {
            if handle.await.unwrap() == Membership::Added {
                added += 1;
            }
        }
        assert_eq!(added, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_counter_values_are_unique() {
        let counter = Arc::new(InMemoryQuotaCounter::default());

        let handles: Vec<_> = (0..1000)
            .map(|_| {
                let counter = counter.clone();
                tokio::spawn(async move { counter.increment().await.unwrap() })
            })
            .collect();

        let mut seen = Vec::with_capacity(1000);
        for handle in handles {
            seen.push(handle.await.unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (1..=1000).collect::<Vec<u64>>());
        assert_eq!(counter.current(), 1000);
    }

    #[tokio::test]
    async fn test_reset_clears_state() {
        let store = InMemoryMembershipStore::default();
        let counter = InMemoryQuotaCounter::default();
        store.add_if_absent(&"a".into()).await.unwrap();
        counter.increment().await.unwrap();

        store.reset().await.unwrap();
        counter.reset().await.unwrap();

        assert_eq!(store.len().await.unwrap(), 0);
        assert_eq!(counter.increment().await.unwrap(), 1);
    }
}
