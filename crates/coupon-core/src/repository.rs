//! Coupon repository - persistence for consumed grant events

use crate::domain::{Coupon, GrantEvent, RequesterId};
use crate::error::RepositoryError;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Repository result type
pub type RepoResult<T> = Result<T, RepositoryError>;

/// Coupon Repository trait
#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// Persist a coupon for the event's requester unless one exists.
    ///
    /// Returns `false` for a redelivered event; the stored row is left as is.
    async fn save_if_absent(&self, event: &GrantEvent) -> RepoResult<bool>;

    /// Get coupon by requester
    async fn find_by_requester(&self, id: &RequesterId) -> RepoResult<Option<Coupon>>;

    /// Number of coupons stored
    async fn count(&self) -> RepoResult<u64>;
}

/// In-memory coupon repository (for testing and development)
#[derive(Debug, Default)]
pub struct InMemoryCouponRepository {
    coupons: DashMap<RequesterId, Coupon>,
    next_id: AtomicU64,
}

impl InMemoryCouponRepository {
    /// Empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CouponRepository for InMemoryCouponRepository {
    async fn save_if_absent(&self, event: &GrantEvent) -> RepoResult<bool> {
        match self.coupons.entry(event.requester_id().clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(Coupon {
                    id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
                    requester_id: event.requester_id().clone(),
                    sequence: event.sequence(),
                    event_id: event.event_id(),
                    issued_at: event.issued_at(),
                });
                Ok(true)
            }
        }
    }

    async fn find_by_requester(&self, id: &RequesterId) -> RepoResult<Option<Coupon>> {
        Ok(self.coupons.get(id).map(|c| c.clone()))
    }

    async fn count(&self) -> RepoResult<u64> {
        Ok(self.coupons.len() as u64)
    }
}
