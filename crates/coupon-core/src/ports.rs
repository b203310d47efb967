//! Outbound ports
//!
//! Interfaces the admission engine consumes. Each one exposes a single atomic
//! operation; implementations own every bit of mutual exclusion.

use crate::domain::{GrantEvent, RequesterId};
use crate::error::{PublishError, StoreError};
use async_trait::async_trait;

/// Result of an add-if-absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// This call inserted the key
    Added,
    /// The key was already in the set
    AlreadyPresent,
}

/// Shared set of requesters that have entered the admission path.
///
/// For a given key exactly one caller observes [`Membership::Added`] until the
/// set is reset, regardless of how many callers or processes race on it.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Atomically insert `id` unless present
    async fn add_if_absent(&self, id: &RequesterId) -> Result<Membership, StoreError>;

    /// Number of members
    async fn len(&self) -> Result<u64, StoreError>;

    /// Drop every member. Bootstrap only.
    async fn reset(&self) -> Result<(), StoreError>;
}

/// Shared monotonic counter of quota units consumed.
#[async_trait]
pub trait QuotaCounter: Send + Sync {
    /// Atomic fetch-and-add; returns the value after the increment (first call returns 1)
    async fn increment(&self) -> Result<u64, StoreError>;

    /// Set back to zero. Bootstrap only.
    async fn reset(&self) -> Result<(), StoreError>;
}

/// Asynchronous, at-least-once handoff of admitted grants.
///
/// `publish` acknowledges the enqueue only; persistence happens downstream.
#[async_trait]
pub trait GrantPublisher: Send + Sync {
    /// Enqueue `event`; `Ok` means the queue accepted it
    async fn publish(&self, event: GrantEvent) -> Result<(), PublishError>;
}
