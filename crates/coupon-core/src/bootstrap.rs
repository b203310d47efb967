//! Process-start reset of the shared admission state
//!
//! Clears the membership set and the quota counter. Must complete before any
//! engine serves traffic; `EngineBuilder::bootstrap` enforces that by only
//! handing out the engine once the reset has returned.

use crate::error::StoreError;
use crate::ports::{MembershipStore, QuotaCounter};

/// Reset both shared stores. Idempotent.
pub async fn reset_event(
    membership: &dyn MembershipStore,
    counter: &dyn QuotaCounter,
) -> Result<(), StoreError> {
    membership.reset().await?;
    counter.reset().await?;
    tracing::info!("coupon event state reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RequesterId;
    use crate::memory::{InMemoryMembershipStore, InMemoryQuotaCounter};
    use crate::ports::Membership;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let membership = InMemoryMembershipStore::default();
        let counter = InMemoryQuotaCounter::default();
        let id = RequesterId::from(1u64);

        membership.add_if_absent(&id).await.unwrap();
        counter.increment().await.unwrap();

        assert_ok!(reset_event(&membership, &counter).await);
        assert_ok!(reset_event(&membership, &counter).await);

        assert_eq!(counter.current(), 0);
        assert_eq!(membership.add_if_absent(&id).await.unwrap(), Membership::Added);
    }
}
