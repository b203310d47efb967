//! Grant consumer
//!
//! Drains the grant queue and writes one coupon per requester. Delivery is
//! at-least-once, so a redelivered event is absorbed by the repository's
//! per-requester uniqueness. Storage failures are retried with backoff; an
//! event that exhausts its budget lands in the dead-letter list.

use crate::domain::GrantEvent;
use crate::error::RepositoryError;
use crate::publisher::RetryPolicy;
use crate::repository::CouponRepository;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Event the consumer gave up on
#[derive(Debug, Clone)]
pub struct DeadLetter {
    /// Event as received from the queue
    pub event: GrantEvent,
    /// Last storage error
    pub error: RepositoryError,
    /// Writes attempted
    pub attempts: u32,
    /// When the consumer gave up
    pub failed_at: DateTime<Utc>,
}

/// Shared view of dead-lettered events
#[derive(Debug, Clone, Default)]
pub struct DeadLetters(Arc<RwLock<Vec<DeadLetter>>>);

impl DeadLetters {
    /// Copy of every dead letter so far
    pub fn list(&self) -> Vec<DeadLetter> {
        self.0.read().clone()
    }

    /// Number of dead letters
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Whether nothing has been dead-lettered
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    fn push(&self, letter: DeadLetter) {
        self.0.write().push(letter);
    }
}

/// Totals reported when the queue closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerSummary {
    /// New coupons written
    pub persisted: u64,
    /// Events for requesters already holding a coupon
    pub redelivered: u64,
    /// Events given up on
    pub dead_lettered: u64,
}

/// Queue consumer persisting grants into a [`CouponRepository`]
pub struct GrantConsumer {
    rx: mpsc::Receiver<GrantEvent>,
    repository: Arc<dyn CouponRepository>,
    policy: RetryPolicy,
    dead_letters: DeadLetters,
}

impl GrantConsumer {
    /// Consumer draining `rx` into `repository`, retrying writes per `policy`
    pub fn new(
        rx: mpsc::Receiver<GrantEvent>,
        repository: Arc<dyn CouponRepository>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            rx,
            repository,
            policy,
            dead_letters: DeadLetters::default(),
        }
    }

    /// Handle onto the dead-letter list; stays valid after `run` consumes self
    pub fn dead_letters(&self) -> DeadLetters {
        self.dead_letters.clone()
    }

    /// Consume until every publisher is dropped
    pub async fn run(mut self) -> ConsumerSummary {
        let mut summary = ConsumerSummary::default();

        while let Some(event) = self.rx.recv().await {
            match persist(self.repository.as_ref(), &self.policy, &event).await {
                Ok(true) => {
                    summary.persisted += 1;
                    tracing::info!(
                        requester = %event.requester_id(),
                        sequence = event.sequence(),
                        "coupon persisted"
                    );
                }
                Ok(false) => {
                    summary.redelivered += 1;
                    tracing::debug!(
                        requester = %event.requester_id(),
                        event_id = %event.event_id(),
                        "redelivered grant ignored"
                    );
                }
                Err((error, attempts)) => {
                    summary.dead_lettered += 1;
                    tracing::error!(
                        requester = %event.requester_id(),
                        event_id = %event.event_id(),
                        attempts,
                        %error,
                        "grant moved to dead letter"
                    );
                    self.dead_letters.push(DeadLetter {
                        event,
                        error,
                        attempts,
                        failed_at: Utc::now(),
                    });
                }
            }
        }

        tracing::info!(?summary, "grant queue closed");
        summary
    }
}

/// Write one event, retrying storage errors. Err carries the last error and attempts made.
async fn persist(
    repository: &dyn CouponRepository,
    policy: &RetryPolicy,
    event: &GrantEvent,
) -> Result<bool, (RepositoryError, u32)> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match repository.save_if_absent(event).await {
            Ok(stored) => return Ok(stored),
            Err(e) if attempt + 1 < attempts => {
                let delay = policy.backoff(attempt);
                tracing::warn!(error = %e, attempt, ?delay, "coupon write failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err((e, attempt + 1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Coupon, RequesterId};
    use crate::repository::{InMemoryCouponRepository, RepoResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Repository failing the first `failures` writes
    struct Flaky {
        inner: InMemoryCouponRepository,
        failures: AtomicU32,
    }

    #[async_trait]
    impl CouponRepository for Flaky {
        async fn save_if_absent(&self, event: &GrantEvent) -> RepoResult<bool> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(RepositoryError::StorageError("disk full".into()));
            }
            self.inner.save_if_absent(event).await
        }

        async fn find_by_requester(&self, id: &RequesterId) -> RepoResult<Option<Coupon>> {
            self.inner.find_by_requester(id).await
        }

        async fn count(&self) -> RepoResult<u64> {
            self.inner.count().await
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_persists_and_absorbs_redelivery() {
        let (tx, rx) = mpsc::channel(8);
        let repo = Arc::new(InMemoryCouponRepository::new());
        let consumer = GrantConsumer::new(rx, repo.clone(), policy(1));

        let event = GrantEvent::new(RequesterId::from(1u64), 1);
        tx.send(event.clone()).await.unwrap();
        tx.send(event).await.unwrap();
        tx.send(GrantEvent::new(RequesterId::from(2u64), 2)).await.unwrap();
        drop(tx);

        let summary = consumer.run().await;
        assert_eq!(summary, ConsumerSummary { persisted: 2, redelivered: 1, dead_lettered: 0 });
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_retries_storage_errors() {
        let (tx, rx) = mpsc::channel(8);
        let repo = Arc::new(Flaky {
            inner: InMemoryCouponRepository::new(),
            failures: AtomicU32::new(2),
        });
        let consumer = GrantConsumer::new(rx, repo.clone(), policy(3));

        tx.send(GrantEvent::new("a".into(), 1)).await.unwrap();
        drop(tx);

        let summary = consumer.run().await;
        assert_eq!(summary.persisted, 1);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dead_letters_after_budget() {
        let (tx, rx) = mpsc::channel(8);
        let repo = Arc::new(Flaky {
            inner: InMemoryCouponRepository::new(),
            failures: AtomicU32::new(10),
        });
        let consumer = GrantConsumer::new(rx, repo, policy(2));
        let dead = consumer.dead_letters();

        let event = GrantEvent::new("a".into(), 1);
        tx.send(event.clone()).await.unwrap();
        drop(tx);

        let summary = consumer.run().await;
        assert_eq!(summary.dead_lettered, 1);
        assert_eq!(dead.len(), 1);

        let letter = &dead.list()[0];
        assert_eq!(letter.event, event);
        assert_eq!(letter.attempts, 2);
        assert_eq!(letter.error, RepositoryError::StorageError("disk full".into()));
    }
}
