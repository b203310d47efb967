//! Grant publishers
//!
//! [`ChannelGrantPublisher`] hands events to a bounded queue drained by the
//! [`GrantConsumer`](crate::consumer::GrantConsumer). [`RetryingPublisher`]
//! wraps any publisher with exponential backoff for retryable failures.

use crate::domain::GrantEvent;
use crate::error::PublishError;
use crate::ports::GrantPublisher;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

/// Create a bounded grant queue.
///
/// Returns the publisher side and the receiver a consumer should drain.
pub fn grant_channel(
    capacity: usize,
    enqueue_timeout: Duration,
) -> (ChannelGrantPublisher, mpsc::Receiver<GrantEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelGrantPublisher { tx, enqueue_timeout }, rx)
}

/// Publisher backed by a bounded `tokio` channel
#[derive(Debug, Clone)]
pub struct ChannelGrantPublisher {
    tx: mpsc::Sender<GrantEvent>,
    enqueue_timeout: Duration,
}

#[async_trait]
impl GrantPublisher for ChannelGrantPublisher {
    async fn publish(&self, event: GrantEvent) -> Result<(), PublishError> {
        match self.tx.send_timeout(event, self.enqueue_timeout).await {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendTimeoutError::Timeout(_)) => Err(PublishError::QueueFull),
            Err(mpsc::error::SendTimeoutError::Closed(_)) => Err(PublishError::Closed),
        }
    }
}

/// Retry policy with exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Scale each delay by a random factor in [0.5, 1.5)
    pub jitter: bool,
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let capped = exp.min(self.max_delay);

        if self.jitter {
            let factor: f64 = rand::thread_rng().gen_range(0.5..1.5);
            capped.mul_f64(factor).min(self.max_delay)
        } else {
            capped
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
            jitter: true,
        }
    }
}

/// Publisher decorator that re-publishes the same event on retryable errors
pub struct RetryingPublisher<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: GrantPublisher> RetryingPublisher<P> {
    /// Wrap `inner` with `policy`
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<P: GrantPublisher> GrantPublisher for RetryingPublisher<P> {
    async fn publish(&self, event: GrantEvent) -> Result<(), PublishError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match self.inner.publish(event.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    let delay = self.policy.backoff(attempt);
                    tracing::debug!(
                        requester = %event.requester_id(),
                        event_id = %event.event_id(),
                        attempt,
                        ?delay,
                        error = %e,
                        "retrying grant publish"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RequesterId;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Publisher replaying a scripted sequence of results
    struct Scripted {
        script: Mutex<VecDeque<Result<(), PublishError>>>,
        seen: Mutex<Vec<GrantEvent>>,
    }

    impl Scripted {
        fn new(script: Vec<Result<(), PublishError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GrantPublisher for Scripted {
        async fn publish(&self, event: GrantEvent) -> Result<(), PublishError> {
            self.seen.lock().push(event);
            self.script.lock().pop_front().unwrap_or(Ok(()))
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_channel_publish_and_receive() {
        let (publisher, mut rx) = grant_channel(4, Duration::from_millis(10));
        let event = GrantEvent::new(RequesterId::from(1u64), 1);

        publisher.publish(event.clone()).await.unwrap();
        assert_eq!(rx.recv().await, Some(event));
    }

    #[tokio::test]
    async fn test_channel_full_times_out() {
        let (publisher, _rx) = grant_channel(1, Duration::from_millis(5));
        publisher.publish(GrantEvent::new("a".into(), 1)).await.unwrap();

        let err = publisher.publish(GrantEvent::new("b".into(), 2)).await.unwrap_err();
        assert_eq!(err, PublishError::QueueFull);
    }

    #[tokio::test]
    async fn test_channel_closed() {
        let (publisher, rx) = grant_channel(1, Duration::from_millis(5));
        drop(rx);

        let err = publisher.publish(GrantEvent::new("a".into(), 1)).await.unwrap_err();
        assert_eq!(err, PublishError::Closed);
    }

    #[tokio::test]
    async fn test_retry_republishes_same_event() {
        let inner = Scripted::new(vec![Err(PublishError::QueueFull), Err(PublishError::QueueFull)]);
        let publisher = RetryingPublisher::new(inner, fast_policy(3));
        let event = GrantEvent::new("a".into(), 1);

        publisher.publish(event.clone()).await.unwrap();

        let seen = publisher.inner.seen.lock();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|e| e.event_id() == event.event_id()));
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let inner = Scripted::new(vec![Err(PublishError::QueueFull); 5]);
        let publisher = RetryingPublisher::new(inner, fast_policy(2));

        let err = publisher.publish(GrantEvent::new("a".into(), 1)).await.unwrap_err();
        assert_eq!(err, PublishError::QueueFull);
        assert_eq!(publisher.inner.seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_closed_is_not_retried() {
        let inner = Scripted::new(vec![Err(PublishError::Closed)]);
        let publisher = RetryingPublisher::new(inner, fast_policy(5));

        assert_eq!(
            publisher.publish(GrantEvent::new("a".into(), 1)).await,
            Err(PublishError::Closed)
        );
        assert_eq!(publisher.inner.seen.lock().len(), 1);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = fast_policy(10);
        assert_eq!(policy.backoff(0), Duration::from_millis(1));
        assert_eq!(policy.backoff(1), Duration::from_millis(2));
        assert_eq!(policy.backoff(8), Duration::from_millis(4));

        let jittered = RetryPolicy { jitter: true, ..policy };
        for attempt in 0..6 {
            assert!(jittered.backoff(attempt) <= Duration::from_millis(4));
        }
    }
}
