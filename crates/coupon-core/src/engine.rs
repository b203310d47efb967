//! Admission engine
//!
//! `apply` runs a fixed four-step sequence against the outbound ports:
//!
//! 1. membership add-if-absent (duplicate requesters stop here)
//! 2. counter increment (only after membership succeeded)
//! 3. strict `count > quota` check on the value the increment returned
//! 4. enqueue the grant event
//!
//! Every step is bounded by a timeout and any failure ends the sequence. The
//! steps are never reordered: a failure after step 1 leaves the requester
//! recorded, so a retry yields `DuplicateRequest` rather than a second grant.

use crate::bootstrap;
use crate::domain::{FailureKind, GrantEvent, Outcome, RequesterId};
use crate::error::{ConfigError, CouponResult, PublishError, StoreError};
use crate::memory::{InMemoryMembershipStore, InMemoryQuotaCounter};
use crate::ports::{GrantPublisher, Membership, MembershipStore, QuotaCounter};
use crate::stats::{AdmissionStats, StatsSnapshot};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;

/// Fixed admission configuration
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Maximum grants for the process lifetime
    pub quota: u64,
    /// Membership set key namespace
    pub membership_key: String,
    /// Quota counter key name
    pub counter_key: String,
    /// Bound on each membership/counter round-trip
    pub store_timeout: Duration,
    /// Bound on the publish call
    pub publish_timeout: Duration,
}

impl AdmissionConfig {
    /// Defaults with a different quota
    pub fn with_quota(quota: u64) -> Self {
        Self {
            quota,
            ..Self::default()
        }
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quota == 0 {
            return Err(ConfigError::ZeroQuota);
        }
        if self.membership_key.is_empty() {
            return Err(ConfigError::EmptyKey("membership_key"));
        }
        if self.counter_key.is_empty() {
            return Err(ConfigError::EmptyKey("counter_key"));
        }
        if self.store_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "store_timeout",
                reason: "must be non-zero".into(),
            });
        }
        if self.publish_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "publish_timeout",
                reason: "must be non-zero".into(),
            });
        }
        Ok(())
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            quota: 100,
            membership_key: "applied_user".into(),
            counter_key: "coupon_count".into(),
            store_timeout: Duration::from_millis(500),
            publish_timeout: Duration::from_millis(500),
        }
    }
}

/// Wires the outbound ports into an [`AdmissionEngine`]
pub struct EngineBuilder {
    config: AdmissionConfig,
    membership: Option<Arc<dyn MembershipStore>>,
    counter: Option<Arc<dyn QuotaCounter>>,
    publisher: Option<Arc<dyn GrantPublisher>>,
}

impl EngineBuilder {
    /// Builder with no ports wired
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            config,
            membership: None,
            counter: None,
            publisher: None,
        }
    }

    /// Use in-process stores named after the configured keys
    pub fn in_memory_stores(self) -> Self {
        let membership = Arc::new(InMemoryMembershipStore::new(self.config.membership_key.clone()));
        let counter = Arc::new(InMemoryQuotaCounter::new(self.config.counter_key.clone()));
        self.membership(membership).counter(counter)
    }

    /// Wire the membership set
    pub fn membership(mut self, store: Arc<dyn MembershipStore>) -> Self {
        self.membership = Some(store);
        self
    }

    /// Wire the quota counter
    pub fn counter(mut self, counter: Arc<dyn QuotaCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Wire the grant publisher
    pub fn publisher(mut self, publisher: Arc<dyn GrantPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Build without touching store state
    pub fn build(self) -> CouponResult<AdmissionEngine> {
        self.config.validate()?;

        let membership = self.membership.ok_or(ConfigError::Invalid {
            field: "membership",
            reason: "no store wired".into(),
        })?;
        let counter = self.counter.ok_or(ConfigError::Invalid {
            field: "counter",
            reason: "no counter wired".into(),
        })?;
        let publisher = self.publisher.ok_or(ConfigError::Invalid {
            field: "publisher",
            reason: "no publisher wired".into(),
        })?;

        Ok(AdmissionEngine {
            membership,
            counter,
            publisher,
            config: Arc::new(self.config),
            stats: Arc::new(AdmissionStats::new()),
        })
    }

    /// Reset the shared stores, then build.
    ///
    /// No engine handle exists until the reset has finished, so no `apply`
    /// can overlap it within this process.
    pub async fn bootstrap(self) -> CouponResult<AdmissionEngine> {
        let engine = self.build()?;
        bootstrap::reset_event(engine.membership.as_ref(), engine.counter.as_ref()).await?;
        tracing::info!(
            quota = engine.config.quota,
            membership_key = %engine.config.membership_key,
            counter_key = %engine.config.counter_key,
            "admission engine ready"
        );
        Ok(engine)
    }
}

/// Stateless admission orchestrator.
///
/// Cloning is cheap and every clone shares the same ports; decisions rely
/// only on the atomicity of those ports.
#[derive(Clone)]
pub struct AdmissionEngine {
    membership: Arc<dyn MembershipStore>,
    counter: Arc<dyn QuotaCounter>,
    publisher: Arc<dyn GrantPublisher>,
    config: Arc<AdmissionConfig>,
    stats: Arc<AdmissionStats>,
}

impl AdmissionEngine {
    /// Start wiring an engine
    pub fn builder(config: AdmissionConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Active configuration
    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Outcome tallies so far
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Decide whether `requester` gets a grant
    pub async fn apply(&self, requester: impl Into<RequesterId>) -> Outcome {
        let requester = requester.into();
        let outcome = self.decide(requester).await;
        self.stats.record(&outcome);
        outcome
    }

    /// Run [`apply`](Self::apply) on its own task.
    ///
    /// Dropping the returned future does not stop the sequence, so a caller
    /// that goes away between steps still leaves a finished decision behind.
    /// `Err` only when the task panicked or the runtime is shutting down.
    pub async fn apply_detached(&self, requester: impl Into<RequesterId>) -> Result<Outcome, JoinError> {
        let engine = self.clone();
        let requester = requester.into();
        tokio::spawn(async move { engine.apply(requester).await }).await
    }

    async fn decide(&self, requester: RequesterId) -> Outcome {
        let store_timeout = self.config.store_timeout;

        match bounded(store_timeout, self.membership.add_if_absent(&requester)).await {
            Ok(Membership::Added) => {}
            Ok(Membership::AlreadyPresent) => {
                tracing::debug!(requester = %requester, "duplicate request");
                return Outcome::DuplicateRequest;
            }
            Err(e) => return self.transient(&requester, FailureKind::Membership, &e),
        }

        let count = match bounded(store_timeout, self.counter.increment()).await {
            Ok(count) => count,
            Err(e) => return self.transient(&requester, FailureKind::Counter, &e),
        };

        if count > self.config.quota {
            tracing::debug!(requester = %requester, count, quota = self.config.quota, "quota exhausted");
            return Outcome::QuotaExhausted;
        }

        let event = GrantEvent::new(requester, count);
        let publish_timeout = self.config.publish_timeout;
        let published = tokio::time::timeout(publish_timeout, self.publisher.publish(event.clone()))
            .await
            .unwrap_or(Err(PublishError::Timeout(publish_timeout)));

        match published {
            Ok(()) => {
                tracing::debug!(
                    requester = %event.requester_id(),
                    count,
                    quota = self.config.quota,
                    "grant issued"
                );
                Outcome::Granted(event)
            }
            Err(e) => self.transient(event.requester_id(), FailureKind::Publish, &e),
        }
    }

    fn transient(&self, requester: &RequesterId, stage: FailureKind, error: &dyn std::error::Error) -> Outcome {
        tracing::warn!(requester = %requester, %stage, %error, "admission step failed");
        Outcome::TransientFailure(stage)
    }
}

async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(StoreError::Timeout(limit)))
}
