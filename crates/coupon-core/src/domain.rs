//! Domain model - requesters, grant events, admission outcomes
//!
//! - **RequesterId**: opaque caller-supplied identity (numeric or textual)
//! - **GrantEvent**: immutable record of one admitted grant, handed to the publisher
//! - **Outcome**: the four possible answers of `AdmissionEngine::apply`
//! - **Coupon**: the durable row written by the grant consumer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque requester identity.
///
/// Integers and strings are both accepted; they are compared by their
/// canonical string form, so `RequesterId::from(7u64) == RequesterId::from("7")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequesterId(String);

impl RequesterId {
    /// Create a requester ID from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for RequesterId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<i64> for RequesterId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for RequesterId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RequesterId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A grant admitted by the engine.
///
/// Fields are private: once built the event cannot be altered, and the
/// publisher receives it by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantEvent {
    event_id: Uuid,
    requester_id: RequesterId,
    sequence: u64,
    issued_at: DateTime<Utc>,
}

impl GrantEvent {
    /// Build an event for `requester_id` admitted at counter value `sequence`
    pub fn new(requester_id: RequesterId, sequence: u64) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            requester_id,
            sequence,
            issued_at: Utc::now(),
        }
    }

    /// Unique event ID (stable across re-publishes)
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Requester the grant belongs to
    pub fn requester_id(&self) -> &RequesterId {
        &self.requester_id
    }

    /// Counter value that admitted this grant (1..=quota)
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Decision time
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

/// Which external call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Add-if-absent on the membership set
    Membership,
    /// Quota counter increment
    Counter,
    /// Grant handoff to the queue
    Publish,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Membership => write!(f, "membership"),
            Self::Counter => write!(f, "counter"),
            Self::Publish => write!(f, "publish"),
        }
    }
}

/// Result of one admission decision
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome {
    /// Grant admitted and accepted by the publisher
    Granted(GrantEvent),
    /// Requester already holds a membership entry
    DuplicateRequest,
    /// Counter passed the quota
    QuotaExhausted,
    /// An external call failed or timed out; retrying the whole call is safe
    TransientFailure(FailureKind),
}

impl Outcome {
    /// Whether a grant was issued
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// The admitted event, if any
    pub fn grant(&self) -> Option<&GrantEvent> {
        match self {
            Self::Granted(event) => Some(event),
            _ => None,
        }
    }
}

/// Persisted coupon row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    /// Row ID assigned by the repository
    pub id: u64,
    /// Owner
    pub requester_id: RequesterId,
    /// Counter value that admitted the grant
    pub sequence: u64,
    /// Source event
    pub event_id: Uuid,
    /// Decision time
    pub issued_at: DateTime<Utc>,
}
