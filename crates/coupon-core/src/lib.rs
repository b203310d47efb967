//! Coupon Admission Core
//!
//! Grants a fixed number of coupons to requesters under two guarantees that
//! hold for any number of concurrent callers and engine instances:
//!
//! - each requester is granted at most one coupon
//! - the total number of grants never exceeds the quota
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         ADMISSION ENGINE                                │
//! │                                                                         │
//! │   apply(id) ──► add_if_absent ──► increment ──► count <= Q ──► publish  │
//! │                    │                 │             │              │     │
//! │               Duplicate        Transient      Exhausted      Granted    │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────────┐  │
//! │  │  Membership  │  │    Quota     │  │       Grant Publisher        │  │
//! │  │    Store     │  │   Counter    │  │  bounded queue + retry       │  │
//! │  └──────────────┘  └──────────────┘  └──────────────┬───────────────┘  │
//! │                                                     │                   │
//! │                                      ┌──────────────▼───────────────┐  │
//! │                                      │  Grant Consumer → Coupons    │  │
//! │                                      │  dedup by requester, DLQ     │  │
//! │                                      └──────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine itself holds no decision state. Mutual exclusion lives entirely
//! in the [`MembershipStore`] and [`QuotaCounter`] ports, each of which exposes
//! a single atomic operation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod consumer;
pub mod domain;
pub mod engine;
pub mod error;
pub mod memory;
pub mod ports;
pub mod publisher;
pub mod repository;
pub mod stats;

pub use consumer::{ConsumerSummary, DeadLetter, DeadLetters, GrantConsumer};
pub use domain::{Coupon, FailureKind, GrantEvent, Outcome, RequesterId};
pub use engine::{AdmissionConfig, AdmissionEngine, EngineBuilder};
pub use error::*;
pub use memory::{InMemoryMembershipStore, InMemoryQuotaCounter};
pub use ports::{GrantPublisher, Membership, MembershipStore, QuotaCounter};
pub use publisher::{grant_channel, ChannelGrantPublisher, RetryPolicy, RetryingPublisher};
pub use repository::{CouponRepository, InMemoryCouponRepository};
pub use stats::{AdmissionStats, StatsSnapshot};
