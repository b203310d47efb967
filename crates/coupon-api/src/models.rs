//! API Models

use chrono::{DateTime, Utc};
use coupon_core::{GrantEvent, StatsSnapshot};
use serde::{Deserialize, Serialize};

/// Standard API response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request succeeded
    pub success: bool,
    /// Payload on success
    pub data: Option<T>,
    /// Details on failure
    pub error: Option<ErrorResponse>,
}

impl<T> ApiResponse<T> {
    /// Successful envelope around `data`
    pub fn success(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    /// Failed envelope with a machine-readable `code`
    pub fn error(code: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorResponse {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

/// Issued grant
#[derive(Debug, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct GrantResponse {
    pub requester_id: String,
    pub sequence: u64,
    pub event_id: String,
    pub issued_at: DateTime<Utc>,
}

impl From<&GrantEvent> for GrantResponse {
    fn from(event: &GrantEvent) -> Self {
        Self {
            requester_id: event.requester_id().to_string(),
            sequence: event.sequence(),
            event_id: event.event_id().to_string(),
            issued_at: event.issued_at(),
        }
    }
}

/// Admission and persistence totals
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Configured quota
    pub quota: u64,
    /// Engine outcome tallies
    pub admission: StatsSnapshot,
    /// Coupons stored by the consumer
    pub persisted: u64,
    /// Events the consumer gave up on
    pub dead_lettered: usize,
}
