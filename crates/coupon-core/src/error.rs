//! Error types for the coupon admission core

use std::time::Duration;
use thiserror::Error;

/// Failure of a shared store round-trip (membership set or quota counter)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Backend could not be reached or rejected the command
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Backend did not answer within the configured bound
    #[error("store timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure to hand a grant event to the durable queue
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    /// Queue stayed at capacity for the whole enqueue window
    #[error("grant queue full")]
    QueueFull,

    /// Downstream consumer is gone
    #[error("grant queue closed")]
    Closed,

    /// Publish call exceeded its bound
    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
}

impl PublishError {
    /// Whether re-publishing the same event could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::QueueFull | Self::Timeout(_))
    }
}

/// Coupon persistence errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// Backend rejected or lost the write
    #[error("storage error: {0}")]
    StorageError(String),
}

/// Invalid construction-time configuration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A quota of zero admits nobody
    #[error("quota must be positive")]
    ZeroQuota,

    /// Named key is blank
    #[error("key name must not be empty: {0}")]
    EmptyKey(&'static str),

    /// Any other out-of-range setting
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Offending setting
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Coupon core error type
#[derive(Debug, Error)]
pub enum CouponError {
    /// Store failure during bootstrap
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Rejected configuration or wiring
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for the coupon core
pub type CouponResult<T> = Result<T, CouponError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_error_retryability() {
        assert!(PublishError::QueueFull.is_retryable());
        assert!(PublishError::Timeout(Duration::from_millis(5)).is_retryable());
        assert!(!PublishError::Closed.is_retryable());
    }

    #[test]
    fn test_umbrella_conversion() {
        let err: CouponError = StoreError::Unavailable("conn refused".into()).into();
        assert_eq!(err.to_string(), "store unavailable: conn refused");
    }
}
