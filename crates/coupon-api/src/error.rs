//! Startup errors

use thiserror::Error;

/// Reasons the service could not start
#[derive(Debug, Error)]
pub enum StartupError {
    /// Config sources could not be read or parsed
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Admission settings failed validation
    #[error("invalid admission config: {0}")]
    Admission(#[from] coupon_core::ConfigError),

    /// Other out-of-range setting
    #[error("invalid config: {0}")]
    Invalid(String),

    /// Engine wiring or bootstrap reset failed
    #[error(transparent)]
    Core(#[from] coupon_core::CouponError),
}
