//! Service configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `COUPON__<SECTION>__<KEY>` environment variables.

use coupon_core::{AdmissionConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::StartupError;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "COUPON";

/// Full service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `[server]`
    pub server: ServerConfig,
    /// `[admission]`
    pub admission: AdmissionSection,
    /// `[publisher]` and `[publisher.retry]`
    pub publisher: PublisherSection,
    /// `[consumer]`
    pub consumer: ConsumerSection,
}

impl AppConfig {
    /// Load defaults, then `path` if given, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, StartupError> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Parse a TOML document layered over the defaults
    pub fn from_toml(source: &str) -> Result<Self, StartupError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;

        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Check settings the engine and queue cannot run with
    pub fn validate(&self) -> Result<(), StartupError> {
        self.admission.to_admission_config().validate()?;
        if self.publisher.queue_capacity == 0 {
            return Err(StartupError::Invalid("publisher.queue_capacity must be positive".into()));
        }
        if self.publisher.retry.max_attempts == 0 || self.consumer.max_attempts == 0 {
            return Err(StartupError::Invalid("max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port` to listen on
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".into(),
        }
    }
}

/// Engine settings, timeouts in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct AdmissionSection {
    pub quota: u64,
    pub membership_key: String,
    pub counter_key: String,
    pub store_timeout_ms: u64,
    pub publish_timeout_ms: u64,
}

impl AdmissionSection {
    /// Convert to the engine's config
    pub fn to_admission_config(&self) -> AdmissionConfig {
        AdmissionConfig {
            quota: self.quota,
            membership_key: self.membership_key.clone(),
            counter_key: self.counter_key.clone(),
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            publish_timeout: Duration::from_millis(self.publish_timeout_ms),
        }
    }
}

impl Default for AdmissionSection {
    fn default() -> Self {
        let defaults = AdmissionConfig::default();
        Self {
            quota: defaults.quota,
            membership_key: defaults.membership_key,
            counter_key: defaults.counter_key,
            store_timeout_ms: defaults.store_timeout.as_millis() as u64,
            publish_timeout_ms: defaults.publish_timeout.as_millis() as u64,
        }
    }
}

/// Grant queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherSection {
    /// Bounded queue size
    pub queue_capacity: usize,
    /// How long one enqueue may wait for a free slot
    pub enqueue_timeout_ms: u64,
    /// Re-publish policy for a full queue
    pub retry: RetrySection,
}

impl PublisherSection {
    /// Enqueue wait as a `Duration`
    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }
}

impl Default for PublisherSection {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            enqueue_timeout_ms: 50,
            retry: RetrySection::default(),
        }
    }
}

/// Publisher retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl RetrySection {
    /// Convert to a [`RetryPolicy`]
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter,
        }
    }
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 10,
            max_delay_ms: 200,
            jitter: true,
        }
    }
}

/// Consumer write-retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct ConsumerSection {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl ConsumerSection {
    /// Convert to a [`RetryPolicy`]
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: true,
        }
    }
}

impl Default for ConsumerSection {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.admission.quota, 100);
        assert_eq!(config.admission.membership_key, "applied_user");
        assert_eq!(config.admission.counter_key, "coupon_count");
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_toml_overrides() {
        let config = AppConfig::from_toml(
            r#"
            [admission]
            quota = 250
            store_timeout_ms = 20

            [publisher.retry]
            max_attempts = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.admission.quota, 250);
        let admission = config.admission.to_admission_config();
        assert_eq!(admission.store_timeout, Duration::from_millis(20));
        assert_eq!(admission.publish_timeout, Duration::from_millis(500));
        assert_eq!(config.publisher.retry.to_policy().max_attempts, 1);
        assert_eq!(config.publisher.queue_capacity, 1024);
    }

    #[test]
    fn test_zero_quota_rejected() {
        let err = AppConfig::from_toml("[admission]\nquota = 0\n").unwrap_err();
        assert!(matches!(
            err,
            StartupError::Admission(coupon_core::ConfigError::ZeroQuota)
        ));
    }

    #[test]
    fn test_load_shipped_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/coupon.toml");
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.consumer.max_attempts, 5);
        assert_eq!(config.publisher.enqueue_timeout(), Duration::from_millis(50));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("does-not-exist.toml");
        assert!(matches!(AppConfig::load(Some(&path)), Err(StartupError::Config(_))));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(AppConfig::from_toml("[publisher]\nqueue_capacity = 0\n").is_err());
    }
}
