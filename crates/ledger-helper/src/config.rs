//! Configuration for the ledger driver.
//!
//! [`DriverConfig`] names the ledger and bounds how the driver runs
//! transactions: how many may be in flight, how transient failures are
//! retried, and how long a whole transaction may take.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of transactions a driver runs concurrently.
pub const DEFAULT_MAX_CONCURRENT_TRANSACTIONS: usize = 10;

/// Default number of retries after the first transaction attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 4;

/// Default backoff before the first retry (10 milliseconds).
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(10);

/// Default upper bound on a single backoff (5 seconds).
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Default bound on a whole transaction including retries (30 seconds).
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required string field was empty.
    #[error("{field} cannot be empty")]
    Empty {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A numeric or duration field was below its minimum.
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        /// Name of the offending field.
        field: &'static str,
        /// Smallest accepted value.
        min: String,
        /// Value supplied.
        value: String,
    },

    /// Two fields contradict each other.
    #[error("{message}")]
    Inconsistent {
        /// Description of the conflict.
        message: String,
    },
}

/// Retry policy for transient transaction failures.
///
/// The driver re-runs the whole transaction up to `max_retries` times after
/// the first attempt. Backoff doubles per attempt from `initial_backoff`,
/// is capped at `max_backoff`, and gets up to 50% random jitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries after the first attempt. Zero disables retry.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff before the first retry.
    #[serde(with = "humantime_serde", default = "default_initial_backoff")]
    pub initial_backoff: Duration,

    /// Upper bound on a single backoff.
    #[serde(with = "humantime_serde", default = "default_max_backoff")]
    pub max_backoff: Duration,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_initial_backoff() -> Duration {
    DEFAULT_INITIAL_BACKOFF
}

fn default_max_backoff() -> Duration {
    DEFAULT_MAX_BACKOFF
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

#[bon::bon]
impl RetryConfig {
    /// Creates a retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `initial_backoff` is zero or `max_backoff`
    /// is shorter than `initial_backoff`.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_MAX_RETRIES)] max_retries: u32,
        #[builder(default = DEFAULT_INITIAL_BACKOFF)] initial_backoff: Duration,
        #[builder(default = DEFAULT_MAX_BACKOFF)] max_backoff: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { max_retries, initial_backoff, max_backoff };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants enforced by the builder.
    ///
    /// Deserialized configs bypass the builder, so [`DriverConfig::validate`]
    /// calls this again.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on a zero `initial_backoff` or a `max_backoff`
    /// shorter than `initial_backoff`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_backoff.is_zero() {
            return Err(ConfigError::BelowMinimum {
                field: "initial_backoff",
                min: "1ms".into(),
                value: "0s".into(),
            });
        }
        if self.max_backoff < self.initial_backoff {
            return Err(ConfigError::Inconsistent {
                message: format!(
                    "max_backoff ({:?}) must not be shorter than initial_backoff ({:?})",
                    self.max_backoff, self.initial_backoff
                ),
            });
        }
        Ok(())
    }
}

/// Configuration for [`LedgerDriver`](crate::LedgerDriver).
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use ledger_helper::{DriverConfig, RetryConfig};
///
/// let config = DriverConfig::builder()
///     .ledger_name("vehicle-registration")
///     .max_concurrent_transactions(4)
///     .retry(RetryConfig::builder().max_retries(2).build()?)
///     .transaction_timeout(Duration::from_secs(10))
///     .build()?;
///
/// assert_eq!(config.ledger_name(), "vehicle-registration");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverConfig {
    /// Ledger all transactions run against.
    pub(crate) ledger_name: String,

    /// Upper bound on in-flight transactions.
    #[serde(default = "default_max_concurrent_transactions")]
    pub(crate) max_concurrent_transactions: usize,

    /// Retry policy for transient failures.
    #[serde(default)]
    pub(crate) retry: RetryConfig,

    /// Bound on a whole transaction including retries. `None` disables it.
    #[serde(with = "humantime_serde", default = "default_transaction_timeout")]
    pub(crate) transaction_timeout: Option<Duration>,
}

fn default_max_concurrent_transactions() -> usize {
    DEFAULT_MAX_CONCURRENT_TRANSACTIONS
}

fn default_transaction_timeout() -> Option<Duration> {
    Some(DEFAULT_TRANSACTION_TIMEOUT)
}

#[bon::bon]
impl DriverConfig {
    /// Creates a driver configuration, validating all fields.
    ///
    /// # Optional Fields
    ///
    /// * `max_concurrent_transactions` - default 10.
    /// * `retry` - default [`RetryConfig::default`].
    /// * `transaction_timeout` - default 30 seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the ledger name is empty, the concurrency
    /// bound is zero, or the retry policy is invalid.
    #[builder]
    pub fn new(
        #[builder(into)] ledger_name: String,
        #[builder(default = DEFAULT_MAX_CONCURRENT_TRANSACTIONS)] max_concurrent_transactions: usize,
        #[builder(default)] retry: RetryConfig,
        #[builder(default = DEFAULT_TRANSACTION_TIMEOUT)] transaction_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            ledger_name,
            max_concurrent_transactions,
            retry,
            transaction_timeout: Some(transaction_timeout),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger_name.is_empty() {
            return Err(ConfigError::Empty { field: "ledger_name" });
        }
        if self.max_concurrent_transactions == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "max_concurrent_transactions",
                min: "1".into(),
                value: "0".into(),
            });
        }
        if let Some(timeout) = self.transaction_timeout
            && timeout.is_zero()
        {
            return Err(ConfigError::BelowMinimum {
                field: "transaction_timeout",
                min: "1ms".into(),
                value: "0s".into(),
            });
        }
        self.retry.validate()
    }

    /// Returns a copy with no overall transaction timeout.
    #[must_use]
    pub fn without_transaction_timeout(mut self) -> Self {
        self.transaction_timeout = None;
        self
    }

    /// Returns the ledger name.
    #[must_use]
    pub fn ledger_name(&self) -> &str {
        &self.ledger_name
    }

    /// Returns the concurrency bound.
    #[must_use]
    pub fn max_concurrent_transactions(&self) -> usize {
        self.max_concurrent_transactions
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Returns the overall transaction timeout, if any.
    #[must_use]
    pub fn transaction_timeout(&self) -> Option<Duration> {
        self.transaction_timeout
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_valid_config_uses_defaults() {
        let config = DriverConfig::builder().ledger_name("ledger").build().unwrap();

        assert_eq!(config.ledger_name(), "ledger");
        assert_eq!(config.max_concurrent_transactions(), DEFAULT_MAX_CONCURRENT_TRANSACTIONS);
        assert_eq!(config.retry(), &RetryConfig::default());
        assert_eq!(config.transaction_timeout(), Some(DEFAULT_TRANSACTION_TIMEOUT));
    }

    #[test]
    fn test_empty_ledger_name_rejected() {
        let err = DriverConfig::builder().ledger_name("").build().unwrap_err();
        assert_eq!(err, ConfigError::Empty { field: "ledger_name" });
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = DriverConfig::builder()
            .ledger_name("ledger")
            .max_concurrent_transactions(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("max_concurrent_transactions"), "{err}");
    }

    #[test]
    fn test_zero_transaction_timeout_rejected() {
        let err = DriverConfig::builder()
            .ledger_name("ledger")
            .transaction_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("transaction_timeout"), "{err}");
    }

    #[test]
    fn test_without_transaction_timeout() {
        let config = DriverConfig::builder()
            .ledger_name("ledger")
            .build()
            .unwrap()
            .without_transaction_timeout();
        assert_eq!(config.transaction_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_builder_defaults_match_default_impl() {
        let built = RetryConfig::builder().build().unwrap();
        assert_eq!(built, RetryConfig::default());
    }

    #[rstest]
    #[case::zero_initial(Duration::ZERO, Duration::from_secs(1), false)]
    #[case::max_below_initial(Duration::from_secs(2), Duration::from_secs(1), false)]
    #[case::equal(Duration::from_millis(50), Duration::from_millis(50), true)]
    #[case::normal(Duration::from_millis(10), Duration::from_secs(5), true)]
    fn test_retry_backoff_validation(
        #[case] initial_backoff: Duration,
        #[case] max_backoff: Duration,
        #[case] should_pass: bool,
    ) {
        let result = RetryConfig::builder()
            .initial_backoff(initial_backoff)
            .max_backoff(max_backoff)
            .build();
        assert_eq!(result.is_ok(), should_pass);
    }

    #[test]
    fn test_deserialization_with_defaults() {
        let json = r#"{ "ledger_name": "ledger" }"#;

        let config: DriverConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.max_concurrent_transactions, DEFAULT_MAX_CONCURRENT_TRANSACTIONS);
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.transaction_timeout, Some(DEFAULT_TRANSACTION_TIMEOUT));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialization_humantime_durations() {
        let json = r#"{
            "ledger_name": "ledger",
            "max_concurrent_transactions": 2,
            "retry": { "max_retries": 1, "initial_backoff": "25ms", "max_backoff": "1s" },
            "transaction_timeout": "2m"
        }"#;

        let config: DriverConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.retry.initial_backoff, Duration::from_millis(25));
        assert_eq!(config.retry.max_backoff, Duration::from_secs(1));
        assert_eq!(config.transaction_timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_deserialization_rejects_unknown_fields() {
        let json = r#"{ "ledger_name": "ledger", "region": "us-east-1" }"#;
        assert!(serde_json::from_str::<DriverConfig>(json).is_err());
    }

    #[test]
    fn test_deserialized_config_still_validated() {
        let json = r#"{ "ledger_name": "", "max_concurrent_transactions": 1 }"#;
        let config: DriverConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }
}
