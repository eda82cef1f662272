//! Configuration for the event coordinator

use std::time::Duration;

use serde::{Deserialize, Serialize};

use adlog_core::SignerId;

use crate::error::{CoordinatorError, CoordinatorResult};

/// Configuration for an [`EventCoordinator`](crate::EventCoordinator)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Identity used for every ledger append
    pub signer: SignerId,
    /// How long to wait for ledger finality (milliseconds)
    pub finality_timeout_ms: u64,
    /// Bound on a ledger sequence fetch or append (milliseconds)
    pub append_timeout_ms: u64,
    /// Bound on ledger and content reads (milliseconds)
    pub read_timeout_ms: u64,
    /// Bound on a content-store put (milliseconds)
    pub content_timeout_ms: u64,
    /// Lifetime of a cached event projection (seconds)
    pub cache_ttl_secs: u64,
    /// Largest page `list_recent_events` accepts
    pub max_list_limit: usize,
    /// Page size used when a caller does not specify one
    pub default_list_limit: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            signer: SignerId::new("adlog-default"),
            finality_timeout_ms: 30_000,
            append_timeout_ms: 10_000,
            read_timeout_ms: 5_000,
            content_timeout_ms: 10_000,
            cache_ttl_secs: 3_600,
            max_list_limit: 100,
            default_list_limit: 10,
        }
    }
}

impl CoordinatorConfig {
    /// Create a configuration for a specific signer
    pub fn with_signer(signer: impl Into<String>) -> Self {
        Self {
            signer: SignerId::new(signer),
            ..Default::default()
        }
    }

    /// Set the finality timeout, rounded up to whole milliseconds
    pub fn with_finality_timeout(mut self, timeout: Duration) -> Self {
        self.finality_timeout_ms = ceil_millis(timeout);
        self
    }

    /// Set the append timeout
    pub fn with_append_timeout(mut self, timeout: Duration) -> Self {
        self.append_timeout_ms = ceil_millis(timeout);
        self
    }

    /// Set the read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = ceil_millis(timeout);
        self
    }

    /// Set the content-store put timeout
    pub fn with_content_timeout(mut self, timeout: Duration) -> Self {
        self.content_timeout_ms = ceil_millis(timeout);
        self
    }

    /// Set the cache TTL, rounded up to whole seconds
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ceil_secs(ttl);
        self
    }

    /// Set the maximum list page size
    pub fn with_max_list_limit(mut self, limit: usize) -> Self {
        self.max_list_limit = limit;
        self
    }

    pub fn finality_timeout(&self) -> Duration {
        Duration::from_millis(self.finality_timeout_ms)
    }

    pub fn append_timeout(&self) -> Duration {
        Duration::from_millis(self.append_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn content_timeout(&self) -> Duration {
        Duration::from_millis(self.content_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Reject configurations the coordinator cannot run with
    pub fn validate(&self) -> CoordinatorResult<()> {
        if self.signer.as_str().is_empty() {
            return Err(CoordinatorError::Config("signer must not be empty".into()));
        }
        if self.finality_timeout_ms == 0
            || self.append_timeout_ms == 0
            || self.read_timeout_ms == 0
            || self.content_timeout_ms == 0
        {
            return Err(CoordinatorError::Config("timeouts must be non-zero".into()));
        }
        if self.cache_ttl_secs == 0 {
            return Err(CoordinatorError::Config("cache_ttl_secs must be non-zero".into()));
        }
        if self.max_list_limit == 0 {
            return Err(CoordinatorError::Config("max_list_limit must be non-zero".into()));
        }
        if self.default_list_limit == 0 || self.default_list_limit > self.max_list_limit {
            return Err(CoordinatorError::Config(format!(
                "default_list_limit must be in 1..={}",
                self.max_list_limit
            )));
        }
        Ok(())
    }
}

/// Whole milliseconds, rounded up so a non-zero duration never becomes zero
fn ceil_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

fn ceil_secs(duration: Duration) -> u64 {
    duration
        .as_secs()
        .saturating_add(u64::from(duration.subsec_nanos() > 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CoordinatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.finality_timeout(), Duration::from_secs(30));
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.max_list_limit, 100);
    }

    #[test]
    fn test_builders() {
        let config = CoordinatorConfig::with_signer("ops")
            .with_finality_timeout(Duration::from_millis(250))
            .with_cache_ttl(Duration::from_secs(60))
            .with_max_list_limit(20);

        assert_eq!(config.signer.as_str(), "ops");
        assert_eq!(config.finality_timeout_ms, 250);
        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.max_list_limit, 20);
    }

    #[test]
    fn test_sub_unit_durations_round_up() {
        let config = CoordinatorConfig::default()
            .with_cache_ttl(Duration::from_millis(500))
            .with_append_timeout(Duration::from_micros(10))
            .with_read_timeout(Duration::from_millis(1500));
        assert_eq!(config.cache_ttl_secs, 1);
        assert_eq!(config.append_timeout_ms, 1);
        assert_eq!(config.read_timeout_ms, 1500);
        assert!(config.validate().is_ok());

        let config = CoordinatorConfig::default()
            .with_cache_ttl(Duration::from_millis(2001))
            .with_finality_timeout(Duration::MAX);
        assert_eq!(config.cache_ttl_secs, 3);
        assert_eq!(config.finality_timeout_ms, u64::MAX);

        let config = CoordinatorConfig::default().with_cache_ttl(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = CoordinatorConfig::with_signer("");
        assert!(matches!(config.validate(), Err(CoordinatorError::Config(_))));

        let config = CoordinatorConfig::default().with_finality_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = CoordinatorConfig::default().with_max_list_limit(5);
        assert!(config.validate().is_err(), "default limit exceeds max");
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: CoordinatorConfig =
            serde_json::from_str(r#"{"signer":"edge-1","cache_ttl_secs":120}"#).unwrap();
        assert_eq!(config.signer.as_str(), "edge-1");
        assert_eq!(config.cache_ttl_secs, 120);
        assert_eq!(config.read_timeout_ms, 5_000);
    }
}
