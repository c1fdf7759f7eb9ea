//! Configuration for the conversational-memory and tool-authorization core
//!
//! Every policy value the pipeline applies (history caps, refresh lookahead,
//! retry/backoff bounds, client cache TTL) lives here as a field with the
//! production default, so deployments can tune them without code changes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for thread-history retrieval and budgeting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Safety cap on how many messages are loaded from storage per request
    pub load_limit: usize,
    /// Threads at or below this many messages skip budget filtering entirely
    pub small_thread_threshold: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            load_limit: 1000,
            small_thread_threshold: 10,
        }
    }
}

impl MemoryConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage load cap
    pub fn with_load_limit(mut self, limit: usize) -> Self {
        self.load_limit = limit;
        self
    }

    /// Set the small-thread short-circuit threshold
    pub fn with_small_thread_threshold(mut self, threshold: usize) -> Self {
        self.small_thread_threshold = threshold;
        self
    }
}

/// Configuration for token refresh and reactive retry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Refresh is forced once expiry is closer than this window
    #[serde(with = "humantime_serde")]
    pub lookahead: Duration,
    /// Maximum refresh attempts on a reactive 401/403
    pub max_retries: u32,
    /// Initial delay between reactive refresh attempts
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Cap on the exponential backoff delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// How far a revalidated opaque API token's expiry is extended
    #[serde(with = "humantime_serde")]
    pub opaque_extension: Duration,
    /// Lifetime of a locally minted fallback access token
    #[serde(with = "humantime_serde")]
    pub local_token_ttl: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            lookahead: Duration::from_secs(5 * 60),
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            opaque_extension: Duration::from_secs(24 * 60 * 60),
            local_token_ttl: Duration::from_secs(60 * 60),
        }
    }
}

impl RefreshConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the proactive refresh lookahead window
    pub fn with_lookahead(mut self, lookahead: Duration) -> Self {
        self.lookahead = lookahead;
        self
    }

    /// Set max reactive refresh attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the initial backoff delay
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Set the backoff delay cap
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set the opaque token extension window
    pub fn with_opaque_extension(mut self, extension: Duration) -> Self {
        self.opaque_extension = extension;
        self
    }

    /// Set the locally minted token lifetime
    pub fn with_local_token_ttl(mut self, ttl: Duration) -> Self {
        self.local_token_ttl = ttl;
        self
    }

    /// Backoff delay for a 0-indexed attempt: `base_delay * 2^attempt`,
    /// capped at `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_secs_f64() * 2f64.powi(attempt as i32);
        Duration::from_secs_f64(exp.min(self.max_delay.as_secs_f64()))
    }
}

/// Configuration for the tool-client cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolClientCacheConfig {
    /// TTL for cached clients; `None` means entries live until the owning
    /// principal's token expires
    #[serde(default, with = "humantime_serde::option")]
    pub client_ttl: Option<Duration>,
    /// Maximum number of cached clients
    pub max_entries: usize,
}

impl Default for ToolClientCacheConfig {
    fn default() -> Self {
        Self {
            client_ttl: Some(Duration::from_secs(600)),
            max_entries: 1000,
        }
    }
}

impl ToolClientCacheConfig {
    /// Create a config with no TTL-based expiry
    pub fn no_expiry() -> Self {
        Self {
            client_ttl: None,
            max_entries: 10000,
        }
    }

    /// Set the client TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.client_ttl = Some(ttl);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_config_defaults() {
        let config = MemoryConfig::default();
        assert_eq!(config.load_limit, 1000);
        assert_eq!(config.small_thread_threshold, 10);
    }

    #[test]
    fn test_refresh_config_defaults() {
        let config = RefreshConfig::default();
        assert_eq!(config.lookahead, Duration::from_secs(300));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let config = RefreshConfig::default();
        assert_eq!(config.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(config.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(config.backoff_delay(2), Duration::from_secs(4));
        // 2^5 = 32s would exceed the 10s cap
        assert_eq!(config.backoff_delay(5), Duration::from_secs(10));
    }

    #[test]
    fn test_builder_chain() {
        let config = RefreshConfig::new()
            .with_max_retries(5)
            .with_base_delay(Duration::from_millis(200));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.base_delay, Duration::from_millis(200));
    }
}
