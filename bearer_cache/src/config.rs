use std::time::Duration;

use crate::{AccessTokenRef, IssuedToken};

/// Configuration for a [`TokenCache`][crate::TokenCache]
#[derive(Clone, Debug)]
pub struct TokenCacheConfig {
    max_wait: Duration,
    min_delay_between_loads: Duration,
    retry_after_failure: Duration,
    pool_name: String,
    background: bool,
}

impl Default for TokenCacheConfig {
    /// Default cache configuration
    ///
    /// Waits at most 10 seconds for the first token, refreshes no more often
    /// than every 5 seconds, and retries 3 seconds after a failed fetch. The
    /// refresh job runs on the background pool named `OIDC_CLIENT`.
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(10),
            min_delay_between_loads: Duration::from_secs(5),
            retry_after_failure: Duration::from_secs(3),
            pool_name: String::from("OIDC_CLIENT"),
            background: true,
        }
    }
}

impl TokenCacheConfig {
    /// Constructs a new cache configuration
    ///
    /// Callers wait up to `max_wait` for the first token. After a successful
    /// load, the next load happens after a third of the token's lifetime, but
    /// never sooner than `min_delay_between_loads`. After a failed load, the
    /// next attempt happens after `retry_after_failure`.
    pub fn new(
        max_wait: Duration,
        min_delay_between_loads: Duration,
        retry_after_failure: Duration,
    ) -> Self {
        Self {
            max_wait,
            min_delay_between_loads,
            retry_after_failure,
            ..Self::default()
        }
    }

    /// Sets the maximum time callers wait for the first token
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Sets the minimum delay between successful loads
    pub fn with_min_delay_between_loads(mut self, min_delay: Duration) -> Self {
        self.min_delay_between_loads = min_delay;
        self
    }

    /// Sets the delay before retrying a failed load
    pub fn with_retry_after_failure(mut self, delay: Duration) -> Self {
        self.retry_after_failure = delay;
        self
    }

    /// Sets the worker pool identity the refresh job runs on
    pub fn with_pool(mut self, name: impl Into<String>, background: bool) -> Self {
        self.pool_name = name.into();
        self.background = background;
        self
    }

    /// The maximum time callers wait for the first token
    #[inline]
    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// The minimum delay between successful loads
    #[inline]
    pub fn min_delay_between_loads(&self) -> Duration {
        self.min_delay_between_loads
    }

    /// The delay before retrying a failed load
    #[inline]
    pub fn retry_after_failure(&self) -> Duration {
        self.retry_after_failure
    }

    /// The name prefix of the worker pool
    #[inline]
    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    /// Whether the worker pool is a background pool
    #[inline]
    pub fn is_background(&self) -> bool {
        self.background
    }

    /// The delay before reloading a token declared valid for `lifetime_secs`
    ///
    /// A third of the lifetime (at least one second), raised to the minimum
    /// delay between loads.
    pub fn refresh_delay(&self, lifetime_secs: u64) -> Duration {
        Duration::from_secs((lifetime_secs / 3).max(1)).max(self.min_delay_between_loads)
    }

    pub(crate) fn issue(&self, access_token: &AccessTokenRef, lifetime_secs: u64) -> IssuedToken {
        IssuedToken::new(
            access_token,
            Duration::from_secs(lifetime_secs),
            self.refresh_delay(lifetime_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TokenCacheConfig::default();
        assert_eq!(config.max_wait(), Duration::from_secs(10));
        assert_eq!(config.min_delay_between_loads(), Duration::from_secs(5));
        assert_eq!(config.retry_after_failure(), Duration::from_secs(3));
        assert_eq!(config.pool_name(), "OIDC_CLIENT");
        assert!(config.is_background());
    }

    #[test]
    fn refresh_after_a_third_of_the_lifetime() {
        let config = TokenCacheConfig::default();
        assert_eq!(config.refresh_delay(30), Duration::from_secs(10));
        assert_eq!(config.refresh_delay(3600), Duration::from_secs(1200));
    }

    #[test]
    fn short_lifetimes_use_the_minimum_delay() {
        let config = TokenCacheConfig::default();
        assert_eq!(config.refresh_delay(6), Duration::from_secs(5));
        assert_eq!(config.refresh_delay(15), Duration::from_secs(5));
        assert_eq!(config.refresh_delay(0), Duration::from_secs(5));
    }

    #[test]
    fn refresh_delay_is_at_least_one_second() {
        let config = TokenCacheConfig::default().with_min_delay_between_loads(Duration::ZERO);
        assert_eq!(config.refresh_delay(0), Duration::from_secs(1));
        assert_eq!(config.refresh_delay(2), Duration::from_secs(1));
        assert_eq!(config.refresh_delay(6), Duration::from_secs(2));
    }

    #[test]
    fn issued_token_carries_lifetime_and_refresh_delay() {
        let config = TokenCacheConfig::default();
        let token = config.issue(AccessTokenRef::from_static("abc123"), 30);
        assert_eq!(token.access_token().as_str(), "abc123");
        assert_eq!(token.lifetime(), Duration::from_secs(30));
        assert_eq!(token.refresh_delay(), Duration::from_secs(10));
    }
}
