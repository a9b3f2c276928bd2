use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{AccessToken, AccessTokenRef};

/// A token as reported by the issuer
///
/// The issuer may answer without a credential, or with an empty one. Such a
/// response is not a usable token, and the cache treats it like a failed
/// fetch.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TokenResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<AccessToken>,
    #[serde(rename = "expires_in", default)]
    lifetime_secs: u64,
}

impl TokenResource {
    /// A token declared valid for `lifetime_secs` seconds from now
    pub fn new(access_token: impl Into<AccessToken>, lifetime_secs: u64) -> Self {
        Self {
            access_token: Some(access_token.into()),
            lifetime_secs,
        }
    }

    /// A response that carries no access token
    pub fn without_token(lifetime_secs: u64) -> Self {
        Self {
            access_token: None,
            lifetime_secs,
        }
    }

    /// The access token, if present and not empty
    #[inline]
    pub fn access_token(&self) -> Option<&AccessTokenRef> {
        self.access_token
            .as_deref()
            .filter(|token| !token.as_str().is_empty())
    }

    /// The declared remaining lifetime, in seconds
    #[inline]
    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime_secs
    }
}

/// A token's lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
    /// The token is valid and not yet due for refresh
    Fresh,
    /// The token is valid, but a refresh was due
    Stale,
    /// The token's declared lifetime has passed
    Expired,
}

/// A token published by the cache
///
/// Times are measured on the monotonic clock from the moment the token was
/// received.
#[derive(Debug)]
pub struct IssuedToken {
    access_token: AccessToken,
    lifetime: Duration,
    refresh_delay: Duration,
    received: Instant,
}

impl IssuedToken {
    pub(crate) fn new(
        access_token: &AccessTokenRef,
        lifetime: Duration,
        refresh_delay: Duration,
    ) -> Self {
        Self {
            access_token: access_token.to_owned(),
            lifetime,
            refresh_delay,
            received: Instant::now(),
        }
    }

    /// Gets the access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the lifetime the issuer declared for this token
    #[inline]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Gets the delay after which the cache refreshes this token
    #[inline]
    pub fn refresh_delay(&self) -> Duration {
        self.refresh_delay
    }

    /// Gets the time the token was received
    #[inline]
    pub fn received(&self) -> Instant {
        self.received
    }

    /// Gets the time the token becomes due for refresh
    ///
    /// `None` if that time lies beyond the range of the monotonic clock.
    #[inline]
    pub fn refresh_at(&self) -> Option<Instant> {
        self.received.checked_add(self.refresh_delay)
    }

    /// Gets the time the token expires
    ///
    /// `None` if that time lies beyond the range of the monotonic clock.
    #[inline]
    pub fn expiry(&self) -> Option<Instant> {
        self.received.checked_add(self.lifetime)
    }

    /// Gets the token's current lifecycle status
    #[inline]
    pub fn token_status(&self) -> TokenStatus {
        self.token_status_at(Instant::now())
    }

    /// Gets the token's lifecycle status as of `time`
    pub fn token_status_at(&self, time: Instant) -> TokenStatus {
        let age = time.saturating_duration_since(self.received);
        if age >= self.lifetime {
            TokenStatus::Expired
        } else if age >= self.refresh_delay {
            TokenStatus::Stale
        } else {
            TokenStatus::Fresh
        }
    }

    /// Gets how much longer the token is valid as of `time`
    #[inline]
    pub fn until_expired_at(&self, time: Instant) -> Duration {
        self.lifetime
            .saturating_sub(time.saturating_duration_since(self.received))
    }
}
