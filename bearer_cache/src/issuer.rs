//! Token issuers

use crate::{AccessToken, TokenResource};
use async_trait::async_trait;
use std::{convert::Infallible, error};

#[cfg(feature = "oauth2")]
#[cfg_attr(docsrs, doc(cfg(feature = "oauth2")))]
pub mod oauth2;

/// A remote authority that mints access tokens
///
/// Implementations should not keep state between calls; the cache calls
/// [`fetch_token()`][Self::fetch_token()] from its refresh job only, never
/// concurrently with itself.
#[async_trait]
pub trait IssuerClient: Send + Sync + 'static {
    /// The error type returned in the event that fetching a token fails
    type Error: error::Error + Send + Sync + 'static;

    /// Fetches a fresh token from the authority
    async fn fetch_token(&self) -> Result<TokenResource, Self::Error>;
}

/// An issuer that always hands out the same token
///
/// Useful in tests and for local development against services that accept
/// a fixed credential.
#[derive(Clone, Debug)]
pub struct StaticIssuer {
    access_token: AccessToken,
    lifetime_secs: u64,
}

impl StaticIssuer {
    /// Constructs an issuer returning `access_token`, declared valid for
    /// `lifetime_secs` seconds on every fetch
    pub fn new(access_token: impl Into<AccessToken>, lifetime_secs: u64) -> Self {
        Self {
            access_token: access_token.into(),
            lifetime_secs,
        }
    }
}

#[async_trait]
impl IssuerClient for StaticIssuer {
    type Error = Infallible;

    async fn fetch_token(&self) -> Result<TokenResource, Self::Error> {
        Ok(TokenResource::new(
            self.access_token.clone(),
            self.lifetime_secs,
        ))
    }
}
