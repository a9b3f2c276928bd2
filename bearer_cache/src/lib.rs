//! A background-refreshing cache for bearer tokens
//!
//! Outbound calls to protected services need a current access token, but
//! callers should not have to wait on the identity provider every time they
//! make a request. This crate keeps one token per [`TokenCache`] and renews it
//! in the background, so that reading the token is a cheap, synchronous
//! operation for any number of concurrent callers.
//!
//! # General Flow
//!
//! A [`TokenCache`] is constructed from an [`IssuerClient`][issuer::IssuerClient],
//! the capability that fetches a fresh token from the issuing authority, and
//! a [`WorkerPools`][pool::WorkerPools] registry. Construction immediately
//! submits the first fetch to a dedicated, named worker and returns without
//! waiting for it.
//!
//! Each successful fetch is published atomically. The next fetch is
//! scheduled after a third of the token's declared lifetime, but never
//! sooner than the configured minimum delay between loads. A failed fetch,
//! or a response without a usable token, is logged and retried after a fixed
//! delay; readers keep the last good token in the meantime.
//!
//! Only the very first read can block, and only for a bounded time. If the
//! issuer could not provide a token by then, the getters return no token
//! rather than an error, and the request goes out unauthenticated.
//!
//! ```
//! use bearer_cache::{issuer::StaticIssuer, pool::WorkerPools, TokenCache};
//!
//! let cache = TokenCache::new(StaticIssuer::new("abc123", 30), WorkerPools::shared())?;
//!
//! assert_eq!(cache.bearer_token(), "Bearer abc123");
//! # Ok::<(), bearer_cache::Error>(())
//! ```
//!
//! Against a real authority, use the client credentials issuer:
//!
//! ```
//! use bearer_cache::{
//!     issuer::oauth2::{ClientCredentials, ClientCredentialsIssuer},
//!     pool::WorkerPools,
//!     ClientId, ClientSecret, TokenCache, TokenCacheConfig,
//! };
//! # fn cache() -> Result<TokenCache, Box<dyn std::error::Error>> {
//! let issuer = ClientCredentialsIssuer::new(
//!     reqwest::Client::new(),
//!     reqwest::Url::parse("https://issuer.example.com/oauth/token")?,
//!     ClientCredentials {
//!         client_id: ClientId::from_static("orders-service"),
//!         client_secret: ClientSecret::from_static("secret"),
//!         audience: None,
//!     },
//! );
//!
//! let config = TokenCacheConfig::default().with_pool("orders-oidc", true);
//! let cache = TokenCache::with_config(issuer, config, WorkerPools::shared())?;
//! # Ok(cache)
//! # }
//! ```
//!
//! # Features
//!
//! * `oauth2` (default): Provides an issuer that performs the OAuth2 _client
//!   credentials_ exchange using [reqwest](https://docs.rs/reqwest), see
//!   [`ClientCredentialsIssuer`][issuer::oauth2::ClientCredentialsIssuer].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod braids;
mod cache;
mod config;
mod error;
pub mod issuer;
pub mod pool;
mod readiness;
pub mod scheduler;
mod tokens;

pub use braids::*;
pub use cache::TokenCache;
pub use config::TokenCacheConfig;
pub use error::{Error, RefreshError};
pub use tokens::{IssuedToken, TokenResource, TokenStatus};
