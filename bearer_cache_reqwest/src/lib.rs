//! Middleware to attach cached bearer tokens to outgoing requests
//!
//! When using [`ClientWithMiddleware`](reqwest_middleware::ClientWithMiddleware),
//! include the [`BearerTokenMiddleware`] in the middleware stack to send the
//! current access token held by a [`TokenCache`] with each outbound request.
//!
//! If a request already has an `Authorization` header by the time the
//! middleware executes, the existing value is left in place. If the cache has
//! no token (the issuer could not provide one within the cache's maximum
//! wait), the request is sent without an `Authorization` header.
//!
//! ```
//! use std::sync::Arc;
//!
//! use bearer_cache::{issuer::StaticIssuer, pool::WorkerPools, TokenCache};
//! use bearer_cache_reqwest::BearerTokenMiddleware;
//! use reqwest::Client;
//! use reqwest_middleware::ClientBuilder;
//!
//! # fn main() -> Result<(), bearer_cache::Error> {
//! let cache = TokenCache::new(StaticIssuer::new("token", 300), WorkerPools::shared())?;
//!
//! let client = ClientBuilder::new(Client::default())
//!     .with(BearerTokenMiddleware::new(Arc::new(cache)))
//!     .build();
//!
//! let req = client.get("https://example.com");
//! # drop(req);
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::sync::Arc;

use bearer_cache::{AccessTokenRef, TokenCache};
use bytes::{BufMut, BytesMut};
use reqwest::{header, Request, Response};
use reqwest_middleware::{Middleware, Next, Result};

const BEARER_PREFIX: &[u8] = b"Bearer ";

/// A middleware that injects the cached access token into outgoing requests
#[derive(Clone, Debug)]
pub struct BearerTokenMiddleware {
    cache: Arc<TokenCache>,
}

impl BearerTokenMiddleware {
    /// Construct a new middleware from a token cache
    pub fn new(cache: Arc<TokenCache>) -> Self {
        Self { cache }
    }

    /// The token cache backing this middleware
    pub fn cache(&self) -> &Arc<TokenCache> {
        &self.cache
    }
}

fn authorization_value(token: &AccessTokenRef) -> Option<header::HeaderValue> {
    let mut header_value = BytesMut::with_capacity(token.as_str().len() + BEARER_PREFIX.len());
    header_value.put_slice(BEARER_PREFIX);
    header_value.put_slice(token.as_str().as_bytes());
    match header::HeaderValue::from_maybe_shared(header_value.freeze()) {
        Ok(mut value) => {
            value.set_sensitive(true);
            Some(value)
        }
        Err(_) => {
            tracing::warn!("access token contains bytes not allowed in a header, omitting");
            None
        }
    }
}

#[async_trait::async_trait]
impl Middleware for BearerTokenMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if req.headers().contains_key(header::AUTHORIZATION) {
            tracing::trace!("request already carries authorization, leaving it in place");
        } else if let Some(token) = self.cache.access_token_async().await {
            if let Some(value) = authorization_value(&token) {
                req.headers_mut().insert(header::AUTHORIZATION, value);
            }
        } else {
            tracing::debug!("no access token available, sending request unauthenticated");
        }

        next.run(req, extensions).await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };

    use bearer_cache::{
        issuer::{IssuerClient, StaticIssuer},
        pool::WorkerPools,
        TokenCacheConfig, TokenResource,
    };
    use reqwest::Client;
    use reqwest_middleware::ClientBuilder;

    use super::*;

    const TEST_TOKEN: &str = "this-is-a-test-token";
    const BEARER_TEST_TOKEN: &str = "Bearer this-is-a-test-token";

    struct AuthChecker {
        expected_authorization: String,
        checked: AtomicBool,
    }

    impl AuthChecker {
        pub fn new(expected: impl Into<String>) -> Self {
            Self {
                expected_authorization: expected.into(),
                checked: AtomicBool::new(false),
            }
        }
    }

    #[async_trait::async_trait]
    impl Middleware for AuthChecker {
        async fn handle(
            &self,
            req: Request,
            _: &mut http::Extensions,
            _: Next<'_>,
        ) -> Result<Response> {
            let authorization_header = req
                .headers()
                .get(header::AUTHORIZATION)
                .expect("no authorization header")
                .to_str()
                .expect("authorization header was not valid UTF-8");

            assert_eq!(authorization_header, self.expected_authorization);
            self.checked.store(true, Ordering::Release);

            Ok(http::Response::<&[u8]>::default().into())
        }
    }

    #[derive(Default)]
    struct NoAuthChecker {
        checked: AtomicBool,
    }

    #[async_trait::async_trait]
    impl Middleware for NoAuthChecker {
        async fn handle(
            &self,
            req: Request,
            _: &mut http::Extensions,
            _: Next<'_>,
        ) -> Result<Response> {
            assert_eq!(req.headers().get(header::AUTHORIZATION), None);
            self.checked.store(true, Ordering::Release);

            Ok(http::Response::<&[u8]>::default().into())
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("issuer unreachable")]
    struct Unreachable;

    struct UnreachableIssuer;

    #[async_trait::async_trait]
    impl IssuerClient for UnreachableIssuer {
        type Error = Unreachable;

        async fn fetch_token(&self) -> std::result::Result<TokenResource, Self::Error> {
            Err(Unreachable)
        }
    }

    fn test_config(max_wait: Duration) -> TokenCacheConfig {
        TokenCacheConfig::default()
            .with_max_wait(max_wait)
            .with_retry_after_failure(Duration::from_millis(20))
            .with_pool("middleware-test", true)
    }

    fn middleware_with_token(pools: &WorkerPools) -> BearerTokenMiddleware {
        let issuer = StaticIssuer::new(TEST_TOKEN, 300);
        let cache =
            TokenCache::with_config(issuer, test_config(Duration::from_secs(5)), pools).unwrap();
        BearerTokenMiddleware::new(Arc::new(cache))
    }

    fn middleware_without_token(pools: &WorkerPools) -> BearerTokenMiddleware {
        let config = test_config(Duration::from_millis(100));
        let cache = TokenCache::with_config(UnreachableIssuer, config, pools).unwrap();
        BearerTokenMiddleware::new(Arc::new(cache))
    }

    mod when_request_does_not_have_an_authorization_header {
        use super::*;

        #[tokio::test]
        async fn middleware_attaches_cached_token() {
            let pools = WorkerPools::new();
            let auth_checker = Arc::new(AuthChecker::new(BEARER_TEST_TOKEN));

            let client = ClientBuilder::new(Client::default())
                .with(middleware_with_token(&pools))
                .with_arc(auth_checker.clone())
                .build();

            let resp = client.get("https://example.com").send().await.unwrap();

            assert_eq!(resp.status(), http::StatusCode::OK);
            assert!(auth_checker.checked.load(Ordering::Acquire));
        }

        #[test]
        fn attached_header_is_marked_sensitive() {
            let value = authorization_value(AccessTokenRef::from_static(TEST_TOKEN)).unwrap();

            assert!(value.is_sensitive());
            assert_eq!(value.to_str().unwrap(), BEARER_TEST_TOKEN);
        }

        mod and_cache_has_no_token {
            use super::*;

            #[tokio::test]
            async fn middleware_sends_request_unauthenticated() {
                let pools = WorkerPools::new();
                let no_auth_checker = Arc::new(NoAuthChecker::default());

                let client = ClientBuilder::new(Client::default())
                    .with(middleware_without_token(&pools))
                    .with_arc(no_auth_checker.clone())
                    .build();

                let resp = client.get("https://example.com").send().await.unwrap();

                assert_eq!(resp.status(), http::StatusCode::OK);
                assert!(no_auth_checker.checked.load(Ordering::Acquire));
            }
        }
    }

    mod when_request_already_contains_an_authorization_header {
        use super::*;

        #[tokio::test]
        async fn middleware_does_not_replace_it() {
            const BEARER_OVERRIDE_TOKEN: &str = "Bearer overridden!";

            let pools = WorkerPools::new();
            let auth_checker = Arc::new(AuthChecker::new(BEARER_OVERRIDE_TOKEN));

            let client = ClientBuilder::new(Client::default())
                .with(middleware_with_token(&pools))
                .with_arc(auth_checker.clone())
                .build();

            let resp = client
                .get("https://example.com")
                .bearer_auth("overridden!")
                .send()
                .await
                .unwrap();

            assert_eq!(resp.status(), http::StatusCode::OK);
            assert!(auth_checker.checked.load(Ordering::Acquire));
        }
    }
}
