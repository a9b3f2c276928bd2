use crate::{
    issuer::IssuerClient,
    pool::WorkerPools,
    readiness::Readiness,
    scheduler::{Job, Scheduler},
    AccessToken, Error, IssuedToken, RefreshError, TokenCacheConfig, TokenStatus,
};
use async_trait::async_trait;
use std::{
    error,
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::sync::watch;

const BEARER: &str = "Bearer";

/// A cache that keeps a current access token available
///
/// On construction the cache starts a refresh job on a named worker pool.
/// The job fetches a token from the issuer, publishes it, and schedules the
/// next fetch after a third of the token's lifetime. Failed fetches are
/// logged and retried after a fixed delay; they are never reported to
/// readers, who keep receiving the last good token.
///
/// Only the very first read can block, and only for the configured maximum
/// wait. If no token arrives in time, the getters return no token instead of
/// failing, and callers are expected to proceed unauthenticated.
///
/// Dropping the cache stops the refresh job.
#[derive(Debug)]
pub struct TokenCache {
    shared: Arc<Shared>,
    tokens: watch::Receiver<Option<Arc<IssuedToken>>>,
}

#[derive(Debug)]
struct Shared {
    config: TokenCacheConfig,
    publisher: watch::Sender<Option<Arc<IssuedToken>>>,
    ready: Readiness,
    scheduler: Scheduler,
}

impl TokenCache {
    /// Starts a cache with the default configuration
    pub fn new<I: IssuerClient>(issuer: I, pools: &WorkerPools) -> Result<Self, Error> {
        Self::with_config(issuer, TokenCacheConfig::default(), pools)
    }

    /// Starts a cache with the given configuration
    ///
    /// The first fetch is submitted to the worker pool before this returns;
    /// this constructor never waits for it. Fails only if the configured pool
    /// name is empty or the pool cannot be started.
    pub fn with_config<I: IssuerClient>(
        issuer: I,
        config: TokenCacheConfig,
        pools: &WorkerPools,
    ) -> Result<Self, Error> {
        let pool = pools.get(config.pool_name(), config.is_background())?;
        let (publisher, tokens) = watch::channel(None);
        let issuer = Arc::new(issuer);

        let shared = Arc::new_cyclic(|shared| Shared {
            config,
            publisher,
            ready: Readiness::default(),
            scheduler: Scheduler::new(
                pool,
                RefreshJob {
                    issuer,
                    shared: Weak::clone(shared),
                },
            ),
        });

        shared.scheduler.start();

        Ok(Self { shared, tokens })
    }

    /// Gets the current access token, waiting for the first one if necessary
    ///
    /// Blocks the calling thread for up to the configured maximum wait if no
    /// token has been loaded yet, and never blocks afterwards. Returns `None`
    /// if the wait elapses without a token. Async callers should prefer
    /// [`access_token_async()`][Self::access_token_async()].
    pub fn access_token(&self) -> Option<AccessToken> {
        self.wait_for_token()
            .map(|token| token.access_token().to_owned())
    }

    /// Gets the current access token formatted as an `Authorization` header
    /// value
    ///
    /// The credential part is empty when no token is available.
    pub fn bearer_token(&self) -> String {
        bearer(self.access_token())
    }

    /// Gets the current access token without blocking the runtime
    ///
    /// Same contract as [`access_token()`][Self::access_token()].
    pub async fn access_token_async(&self) -> Option<AccessToken> {
        if let Some(token) = self.current_token() {
            return Some(token.access_token().to_owned());
        }

        let mut tokens = self.tokens.clone();
        let max_wait = self.shared.config.max_wait();
        let first_token = tokens.wait_for(Option::is_some);
        let token = match tokio::time::timeout(max_wait, first_token).await {
            Ok(Ok(token)) => token.as_ref().map(|t| t.access_token().to_owned()),
            Ok(Err(_)) | Err(_) => {
                log_readiness_timeout(max_wait);
                None
            }
        };
        token
    }

    /// Gets the current access token as an `Authorization` header value
    /// without blocking the runtime
    pub async fn bearer_token_async(&self) -> String {
        bearer(self.access_token_async().await)
    }

    /// Gets the most recently published token, without waiting
    pub fn current_token(&self) -> Option<Arc<IssuedToken>> {
        self.tokens.borrow().clone()
    }

    /// Whether a token has been loaded at least once
    pub fn is_ready(&self) -> bool {
        self.shared.ready.is_ready()
    }

    /// Stops refreshing
    ///
    /// A fetch that is already running may still publish its token. The last
    /// published token remains readable.
    pub fn close(&self) {
        if self.shared.scheduler.shutdown() {
            tracing::info!("token cache closed, no further refreshes");
        }
    }

    fn wait_for_token(&self) -> Option<Arc<IssuedToken>> {
        if let Some(token) = self.current_token() {
            if tracing::enabled!(tracing::Level::DEBUG)
                && token.token_status() == TokenStatus::Expired
            {
                tracing::debug!(
                    lifetime_secs = token.lifetime().as_secs(),
                    "serving expired token, issuer has not provided a new one"
                );
            }
            return Some(token);
        }

        let max_wait = self.shared.config.max_wait();
        if !self.shared.ready.wait(max_wait) {
            log_readiness_timeout(max_wait);
        }

        self.current_token()
    }
}

impl Drop for TokenCache {
    fn drop(&mut self) {
        self.close();
    }
}

fn bearer(token: Option<AccessToken>) -> String {
    match token {
        Some(token) => format!("{} {}", BEARER, token.as_str()),
        None => format!("{} ", BEARER),
    }
}

fn log_readiness_timeout(max_wait: Duration) {
    tracing::error!(
        max_wait_ms = max_wait.as_millis() as u64,
        "could not load token within max wait, continuing without token"
    );
}

impl Shared {
    fn publish(&self, token: IssuedToken) {
        tracing::info!(
            lifetime_secs = token.lifetime().as_secs(),
            refresh_delay_secs = token.refresh_delay().as_secs(),
            "received new token"
        );
        self.publisher.send_replace(Some(Arc::new(token)));
        self.ready.release();
    }
}

struct RefreshJob<I> {
    issuer: Arc<I>,
    shared: Weak<Shared>,
}

impl<I: IssuerClient> RefreshJob<I> {
    async fn load_token(&self, config: &TokenCacheConfig) -> Result<IssuedToken, RefreshError> {
        let issuer = Arc::clone(&self.issuer);
        // Run the fetch as its own task so a panicking issuer cannot end the
        // refresh chain.
        let resource = tokio::spawn(async move { issuer.fetch_token().await })
            .await
            .map_err(|join| RefreshError::FetchFailure(Box::new(join)))?
            .map_err(|error| RefreshError::FetchFailure(Box::new(error)))?;

        let access_token = resource
            .access_token()
            .ok_or(RefreshError::EmptyCredential)?;

        Ok(config.issue(access_token, resource.lifetime_secs()))
    }
}

#[async_trait]
impl<I: IssuerClient> Job for RefreshJob<I> {
    async fn run(&self) {
        let shared = match self.shared.upgrade() {
            Some(shared) => shared,
            None => {
                tracing::trace!("token cache dropped, not refreshing");
                return;
            }
        };

        tracing::debug!("requesting new token");
        let delay = match self.load_token(&shared.config).await {
            Ok(token) => {
                let delay = token.refresh_delay();
                shared.publish(token);
                delay
            }
            Err(error) => {
                let delay = shared.config.retry_after_failure();
                tracing::warn!(
                    error = (&error as &dyn error::Error),
                    delay_ms = delay.as_millis() as u64,
                    "error loading token, will retry"
                );
                delay
            }
        };

        shared.scheduler.schedule_after(delay);
        tracing::debug!(delay_ms = delay.as_millis() as u64, "next load scheduled");
    }
}
