//! Error types

use std::error;
use thiserror::Error;

/// Errors raised while constructing caches and worker pools
///
/// These are reported at the call site and never retried.
#[derive(Debug, Error)]
pub enum Error {
    /// An argument violated the documented contract
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The worker runtime for a pool could not be started
    #[error("unable to start worker pool `{name}`")]
    PoolStart {
        /// The thread name prefix of the pool
        name: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// The reason a refresh attempt did not produce a new token
///
/// These never reach callers of the token getters. The refresh loop logs
/// them and tries again after the configured retry delay.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The issuer could not be reached or rejected the request
    #[error("error fetching token from issuer")]
    FetchFailure(#[source] Box<dyn error::Error + Send + Sync + 'static>),
    /// The issuer answered without a usable access token
    #[error("issuer response did not contain an access token")]
    EmptyCredential,
}
