//! Crate-wide error types.
//!
//! Each component gets a focused `thiserror` enum; [`AppError`] aggregates
//! them at the boundaries (road service orchestration, the dev API).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error calling {provider}: {message}")]
    Network { provider: &'static str, message: String },

    #[error("{provider} returned an unparsable response: {message}")]
    Parse { provider: &'static str, message: String },

    #[error("{provider} request timed out")]
    Timeout { provider: &'static str },

    #[error("no {0} configured")]
    NotConfigured(&'static str),

    #[error("all {provider} endpoints exhausted after {attempts} attempts")]
    EndpointsExhausted { provider: &'static str, attempts: u32 },
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to serialize cache payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not geocode origin {0:?}")]
    OriginNotFound(String),

    #[error("could not geocode destination {0:?}")]
    DestinationNotFound(String),

    #[error("routing provider returned no route between origin and destination")]
    NoRoute,

    #[error("aborting: {failed} of {attempted} POI searches failed ({reason})")]
    SystemicUpstreamFailure {
        failed: u32,
        attempted: u32,
        reason: &'static str,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
