use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure kinds surfaced by an embedding provider.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EmbedError {
    #[error("embedding provider rejected the credentials: {0}")]
    Unauthenticated(String),

    #[error("{}", rate_limited_message(.message, .quota_exhausted))]
    RateLimited { message: String, quota_exhausted: bool },

    #[error("embedding request timed out after {0:?}")]
    Timeout(Duration),

    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),

    #[error("invalid embedding request: {0}")]
    InvalidRequest(String),
}

fn rate_limited_message(message: &str, quota_exhausted: &bool) -> String {
    if *quota_exhausted {
        format!("embedding quota or credit exhausted: {message}")
    } else {
        format!("embedding provider rate limited the request: {message}")
    }
}

impl EmbedError {
    /// Worth retrying after a pause. Exhausted quota never is.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { quota_exhausted, .. } => !quota_exhausted,
            Self::Timeout(_) | Self::Unavailable(_) => true,
            Self::Unauthenticated(_) | Self::InvalidRequest(_) => false,
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, Self::RateLimited { quota_exhausted: true, .. })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Chunking failed for {path}: {reason}")]
    Chunking { path: String, reason: String },

    #[error("Index at {path} is unreadable: {reason}")]
    CacheCorruption { path: PathBuf, reason: String },

    #[error("Embedding batch {batch}/{batches} failed (files: {}): {source}", .files.join(", "))]
    Embedding {
        batch: usize,
        batches: usize,
        files: Vec<String>,
        #[source]
        source: EmbedError,
    },

    #[error("Embedding batch {batch}/{batches} was rejected (files: {}): {source}", .files.join(", "))]
    BatchRejected {
        batch: usize,
        batches: usize,
        files: Vec<String>,
        #[source]
        source: Box<Error>,
    },

    #[error("Embedding the query failed: {0}")]
    QueryEmbedding(#[source] EmbedError),

    #[error("Embedding dimensionality mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index was built with model '{index_model}' but the provider uses '{provider_model}'; rebuild with --force")]
    ModelMismatch { index_model: String, provider_model: String },

    #[error("Embedding provider returned {actual} vectors for {expected} texts")]
    MalformedResponse { expected: usize, actual: usize },

    #[error("Build cancelled after {completed}/{total} batches; completed batches were saved")]
    Cancelled { completed: usize, total: usize },

    #[error("Another build holds the lock at {0}")]
    Locked(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
