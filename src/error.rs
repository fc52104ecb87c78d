// Error types for shoal.
// Separates remote/transport failures from the errors the sync core surfaces to callers.

use thiserror::Error;

use crate::cache::ResourceKey;

/// Errors raised while talking to the remote repository host.
#[derive(Error, Debug)]
pub enum ShoalError {
    #[error("GitHub API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Missing {0} environment variable")]
    MissingToken(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Content decoding error: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ShoalError>;

/// Errors that cross the sync core boundary.
///
/// Background and proactive refresh failures never appear here; they are
/// logged and absorbed so a cached view never regresses.
#[derive(Error, Debug)]
pub enum SyncError {
    /// No cached or seed value existed and the blocking fetch failed.
    #[error("initial fetch of {key} failed: {source}")]
    InitialFetch {
        key: ResourceKey,
        #[source]
        source: ShoalError,
    },

    /// The remote host rejected a write. Nothing was invalidated.
    #[error("mutation rejected: {source}")]
    Mutation {
        #[source]
        source: ShoalError,
    },

    /// A write was refused locally before reaching the remote host.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A key resolved to a payload of another resource type.
    #[error("{key} resolved to a {kind} payload")]
    UnexpectedResource { key: ResourceKey, kind: &'static str },
}

impl SyncError {
    /// The underlying remote error, if any.
    pub fn remote(&self) -> Option<&ShoalError> {
        match self {
            SyncError::InitialFetch { source, .. } | SyncError::Mutation { source } => {
                Some(source)
            }
            SyncError::InvalidRequest(_) | SyncError::UnexpectedResource { .. } => None,
        }
    }
}
