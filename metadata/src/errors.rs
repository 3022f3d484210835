use http::StatusCode;
use thiserror::Error;

/// Result type alias for metadata operations
pub type Result<T, E = MetadataError> = std::result::Result<T, E>;

/// Failures that stop a single fetch. Everything else is recovered from while
/// decoding and only removes the affected item from the snapshot.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("metadata request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("metadata server returned {0}")]
    Status(StatusCode),

    #[error("could not decode metadata: {0}")]
    Decode(#[from] serde_json::Error),
}
