use thiserror::Error;

/// Errors surfaced by model backends.
///
/// These are transport-level failures: the backend could not be reached or
/// returned something unusable for the whole request. Per-item content
/// failures (a model producing no usable output) are *not* errors; they are
/// represented as `None` slots in the generation results.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// The backend could not be reached or the request failed in transit
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend responded, but the payload could not be interpreted
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Batch submission or batch-result retrieval failed
    #[error("Batch error: {0}")]
    Batch(String),

    /// The request itself was invalid (empty prompt, bad parameters)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// I/O error while writing or reading a batch manifest
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError::Transport(e.to_string())
    }
}
