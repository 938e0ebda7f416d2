use thiserror::Error;

/// Errors raised while talking to the remote inference service.
///
/// These are the "thrown" failures of a call. A call that reaches the
/// service but is rejected by the model is reported as
/// [`PredictReply::Failure`](crate::inference::PredictReply) instead.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Endpoint {0} is not exposed by the remote app")]
    UnknownEndpoint(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, InferenceError>;
