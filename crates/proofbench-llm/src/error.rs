//! Error types for proofbench-llm

use thiserror::Error;

/// Errors raised while talking to a chat-completion endpoint.
///
/// Every variant is a transport-level failure from the caller's point of
/// view: the task runner records it on the task trace and moves on.
#[derive(Error, Debug)]
pub enum ChatError {
    /// No endpoint URL was resolved
    #[error("chat endpoint is not configured")]
    NotConfigured,

    /// Request did not complete within the client timeout
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// Endpoint answered with a non-success status
    #[error("endpoint {url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// Connection, DNS or protocol failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response body was not JSON
    #[error("invalid response payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Http(err.to_string())
    }
}
