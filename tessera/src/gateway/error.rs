use thiserror::Error;

/// Errors from outbound HTTP calls.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request never produced a response (connect, timeout, body).
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    /// The server answered with a non-2xx status.
    #[error("{url} responded with status {status}: {body}")]
    Status { url: String, status: u16, body: String },
}

impl GatewayError {
    /// HTTP status of the response, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
