use thiserror::Error;

/// Failures of the match REST endpoints
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    /// No usable response: connection refused, reset, timed out
    #[error("network error: {0}")]
    Network(String),
    #[error("unauthorized")]
    Unauthorized { message: Option<String> },
    #[error("match not found")]
    NotFound { message: Option<String> },
    #[error("server answered with status {status}")]
    Server { status: u16, message: Option<String> },
    /// A body that could not be read: a success without a match, or an error page that is not JSON
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// The `message` the server attached to a non-OK answer
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { message }
            | ApiError::NotFound { message }
            | ApiError::Server { message, .. } => message.as_deref(),
            ApiError::Network(_) | ApiError::Decode(_) => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}

/// Failures of the event stream subscription, always recovered by reconnecting
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StreamError {
    #[error("event stream transport failed: {0}")]
    Transport(String),
    #[error("subscription refused with status {0}")]
    Rejected(u16),
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        StreamError::Transport(err.to_string())
    }
}
