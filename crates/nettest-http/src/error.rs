//! Errors of the HTTP client.

use nettest_core::MockError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("malformed response: {0}")]
    Parse(#[from] httparse::Error),
    #[error("connection closed before the response head was complete")]
    Incomplete,
    #[error("invalid Content-Length header: {0}")]
    ContentLength(String),
    #[error("invalid URL: {0}")]
    Url(#[from] ::url::ParseError),
    #[error("unsupported URL: {0}")]
    UnsupportedUrl(String),
    #[error("no request has been sent on this connection")]
    NoRequest,
}

impl HttpError {
    /// True if a network blocker refused to open the socket.
    pub fn is_network_blocked(&self) -> bool {
        matches!(self, HttpError::Io(err) if nettest_core::is_network_blocked(err))
    }

    /// Mock configuration error raised while the request was being sent.
    pub fn mock_error(&self) -> Option<&MockError> {
        match self {
            HttpError::Io(err) => err.get_ref()?.downcast_ref::<MockError>(),
            _ => None,
        }
    }
}
