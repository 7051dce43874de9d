//! Error types raised by mocks and the network blocker.

use std::io;
use thiserror::Error;

/// Configuration error in a mock definition.
#[derive(Debug, Error)]
pub enum MockError {
    /// Endpoint lookup by an identifier that is not defined
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),
    /// Two endpoints in one set share an identifier
    #[error("duplicate endpoint: {0}")]
    DuplicateEndpoint(String),
    /// Endpoint match pattern is not a valid regular expression
    #[error("invalid match pattern for endpoint '{operation_id}': {source}")]
    InvalidPattern {
        operation_id: String,
        #[source]
        source: regex::Error,
    },
    /// Response generator produced neither a status/body pair nor a raw payload
    #[error("endpoint '{operation_id}' produced an invalid response: {reason}")]
    InvalidResponse { operation_id: String, reason: String },
    /// Status code outside `100..=999`
    #[error("status code {0} is not a three-digit HTTP status")]
    InvalidStatus(u16),
    /// Raw response payload is neither text nor bytes
    #[error("raw response payload must be text or bytes, got {0}")]
    InvalidRawPayload(String),
    /// Structured body could not be serialized
    #[error("failed to serialize response body: {0}")]
    Body(#[from] serde_json::Error),
}

impl From<MockError> for io::Error {
    fn from(err: MockError) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, err)
    }
}

/// Raised when a strict [`NetworkBlocker`](crate::NetworkBlocker) sees a socket being opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("A test that should not be doing so opened a network connection.")]
pub struct NetworkBlocked;

impl From<NetworkBlocked> for io::Error {
    fn from(err: NetworkBlocked) -> Self {
        io::Error::new(io::ErrorKind::PermissionDenied, err)
    }
}

/// True if `err` was produced by a strict network blocker.
pub fn is_network_blocked(err: &io::Error) -> bool {
    err.get_ref().is_some_and(|inner| inner.is::<NetworkBlocked>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_network_blocked_roundtrip_through_io_error() {
        let err: io::Error = NetworkBlocked.into();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(is_network_blocked(&err));
        assert_eq!(
            err.to_string(),
            "A test that should not be doing so opened a network connection."
        );
    }

    #[rstest]
    #[case(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))]
    #[case(io::Error::from(io::ErrorKind::ConnectionRefused))]
    #[case(MockError::UnknownEndpoint("test".into()).into())]
    fn test_other_errors_are_not_network_blocked(#[case] err: io::Error) {
        assert!(!is_network_blocked(&err));
    }

    #[rstest]
    fn test_mock_error_display() {
        let err = MockError::InvalidResponse {
            operation_id: "getUser".into(),
            reason: "expected [status, body]".into(),
        };
        let display = err.to_string();
        assert!(display.contains("getUser"));
        assert!(display.contains("expected [status, body]"));
    }
}
