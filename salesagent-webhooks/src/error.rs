//! Typed error handling for webhook delivery.
//!
//! Delivery failures are data, not control flow. Each failed attempt is
//! classified as either:
//! - Temporary (non-2xx status, timeout, transport failure) - retried up to
//!   the attempt cap
//! - Fatal (anything unclassified) - no further attempts to that receiver

use thiserror::Error;

/// Failure of a single delivery attempt to one receiver.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Failure that may succeed on another attempt.
    #[error("Temporary failure: {0}")]
    Temporary(#[from] TemporaryError),

    /// Failure that aborts delivery to this receiver.
    #[error("Fatal failure: {0}")]
    Fatal(#[from] FatalError),
}

/// Retryable failures.
#[derive(Debug, Error)]
pub enum TemporaryError {
    /// Receiver answered with a status outside `[200, 300)`.
    #[error("Receiver returned HTTP {0}")]
    Status(u16),

    /// The attempt exceeded the per-attempt timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection refused, DNS failure, reset, and similar.
    #[error("Transport failure: {0}")]
    Transport(String),
}

/// Failures that are not retried.
#[derive(Debug, Error)]
pub enum FatalError {
    /// Header material from the receiver configuration cannot be sent.
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: &'static str, reason: String },

    /// The request could not be built (bad URL, body serialisation).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Anything the client reported that is not otherwise classified.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Errors building a notifier from configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration value is out of range.
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl DeliveryError {
    /// Returns `true` if another attempt may be made.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    /// Returns `true` if delivery to this receiver must stop.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// HTTP status returned by the receiver, if the failure came from one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Temporary(TemporaryError::Status(code)) => Some(*code),
            _ => None,
        }
    }
}

/// Classify a client error.
///
/// - timeouts → Temporary
/// - connection / request transmission errors → Temporary
/// - an error carrying a status → Temporary (status)
/// - builder, body, decode, redirect and the rest → Fatal
impl From<reqwest::Error> for DeliveryError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Temporary(TemporaryError::Timeout(error.to_string()));
        }

        if error.is_connect() || error.is_request() {
            return Self::Temporary(TemporaryError::Transport(error.to_string()));
        }

        if let Some(status) = error.status() {
            return Self::Temporary(TemporaryError::Status(status.as_u16()));
        }

        if error.is_builder() {
            return Self::Fatal(FatalError::InvalidRequest(error.to_string()));
        }

        Self::Fatal(FatalError::Unexpected(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_is_temporary() {
        let error = DeliveryError::Temporary(TemporaryError::Status(503));
        assert!(error.is_temporary());
        assert!(!error.is_fatal());
        assert_eq!(error.status(), Some(503));
    }

    #[test]
    fn test_delivery_error_is_fatal() {
        let error = DeliveryError::Fatal(FatalError::Unexpected("boom".to_string()));
        assert!(error.is_fatal());
        assert!(!error.is_temporary());
        assert_eq!(error.status(), None);
    }

    #[test]
    fn test_error_display() {
        let error = DeliveryError::Temporary(TemporaryError::Status(500));
        assert_eq!(error.to_string(), "Temporary failure: Receiver returned HTTP 500");

        let error = DeliveryError::Fatal(FatalError::InvalidHeader {
            name: "Authorization",
            reason: "contains a newline".to_string(),
        });
        assert_eq!(
            error.to_string(),
            "Fatal failure: Invalid header Authorization: contains a newline"
        );
    }

    #[test]
    fn test_builder_error_is_fatal() {
        let client = reqwest::blocking::Client::new();
        let error = client
            .post("not a url")
            .send()
            .expect_err("relative URL must be rejected");
        let delivery_err: DeliveryError = error.into();
        assert!(delivery_err.is_fatal());
    }

    #[test]
    fn test_connection_refused_is_temporary() {
        let client = reqwest::blocking::Client::new();
        // Port 9 (discard) on localhost is closed in test environments
        let error = client
            .post("http://127.0.0.1:9/hook")
            .send()
            .expect_err("nothing listens on the discard port");
        let delivery_err: DeliveryError = error.into();
        assert!(delivery_err.is_temporary());
    }
}
