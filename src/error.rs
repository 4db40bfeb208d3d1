//! Error types for the query adapter
//!
//! Three families of failure reach callers:
//!
//! - **Validation** errors are raised before any query is issued (bad `num`,
//!   malformed duration strings).
//! - **Decode** errors describe a backend response that cannot be turned into
//!   tagged series. They always carry the request that produced the response.
//! - **Transport** errors come from the query transport or cache collaborator
//!   and are passed through with the calling operation's name attached.

use std::fmt;

use thiserror::Error;

/// Main error type for the adapter
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before any query was issued
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Backend response could not be decoded
    #[error("{0}")]
    Decode(#[from] DecodeError),

    /// Query transport or cache failure
    #[error("{operation}: {source}")]
    Transport {
        /// Name of the operation that issued the query
        operation: &'static str,
        /// Underlying transport failure
        #[source]
        source: TransportError,
    },

    /// Any failure inside a band query, reported with the band prefix
    #[error("graphiteBand: {0}")]
    Band(Box<Error>),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Wrap this error as a band failure
    pub fn into_band(self) -> Self {
        match self {
            Error::Band(_) => self,
            other => Error::Band(Box::new(other)),
        }
    }

    /// Strip the band wrapper, if any
    pub fn root(&self) -> &Error {
        match self {
            Error::Band(inner) => inner.root(),
            other => other,
        }
    }
}

/// Validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Value is out of allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Field name being validated
        field: String,
        /// The invalid value
        value: String,
        /// Minimum allowed value
        min: String,
        /// Maximum allowed value
        max: String,
    },

    /// Invalid format
    #[error("Invalid format for {field}: {message}")]
    InvalidFormat {
        /// Field name being validated
        field: String,
        /// Description of the format error
        message: String,
    },
}

/// Failure to turn one backend response into elements
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError {
    /// Error kind for programmatic handling
    pub kind: DecodeErrorKind,
    /// Render path of the request whose response failed to decode
    pub request: String,
    /// Human-readable cause
    pub message: String,
}

impl DecodeError {
    /// Create a new decode error
    pub fn new(kind: DecodeErrorKind, request: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            request: request.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graphite ParseError ({}): {}", self.request, self.message)
    }
}

impl std::error::Error for DecodeError {}

/// Categories of decode errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeErrorKind {
    /// Backend returned no series at all
    EmptyResponse,
    /// Series name has fewer segments than the format
    FormatMismatch,
    /// Tag set derived from the series name is not valid
    InvalidTagSet,
    /// Two series in one response share a tag set
    DuplicateTagSet,
    /// Datapoint does not have exactly two fields
    MalformedDatapoint,
    /// Value token is not a float
    InvalidValue,
    /// Timestamp token is not an integer
    InvalidTimestamp,
}

impl DecodeErrorKind {
    /// Stable label used for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodeErrorKind::EmptyResponse => "empty_response",
            DecodeErrorKind::FormatMismatch => "format_mismatch",
            DecodeErrorKind::InvalidTagSet => "invalid_tagset",
            DecodeErrorKind::DuplicateTagSet => "duplicate_tagset",
            DecodeErrorKind::MalformedDatapoint => "malformed_datapoint",
            DecodeErrorKind::InvalidValue => "invalid_value",
            DecodeErrorKind::InvalidTimestamp => "invalid_timestamp",
        }
    }
}

/// Errors raised by the query transport or the response cache
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request failed before a response was received
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("{url} returned status {status}")]
    Status {
        /// Full request URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Response body was not a valid render document
    #[error("invalid response body: {0}")]
    Body(String),

    /// Request could not be built
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Any other collaborator failure
    #[error("{0}")]
    Other(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display_includes_request() {
        let err = DecodeError::new(
            DecodeErrorKind::EmptyResponse,
            "/render?target=a.b",
            "empty response",
        );
        let display = err.to_string();
        assert!(display.contains("/render?target=a.b"));
        assert!(display.contains("empty response"));
    }

    #[test]
    fn test_band_wrapping_is_idempotent() {
        let err = Error::Configuration("bad".to_string()).into_band().into_band();
        assert_eq!(err.to_string(), "graphiteBand: Configuration error: bad");
        assert!(matches!(err.root(), Error::Configuration(_)));
    }

    #[test]
    fn test_transport_error_carries_operation() {
        let err = Error::Transport {
            operation: "graphite",
            source: TransportError::Other("connection refused".to_string()),
        };
        assert_eq!(err.to_string(), "graphite: connection refused");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::OutOfRange {
            field: "num".to_string(),
            value: "0".to_string(),
            min: "1".to_string(),
            max: "100".to_string(),
        };
        assert_eq!(err.to_string(), "num value 0 is out of range [1, 100]");
    }
}
