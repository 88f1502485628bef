//! Error types for the frontdesk client.
//!
//! The unified [`Error`] keeps the failure classes a caller needs to tell
//! apart: the network, the API answering with a non-success status, the
//! session having ended, the local credential store, and bad input.

use std::fmt;
use thiserror::Error;

/// The unified error type for frontdesk operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (DNS, TLS, connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The API answered with a non-success status.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// The session is over or could not be established.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// The local credential store failed.
    #[error("credential store error: {0}")]
    Store(#[from] StoreError),

    /// Input validation errors (base URL, header values, endpoint patterns).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

impl Error {
    /// Returns the API error if this is a non-success HTTP response.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true if the session ended and the user has to sign in again.
    pub fn is_session_ended(&self) -> bool {
        matches!(self, Error::Session(SessionError::Ended { .. }))
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The response body could not be decoded.
    #[error("invalid response body: {message}")]
    Decode { message: String },

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout { duration_ms: 0 }
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else if err.is_decode() {
            TransportError::Decode {
                message: err.to_string(),
            }
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(TransportError::from(err))
    }
}

/// A non-success response from the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code.
    pub status: u16,
    /// Machine-readable error code (if present).
    pub error: Option<String>,
    /// Error message from the server.
    pub message: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref error) = self.error {
            write!(f, " [{}]", error)?;
        }
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: u16, error: Option<String>, message: Option<String>) -> Self {
        Self {
            status,
            error,
            message,
        }
    }

    /// Check if the status says the presented credential was not accepted.
    pub fn is_auth_failure(&self) -> bool {
        self.status == 401 || self.status == 403
    }
}

/// Why a session was torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalReason {
    /// The session service rejected the refresh token.
    RefreshRejected,
    /// The session service could not be reached during the exchange.
    RefreshUnreachable { message: String },
    /// There was no refresh token to exchange.
    NoRefreshToken,
    /// A liveness check reported the refresh token as revoked.
    Revoked,
    /// Renewed tokens could not be written to the credential store.
    StoreFailure { message: String },
    /// The user signed out while a renewal was in flight.
    SignedOut,
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalReason::RefreshRejected => write!(f, "refresh token rejected"),
            TerminalReason::RefreshUnreachable { message } => {
                write!(f, "session service unreachable: {}", message)
            }
            TerminalReason::NoRefreshToken => write!(f, "no refresh token"),
            TerminalReason::Revoked => write!(f, "refresh token revoked"),
            TerminalReason::StoreFailure { message } => {
                write!(f, "credential store failed: {}", message)
            }
            TerminalReason::SignedOut => write!(f, "signed out"),
        }
    }
}

/// Session lifecycle errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session ended; the caller must sign in again.
    #[error("session ended, please sign in again")]
    Ended { reason: TerminalReason },

    /// The login endpoint refused the supplied credentials.
    #[error("login rejected: {0}")]
    LoginRejected(ApiError),

    /// The coordinator dropped the waiter without settling it.
    #[error("session renewal was interrupted")]
    Interrupted,
}

/// Credential store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The stored credentials could not be (de)serialized.
    #[error("malformed credential file: {0}")]
    Format(#[from] serde_json::Error),
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid API base URL.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// Invalid exempt endpoint pattern.
    #[error("invalid endpoint pattern '{value}': {reason}")]
    EndpointPattern { value: String, reason: String },

    /// A token contained characters not allowed in an HTTP header.
    #[error("token is not a valid header value")]
    HeaderValue,

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}
