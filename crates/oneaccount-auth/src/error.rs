//! Error types for the OneAccount middleware.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.

use axum::http::StatusCode;

/// Errors from a [`Store`](crate::store::Store) implementation.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// No live entry exists for the key (never staged, expired, or already picked up)
    #[error("no item found or item expired for key: {key}")]
    NotFound {
        /// Key that was looked up
        key: String,
    },

    /// The caller's context was cancelled before the operation started
    #[error("store operation cancelled")]
    Cancelled,

    /// Adapter store used for staging without a setter
    #[error("store setter is not set")]
    SetterMissing,

    /// Adapter store used for pickup without a getter
    #[error("store getter is not set")]
    GetterMissing,

    /// Failure reported by an external persistence layer
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a not found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a backend error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Returns true if the key simply had nothing live behind it.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors from a [`Verifier`](crate::verify::Verifier).
#[derive(thiserror::Error, Debug)]
pub enum VerifyError {
    /// HTTP transport error (connection, DNS, TLS, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Verification endpoint answered with a non-success status
    #[error("verification endpoint returned status {status}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
    },

    /// Response body was not the expected shape
    #[error("failed to parse verification response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The remote authority did not confirm the token
    #[error("token rejected by the verification endpoint")]
    Rejected,
}

impl VerifyError {
    /// Returns true if the failure happened before the remote authority answered.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

/// Errors handled locally by the middleware.
#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    /// Missing or invalid protocol field
    #[error("Validation error: {field}: {message}")]
    Validation {
        /// Field that failed validation
        field: String,
        /// Validation error message
        message: String,
    },

    /// Callback body is not a JSON object or could not be read
    #[error("cannot parse request body: {0}")]
    MalformedBody(String),

    /// Staging or pickup failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Remote verification failed
    #[error("Verification error: {0}")]
    Verification(#[from] VerifyError),

    /// Payload could not be re-serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Operation that produced an [`AuthError`], used for the client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Widget posting data to be staged
    Stage,
    /// Client exchanging a bearer token for staged data
    Authorize,
}

impl AuthError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a malformed body error.
    #[must_use]
    pub fn malformed_body(detail: impl Into<String>) -> Self {
        Self::MalformedBody(detail.into())
    }

    /// Status code sent to the client.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    /// Short client-facing message.
    ///
    /// Never contains the wrapped error text, which may carry keys or
    /// payload fragments.
    #[must_use]
    pub fn to_user_message(&self, phase: Phase) -> String {
        match (self, phase) {
            (Self::Validation { field, message }, _) => format!("{field} {message}"),
            (Self::MalformedBody(_), _) => "cannot parse request body".to_string(),
            (Self::Serialization(_), _) => "cannot process request body".to_string(),
            (Self::Store(_), Phase::Stage) => "cannot stage authorization data".to_string(),
            (Self::Store(_), Phase::Authorize) => {
                "authorization data not found or expired".to_string()
            }
            (Self::Verification(_), _) => "cannot verify the request".to_string(),
        }
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for verification.
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Result type alias for middleware operations.
pub type AuthResult<T> = Result<T, AuthError>;
