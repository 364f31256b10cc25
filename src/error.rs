// Error handling module
// Defines the error surface of the client API layer

use thiserror::Error;

/// Errors surfaced by workspace API operations
#[derive(Error, Debug)]
pub enum ApiError {
    /// Login or signup rejected by the backend. Never retried automatically.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// A request came back 401 even after its single refresh-and-replay
    #[error("authentication expired, log in again")]
    AuthExpired,

    /// The refresh exchange was rejected or unreachable. The stored session
    /// is cleared before this is returned; terminal for the current session.
    #[error("session refresh failed: {0}")]
    RefreshFailed(String),

    /// Any other non-success status, passed through to the caller untouched
    #[error("backend error: {status} - {message}")]
    Backend { status: u16, message: String },

    /// Transport or serialization failure
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// True for errors that should send the user back to the login entry point
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::AuthExpired | ApiError::RefreshFailed(_))
    }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
