// Session types

use serde::{Deserialize, Serialize};

/// Login/signup form data. Transient: exists only for the duration of the
/// call, never persisted.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The credential pair held for the current session.
///
/// `access` is a signed token carrying its own expiry; `refresh` is an opaque
/// longer-lived secret. At most one pair exists at a time; the TokenStore
/// replaces it wholesale on every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Locally evaluated authorization state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No evaluation has completed yet. Transient; callers must not treat
    /// this as either authorized or unauthorized.
    Unknown,

    /// A well-formed, unexpired access token is held
    Authorized,

    /// No token, a malformed token, or an expired token
    Unauthorized,
}

/// Body of the refresh exchange request
#[derive(Debug, Serialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Refresh exchange response: a new access token only. The refresh token is
/// unchanged and must be merged into the existing pair by the caller.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}
