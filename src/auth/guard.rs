// Session guard
// Gates protected views on the locally held access token, without a network
// call

use std::sync::Arc;

use chrono::Utc;

use super::jwt;
use super::store::TokenStore;
use super::types::SessionState;

/// Evaluates whether a protected view may render.
///
/// Evaluation is purely local: the access token's expiry claim is decoded and
/// compared against the current time. Callers re-evaluate on every navigation
/// since elapsed time may cross the expiry boundary between navigations.
pub struct SessionGuard {
    store: Arc<dyn TokenStore>,
}

impl SessionGuard {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Evaluate the current session state
    pub fn evaluate(&self) -> SessionState {
        let Some(pair) = self.store.get() else {
            return SessionState::Unauthorized;
        };

        match jwt::decode_expiry(&pair.access) {
            Ok(expires_at) if Utc::now() < expires_at => SessionState::Authorized,
            Ok(expires_at) => {
                // An expired token has no further use and must not be replayed
                tracing::info!("Access token expired at {}, clearing session", expires_at);
                if let Err(e) = self.store.clear() {
                    tracing::warn!("Failed to clear expired session: {}", e);
                }
                SessionState::Unauthorized
            }
            Err(e) => {
                tracing::debug!("Access token not decodable: {}", e);
                SessionState::Unauthorized
            }
        }
    }
}
