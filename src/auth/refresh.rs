// Token refresh logic
//
// Single point of truth for "the access credential died, get a new one or
// give up". Every other component treats authorization transparently and
// never special-cases 401 itself.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::sync::Mutex;

use super::store::TokenStore;
use super::types::{RefreshRequest, RefreshResponse, TokenPair};
use crate::error::ApiError;

/// Exchanges the refresh credential for a new access credential.
///
/// Concurrent 401s share a single in-flight exchange: the first caller holds
/// the flight lock while refreshing, queued callers observe the replaced
/// token on wake-up and adopt it instead of issuing their own exchange.
/// Two exchanges racing against the same refresh credential could trip
/// backend-side refresh-token rotation and invalidate the session.
pub struct RefreshCoordinator {
    store: Arc<dyn TokenStore>,
    client: Client,
    refresh_url: String,
    flight: Mutex<()>,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<dyn TokenStore>, client: Client, base_url: &str) -> Self {
        Self {
            store,
            client,
            refresh_url: format!("{}/api/token/refresh/", base_url.trim_end_matches('/')),
            flight: Mutex::new(()),
        }
    }

    /// Renew the access token, or clear the session and give up.
    ///
    /// `stale_access` is the access token the failed request carried, used to
    /// detect that a concurrent caller already completed the renewal.
    pub async fn refresh(&self, stale_access: &str) -> std::result::Result<String, ApiError> {
        let _flight = self.flight.lock().await;

        let pair = match self.store.get() {
            Some(pair) if pair.access != stale_access => {
                tracing::debug!("Adopting access token renewed by a concurrent caller");
                return Ok(pair.access);
            }
            Some(pair) => pair,
            // No refresh credential held: fail without a network call
            None => return self.fail("no refresh credential held"),
        };

        match self.exchange(&pair.refresh).await {
            Ok(access) => {
                // Merge the new access token into the pair; the refresh
                // credential is unchanged
                let renewed = TokenPair {
                    access: access.clone(),
                    refresh: pair.refresh,
                };
                self.store.set(&renewed).map_err(ApiError::Internal)?;
                tracing::info!("Access token renewed");
                Ok(access)
            }
            Err(e) => self.fail(&format!("{:#}", e)),
        }
    }

    /// Failure handling: drop the session and surface a terminal error
    fn fail(&self, reason: &str) -> std::result::Result<String, ApiError> {
        tracing::warn!("Session refresh failed: {}", reason);
        if let Err(e) = self.store.clear() {
            tracing::warn!("Failed to clear session after refresh failure: {}", e);
        }
        Err(ApiError::RefreshFailed(reason.to_string()))
    }

    async fn exchange(&self, refresh: &str) -> Result<String> {
        let request = RefreshRequest {
            refresh: refresh.to_string(),
        };

        let response = self
            .client
            .post(&self.refresh_url)
            .json(&request)
            .send()
            .await
            .context("Failed to send refresh request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("refresh endpoint answered {} - {}", status, body);
        }

        let data: RefreshResponse = response
            .json()
            .await
            .context("Failed to parse refresh response")?;

        if data.access.is_empty() {
            anyhow::bail!("refresh response does not contain an access token");
        }

        Ok(data.access)
    }
}
