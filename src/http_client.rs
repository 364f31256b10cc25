// HTTP transport with bearer attachment and transparent session renewal

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Request, Response, StatusCode};

use crate::auth::{RefreshCoordinator, TokenStore};
use crate::error::ApiError;

/// A transform applied to an outbound request immediately before
/// transmission, in registration order.
///
/// Replays run the pipeline again, so a replayed request always reflects the
/// most recently stored credential.
pub trait RequestTransform: Send + Sync {
    fn apply(&self, request: &mut Request);
}

/// Attaches the stored access credential as a bearer header. Requests are
/// forwarded unmodified when no session is held.
pub struct BearerAuth {
    store: Arc<dyn TokenStore>,
}

impl BearerAuth {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }
}

impl RequestTransform for BearerAuth {
    fn apply(&self, request: &mut Request) {
        if let Some(pair) = self.store.get() {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", pair.access)) {
                request.headers_mut().insert(AUTHORIZATION, value);
            }
        }
    }
}

/// Stamps a short id on each outbound request for log correlation
pub struct RequestTag;

impl RequestTransform for RequestTag {
    fn apply(&self, request: &mut Request) {
        let id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        tracing::debug!(
            request_id = %id,
            method = %request.method(),
            url = %request.url(),
            "Sending HTTP request"
        );
        if let Ok(value) = HeaderValue::from_str(&id) {
            request.headers_mut().insert("x-request-id", value);
        }
    }
}

/// Retry state carried alongside a request. Immutable; a replay gets a new
/// context rather than mutating a tag on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    attempts: u32,
}

impl RequestContext {
    pub fn first() -> Self {
        Self { attempts: 0 }
    }

    pub fn replayed(self) -> Self {
        Self {
            attempts: self.attempts + 1,
        }
    }

    pub fn already_replayed(&self) -> bool {
        self.attempts > 0
    }
}

/// HTTP client for the workspace backend.
///
/// Runs the transform pipeline before every transmission and renews the
/// session on authorization failures: a 401 triggers one refresh exchange
/// and one replay of the original request, nothing more.
pub struct SalvageHttpClient {
    client: Client,
    transforms: Vec<Box<dyn RequestTransform>>,
    coordinator: Arc<RefreshCoordinator>,
}

impl SalvageHttpClient {
    pub fn new(
        store: Arc<dyn TokenStore>,
        base_url: &str,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            client.clone(),
            base_url,
        ));

        let transforms: Vec<Box<dyn RequestTransform>> =
            vec![Box::new(RequestTag), Box::new(BearerAuth::new(store))];

        Ok(Self {
            client,
            transforms,
            coordinator,
        })
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Execute a request with transparent session renewal.
    ///
    /// Only 401 is intercepted; every other status passes through untouched
    /// for the caller to interpret. A request still unauthorized after its
    /// single replay surfaces as an authentication failure.
    pub async fn execute(&self, request: Request) -> std::result::Result<Response, ApiError> {
        self.execute_internal(request, true).await
    }

    /// Execute a request without the renewal path. For the credential
    /// endpoints themselves, where a 401 means bad credentials rather than a
    /// stale session.
    pub async fn execute_no_refresh(
        &self,
        request: Request,
    ) -> std::result::Result<Response, ApiError> {
        self.execute_internal(request, false).await
    }

    async fn execute_internal(
        &self,
        request: Request,
        renew_session: bool,
    ) -> std::result::Result<Response, ApiError> {
        let mut context = RequestContext::first();

        loop {
            let mut req = request.try_clone().ok_or_else(|| {
                ApiError::Internal(anyhow::anyhow!("Request body is not cloneable"))
            })?;

            // Pipeline runs immediately before transmission, including on
            // replays
            for transform in &self.transforms {
                transform.apply(&mut req);
            }
            let sent_access = bearer_token(&req).unwrap_or_default();

            let response = self
                .client
                .execute(req)
                .await
                .map_err(|e| ApiError::Internal(anyhow::Error::new(e).context("HTTP request failed")))?;

            if response.status() != StatusCode::UNAUTHORIZED || !renew_session {
                return Ok(response);
            }

            if context.already_replayed() {
                tracing::warn!("Request unauthorized after replay, giving up");
                return Err(ApiError::AuthExpired);
            }

            tracing::debug!("Received 401, renewing session before replay");
            self.coordinator.refresh(&sent_access).await?;
            context = context.replayed();
        }
    }
}

/// Bearer token a prepared request carries, if any
fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}
