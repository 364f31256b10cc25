// Typed client for the Salvage REST backend

use std::sync::Arc;

use anyhow::Context;
use reqwest::{Response, StatusCode};

use crate::auth::{Credentials, TokenPair, TokenStore};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::http_client::SalvageHttpClient;
use crate::models::{NewFile, SourceFile, TranspileRequest, TranspileResponse};

/// Client for the workspace backend.
///
/// Protected calls go through the renewal-aware transport; the credential
/// endpoints bypass it. The token store is written here only by the login
/// and logout flows.
pub struct SalvageApi {
    http: SalvageHttpClient,
    base_url: String,
    store: Arc<dyn TokenStore>,
}

impl SalvageApi {
    pub fn new(
        base_url: &str,
        store: Arc<dyn TokenStore>,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> anyhow::Result<Self> {
        let http = SalvageHttpClient::new(store.clone(), base_url, connect_timeout, request_timeout)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
        })
    }

    pub fn from_config(config: &Config, store: Arc<dyn TokenStore>) -> anyhow::Result<Self> {
        Self::new(
            &config.api_url,
            store,
            config.http_connect_timeout,
            config.http_request_timeout,
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange username/password for a credential pair and store it
    pub async fn login(&self, credentials: &Credentials) -> Result<()> {
        let request = self
            .http
            .client()
            .post(self.url("/api/token/"))
            .json(credentials)
            .build()
            .context("Failed to build login request")?;

        let response = self.http.execute_no_refresh(request).await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::InvalidCredentials(error_detail(&body)));
        }
        let response = check_response(response).await?;

        let pair: TokenPair = response
            .json()
            .await
            .context("Failed to parse login response")?;
        self.store.set(&pair).map_err(ApiError::Internal)?;

        tracing::info!("Logged in");
        Ok(())
    }

    /// Create an account. Does not log in; callers follow up with `login`.
    pub async fn signup(&self, credentials: &Credentials) -> Result<()> {
        let request = self
            .http
            .client()
            .post(self.url("/api/signup/"))
            .json(credentials)
            .build()
            .context("Failed to build signup request")?;

        let response = self.http.execute_no_refresh(request).await?;

        if response.status() == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::InvalidCredentials(error_detail(&body)));
        }
        check_response(response).await?;

        Ok(())
    }

    /// Drop the local session. The backend holds no session state to revoke.
    pub fn logout(&self) -> Result<()> {
        self.store.clear().map_err(ApiError::Internal)?;
        tracing::info!("Logged out");
        Ok(())
    }

    /// Fetch the caller's file records
    pub async fn list_files(&self) -> Result<Vec<SourceFile>> {
        let request = self
            .http
            .client()
            .get(self.url("/api/files/"))
            .build()
            .context("Failed to build file listing request")?;

        let response = check_response(self.http.execute(request).await?).await?;

        response
            .json()
            .await
            .context("Failed to parse file listing")
            .map_err(ApiError::Internal)
    }

    /// Store a new file record
    pub async fn save_file(&self, file: &NewFile) -> Result<SourceFile> {
        let request = self
            .http
            .client()
            .post(self.url("/api/files/"))
            .json(file)
            .build()
            .context("Failed to build file save request")?;

        let response = check_response(self.http.execute(request).await?).await?;

        response
            .json()
            .await
            .context("Failed to parse stored file record")
            .map_err(ApiError::Internal)
    }

    /// Delete a file record by id
    pub async fn delete_file(&self, id: i64) -> Result<()> {
        let request = self
            .http
            .client()
            .delete(self.url(&format!("/api/files/{}/", id)))
            .build()
            .context("Failed to build file delete request")?;

        check_response(self.http.execute(request).await?).await?;
        Ok(())
    }

    /// Submit C code for transpilation and return the produced Rust code
    pub async fn transpile(&self, code: &str) -> Result<String> {
        let request = self
            .http
            .client()
            .post(self.url("/transpiler/transpile/"))
            .json(&TranspileRequest {
                code: code.to_string(),
            })
            .build()
            .context("Failed to build transpile request")?;

        let response = check_response(self.http.execute(request).await?).await?;

        let data: TranspileResponse = response
            .json()
            .await
            .context("Failed to parse transpile response")
            .map_err(ApiError::Internal)?;
        Ok(data.rust_code)
    }
}

/// Pass successful responses through; surface everything else untouched as a
/// backend error for the caller to interpret
async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let message = response.text().await.unwrap_or_default();
        Err(ApiError::Backend {
            status: status.as_u16(),
            message,
        })
    }
}

/// Pull the human-readable detail out of a DRF error body, falling back to
/// the raw body
fn error_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(detail) = value.get("detail").and_then(|v| v.as_str()) {
            return detail.to_string();
        }
        if let Some(error) = value.get("error").and_then(|v| v.as_str()) {
            return error.to_string();
        }
    }
    body.to_string()
}
