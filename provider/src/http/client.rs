//! HTTP client implementation

use std::time::Duration;

use mzcloud_openapi::ErrorResponse;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::authn::context::CallContext;
use crate::errors::ProviderError;

/// Default timeout applied to every request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the cloud API
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str) -> Result<Self, ProviderError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a new HTTP client with a custom request timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| ProviderError::ConfigError(format!("invalid base URL {}: {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProviderError::ConfigError(format!(
                "unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mzcloud-provider/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        path: &str,
    ) -> Result<T, ProviderError> {
        let request = self.client.get(self.url(path));
        let response = self.send(ctx, "GET", path, request).await?;
        Ok(response.json().await?)
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        ctx: &CallContext,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let request = self.client.post(self.url(path)).json(body);
        let response = self.send(ctx, "POST", path, request).await?;
        Ok(response.json().await?)
    }

    /// Make a PUT request
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        ctx: &CallContext,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let request = self.client.put(self.url(path)).json(body);
        let response = self.send(ctx, "PUT", path, request).await?;
        Ok(response.json().await?)
    }

    /// Make a DELETE request, discarding any response body
    pub async fn delete(&self, ctx: &CallContext, path: &str) -> Result<(), ProviderError> {
        let request = self.client.delete(self.url(path));
        self.send(ctx, "DELETE", path, request).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        ctx: &CallContext,
        method: &str,
        path: &str,
        request: RequestBuilder,
    ) -> Result<Response, ProviderError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        debug!("{} {}{} (request {})", method, self.base_url, path, request_id);

        let request = request
            .header(header::AUTHORIZATION, ctx.token().bearer())
            .header("X-Request-Id", &request_id);

        let what = format!("{} {}", method, path);
        let response = ctx
            .run(&what, async { request.send().await.map_err(ProviderError::from) })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = error_message(response.text().await.unwrap_or_default());
            if status == reqwest::StatusCode::NOT_FOUND {
                debug!("HTTP {} {} returned 404 (request {})", method, path, request_id);
            } else {
                error!("HTTP {} failed: {} - {} (request {})", method, status, body, request_id);
            }
            return Err(ProviderError::ApiError { status, body });
        }

        Ok(response)
    }
}

/// Use the API's `detail` when the body is its error envelope, else the raw text
fn error_message(body: String) -> String {
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(ErrorResponse {
            detail: Some(detail),
            ..
        }) => detail,
        _ => body,
    }
}
