//! HTTP client for the backend API (AI matching, email, attachments,
//! resume parsing, runtime config).
//!
//! Every call carries the shared `X-API-Key`. Tenant-scoped calls also send
//! `X-Tenant-ID` and, when available, the caller's bearer token.

use anyhow::{Context, Result};
use reqwest::{multipart::Form, Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::ApiError;

/// Message used when the backend cannot be reached at all.
pub const NETWORK_ERROR_MESSAGE: &str =
    "ネットワークエラーが発生しました。接続を確認してください。";

/// Caller identity forwarded to the backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendAuth<'a> {
    pub tenant_id: Option<&'a str>,
    pub access_token: Option<&'a str>,
}

impl<'a> BackendAuth<'a> {
    pub fn tenant(tenant_id: &'a str, access_token: Option<&'a str>) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            access_token,
        }
    }
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl BackendClient {
    pub fn new(base_url: &str, api_key: &str, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create backend HTTP client")?;

        tracing::info!(base_url = base_url, "Backend client initialized");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, req: RequestBuilder, auth: BackendAuth<'_>) -> RequestBuilder {
        let mut req = req
            .header("X-API-Key", &self.api_key)
            .header("Accept", "application/json");
        if let Some(tenant_id) = auth.tenant_id {
            req = req.header("X-Tenant-ID", tenant_id);
        }
        if let Some(token) = auth.access_token {
            req = req.bearer_auth(token);
        }
        req
    }

    pub async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        auth: BackendAuth<'_>,
    ) -> Result<R, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "Backend GET");
        let req = self.authorize(self.client.get(&url), auth).query(query);
        Self::send(req).await
    }

    pub async fn post<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
        auth: BackendAuth<'_>,
    ) -> Result<R, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "Backend POST");
        let req = self.authorize(self.client.post(&url), auth).json(body);
        Self::send(req).await
    }

    pub async fn put<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        auth: BackendAuth<'_>,
    ) -> Result<R, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "Backend PUT");
        let req = self.authorize(self.client.put(&url), auth).query(query);
        Self::send(req).await
    }

    /// Multipart POST to an absolute URL (the resume parser may live on
    /// another host).
    pub async fn post_multipart<R: DeserializeOwned>(
        &self,
        url: &str,
        form: Form,
        auth: BackendAuth<'_>,
    ) -> Result<R, ApiError> {
        debug!(url = %url, "Backend multipart POST");
        let req = self.authorize(self.client.post(url), auth).multipart(form);
        Self::send(req).await
    }

    /// GET without the API key; used by public health endpoints.
    pub async fn get_public<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        let req = self
            .client
            .get(self.url(path))
            .timeout(Duration::from_secs(5));
        Self::send(req).await
    }

    /// Download raw bytes from an arbitrary URL (resume files in storage).
    pub async fn download(&self, url: &str) -> Result<(Vec<u8>, Option<String>), ApiError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            error!(error = %e, "Download request failed");
            ApiError::Upstream {
                status: 503,
                message: NETWORK_ERROR_MESSAGE.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Upstream {
                status: status.as_u16(),
                message: format!("Download failed: {}", status),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::internal(format!("Failed to read download: {}", e)))?;

        Ok((bytes.to_vec(), content_type))
    }

    pub async fn health_check(&self) -> Result<()> {
        self.client
            .get(self.url("/health"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .context("Backend API health check failed")?
            .error_for_status()
            .context("Backend API unhealthy")?;

        Ok(())
    }

    async fn send<R: DeserializeOwned>(req: RequestBuilder) -> Result<R, ApiError> {
        let response = req.send().await.map_err(|e| {
            error!(error = %e, "Backend request failed");
            ApiError::Upstream {
                status: 503,
                message: NETWORK_ERROR_MESSAGE.to_string(),
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<R>().await.map_err(|e| {
                error!(error = %e, "Failed to parse backend response");
                ApiError::internal(format!("Invalid backend response: {}", e))
            });
        }

        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        let err = map_backend_error(status, &body);
        error!(status = %status, error = %err, "Backend error");
        Err(err)
    }
}

/// Message from a backend error body: `message`, FastAPI `detail`, or `error`.
pub fn error_message(body: &Value) -> Option<String> {
    ["message", "detail", "error"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
}

pub fn map_backend_error(status: StatusCode, body: &Value) -> ApiError {
    let message = error_message(body).unwrap_or_else(|| format!("HTTPエラー: {}", status.as_u16()));

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::BadRequest(message),
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
        StatusCode::FORBIDDEN => ApiError::Forbidden(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        _ => ApiError::Upstream {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_message_prefers_message_then_detail() {
        assert_eq!(
            error_message(&json!({"message": "bad", "detail": "x"})).as_deref(),
            Some("bad")
        );
        assert_eq!(error_message(&json!({"detail": "missing"})).as_deref(), Some("missing"));
        assert_eq!(error_message(&json!(null)), None);
    }

    #[test]
    fn status_codes_map_onto_api_errors() {
        let err = map_backend_error(StatusCode::UNAUTHORIZED, &json!({"message": "token"}));
        assert!(matches!(err, ApiError::Unauthorized(_)));
        assert!(err.is_auth_error());

        let err = map_backend_error(StatusCode::INTERNAL_SERVER_ERROR, &Value::Null);
        match err {
            ApiError::Upstream { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "HTTPエラー: 500");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn base_url_is_normalized() {
        let client = BackendClient::new("http://localhost:8000/", "k", 1).unwrap();
        assert_eq!(client.url("/api/v1/x"), "http://localhost:8000/api/v1/x");
    }
}
