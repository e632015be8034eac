//! Table client seam and its PostgREST implementation.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, instrument};

use super::TableQuery;
use crate::error::{ApiError, ApiResult};

/// Row-level access to the remote tables. Rows travel as JSON.
#[async_trait]
pub trait TableClient: Send + Sync {
    async fn select(&self, query: &TableQuery) -> ApiResult<Vec<Value>>;

    async fn insert(&self, table: &str, rows: Vec<Value>) -> ApiResult<Vec<Value>>;

    /// Apply `patch` to every row matched by the query's filters.
    async fn update(&self, query: &TableQuery, patch: Value) -> ApiResult<Vec<Value>>;

    async fn delete(&self, query: &TableQuery) -> ApiResult<Vec<Value>>;

    /// A client that sends `token` as the caller's bearer credential.
    fn with_token(&self, token: &str) -> Arc<dyn TableClient>;
}

/// Deserialize rows into typed records.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> ApiResult<Vec<T>> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row)
                .map_err(|e| ApiError::internal(format!("Unexpected row shape: {}", e)))
        })
        .collect()
}

pub fn decode_first<T: DeserializeOwned>(rows: Vec<Value>) -> ApiResult<Option<T>> {
    Ok(decode_rows(rows)?.into_iter().next())
}

/// Error body returned by PostgREST.
#[derive(Debug, Default, Deserialize)]
pub struct PostgrestErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Map a failed PostgREST response onto `ApiError`.
pub fn map_postgrest_error(status: u16, body: &PostgrestErrorBody) -> ApiError {
    let message = body
        .message
        .clone()
        .unwrap_or_else(|| format!("Table API error: {}", status));

    match body.code.as_deref() {
        Some("PGRST301") => return ApiError::SessionExpired(message),
        Some("PGRST116") => return ApiError::NotFound(message),
        Some("23505") => return ApiError::Conflict(message),
        _ => {}
    }

    match status {
        401 => ApiError::SessionExpired(message),
        400 => ApiError::BadRequest(message),
        403 => ApiError::Forbidden(message),
        404 => ApiError::NotFound(message),
        409 => ApiError::Conflict(message),
        _ => ApiError::Upstream { status, message },
    }
}

/// PostgREST client for `{SUPABASE_URL}/rest/v1`.
#[derive(Clone)]
pub struct PostgrestClient {
    http: Client,
    rest_url: String,
    anon_key: String,
    token: Option<String>,
}

impl PostgrestClient {
    pub fn new(http: Client, supabase_url: &str, anon_key: &str) -> Self {
        Self {
            http,
            rest_url: format!("{}/rest/v1", supabase_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
            token: None,
        }
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        let bearer = self.token.as_deref().unwrap_or(&self.anon_key);

        self.http
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> ApiResult<Vec<Value>> {
        let response = req.send().await.map_err(|e| {
            error!(error = %e, "Table API request failed");
            ApiError::internal(format!("Table API unavailable: {}", e))
        })?;

        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }

        if status.is_success() {
            let body: Value = response.json().await.map_err(|e| {
                error!(error = %e, "Failed to parse table API response");
                ApiError::internal(format!("Invalid table API response: {}", e))
            })?;

            return Ok(match body {
                Value::Array(rows) => rows,
                Value::Null => Vec::new(),
                // object responses from single-row selects
                row => vec![row],
            });
        }

        let body = response
            .json::<PostgrestErrorBody>()
            .await
            .unwrap_or_default();

        let err = map_postgrest_error(status.as_u16(), &body);
        debug!(
            status = %status,
            code = ?body.code,
            details = ?body.details,
            hint = ?body.hint,
            "Table API error"
        );
        Err(err)
    }
}

#[async_trait]
impl TableClient for PostgrestClient {
    #[instrument(skip(self, query), fields(table = %query.table))]
    async fn select(&self, query: &TableQuery) -> ApiResult<Vec<Value>> {
        let mut req = self
            .request(reqwest::Method::GET, &query.table)
            .query(&query.to_params());

        if query.single {
            req = req.header("Accept", "application/vnd.pgrst.object+json");
        }

        self.send(req).await
    }

    #[instrument(skip(self, rows))]
    async fn insert(&self, table: &str, rows: Vec<Value>) -> ApiResult<Vec<Value>> {
        let req = self
            .request(reqwest::Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&rows);

        self.send(req).await
    }

    #[instrument(skip(self, query, patch), fields(table = %query.table))]
    async fn update(&self, query: &TableQuery, patch: Value) -> ApiResult<Vec<Value>> {
        let req = self
            .request(reqwest::Method::PATCH, &query.table)
            .query(&query.filter_params())
            .header("Prefer", "return=representation")
            .json(&patch);

        self.send(req).await
    }

    #[instrument(skip(self, query), fields(table = %query.table))]
    async fn delete(&self, query: &TableQuery) -> ApiResult<Vec<Value>> {
        let req = self
            .request(reqwest::Method::DELETE, &query.table)
            .query(&query.filter_params())
            .header("Prefer", "return=representation");

        self.send(req).await
    }

    fn with_token(&self, token: &str) -> Arc<dyn TableClient> {
        let mut client = self.clone();
        client.token = Some(token.to_string());
        Arc::new(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(code: Option<&str>, message: &str) -> PostgrestErrorBody {
        PostgrestErrorBody {
            code: code.map(String::from),
            message: Some(message.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn jwt_expiry_maps_to_session_expired() {
        assert!(matches!(
            map_postgrest_error(401, &body(Some("PGRST301"), "JWT expired")),
            ApiError::SessionExpired(_)
        ));
        assert!(matches!(
            map_postgrest_error(401, &PostgrestErrorBody::default()),
            ApiError::SessionExpired(_)
        ));
    }

    #[test]
    fn single_row_miss_maps_to_not_found() {
        assert!(matches!(
            map_postgrest_error(406, &body(Some("PGRST116"), "0 rows")),
            ApiError::NotFound(_)
        ));
    }

    #[test]
    fn other_statuses_map_by_class() {
        assert!(matches!(
            map_postgrest_error(400, &body(Some("22P02"), "bad uuid")),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            map_postgrest_error(409, &body(Some("23505"), "duplicate")),
            ApiError::Conflict(_)
        ));
        match map_postgrest_error(503, &PostgrestErrorBody::default()) {
            ApiError::Upstream { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Table API error: 503");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decode_rows_reports_shape_errors() {
        #[derive(Debug, Deserialize)]
        struct Row {
            #[allow(dead_code)]
            id: String,
        }

        let ok: Vec<Row> = decode_rows(vec![serde_json::json!({"id": "a"})]).unwrap();
        assert_eq!(ok.len(), 1);
        assert!(decode_rows::<Row>(vec![serde_json::json!({"id": 1})]).is_err());
    }
}
