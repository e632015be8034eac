//! AI matching endpoints of the backend API.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::domain::{BulkMatchingRequest, BulkMatchingResponse, MatchOptions};
use crate::error::ApiError;

use super::{BackendAuth, BackendClient};

const DEFAULT_MAX_MATCHES: u32 = 10;
const DEFAULT_MIN_SCORE: f64 = 0.7;

#[derive(Clone)]
pub struct AiMatchingClient {
    backend: BackendClient,
}

#[derive(Serialize)]
struct SingleSidedRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    engineer_id: Option<&'a str>,
    tenant_id: &'a str,
    max_matches: u32,
    min_score: f64,
    filters: Value,
}

impl<'a> SingleSidedRequest<'a> {
    fn new(tenant_id: &'a str, options: &MatchOptions) -> Self {
        Self {
            project_id: None,
            engineer_id: None,
            tenant_id,
            max_matches: options.max_matches.unwrap_or(DEFAULT_MAX_MATCHES),
            min_score: options.min_score.unwrap_or(DEFAULT_MIN_SCORE),
            filters: options.filters.clone().unwrap_or_else(|| json!({})),
        }
    }
}

impl AiMatchingClient {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    #[instrument(skip(self, options, auth))]
    pub async fn find_engineers_for_project(
        &self,
        project_id: &str,
        options: &MatchOptions,
        auth: BackendAuth<'_>,
    ) -> Result<Value, ApiError> {
        let tenant_id = require_tenant(auth)?;
        let request = SingleSidedRequest {
            project_id: Some(project_id),
            ..SingleSidedRequest::new(tenant_id, options)
        };
        self.backend
            .post("/api/v1/ai-matching/project-to-engineers", &request, auth)
            .await
    }

    #[instrument(skip(self, options, auth))]
    pub async fn find_projects_for_engineer(
        &self,
        engineer_id: &str,
        options: &MatchOptions,
        auth: BackendAuth<'_>,
    ) -> Result<Value, ApiError> {
        let tenant_id = require_tenant(auth)?;
        let request = SingleSidedRequest {
            engineer_id: Some(engineer_id),
            ..SingleSidedRequest::new(tenant_id, options)
        };
        self.backend
            .post("/api/v1/ai-matching/engineer-to-projects", &request, auth)
            .await
    }

    #[instrument(skip(self, request, auth), fields(tenant_id = %request.tenant_id))]
    pub async fn perform_bulk_matching(
        &self,
        request: &BulkMatchingRequest,
        auth: BackendAuth<'_>,
    ) -> Result<BulkMatchingResponse, ApiError> {
        self.backend
            .post("/api/v1/ai-matching/bulk-matching", request, auth)
            .await
    }

    #[instrument(skip(self, auth))]
    pub async fn update_match_status(
        &self,
        match_id: &str,
        status: &str,
        comment: Option<&str>,
        reviewed_by: Option<&str>,
        auth: BackendAuth<'_>,
    ) -> Result<Value, ApiError> {
        let tenant_id = require_tenant(auth)?;
        let mut query = vec![("status", status.to_string())];
        if let Some(comment) = comment.filter(|c| !c.is_empty()) {
            query.push(("comment", comment.to_string()));
        }
        if let Some(reviewer) = reviewed_by {
            query.push(("reviewed_by", reviewer.to_string()));
        }

        self.backend
            .put(
                &format!("/api/v1/ai-matching/matches/{}/{}/status", tenant_id, match_id),
                &query,
                auth,
            )
            .await
    }

    #[instrument(skip(self, auth))]
    pub async fn get_matching_history(
        &self,
        limit: usize,
        matching_type: Option<&str>,
        auth: BackendAuth<'_>,
    ) -> Result<Vec<Value>, ApiError> {
        let tenant_id = require_tenant(auth)?;
        let mut query = vec![("limit", limit.to_string())];
        if let Some(matching_type) = matching_type {
            query.push(("matching_type", matching_type.to_string()));
        }

        self.backend
            .get(&format!("/api/v1/ai-matching/history/{}", tenant_id), &query, auth)
            .await
    }

    #[instrument(skip(self, auth))]
    pub async fn get_matches_by_history_id(
        &self,
        history_id: &str,
        limit: usize,
        min_score: f64,
        auth: BackendAuth<'_>,
    ) -> Result<Vec<Value>, ApiError> {
        let tenant_id = require_tenant(auth)?;
        let query = [("limit", limit.to_string()), ("min_score", min_score.to_string())];

        self.backend
            .get(
                &format!("/api/v1/ai-matching/matches/{}/{}", tenant_id, history_id),
                &query,
                auth,
            )
            .await
    }
}

fn require_tenant<'a>(auth: BackendAuth<'a>) -> Result<&'a str, ApiError> {
    auth.tenant_id
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("テナントIDが取得できません"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_sided_request_applies_defaults() {
        let request = SingleSidedRequest {
            project_id: Some("p1"),
            ..SingleSidedRequest::new("t1", &MatchOptions::default())
        };
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["max_matches"], 10);
        assert_eq!(body["min_score"], 0.7);
        assert_eq!(body["filters"], json!({}));
        assert!(body.get("engineer_id").is_none());
    }

    #[test]
    fn tenant_is_required() {
        let err = require_tenant(BackendAuth::default()).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(require_tenant(BackendAuth::tenant("t1", None)).unwrap(), "t1");
    }
}
