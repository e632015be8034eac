use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::list_or_notice;
use crate::api::ApiResponse;
use crate::app::AppState;
use crate::auth::TenantContext;
use crate::domain::{
    BatchMatchingFilters, CandidateDetail, CaseDetail, MatchOptions, MatchStatusUpdate, SavedMatch,
};
use crate::error::{ApiError, ApiResult};
use crate::matching::{
    candidate_detail, case_detail, BatchMatchingPage, BatchMatchingSession, RemoteMatcher,
};
use crate::services::MatchingHistoryService;

fn history(ctx: &TenantContext, state: &AppState) -> MatchingHistoryService {
    MatchingHistoryService::new(ctx.client.clone(), state.settings.detail_fetch_concurrency)
}

fn session_key(ctx: &TenantContext) -> String {
    format!("{}:{}", ctx.tenant_id, ctx.user_id())
}

/// Saved matches with their project and engineer rows
pub async fn list_saved_matches(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
) -> ApiResponse<Vec<SavedMatch>> {
    let details = ctx.details();
    list_or_notice(
        history(&ctx, &state)
            .get_saved_matching_history(&ctx.tenant_id, &details)
            .await,
        "マッチング履歴の取得に失敗しました",
    )
}

pub async fn get_saved_match(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<String>,
) -> ApiResult<ApiResponse<SavedMatch>> {
    let details = ctx.details();
    let saved = history(&ctx, &state)
        .get_matching_history_by_id(&match_id, &ctx.tenant_id, &details)
        .await?;
    Ok(ApiResponse::new(saved))
}

pub async fn delete_saved_match(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<String>,
) -> ApiResult<ApiResponse<Value>> {
    history(&ctx, &state)
        .delete_matching_history(&match_id, &ctx.tenant_id)
        .await?;
    Ok(ApiResponse::new(json!({ "deleted": match_id })))
}

/// Run a bulk match for the filters and return the first page. The result
/// set is kept per user so later pages do not search again.
pub async fn run_batch_matching(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    filters: Option<Json<BatchMatchingFilters>>,
) -> ApiResponse<BatchMatchingPage> {
    let filters = filters.map(|Json(f)| f).unwrap_or_default();
    let key = session_key(&ctx);

    let mut session = state
        .batch_sessions
        .take(&key)
        .unwrap_or_else(|| BatchMatchingSession::new(filters.clone()));
    session.filters = filters;

    let matcher = RemoteMatcher {
        client: &state.ai_matching,
        auth: ctx.backend_auth(),
    };
    let details = ctx.details();
    session
        .search(
            &ctx.tenant_id,
            Some(ctx.user_id()),
            &matcher,
            &details,
            state.settings.detail_fetch_concurrency,
        )
        .await;

    let page = session.page();
    let notices = std::mem::take(&mut session.notices);
    state.batch_sessions.put(key, session);
    ApiResponse::with_notices(page, notices)
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<usize>,
}

/// A page of the caller's last batch search
pub async fn batch_matching_page(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> ApiResponse<BatchMatchingPage> {
    let page = state
        .batch_sessions
        .with_session(&session_key(&ctx), |session| {
            if let Some(page) = query.page {
                session.set_page(page);
            }
            session.page()
        })
        .unwrap_or_else(|| BatchMatchingSession::new(BatchMatchingFilters::default()).page());
    ApiResponse::new(page)
}

#[derive(Debug, Serialize)]
pub struct BatchResultDetail {
    pub case: CaseDetail,
    pub candidate: CandidateDetail,
}

/// Case and candidate views of one row of the last batch search
pub async fn batch_result_detail(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path(result_id): Path<String>,
) -> ApiResult<ApiResponse<BatchResultDetail>> {
    let detail = state
        .batch_sessions
        .with_session(&session_key(&ctx), |session| {
            session
                .results
                .iter()
                .find(|r| r.id == result_id)
                .map(|result| BatchResultDetail {
                    case: case_detail(result),
                    candidate: candidate_detail(result),
                })
        })
        .flatten()
        .ok_or_else(|| ApiError::not_found("マッチング結果が見つかりません"))?;

    Ok(ApiResponse::new(detail))
}

pub async fn match_engineers_for_project(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    options: Option<Json<MatchOptions>>,
) -> ApiResult<ApiResponse<Value>> {
    let options = options.map(|Json(o)| o).unwrap_or_default();
    let matches = state
        .ai_matching
        .find_engineers_for_project(&project_id, &options, ctx.backend_auth())
        .await?;
    Ok(ApiResponse::new(matches))
}

pub async fn match_projects_for_engineer(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path(engineer_id): Path<String>,
    options: Option<Json<MatchOptions>>,
) -> ApiResult<ApiResponse<Value>> {
    let options = options.map(|Json(o)| o).unwrap_or_default();
    let matches = state
        .ai_matching
        .find_projects_for_engineer(&engineer_id, &options, ctx.backend_auth())
        .await?;
    Ok(ApiResponse::new(matches))
}

pub async fn update_match_status(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<String>,
    Json(update): Json<MatchStatusUpdate>,
) -> ApiResult<ApiResponse<Value>> {
    let updated = state
        .ai_matching
        .update_match_status(
            &match_id,
            &update.status,
            update.comment.as_deref(),
            Some(ctx.user_id()),
            ctx.backend_auth(),
        )
        .await?;
    Ok(ApiResponse::new(updated))
}

#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    #[serde(default = "default_runs_limit")]
    pub limit: usize,
    #[serde(default)]
    pub matching_type: Option<String>,
}

fn default_runs_limit() -> usize {
    20
}

/// Matching runs recorded by the backend
pub async fn list_matching_runs(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Query(query): Query<RunsQuery>,
) -> ApiResult<ApiResponse<Vec<Value>>> {
    let runs = state
        .ai_matching
        .get_matching_history(query.limit, query.matching_type.as_deref(), ctx.backend_auth())
        .await?;
    Ok(ApiResponse::new(runs))
}

#[derive(Debug, Deserialize)]
pub struct RunMatchesQuery {
    #[serde(default = "default_run_matches_limit")]
    pub limit: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

fn default_run_matches_limit() -> usize {
    100
}

fn default_min_score() -> f64 {
    0.0
}

pub async fn list_run_matches(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Path(history_id): Path<String>,
    Query(query): Query<RunMatchesQuery>,
) -> ApiResult<ApiResponse<Vec<Value>>> {
    let matches = state
        .ai_matching
        .get_matches_by_history_id(&history_id, query.limit, query.min_score, ctx.backend_auth())
        .await?;
    Ok(ApiResponse::new(matches))
}
