use axum::{
    extract::{Path, Query},
    Json,
};
use serde::Deserialize;

use super::list_or_notice;
use crate::api::{ApiResponse, Created, NoContent};
use crate::auth::TenantContext;
use crate::domain::{
    BatchUpdateEngineersRequest, CompanyType, Engineer, EngineerInput, EngineerSearch,
};
use crate::error::{ApiError, ApiResult};
use crate::stores::EngineerStore;

#[derive(Debug, Default, Deserialize)]
pub struct CompanyTypeQuery {
    #[serde(default)]
    pub company_type: Option<CompanyType>,
}

fn store(ctx: &TenantContext, company_type: Option<CompanyType>) -> EngineerStore {
    EngineerStore::new(ctx.engineers(), &ctx.tenant_id, company_type)
}

/// Active engineers, optionally only `own` or `other`
pub async fn list_engineers(
    ctx: TenantContext,
    Query(query): Query<CompanyTypeQuery>,
) -> ApiResponse<Vec<Engineer>> {
    let mut store = store(&ctx, query.company_type);
    let engineers = store.fetch().await.to_vec();
    ApiResponse::with_notices(engineers, store.state.take_notices())
}

pub async fn get_engineer(
    ctx: TenantContext,
    Path(engineer_id): Path<String>,
) -> ApiResult<ApiResponse<Engineer>> {
    ctx.engineers()
        .get_engineer_by_id(&engineer_id, &ctx.tenant_id)
        .await
        .map(ApiResponse::new)
        .ok_or_else(|| ApiError::not_found("技術者が見つかりません"))
}

pub async fn create_engineer(
    ctx: TenantContext,
    Query(query): Query<CompanyTypeQuery>,
    Json(input): Json<EngineerInput>,
) -> ApiResult<Created<ApiResponse<Engineer>>> {
    tracing::info!(
        user_id = %ctx.user_id(),
        tenant_id = %ctx.tenant_id,
        "Creating engineer"
    );

    let mut store = store(&ctx, query.company_type);
    let engineer = store.create(&input).await?;
    Ok(Created(ApiResponse::with_notices(
        engineer,
        store.state.take_notices(),
    )))
}

pub async fn update_engineer(
    ctx: TenantContext,
    Path(engineer_id): Path<String>,
    Json(input): Json<EngineerInput>,
) -> ApiResult<ApiResponse<Engineer>> {
    let mut store = store(&ctx, None);
    let engineer = store.update(&engineer_id, &input).await?;
    Ok(ApiResponse::with_notices(engineer, store.state.take_notices()))
}

/// Soft delete
pub async fn delete_engineer(
    ctx: TenantContext,
    Path(engineer_id): Path<String>,
) -> ApiResult<NoContent> {
    store(&ctx, None).delete(&engineer_id).await?;
    Ok(NoContent)
}

pub async fn permanently_delete_engineer(
    ctx: TenantContext,
    Path(engineer_id): Path<String>,
) -> ApiResult<NoContent> {
    tracing::warn!(
        user_id = %ctx.user_id(),
        engineer_id = %engineer_id,
        "Permanently deleting engineer"
    );
    store(&ctx, None).permanently_delete(&engineer_id).await?;
    Ok(NoContent)
}

pub async fn batch_update_engineers(
    ctx: TenantContext,
    Json(req): Json<BatchUpdateEngineersRequest>,
) -> ApiResult<ApiResponse<Vec<Engineer>>> {
    if req.ids.is_empty() {
        return Err(ApiError::bad_request("更新する技術者を選択してください"));
    }

    let mut store = store(&ctx, None);
    let updated = store.batch_update(&req.ids, &req.updates).await?;
    Ok(ApiResponse::with_notices(updated, store.state.take_notices()))
}

pub async fn search_engineers(
    ctx: TenantContext,
    Query(search): Query<EngineerSearch>,
) -> ApiResponse<Vec<Engineer>> {
    list_or_notice(
        ctx.engineers().search_engineers(&ctx.tenant_id, &search).await,
        "技術者の検索に失敗しました",
    )
}

pub async fn list_skills(ctx: TenantContext) -> ApiResponse<Vec<String>> {
    list_or_notice(
        ctx.engineers().get_skills_list(&ctx.tenant_id).await,
        "スキル一覧の取得に失敗しました",
    )
}

pub async fn list_nationalities(ctx: TenantContext) -> ApiResponse<Vec<String>> {
    list_or_notice(
        ctx.engineers().get_nationality_list(&ctx.tenant_id).await,
        "国籍一覧の取得に失敗しました",
    )
}
