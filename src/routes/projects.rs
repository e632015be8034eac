use axum::{
    extract::{Path, Query},
    Json,
};

use super::list_or_notice;
use crate::api::{ApiResponse, Created, NoContent};
use crate::auth::TenantContext;
use crate::domain::{ArchiveProjectRequest, Project, ProjectArchive, ProjectInput, ProjectSearch};
use crate::error::{ApiError, ApiResult};
use crate::stores::ProjectStore;

fn store(ctx: &TenantContext) -> ProjectStore {
    ProjectStore::new(ctx.projects(), &ctx.tenant_id, ctx.user_id())
}

/// Active projects, newest first
pub async fn list_projects(ctx: TenantContext) -> ApiResponse<Vec<Project>> {
    let mut store = store(&ctx);
    let projects = store.fetch().await.to_vec();
    ApiResponse::with_notices(projects, store.state.take_notices())
}

pub async fn get_project(
    ctx: TenantContext,
    Path(project_id): Path<String>,
) -> ApiResult<ApiResponse<Project>> {
    ctx.projects()
        .get_project_by_id(&project_id, &ctx.tenant_id)
        .await
        .map(ApiResponse::new)
        .ok_or_else(|| ApiError::not_found("案件が見つかりません"))
}

pub async fn create_project(
    ctx: TenantContext,
    Json(input): Json<ProjectInput>,
) -> ApiResult<Created<ApiResponse<Project>>> {
    tracing::info!(
        user_id = %ctx.user_id(),
        tenant_id = %ctx.tenant_id,
        "Creating project"
    );

    let mut store = store(&ctx);
    let project = store.create(&input).await?;
    Ok(Created(ApiResponse::with_notices(
        project,
        store.state.take_notices(),
    )))
}

pub async fn update_project(
    ctx: TenantContext,
    Path(project_id): Path<String>,
    Json(input): Json<ProjectInput>,
) -> ApiResult<ApiResponse<Project>> {
    let mut store = store(&ctx);
    let project = store.update(&project_id, &input).await?;
    Ok(ApiResponse::with_notices(project, store.state.take_notices()))
}

/// Soft delete
pub async fn delete_project(
    ctx: TenantContext,
    Path(project_id): Path<String>,
) -> ApiResult<NoContent> {
    store(&ctx).delete(&project_id).await?;
    Ok(NoContent)
}

/// Snapshot the project into the archive and deactivate it
pub async fn archive_project(
    ctx: TenantContext,
    Path(project_id): Path<String>,
    body: Option<Json<ArchiveProjectRequest>>,
) -> ApiResult<Created<ApiResponse<ProjectArchive>>> {
    let reason = body.and_then(|Json(req)| req.reason);
    let mut store = store(&ctx);
    let archive = store.archive(&project_id, reason.as_deref()).await?;
    Ok(Created(ApiResponse::with_notices(
        archive,
        store.state.take_notices(),
    )))
}

pub async fn search_projects(
    ctx: TenantContext,
    Query(search): Query<ProjectSearch>,
) -> ApiResponse<Vec<Project>> {
    list_or_notice(
        ctx.projects().search_projects(&ctx.tenant_id, &search).await,
        "案件の検索に失敗しました",
    )
}

pub async fn list_companies(ctx: TenantContext) -> ApiResponse<Vec<String>> {
    ApiResponse::new(ctx.projects().get_company_list(&ctx.tenant_id).await)
}
