use axum::{
    extract::{Path, Query},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::{ApiResponse, Created, NoContent};
use crate::auth::TenantContext;
use crate::domain::{
    CreateEmailTemplateRequest, EmailTemplate, Engineer, Project, RenderedEmail,
    TemplateListParams, TemplateSearchParams, UpdateEmailTemplateRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::stores::TemplateStore;
use crate::templating::{
    apply_case_template, apply_template_with_engineers, render_for_case, tag_placeholders,
    values_from_json, Segment,
};

fn store(ctx: &TenantContext) -> TemplateStore {
    TemplateStore::new(ctx.templates(), &ctx.tenant_id, ctx.user_id())
}

fn template_not_found() -> ApiError {
    ApiError::not_found("テンプレートが見つかりません")
}

pub async fn list_templates(
    ctx: TenantContext,
    Query(params): Query<TemplateListParams>,
) -> ApiResponse<Vec<EmailTemplate>> {
    let mut store = store(&ctx);
    let templates = store.fetch(&params).await.to_vec();
    ApiResponse::with_notices(templates, store.state.take_notices())
}

pub async fn get_template(
    ctx: TenantContext,
    Path(template_id): Path<String>,
) -> ApiResult<ApiResponse<EmailTemplate>> {
    store(&ctx)
        .get(&template_id)
        .await
        .map(ApiResponse::new)
        .ok_or_else(template_not_found)
}

pub async fn create_template(
    ctx: TenantContext,
    Json(req): Json<CreateEmailTemplateRequest>,
) -> ApiResult<Created<ApiResponse<EmailTemplate>>> {
    let mut store = store(&ctx);
    let template = store.create(&req).await?;
    Ok(Created(ApiResponse::with_notices(
        template,
        store.state.take_notices(),
    )))
}

pub async fn update_template(
    ctx: TenantContext,
    Path(template_id): Path<String>,
    Json(req): Json<UpdateEmailTemplateRequest>,
) -> ApiResult<ApiResponse<EmailTemplate>> {
    let mut store = store(&ctx);
    let template = store.update(&template_id, &req).await?;
    Ok(ApiResponse::with_notices(template, store.state.take_notices()))
}

/// Soft delete
pub async fn delete_template(
    ctx: TenantContext,
    Path(template_id): Path<String>,
) -> ApiResult<NoContent> {
    store(&ctx).delete(&template_id).await?;
    Ok(NoContent)
}

pub async fn search_templates(
    ctx: TenantContext,
    Query(params): Query<TemplateSearchParams>,
) -> ApiResponse<Vec<EmailTemplate>> {
    let mut store = store(&ctx);
    let templates = store.search(&params).await;
    ApiResponse::with_notices(templates, store.state.take_notices())
}

pub async fn list_categories(ctx: TenantContext) -> ApiResponse<Vec<String>> {
    let mut store = store(&ctx);
    let categories = store.categories().await;
    ApiResponse::with_notices(categories, store.state.take_notices())
}

/// Most used active template of a category
pub async fn default_template(
    ctx: TenantContext,
    Path(category): Path<String>,
) -> ApiResult<ApiResponse<EmailTemplate>> {
    let mut store = store(&ctx);
    match store.default_for(&category).await {
        Some(template) => Ok(ApiResponse::with_notices(template, store.state.take_notices())),
        None => Err(template_not_found()),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RenderRequest {
    /// Case whose contact the email is addressed to.
    #[serde(default)]
    pub case_id: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub engineer_ids: Vec<String>,
    #[serde(default)]
    pub placeholders: Map<String, Value>,
}

/// Active engineers of the tenant in the order of `ids`. Unknown ids are
/// skipped.
pub(crate) async fn selected_engineers(
    ctx: &TenantContext,
    ids: &[String],
) -> ApiResult<Vec<Engineer>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let engineers = ctx
        .engineers()
        .get_active_engineers(&ctx.tenant_id, None)
        .await?;
    Ok(ids
        .iter()
        .filter_map(|id| engineers.iter().find(|e| &e.id == id).cloned())
        .collect())
}

/// Render a stored template with engineer and case values. Unknown
/// placeholders render as empty text.
pub async fn render_template(
    ctx: TenantContext,
    Path(template_id): Path<String>,
    body: Option<Json<RenderRequest>>,
) -> ApiResult<ApiResponse<RenderedEmail>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let template = store(&ctx)
        .get(&template_id)
        .await
        .ok_or_else(template_not_found)?;
    let engineers = selected_engineers(&ctx, &req.engineer_ids).await?;
    let additional = values_from_json(&req.placeholders);

    let rendered = match req.case_id.as_deref() {
        Some(case_id) => {
            let case = ctx
                .projects()
                .get_project_by_id(case_id, &ctx.tenant_id)
                .await
                .ok_or_else(|| ApiError::not_found("案件が見つかりません"))?;
            render_for_case(
                &template,
                &case,
                req.sender_name.as_deref(),
                &engineers,
                &additional,
            )
        }
        None => apply_template_with_engineers(&template, &engineers, &additional),
    };
    Ok(ApiResponse::new(rendered))
}

#[derive(Debug, Deserialize)]
pub struct CaseRenderRequest {
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub case_ids: Vec<String>,
    #[serde(default)]
    pub engineer_ids: Vec<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
}

/// Render a built-in `{{key}}` template for the first selected case and
/// engineer.
pub async fn render_case_template(
    ctx: TenantContext,
    Json(req): Json<CaseRenderRequest>,
) -> ApiResult<ApiResponse<RenderedEmail>> {
    let template = EmailTemplate {
        subject_template: req.subject,
        body_template_text: req.body,
        signature_template: req.signature,
        ..Default::default()
    };

    let mut cases: Vec<Project> = Vec::new();
    if let Some(case_id) = req.case_ids.first() {
        cases.extend(
            ctx.projects()
                .get_project_by_id(case_id, &ctx.tenant_id)
                .await,
        );
    }
    let engineers = selected_engineers(&ctx, &req.engineer_ids).await?;

    Ok(ApiResponse::new(apply_case_template(
        &template,
        &cases,
        &engineers,
        req.sender_name.as_deref(),
    )))
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub subject: Vec<Segment>,
    pub body: Vec<Segment>,
}

/// Split template text into literal text and placeholder tags for display.
pub async fn preview_template(
    _ctx: TenantContext,
    Json(req): Json<PreviewRequest>,
) -> ApiResponse<PreviewResponse> {
    ApiResponse::new(PreviewResponse {
        subject: tag_placeholders(&req.subject),
        body: tag_placeholders(&req.body),
    })
}
