use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::templates::selected_engineers;
use crate::api::ApiResponse;
use crate::app::AppState;
use crate::auth::TenantContext;
use crate::domain::{
    AttachmentInfo, BulkSendReport, BulkSendRequest, EmailWithAttachments, MailCaseQuery,
    SendEmailResponse, SenderPage, SmtpSetting, TestEmailRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::mail::{case_page, flatten_all, send_to_rows, BulkEmailPlan, QueueTransport};
use crate::services::attachments::{format_file_size, QueuedEmail};
use crate::stores::{Notice, ProjectStore, TemplateStore};
use crate::templating::values_from_json;

/// One row per case contact, filtered, sorted and paged
pub async fn list_senders(
    ctx: TenantContext,
    Query(query): Query<MailCaseQuery>,
) -> ApiResponse<SenderPage> {
    let mut store = ProjectStore::new(ctx.projects(), &ctx.tenant_id, ctx.user_id());
    let page = case_page(store.fetch().await, &query);
    ApiResponse::with_notices(page, store.state.take_notices())
}

/// Render the template per selected contact and queue one email each. The
/// template's usage count is bumped once when anything was queued.
pub async fn bulk_send(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Json(req): Json<BulkSendRequest>,
) -> ApiResult<ApiResponse<BulkSendReport>> {
    if req.row_ids.is_empty() {
        return Err(ApiError::bad_request("送信先を選択してください。"));
    }

    let templates = TemplateStore::new(ctx.templates(), &ctx.tenant_id, ctx.user_id());
    let template = templates
        .get(&req.template_id)
        .await
        .ok_or_else(|| ApiError::not_found("テンプレートが見つかりません"))?;
    let cases = ctx.projects().get_active_projects(&ctx.tenant_id).await?;
    let engineers = selected_engineers(&ctx, &req.engineer_ids).await?;
    let rows = flatten_all(&cases);
    let additional = values_from_json(&req.placeholders);

    let auth = ctx.backend_auth();
    let transport = QueueTransport {
        api: &state.email_api,
        smtp_setting_id: state.email_api.default_smtp_setting_id(auth).await?,
        auth,
    };
    let plan = BulkEmailPlan {
        template: &template,
        cases: &cases,
        rows: &rows,
        engineers: &engineers,
        additional: &additional,
    };

    tracing::info!(
        tenant_id = %ctx.tenant_id,
        template_id = %template.id,
        recipients = req.row_ids.len(),
        "Bulk send started"
    );
    let report = send_to_rows(&plan, &req.row_ids, &transport).await;
    if report.sent > 0 {
        templates.increment_usage(&template.id).await;
    }

    let notice = if report.failed == 0 {
        Notice::success(
            "送信完了",
            format!("{}件のメールを送信キューに追加しました", report.sent),
        )
    } else {
        Notice::error(
            "一部の送信に失敗しました",
            format!("成功: {}件 / 失敗: {}件", report.sent, report.failed),
        )
    };
    Ok(ApiResponse::with_notices(report, vec![notice]))
}

/// Send the rendered email to the caller (or the given address)
pub async fn test_send(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Json(req): Json<TestEmailRequest>,
) -> ApiResult<ApiResponse<SendEmailResponse>> {
    let recipient = req
        .test_email
        .clone()
        .or_else(|| ctx.auth.email.clone())
        .unwrap_or_default();

    let response = state
        .email_api
        .send_test(
            &req.subject,
            &req.body,
            req.signature.as_deref(),
            &recipient,
            ctx.backend_auth(),
        )
        .await?;
    Ok(ApiResponse::with_notices(
        response,
        vec![Notice::success(
            "テストメール送信",
            format!("{}にテストメールを送信しました", recipient),
        )],
    ))
}

pub async fn list_smtp_settings(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
) -> ApiResult<ApiResponse<Vec<SmtpSetting>>> {
    let settings = state.email_api.smtp_settings(ctx.backend_auth()).await?;
    Ok(ApiResponse::new(settings))
}

#[derive(Debug, Deserialize)]
pub struct ResumeAttachmentRequest {
    pub engineer_id: String,
}

/// Register the engineer's stored resume as an email attachment
pub async fn attach_resume(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResumeAttachmentRequest>,
) -> ApiResult<ApiResponse<AttachmentInfo>> {
    let engineer = ctx
        .engineers()
        .get_engineer_by_id(&req.engineer_id, &ctx.tenant_id)
        .await
        .ok_or_else(|| ApiError::not_found("技術者が見つかりません"))?;
    let resume_url = engineer
        .resume_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("履歴書ファイルが登録されていません"))?;

    let info = state
        .attachments
        .upload_resume_from_storage(&engineer.id, &engineer.name, resume_url, ctx.backend_auth())
        .await?;
    let notice = Notice::success(
        "添付完了",
        format!("{} ({})", info.filename, format_file_size(info.size)),
    );
    Ok(ApiResponse::with_notices(info, vec![notice]))
}

pub async fn send_with_attachments(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    Json(email): Json<EmailWithAttachments>,
) -> ApiResult<ApiResponse<QueuedEmail>> {
    let queued = state
        .attachments
        .send_email_with_attachments(&email, ctx.backend_auth())
        .await?;
    Ok(ApiResponse::with_notices(
        queued,
        vec![Notice::success(
            "送信完了",
            format!("{}件の宛先に送信キューを登録しました", email.to.len()),
        )],
    ))
}
