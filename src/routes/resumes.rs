use axum::extract::{Multipart, State};
use std::sync::Arc;

use crate::api::ApiResponse;
use crate::app::AppState;
use crate::auth::TenantContext;
use crate::domain::{ParsedResume, ResumeUpload, ResumeValidation};
use crate::error::{ApiError, ApiResult};
use crate::stores::Notice;

const FILE_FIELD: &str = "file";

/// The `file` part of a multipart upload.
async fn read_upload(mut multipart: Multipart) -> ApiResult<ResumeUpload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or("resume").to_string();
        let content_type = field.content_type().map(String::from);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;
        if bytes.is_empty() {
            return Err(ApiError::bad_request("ファイルが空です"));
        }

        return Ok(ResumeUpload {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(ApiError::bad_request("ファイルを選択してください"))
}

pub async fn validate_resume(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<ApiResponse<ResumeValidation>> {
    let upload = read_upload(multipart).await?;
    let validation = state
        .resume_parser
        .validate(&upload, ctx.backend_auth())
        .await?;
    Ok(ApiResponse::new(validation))
}

/// Extract engineer fields from a resume file
pub async fn parse_resume(
    ctx: TenantContext,
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<ApiResponse<ParsedResume>> {
    let upload = read_upload(multipart).await?;
    tracing::info!(
        tenant_id = %ctx.tenant_id,
        filename = %upload.filename,
        bytes = upload.bytes.len(),
        "Parsing resume"
    );

    let parsed = state.resume_parser.parse(&upload, ctx.backend_auth()).await?;
    Ok(ApiResponse::with_notices(
        parsed,
        vec![Notice::success("解析完了", "履歴書の解析が完了しました")],
    ))
}
