use axum::{extract::Path, Json};
use serde_json::{json, Value};

use crate::api::ApiResponse;
use crate::auth::TenantContext;
use crate::domain::{DeleteArchivesRequest, ProjectArchive};
use crate::error::{ApiError, ApiResult};
use crate::stores::ArchiveStore;

fn store(ctx: &TenantContext) -> ArchiveStore {
    ArchiveStore::new(ctx.archives(), &ctx.tenant_id)
}

/// Archived projects, most recent first
pub async fn list_archives(ctx: TenantContext) -> ApiResponse<Vec<ProjectArchive>> {
    let mut store = store(&ctx);
    let archives = store.fetch().await.to_vec();
    ApiResponse::with_notices(archives, store.state.take_notices())
}

/// Reactivate the project and drop its archive row
pub async fn restore_archive(
    ctx: TenantContext,
    Path(archive_id): Path<String>,
) -> ApiResult<ApiResponse<Value>> {
    let mut store = store(&ctx);
    store.restore(&archive_id).await?;
    Ok(ApiResponse::with_notices(
        json!({ "restored": archive_id }),
        store.state.take_notices(),
    ))
}

pub async fn delete_archive(
    ctx: TenantContext,
    Path(archive_id): Path<String>,
) -> ApiResult<ApiResponse<Value>> {
    let mut store = store(&ctx);
    store.delete(&archive_id).await?;
    Ok(ApiResponse::with_notices(
        json!({ "deleted": 1 }),
        store.state.take_notices(),
    ))
}

pub async fn delete_archives(
    ctx: TenantContext,
    Json(req): Json<DeleteArchivesRequest>,
) -> ApiResult<ApiResponse<Value>> {
    if req.ids.is_empty() {
        return Err(ApiError::bad_request("削除するアーカイブを選択してください"));
    }

    let mut store = store(&ctx);
    let deleted = store.delete_many(&req.ids).await?;
    Ok(ApiResponse::with_notices(
        json!({ "deleted": deleted }),
        store.state.take_notices(),
    ))
}
