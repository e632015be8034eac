use axum::extract::State;
use std::sync::Arc;

use crate::api::ApiResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::{ConfigHealth, RuntimeConfigView};
use crate::error::ApiResult;
use crate::services::runtime_config::apply_env_to_runtime;

/// Load (or reuse) the backend's runtime config and apply it
pub async fn get_runtime_config(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> ApiResult<ApiResponse<RuntimeConfigView>> {
    let view = state.config_service.get_frontend_env().await?;
    if !view.cached {
        apply_env_to_runtime(&view.values, &state.runtime_env);
    }
    Ok(ApiResponse::new(view))
}

/// Drop the cached config and fetch it again
pub async fn refresh_runtime_config(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> ApiResult<ApiResponse<RuntimeConfigView>> {
    tracing::info!(user_id = %auth.user_id, "Refreshing runtime config");
    state.config_service.clear_cache();
    get_runtime_config(auth, State(state)).await
}

pub async fn config_health(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> ApiResponse<ConfigHealth> {
    ApiResponse::new(state.config_service.check_health().await)
}
