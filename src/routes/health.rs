use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::services::projects::PROJECTS_TABLE;
use crate::supabase::TableQuery;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: ServiceHealth,
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub tables: String,
    pub backend_api: String,
    pub runtime_config: String,
}

/// Health check endpoint - public
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let probe = TableQuery::table(PROJECTS_TABLE).select("id").limit(1);
    let (tables_result, backend_result, config_health) = tokio::join!(
        state.tables.select(&probe),
        state.backend.health_check(),
        state.config_service.check_health(),
    );

    let label = |ok: bool| if ok { "ok" } else { "error" };
    let tables_ok = tables_result.is_ok();
    let backend_ok = backend_result.is_ok();
    let config_ok = config_health.status != "error";

    // The table API is critical; the backend only degrades matching and mail
    let status = match (tables_ok, backend_ok && config_ok) {
        (true, true) => "healthy",
        (true, false) => "degraded",
        (false, _) => "unhealthy",
    };
    let status_code = if tables_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            services: ServiceHealth {
                tables: label(tables_ok).to_string(),
                backend_api: label(backend_ok).to_string(),
                runtime_config: config_health.status,
            },
        }),
    )
}
