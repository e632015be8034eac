pub mod archives;
pub mod engineers;
pub mod health;
pub mod mail;
pub mod matching;
pub mod projects;
pub mod resumes;
pub mod runtime_config;
pub mod templates;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::api::ApiResponse;
use crate::app::AppState;
use crate::error::ApiResult;
use crate::stores::Notice;

/// List reads never fail the request: errors become an empty list with an
/// error notice.
pub(crate) fn list_or_notice<T: Serialize>(
    result: ApiResult<Vec<T>>,
    title: &str,
) -> ApiResponse<Vec<T>> {
    match result {
        Ok(items) => ApiResponse::new(items),
        Err(e) => {
            tracing::error!(error = %e, "{}", title);
            ApiResponse::with_notices(Vec::new(), vec![Notice::error(title, e.notice_message())])
        }
    }
}

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        // Projects
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route("/projects/search", get(projects::search_projects))
        .route("/projects/companies", get(projects::list_companies))
        .route(
            "/projects/:project_id",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route(
            "/projects/:project_id/archive",
            post(projects::archive_project),
        )
        // Archives
        .route("/archives", get(archives::list_archives))
        .route("/archives/delete-batch", post(archives::delete_archives))
        .route("/archives/:archive_id", delete(archives::delete_archive))
        .route(
            "/archives/:archive_id/restore",
            post(archives::restore_archive),
        )
        // Engineers
        .route(
            "/engineers",
            get(engineers::list_engineers).post(engineers::create_engineer),
        )
        .route("/engineers/search", get(engineers::search_engineers))
        .route("/engineers/skills", get(engineers::list_skills))
        .route(
            "/engineers/nationalities",
            get(engineers::list_nationalities),
        )
        .route(
            "/engineers/batch-update",
            post(engineers::batch_update_engineers),
        )
        .route(
            "/engineers/:engineer_id",
            get(engineers::get_engineer)
                .put(engineers::update_engineer)
                .delete(engineers::delete_engineer),
        )
        .route(
            "/engineers/:engineer_id/permanent",
            delete(engineers::permanently_delete_engineer),
        )
        // Matching
        .route("/matching/history", get(matching::list_saved_matches))
        .route(
            "/matching/history/:match_id",
            get(matching::get_saved_match).delete(matching::delete_saved_match),
        )
        .route(
            "/matching/batch",
            get(matching::batch_matching_page).post(matching::run_batch_matching),
        )
        .route(
            "/matching/batch/:result_id/detail",
            get(matching::batch_result_detail),
        )
        .route(
            "/matching/project/:project_id",
            post(matching::match_engineers_for_project),
        )
        .route(
            "/matching/engineer/:engineer_id",
            post(matching::match_projects_for_engineer),
        )
        .route(
            "/matching/matches/:match_id/status",
            put(matching::update_match_status),
        )
        .route("/matching/runs", get(matching::list_matching_runs))
        .route(
            "/matching/runs/:history_id/matches",
            get(matching::list_run_matches),
        )
        // Email templates
        .route(
            "/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route("/templates/search", get(templates::search_templates))
        .route("/templates/categories", get(templates::list_categories))
        .route("/templates/preview", post(templates::preview_template))
        .route("/templates/case-render", post(templates::render_case_template))
        .route(
            "/templates/default/:category",
            get(templates::default_template),
        )
        .route(
            "/templates/:template_id",
            get(templates::get_template)
                .put(templates::update_template)
                .delete(templates::delete_template),
        )
        .route(
            "/templates/:template_id/render",
            post(templates::render_template),
        )
        // Mail
        .route("/mail/senders", get(mail::list_senders))
        .route("/mail/bulk-send", post(mail::bulk_send))
        .route("/mail/test-send", post(mail::test_send))
        .route("/mail/smtp-settings", get(mail::list_smtp_settings))
        .route("/mail/attachments/resume", post(mail::attach_resume))
        .route(
            "/mail/send-with-attachments",
            post(mail::send_with_attachments),
        )
        // Resumes
        .route("/resumes/validate", post(resumes::validate_resume))
        .route("/resumes/parse", post(resumes::parse_resume))
        // Runtime config
        .route("/config/runtime", get(runtime_config::get_runtime_config))
        .route(
            "/config/runtime/refresh",
            post(runtime_config::refresh_runtime_config),
        )
        .route("/config/health", get(runtime_config::config_health))
}
