use anyhow::Result;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    Router,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::auth::middleware::{REFRESH_TOKEN_HEADER, TENANT_HEADER};
use crate::auth::JwksCache;
use crate::business_client::{SupabaseTokenRefresher, TokenRefresher};
use crate::config::Settings;
use crate::matching::BatchSessions;
use crate::middleware::{request_id_layer, X_REQUEST_ID};
use crate::routes;
use crate::services::{
    AiMatchingClient, AttachmentService, BackendClient, ConfigService, EmailApiClient,
    ResumeParserClient,
};
use crate::supabase::TableClient;

/// Resume uploads are the largest request bodies.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Shared application state
pub struct AppState {
    pub settings: Settings,
    pub jwks_cache: JwksCache,
    /// Table API without caller credentials; per-request clients wrap it.
    pub tables: Arc<dyn TableClient>,
    pub token_refresher: Arc<dyn TokenRefresher>,
    pub backend: BackendClient,
    pub ai_matching: AiMatchingClient,
    pub email_api: EmailApiClient,
    pub attachments: AttachmentService,
    pub resume_parser: ResumeParserClient,
    pub config_service: ConfigService,
    /// Values applied from the backend's runtime config.
    pub runtime_env: RwLock<HashMap<String, String>>,
    /// Last batch matching search per tenant and user, for paging.
    pub batch_sessions: BatchSessions,
    /// Shared HTTP client for Supabase calls (auth refresh, JWKS)
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(
        settings: Settings,
        tables: Arc<dyn TableClient>,
        http_client: reqwest::Client,
    ) -> Result<Arc<Self>> {
        let backend = BackendClient::new(
            &settings.backend_api_url,
            &settings.backend_api_key,
            settings.backend_timeout_seconds,
        )?;

        let jwks_cache = JwksCache::new(
            http_client.clone(),
            settings.supabase_jwt_jwks_url.clone(),
            settings.supabase_jwt_issuer.clone(),
            settings.supabase_jwt_audience.clone(),
            settings.jwks_cache_ttl_seconds,
        );
        let token_refresher: Arc<dyn TokenRefresher> = Arc::new(SupabaseTokenRefresher::new(
            http_client.clone(),
            &settings.supabase_url,
            &settings.supabase_anon_key,
        ));

        Ok(Arc::new(Self {
            jwks_cache,
            tables,
            token_refresher,
            ai_matching: AiMatchingClient::new(backend.clone()),
            email_api: EmailApiClient::new(backend.clone()),
            attachments: AttachmentService::new(backend.clone()),
            resume_parser: ResumeParserClient::new(backend.clone(), &settings.resume_parser_url),
            config_service: ConfigService::new(backend.clone(), settings.runtime_config_ttl_seconds),
            backend,
            runtime_env: RwLock::new(HashMap::new()),
            batch_sessions: BatchSessions::new(settings.batch_session_ttl_seconds),
            http_client,
            settings,
        }))
    }
}

/// Build the complete application with all middleware
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.settings);

    // DEBUG spans keep INFO output to the handlers' own events
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    let (set_request_id, propagate_request_id) = request_id_layer();

    Router::new()
        .merge(routes::api_router())
        // Applied bottom-up
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(propagate_request_id)
        .layer(trace_layer)
        .layer(set_request_id)
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_allow_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let max_age = if settings.env.is_dev() {
        Duration::from_secs(86400)
    } else {
        Duration::from_secs(3600)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(X_REQUEST_ID),
            HeaderName::from_static(TENANT_HEADER),
            HeaderName::from_static(REFRESH_TOKEN_HEADER),
        ]))
        .allow_credentials(true)
        .max_age(max_age)
}
