use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use ses_matching_backend::services::runtime_config::apply_env_to_runtime;
use ses_matching_backend::supabase::PostgrestClient;
use ses_matching_backend::{app, config, logging};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::Settings::from_env()?;
    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting SES matching backend"
    );

    // One client for Supabase REST, auth refresh and JWKS
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let tables = Arc::new(PostgrestClient::new(
        http_client.clone(),
        &settings.supabase_url,
        &settings.supabase_anon_key,
    ));

    let state = app::AppState::new(settings.clone(), tables, http_client)?;

    if let Err(e) = state.jwks_cache.warm_cache().await {
        tracing::warn!(error = %e, "Failed to warm JWKS cache - will fetch on first request");
    }

    // Runtime config is optional at startup
    tokio::spawn({
        let state = state.clone();
        async move {
            match state.config_service.get_frontend_env().await {
                Ok(view) => {
                    apply_env_to_runtime(&view.values, &state.runtime_env);
                }
                Err(e) => tracing::warn!(error = %e, "Runtime config unavailable - will retry on request"),
            }
        }
    });

    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
