//! Runtime configuration pulled from the backend API, cached in process.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::domain::{ConfigHealth, FrontendEnvResponse, RuntimeConfigView};
use crate::error::ApiError;

use super::{BackendAuth, BackendClient};

struct CachedEnv {
    values: HashMap<String, String>,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct ConfigService {
    backend: BackendClient,
    cache: Arc<RwLock<Option<CachedEnv>>>,
    ttl: Duration,
}

impl ConfigService {
    pub fn new(backend: BackendClient, ttl_seconds: u64) -> Self {
        Self {
            backend,
            cache: Arc::new(RwLock::new(None)),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Cached values while fresh, else a fetch from
    /// `/api/v1/config/frontend-env`.
    #[instrument(skip(self))]
    pub async fn get_frontend_env(&self) -> Result<RuntimeConfigView, ApiError> {
        if let Some(values) = self.cached_env() {
            debug!("Using cached runtime config");
            return Ok(RuntimeConfigView {
                count: values.len(),
                values,
                cached: true,
            });
        }

        let response: FrontendEnvResponse = self
            .backend
            .get("/api/v1/config/frontend-env", &[], BackendAuth::default())
            .await
            .map_err(|e| {
                ApiError::internal(format!(
                    "Cannot load environment variables from backend API: {}",
                    e
                ))
            })?;

        if !response.success {
            let message = response
                .message
                .unwrap_or_else(|| "Failed to fetch environment variables".to_string());
            return Err(ApiError::Upstream {
                status: 502,
                message,
            });
        }

        self.store(response.data.clone());
        info!(count = response.count, "Runtime config loaded");

        Ok(RuntimeConfigView {
            count: response.data.len(),
            values: response.data,
            cached: false,
        })
    }

    pub fn store(&self, values: HashMap<String, String>) {
        *self.cache.write() = Some(CachedEnv {
            values,
            expires_at: Instant::now() + self.ttl,
        });
    }

    /// Copy of the cached values, if still fresh.
    pub fn cached_env(&self) -> Option<HashMap<String, String>> {
        self.cache
            .read()
            .as_ref()
            .filter(|c| Instant::now() < c.expires_at)
            .map(|c| c.values.clone())
    }

    pub fn clear_cache(&self) {
        *self.cache.write() = None;
        debug!("Runtime config cache cleared");
    }

    /// Health of the backend's config. Never fails: transport and decode
    /// errors come back as an `error` status.
    #[instrument(skip(self))]
    pub async fn check_health(&self) -> ConfigHealth {
        match self
            .backend
            .get_public::<ConfigHealth>("/api/v1/config/frontend-env/health")
            .await
        {
            Ok(health) => {
                if !health.missing_critical_vars.is_empty() {
                    warn!(missing = ?health.missing_critical_vars, "Critical config variables missing");
                }
                health
            }
            Err(e) => ConfigHealth::error(format!("Health check failed: {}", e)),
        }
    }
}

/// Copy non-blank values into the runtime map. Returns how many were applied.
pub fn apply_env_to_runtime(
    values: &HashMap<String, String>,
    runtime: &RwLock<HashMap<String, String>>,
) -> usize {
    let mut runtime = runtime.write();
    let mut applied = 0;
    for (key, value) in values {
        if !value.trim().is_empty() {
            runtime.insert(key.clone(), value.clone());
            applied += 1;
        }
    }
    info!(applied, "Runtime config applied");
    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(ttl: u64) -> ConfigService {
        let backend = BackendClient::new("http://127.0.0.1:9", "k", 1).unwrap();
        ConfigService::new(backend, ttl)
    }

    fn values() -> HashMap<String, String> {
        HashMap::from([
            ("VITE_SUPABASE_URL".to_string(), "https://x.supabase.co".to_string()),
            ("VITE_EMPTY".to_string(), "  ".to_string()),
        ])
    }

    #[tokio::test]
    async fn fresh_cache_is_served_without_fetching() {
        let service = service(300);
        service.store(values());

        let view = service.get_frontend_env().await.unwrap();
        assert!(view.cached);
        assert_eq!(view.count, 2);
    }

    #[test]
    fn expired_or_cleared_cache_is_empty() {
        let service = service(0);
        service.store(values());
        assert!(service.cached_env().is_none());

        let service = self::service(300);
        service.store(values());
        assert!(service.cached_env().is_some());
        service.clear_cache();
        assert!(service.cached_env().is_none());
    }

    #[test]
    fn blank_values_are_not_applied() {
        let runtime = RwLock::new(HashMap::new());
        assert_eq!(apply_env_to_runtime(&values(), &runtime), 1);
        assert!(runtime.read().contains_key("VITE_SUPABASE_URL"));
    }

    #[tokio::test]
    async fn unreachable_health_endpoint_reports_error() {
        let health = service(300).check_health().await;
        assert_eq!(health.status, "error");
        assert_eq!(health.environment, "unknown");
        assert!(health.message.starts_with("Health check failed"));
    }
}
