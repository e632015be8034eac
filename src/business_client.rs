//! Authenticated table access for business data.
//!
//! Binds the caller's JWT to the table client and transparently refreshes the
//! session once when PostgREST reports the token as expired.

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{ApiError, ApiResult};
use crate::supabase::{TableClient, TableQuery};

/// Access/refresh token pair issued by Supabase Auth.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> ApiResult<SessionTokens>;
}

/// Error body from Supabase Auth (both the current and legacy shapes).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupabaseAuthError {
    pub msg: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub message: Option<String>,
}

impl SupabaseAuthError {
    pub fn get_message(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.error_description.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "Invalid refresh token".to_string())
    }
}

/// Refreshes sessions through `{SUPABASE_URL}/auth/v1/token`.
#[derive(Clone)]
pub struct SupabaseTokenRefresher {
    http: Client,
    supabase_url: String,
    anon_key: String,
}

impl SupabaseTokenRefresher {
    pub fn new(http: Client, supabase_url: &str, anon_key: &str) -> Self {
        Self {
            http,
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }
}

#[async_trait]
impl TokenRefresher for SupabaseTokenRefresher {
    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> ApiResult<SessionTokens> {
        let response = self
            .http
            .post(format!(
                "{}/auth/v1/token?grant_type=refresh_token",
                self.supabase_url
            ))
            .header("apikey", &self.anon_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| ApiError::internal(format!("Failed to connect to auth service: {}", e)))?;

        if !response.status().is_success() {
            let error: SupabaseAuthError = response.json().await.unwrap_or_default();
            return Err(ApiError::unauthorized(error.get_message()));
        }

        response
            .json::<SessionTokens>()
            .await
            .map_err(|e| ApiError::internal(format!("Failed to parse auth response: {}", e)))
    }
}

#[derive(Default)]
struct AuthState {
    client: Option<Arc<dyn TableClient>>,
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Owns the token-bound table client for one caller.
pub struct BusinessClientManager {
    base: Arc<dyn TableClient>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    state: RwLock<AuthState>,
    max_retries: u32,
}

impl BusinessClientManager {
    pub fn new(base: Arc<dyn TableClient>) -> Self {
        Self {
            base,
            refresher: None,
            state: RwLock::new(AuthState::default()),
            max_retries: 1,
        }
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Bind an access token the caller has already verified.
    pub fn authorize(&self, access_token: &str, refresh_token: Option<&str>) {
        let mut state = self.state.write();
        state.client = Some(self.base.with_token(access_token));
        state.access_token = Some(access_token.to_string());
        state.refresh_token = refresh_token.map(String::from);
    }

    /// Bind a token after probing it against the `projects` table.
    #[instrument(skip_all)]
    pub async fn set_token(&self, access_token: &str, refresh_token: Option<&str>) -> bool {
        let candidate = self.base.with_token(access_token);
        let probe = TableQuery::table("projects").select("id").limit(1);

        match candidate.select(&probe).await {
            Ok(_) => {
                self.authorize(access_token, refresh_token);
                debug!("Business client authenticated");
                true
            }
            Err(e) => {
                warn!(error = %e, "Token verification failed");
                match refresh_token {
                    Some(refresh) => {
                        self.state.write().refresh_token = Some(refresh.to_string());
                        self.refresh_session().await
                    }
                    None => {
                        self.clear_auth();
                        false
                    }
                }
            }
        }
    }

    pub fn clear_auth(&self) {
        *self.state.write() = AuthState::default();
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().client.is_some()
    }

    /// Current access token, which changes after a refresh.
    pub fn access_token(&self) -> Option<String> {
        self.state.read().access_token.clone()
    }

    pub fn client(&self) -> ApiResult<Arc<dyn TableClient>> {
        self.state
            .read()
            .client
            .clone()
            .ok_or_else(|| ApiError::unauthorized("Business client not initialized"))
    }

    /// Exchange the stored refresh token for a new session. False when no
    /// refresher or refresh token is available, or the exchange fails.
    async fn refresh_session(&self) -> bool {
        let refresh_token = self.state.read().refresh_token.clone();
        let (Some(refresher), Some(refresh_token)) = (self.refresher.as_ref(), refresh_token)
        else {
            return false;
        };

        match refresher.refresh(&refresh_token).await {
            Ok(tokens) => {
                self.authorize(&tokens.access_token, Some(&tokens.refresh_token));
                info!("Session refreshed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Session refresh failed");
                self.clear_auth();
                false
            }
        }
    }

    /// Run `op` against the bound client, refreshing and retrying only when the
    /// session has expired.
    pub async fn execute_with_retry<T, F, Fut>(&self, op: F) -> ApiResult<T>
    where
        F: Fn(Arc<dyn TableClient>) -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut pacing = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(50))
            .with_max_interval(Duration::from_secs(2))
            .with_max_elapsed_time(None)
            .build();
        let mut attempt = 0;

        loop {
            let client = self.client()?;
            match op(client).await {
                Err(ApiError::SessionExpired(message)) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(attempt, "Session expired, attempting refresh");

                    if !self.refresh_session().await {
                        return Err(ApiError::SessionExpired(message));
                    }
                    if let Some(wait) = pacing.next_backoff() {
                        tokio::time::sleep(wait).await;
                    }
                }
                result => return result,
            }
        }
    }

    // =========================================================================
    // Retrying table operations
    // =========================================================================

    pub async fn select(&self, query: &TableQuery) -> ApiResult<Vec<Value>> {
        self.execute_with_retry(|client| async move { client.select(query).await })
            .await
    }

    pub async fn insert(&self, table: &str, rows: Vec<Value>) -> ApiResult<Vec<Value>> {
        self.execute_with_retry(|client| {
            let rows = rows.clone();
            async move { client.insert(table, rows).await }
        })
        .await
    }

    pub async fn update(&self, query: &TableQuery, patch: Value) -> ApiResult<Vec<Value>> {
        self.execute_with_retry(|client| {
            let patch = patch.clone();
            async move { client.update(query, patch).await }
        })
        .await
    }

    pub async fn delete(&self, query: &TableQuery) -> ApiResult<Vec<Value>> {
        self.execute_with_retry(|client| async move { client.delete(query).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supabase::InMemoryTables;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRefresher {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingRefresher {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn refresh(&self, _refresh_token: &str) -> ApiResult<SessionTokens> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ApiError::unauthorized("Invalid refresh token"));
            }
            Ok(SessionTokens {
                access_token: "fresh".into(),
                refresh_token: "r2".into(),
            })
        }
    }

    fn tables() -> InMemoryTables {
        let tables = InMemoryTables::new();
        tables.seed("projects", vec![json!({"id": "p1", "title": "Case A"})]);
        tables
    }

    #[tokio::test]
    async fn client_requires_initialization() {
        let manager = BusinessClientManager::new(Arc::new(tables()));
        assert!(!manager.is_authenticated());
        assert!(matches!(manager.client(), Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_refreshes_exactly_once_then_succeeds() {
        let tables = tables();
        tables.expire_token("stale");
        let refresher = CountingRefresher::new(false);

        let manager =
            BusinessClientManager::new(Arc::new(tables)).with_refresher(refresher.clone());
        manager.authorize("stale", Some("r1"));

        let rows = manager
            .select(&TableQuery::table("projects"))
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.access_token().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn without_refresh_token_expiry_passes_through() {
        let tables = tables();
        tables.expire_token("stale");
        let refresher = CountingRefresher::new(false);

        let manager =
            BusinessClientManager::new(Arc::new(tables)).with_refresher(refresher.clone());
        manager.authorize("stale", None);

        let err = manager
            .select(&TableQuery::table("projects"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::SessionExpired(_)));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let manager = BusinessClientManager::new(Arc::new(tables()))
            .with_refresher(CountingRefresher::new(false));
        manager.authorize("token", Some("r1"));

        let calls = AtomicUsize::new(0);
        let err = manager
            .execute_with_retry(|_client| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ApiError::bad_request("invalid input")) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_clears_auth() {
        let tables = tables();
        tables.expire_token("stale");
        let manager = BusinessClientManager::new(Arc::new(tables))
            .with_refresher(CountingRefresher::new(true));
        manager.authorize("stale", Some("r1"));

        assert!(manager.select(&TableQuery::table("projects")).await.is_err());
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn set_token_probes_then_falls_back_to_refresh() {
        let tables = tables();
        tables.expire_token("stale");
        let refresher = CountingRefresher::new(false);
        let manager =
            BusinessClientManager::new(Arc::new(tables)).with_refresher(refresher.clone());

        assert!(manager.set_token("good", None).await);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);

        assert!(manager.set_token("stale", Some("r1")).await);
        assert_eq!(manager.access_token().as_deref(), Some("fresh"));

        manager.clear_auth();
        assert!(!manager.set_token("stale", None).await);
        assert!(!manager.is_authenticated());
    }
}
