use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Staging => "staging",
            Self::Prod => "prod",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Supabase Auth
    pub supabase_jwt_jwks_url: String,
    pub supabase_jwt_issuer: String,
    pub supabase_jwt_audience: String,
    pub jwks_cache_ttl_seconds: u64,

    // Supabase REST (table queries + token refresh)
    pub supabase_url: String,
    pub supabase_anon_key: String,

    // Backend API (AI matching, email, attachments, runtime config)
    pub backend_api_url: String,
    pub backend_api_key: String,
    pub backend_timeout_seconds: u64,

    // Resume parser
    pub resume_parser_url: String,

    // Batch matching
    pub detail_fetch_concurrency: usize,
    pub batch_session_ttl_seconds: u64,

    // Session-expiry retry budget for table queries
    pub query_max_retries: u32,

    // Runtime config cache
    pub runtime_config_ttl_seconds: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Supabase Auth
        let supabase_jwt_jwks_url =
            env::var("SUPABASE_JWT_JWKS_URL").context("SUPABASE_JWT_JWKS_URL must be set")?;
        let supabase_jwt_issuer =
            env::var("SUPABASE_JWT_ISSUER").context("SUPABASE_JWT_ISSUER must be set")?;
        let supabase_jwt_audience =
            env::var("SUPABASE_JWT_AUDIENCE").unwrap_or_else(|_| "authenticated".to_string());
        let jwks_cache_ttl_seconds = parse_or("JWKS_CACHE_TTL_SECONDS", 1800);

        // Supabase REST
        let supabase_url = env::var("SUPABASE_URL").context("SUPABASE_URL must be set")?;
        let supabase_anon_key =
            env::var("SUPABASE_ANON_KEY").context("SUPABASE_ANON_KEY must be set")?;

        // Backend API
        let backend_api_url =
            env::var("BACKEND_API_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
        let backend_api_key =
            env::var("BACKEND_API_KEY").context("BACKEND_API_KEY must be set")?;
        let backend_timeout_seconds = parse_or("BACKEND_TIMEOUT_SECONDS", 120); // AI matching is slow

        let resume_parser_url = env::var("RESUME_PARSER_URL").unwrap_or_else(|_| {
            format!(
                "{}/api/v1/resume-parser",
                backend_api_url.trim_end_matches('/')
            )
        });

        let detail_fetch_concurrency =
            parse_or::<usize>("DETAIL_FETCH_CONCURRENCY", 8).max(1);
        let batch_session_ttl_seconds = parse_or("BATCH_SESSION_TTL_SECONDS", 1800);
        let query_max_retries = parse_or("QUERY_MAX_RETRIES", 1);
        let runtime_config_ttl_seconds = parse_or("RUNTIME_CONFIG_TTL_SECONDS", 300); // 5 minutes

        Ok(Settings {
            env,
            server_addr,
            cors_allow_origins,
            supabase_jwt_jwks_url,
            supabase_jwt_issuer,
            supabase_jwt_audience,
            jwks_cache_ttl_seconds,
            supabase_url,
            supabase_anon_key,
            backend_api_url,
            backend_api_key,
            backend_timeout_seconds,
            resume_parser_url,
            detail_fetch_concurrency,
            batch_session_ttl_seconds,
            query_max_retries,
            runtime_config_ttl_seconds,
        })
    }

    /// Settings pointing at local placeholders; used by tests and offline runs.
    pub fn for_tests() -> Self {
        Settings {
            env: Environment::Dev,
            server_addr: "127.0.0.1:0".to_string(),
            cors_allow_origins: vec!["http://localhost:5173".to_string()],
            supabase_jwt_jwks_url: "http://127.0.0.1:9/jwks".to_string(),
            supabase_jwt_issuer: "http://127.0.0.1:9/auth/v1".to_string(),
            supabase_jwt_audience: "authenticated".to_string(),
            jwks_cache_ttl_seconds: 1800,
            supabase_url: "http://127.0.0.1:9".to_string(),
            supabase_anon_key: "anon".to_string(),
            backend_api_url: "http://127.0.0.1:9".to_string(),
            backend_api_key: "test-key".to_string(),
            backend_timeout_seconds: 1,
            resume_parser_url: "http://127.0.0.1:9/api/v1/resume-parser".to_string(),
            detail_fetch_concurrency: 8,
            batch_session_ttl_seconds: 1800,
            query_max_retries: 1,
            runtime_config_ttl_seconds: 300,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
