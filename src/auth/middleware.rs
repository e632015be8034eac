use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::AuthContext;
use crate::app::AppState;
use crate::business_client::BusinessClientManager;
use crate::error::ErrorResponse;
use crate::services::{
    ArchiveService, BackendAuth, EmailTemplateService, EngineerService, ProjectService,
    TenantDetails,
};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

/// Requires a valid Supabase bearer token.
///
/// ```ignore
/// async fn whoami(auth: RequireAuth) -> String {
///     auth.user_id.clone()
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthContext);

impl std::ops::Deref for RequireAuth {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidFormat,
    InvalidToken(String),
    MissingTenant,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing authorization token",
            ),
            AuthError::InvalidFormat => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid authorization format",
            ),
            AuthError::InvalidToken(reason) => {
                tracing::debug!(reason = %reason, "Rejected token");
                (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    "Invalid or expired token",
                )
            }
            AuthError::MissingTenant => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "テナント情報が見つかりません",
            ),
        };

        let body = ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
        };

        (status, Json(body)).into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?;

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;

        let claims = state.jwks_cache.verify_token(token).await.map_err(|e| {
            tracing::warn!(error = %e, "JWT verification failed");
            AuthError::InvalidToken(e.to_string())
        })?;

        let context = AuthContext::from_claims_with_token(&claims, token).map_err(|e| {
            tracing::warn!(error = %e, "Failed to build auth context");
            AuthError::InvalidToken(e.to_string())
        })?;

        Ok(RequireAuth(context))
    }
}

/// Authenticated caller bound to a tenant, with a table client carrying the
/// caller's token.
///
/// The tenant comes from `X-Tenant-ID`, else from the token's
/// `app_metadata.tenant_id`. Row-level security on the tables still applies.
#[derive(Clone)]
pub struct TenantContext {
    pub auth: AuthContext,
    pub tenant_id: String,
    pub client: Arc<BusinessClientManager>,
}

impl TenantContext {
    pub fn user_id(&self) -> &str {
        &self.auth.user_id
    }

    /// Credentials for backend API calls.
    pub fn backend_auth(&self) -> BackendAuth<'_> {
        BackendAuth::tenant(&self.tenant_id, Some(self.auth.token()))
    }

    pub fn projects(&self) -> ProjectService {
        ProjectService::new(self.client.clone())
    }

    pub fn engineers(&self) -> EngineerService {
        EngineerService::new(self.client.clone())
    }

    pub fn templates(&self) -> EmailTemplateService {
        EmailTemplateService::new(self.client.clone())
    }

    pub fn archives(&self) -> ArchiveService {
        ArchiveService::new(self.client.clone())
    }

    /// Project and engineer lookups scoped to this tenant.
    pub fn details(&self) -> TenantDetails {
        TenantDetails::new(self.projects(), self.engineers(), &self.tenant_id)
    }
}

/// Resolve the tenant: explicit header first, then the token claim.
pub fn resolve_tenant(headers: &HeaderMap, auth: &AuthContext) -> Option<String> {
    header_value(headers, TENANT_HEADER)
        .map(String::from)
        .or_else(|| auth.claimed_tenant_id.clone())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for TenantContext {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(auth) = RequireAuth::from_request_parts(parts, state).await?;
        let tenant_id = resolve_tenant(&parts.headers, &auth).ok_or(AuthError::MissingTenant)?;

        let client = BusinessClientManager::new(state.tables.clone())
            .with_refresher(state.token_refresher.clone())
            .with_max_retries(state.settings.query_max_retries);
        client.authorize(
            auth.token(),
            header_value(&parts.headers, REFRESH_TOKEN_HEADER),
        );

        Ok(TenantContext {
            auth,
            tenant_id,
            client: Arc::new(client),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Claims;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn auth(tenant: Option<&str>) -> AuthContext {
        let claims: Claims = serde_json::from_value(json!({
            "sub": "u1", "aud": "authenticated", "iss": "x", "iat": 0, "exp": 1,
            "app_metadata": {"tenant_id": tenant}
        }))
        .unwrap();
        AuthContext::from_claims_with_token(&claims, "tok").unwrap()
    }

    #[test]
    fn header_tenant_wins_over_claim() {
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_static("t-header"));
        assert_eq!(
            resolve_tenant(&headers, &auth(Some("t-claim"))).as_deref(),
            Some("t-header")
        );
        assert_eq!(
            resolve_tenant(&HeaderMap::new(), &auth(Some("t-claim"))).as_deref(),
            Some("t-claim")
        );
        assert_eq!(resolve_tenant(&HeaderMap::new(), &auth(None)), None);
    }

    #[test]
    fn bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(AuthError::MissingToken)));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(bearer_token(&headers), Err(AuthError::InvalidFormat)));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc");
    }
}
