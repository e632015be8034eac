use super::Claims;

/// The verified caller.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    /// Tenant from the token, before any header override.
    pub claimed_tenant_id: Option<String>,
    token: String,
}

impl AuthContext {
    pub fn from_claims_with_token(claims: &Claims, token: &str) -> Result<Self, &'static str> {
        if claims.sub.trim().is_empty() {
            return Err("Token has no subject");
        }

        Ok(Self {
            user_id: claims.sub.clone(),
            email: claims.email.clone(),
            role: claims.role.clone(),
            claimed_tenant_id: claims.tenant_id().map(String::from),
            token: token.to_string(),
        })
    }

    /// Raw bearer token, forwarded to Supabase and the backend API.
    pub fn token(&self) -> &str {
        &self.token
    }
}
