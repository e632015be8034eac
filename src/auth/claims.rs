use serde::{Deserialize, Serialize};

/// Claims of a Supabase access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub app_metadata: Option<AppMetadata>,
    #[serde(default)]
    pub user_metadata: Option<serde_json::Value>,
}

impl Claims {
    /// Tenant recorded on the user by the admin tooling, if any.
    pub fn tenant_id(&self) -> Option<&str> {
        self.app_metadata
            .as_ref()
            .and_then(|m| m.tenant_id.as_deref())
            .filter(|t| !t.is_empty())
    }
}

/// Server-controlled metadata. Users cannot edit it, so the tenant lives here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppMetadata {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tenant_is_read_from_app_metadata() {
        let claims: Claims = serde_json::from_value(json!({
            "sub": "u1", "aud": "authenticated", "iss": "x", "iat": 0, "exp": 1,
            "app_metadata": {"provider": "email", "tenant_id": "t1"}
        }))
        .unwrap();
        assert_eq!(claims.tenant_id(), Some("t1"));

        let bare: Claims = serde_json::from_value(json!({
            "sub": "u1", "aud": "authenticated", "iss": "x", "iat": 0, "exp": 1,
            "app_metadata": {"tenant_id": ""}
        }))
        .unwrap();
        assert_eq!(bare.tenant_id(), None);
    }
}
