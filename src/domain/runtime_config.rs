use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Response of `/api/v1/config/frontend-env`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrontendEnvResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: HashMap<String, String>,
    #[serde(default)]
    pub count: usize,
}

/// Response of `/api/v1/config/frontend-env/health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigHealth {
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub missing_critical_vars: Vec<String>,
    pub timestamp: String,
    pub environment: String,
}

impl ConfigHealth {
    /// Health result for an unreachable or failing config endpoint.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            missing_critical_vars: Vec::new(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            environment: "unknown".to_string(),
        }
    }
}

/// Runtime configuration snapshot exposed over HTTP.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeConfigView {
    pub values: HashMap<String, String>,
    pub count: usize,
    pub cached: bool,
}
