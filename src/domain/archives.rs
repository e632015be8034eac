use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Row from `project_archives`: a snapshot of a project taken when it was
/// archived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectArchive {
    pub id: String,
    pub original_project_id: String,
    #[serde(default)]
    pub project_data: Value,
    #[serde(default)]
    pub archive_reason: Option<String>,
    #[serde(default)]
    pub archived_by: Option<String>,
    #[serde(default)]
    pub archived_at: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteArchivesRequest {
    pub ids: Vec<String>,
}
