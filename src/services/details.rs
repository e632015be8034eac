use async_trait::async_trait;

use crate::domain::{Engineer, Project};

use super::{EngineerService, ProjectService};

/// Point lookups used to enrich match rows. A miss and a failed lookup both
/// read as `None`.
#[async_trait]
pub trait DetailLookup: Send + Sync {
    async fn project(&self, project_id: &str) -> Option<Project>;
    async fn engineer(&self, engineer_id: &str) -> Option<Engineer>;
}

/// Detail lookups bound to one tenant.
#[derive(Clone)]
pub struct TenantDetails {
    projects: ProjectService,
    engineers: EngineerService,
    tenant_id: String,
}

impl TenantDetails {
    pub fn new(projects: ProjectService, engineers: EngineerService, tenant_id: &str) -> Self {
        Self {
            projects,
            engineers,
            tenant_id: tenant_id.to_string(),
        }
    }
}

#[async_trait]
impl DetailLookup for TenantDetails {
    async fn project(&self, project_id: &str) -> Option<Project> {
        if project_id.is_empty() {
            return None;
        }
        self.projects
            .get_project_by_id(project_id, &self.tenant_id)
            .await
    }

    async fn engineer(&self, engineer_id: &str) -> Option<Engineer> {
        if engineer_id.is_empty() {
            return None;
        }
        self.engineers
            .get_engineer_by_id(engineer_id, &self.tenant_id)
            .await
    }
}
