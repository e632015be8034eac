//! Project archives: list, restore and removal.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::business_client::BusinessClientManager;
use crate::domain::ProjectArchive;
use crate::error::{ApiError, ApiResult};
use crate::supabase::{decode_first, decode_rows, TableQuery};

use super::projects::{ARCHIVES_TABLE, PROJECTS_TABLE};

#[derive(Clone)]
pub struct ArchiveService {
    client: Arc<BusinessClientManager>,
}

impl ArchiveService {
    pub fn new(client: Arc<BusinessClientManager>) -> Self {
        Self { client }
    }

    fn by_id(archive_id: &str, tenant_id: &str) -> TableQuery {
        TableQuery::table(ARCHIVES_TABLE)
            .eq("id", archive_id)
            .eq("tenant_id", tenant_id)
    }

    #[instrument(skip(self))]
    pub async fn list_archives(&self, tenant_id: &str) -> ApiResult<Vec<ProjectArchive>> {
        let query = TableQuery::table(ARCHIVES_TABLE)
            .eq("tenant_id", tenant_id)
            .order("archived_at", false);
        decode_rows(self.client.select(&query).await?)
    }

    async fn fetch(&self, archive_id: &str, tenant_id: &str) -> ApiResult<ProjectArchive> {
        decode_first(
            self.client
                .select(&Self::by_id(archive_id, tenant_id).single())
                .await?,
        )?
        .ok_or_else(|| ApiError::not_found(format!("Archive {} not found", archive_id)))
    }

    /// Reactivate the original project, then drop the archive row.
    #[instrument(skip(self))]
    pub async fn restore_archive(&self, archive_id: &str, tenant_id: &str) -> ApiResult<()> {
        let archive = self.fetch(archive_id, tenant_id).await?;

        let project = TableQuery::table(PROJECTS_TABLE)
            .eq("id", archive.original_project_id.as_str())
            .eq("tenant_id", tenant_id);
        let patch = json!({"is_active": true, "updated_at": Utc::now().to_rfc3339()});
        self.client.update(&project, patch).await?;

        self.client.delete(&Self::by_id(archive_id, tenant_id)).await?;

        info!(archive_id, project_id = %archive.original_project_id, "Archive restored");
        Ok(())
    }

    /// Hard-delete the original project (best effort), then the archive.
    #[instrument(skip(self))]
    pub async fn delete_archive(&self, archive_id: &str, tenant_id: &str) -> ApiResult<()> {
        let archive = self.fetch(archive_id, tenant_id).await?;
        self.delete_original_project(&archive.original_project_id, tenant_id)
            .await;

        self.client.delete(&Self::by_id(archive_id, tenant_id)).await?;

        info!(archive_id, "Archive deleted");
        Ok(())
    }

    /// Delete several archives. Returns how many archive rows were removed;
    /// an empty id list removes nothing.
    #[instrument(skip(self, archive_ids), fields(count = archive_ids.len()))]
    pub async fn delete_archives(&self, archive_ids: &[String], tenant_id: &str) -> ApiResult<usize> {
        if archive_ids.is_empty() {
            return Ok(0);
        }

        for archive_id in archive_ids {
            match self.fetch(archive_id, tenant_id).await {
                Ok(archive) => {
                    self.delete_original_project(&archive.original_project_id, tenant_id)
                        .await
                }
                Err(e) => warn!(error = %e, archive_id = %archive_id, "Skipping archive lookup"),
            }
        }

        let query = TableQuery::table(ARCHIVES_TABLE)
            .in_list("id", archive_ids.iter().cloned())
            .eq("tenant_id", tenant_id);
        let removed = self.client.delete(&query).await?;

        info!(removed = removed.len(), "Archives deleted");
        Ok(removed.len())
    }

    async fn delete_original_project(&self, project_id: &str, tenant_id: &str) {
        let query = TableQuery::table(PROJECTS_TABLE)
            .eq("id", project_id)
            .eq("tenant_id", tenant_id);
        if let Err(e) = self.client.delete(&query).await {
            warn!(error = %e, project_id, "Original project delete failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::manager;
    use crate::supabase::InMemoryTables;

    fn seeded() -> (InMemoryTables, ArchiveService) {
        let tables = InMemoryTables::new();
        tables.seed(
            PROJECTS_TABLE,
            vec![
                json!({"id": "p1", "title": "A", "tenant_id": "t1", "is_active": false}),
                json!({"id": "p2", "title": "B", "tenant_id": "t1", "is_active": false}),
            ],
        );
        tables.seed(
            ARCHIVES_TABLE,
            vec![
                json!({"id": "a1", "original_project_id": "p1", "project_data": {"title": "A"},
                       "tenant_id": "t1", "archived_at": "2024-01-01"}),
                json!({"id": "a2", "original_project_id": "p2", "project_data": {"title": "B"},
                       "tenant_id": "t1", "archived_at": "2024-02-01"}),
            ],
        );
        (tables.clone(), ArchiveService::new(manager(&tables)))
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let (_, service) = seeded();
        let ids: Vec<_> = service
            .list_archives("t1")
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["a2", "a1"]);
    }

    #[tokio::test]
    async fn restore_reactivates_and_removes_archive() {
        let (tables, service) = seeded();
        service.restore_archive("a1", "t1").await.unwrap();

        assert_eq!(tables.find_by_id(PROJECTS_TABLE, "p1").unwrap()["is_active"], true);
        assert!(tables.find_by_id(ARCHIVES_TABLE, "a1").is_none());
    }

    #[tokio::test]
    async fn delete_removes_project_and_archive() {
        let (tables, service) = seeded();
        service.delete_archive("a2", "t1").await.unwrap();

        assert!(tables.find_by_id(PROJECTS_TABLE, "p2").is_none());
        assert!(tables.find_by_id(ARCHIVES_TABLE, "a2").is_none());
    }

    #[tokio::test]
    async fn batch_delete_skips_unknown_ids() {
        let (tables, service) = seeded();
        assert_eq!(service.delete_archives(&[], "t1").await.unwrap(), 0);

        let removed = service
            .delete_archives(&["a1".into(), "ghost".into()], "t1")
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(tables.find_by_id(PROJECTS_TABLE, "p1").is_none());
        assert_eq!(tables.rows(ARCHIVES_TABLE).len(), 1);
    }
}
