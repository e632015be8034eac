use crate::domain::ProjectArchive;
use crate::error::ApiResult;
use crate::services::ArchiveService;

use super::{Notice, StoreState};

pub struct ArchiveStore {
    service: ArchiveService,
    tenant_id: String,
    pub state: StoreState<ProjectArchive>,
}

impl ArchiveStore {
    pub fn new(service: ArchiveService, tenant_id: &str) -> Self {
        Self {
            service,
            tenant_id: tenant_id.to_string(),
            state: StoreState::default(),
        }
    }

    pub async fn fetch(&mut self) -> &[ProjectArchive] {
        self.state.begin();
        match self.service.list_archives(&self.tenant_id).await {
            Ok(archives) => {
                self.state.items = archives;
                self.state.finish();
            }
            Err(e) => {
                self.state.items.clear();
                self.state.fail("アーカイブの取得に失敗しました", &e);
            }
        }
        &self.state.items
    }

    pub async fn restore(&mut self, archive_id: &str) -> ApiResult<()> {
        self.state.begin();
        match self.service.restore_archive(archive_id, &self.tenant_id).await {
            Ok(()) => {
                self.state.items.retain(|a| a.id != archive_id);
                self.state.finish();
                self.state
                    .notify(Notice::success("成功", "案件が正常に復元されました"));
                Ok(())
            }
            Err(e) => {
                self.state.fail("案件の復元に失敗しました", &e);
                Err(e)
            }
        }
    }

    pub async fn delete(&mut self, archive_id: &str) -> ApiResult<()> {
        self.state.begin();
        match self.service.delete_archive(archive_id, &self.tenant_id).await {
            Ok(()) => {
                self.state.items.retain(|a| a.id != archive_id);
                self.state.finish();
                self.state
                    .notify(Notice::success("成功", "アーカイブが正常に削除されました"));
                Ok(())
            }
            Err(e) => {
                self.state.fail("アーカイブの削除に失敗しました", &e);
                Err(e)
            }
        }
    }

    pub async fn delete_many(&mut self, archive_ids: &[String]) -> ApiResult<usize> {
        self.state.begin();
        match self.service.delete_archives(archive_ids, &self.tenant_id).await {
            Ok(removed) => {
                self.state.items.retain(|a| !archive_ids.contains(&a.id));
                self.state.finish();
                self.state.notify(Notice::success(
                    "成功",
                    format!("{}件のアーカイブが正常に削除されました", archive_ids.len()),
                ));
                Ok(removed)
            }
            Err(e) => {
                self.state.fail("アーカイブの一括削除に失敗しました", &e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::projects::{ARCHIVES_TABLE, PROJECTS_TABLE};
    use crate::services::test_support::manager;
    use crate::supabase::InMemoryTables;
    use serde_json::json;

    #[tokio::test]
    async fn restore_reactivates_and_removes_archive() {
        let tables = InMemoryTables::new();
        tables.seed(
            PROJECTS_TABLE,
            vec![json!({"id": "p1", "title": "案件", "tenant_id": "t1", "is_active": false})],
        );
        tables.seed(
            ARCHIVES_TABLE,
            vec![
                json!({"id": "a1", "original_project_id": "p1", "tenant_id": "t1",
                       "archived_at": "2024-03-01"}),
                json!({"id": "a2", "original_project_id": "p9", "tenant_id": "t1",
                       "archived_at": "2024-03-02"}),
            ],
        );
        let mut store = ArchiveStore::new(ArchiveService::new(manager(&tables)), "t1");

        assert_eq!(store.fetch().await[0].id, "a2");
        store.restore("a1").await.unwrap();

        assert_eq!(store.state.items.len(), 1);
        assert_eq!(tables.find_by_id(PROJECTS_TABLE, "p1").unwrap()["is_active"], true);
        assert!(tables.find_by_id(ARCHIVES_TABLE, "a1").is_none());
        assert_eq!(
            store.state.notices[0].description.as_deref(),
            Some("案件が正常に復元されました")
        );
    }

    #[tokio::test]
    async fn restoring_unknown_archive_raises_error_notice() {
        let tables = InMemoryTables::new();
        let mut store = ArchiveStore::new(ArchiveService::new(manager(&tables)), "t1");
        assert!(store.restore("missing").await.is_err());
        assert_eq!(store.state.notices[0].title, "案件の復元に失敗しました");
    }
}
