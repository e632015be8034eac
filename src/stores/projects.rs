use tracing::instrument;

use crate::domain::{Project, ProjectArchive, ProjectInput};
use crate::error::ApiResult;
use crate::services::ProjectService;

use super::{Notice, StoreState};

pub struct ProjectStore {
    service: ProjectService,
    tenant_id: String,
    user_id: String,
    pub state: StoreState<Project>,
}

impl ProjectStore {
    pub fn new(service: ProjectService, tenant_id: &str, user_id: &str) -> Self {
        Self {
            service,
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            state: StoreState::default(),
        }
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    pub async fn fetch(&mut self) -> &[Project] {
        self.state.begin();
        match self.service.get_active_projects(&self.tenant_id).await {
            Ok(projects) => {
                self.state.items = projects;
                self.state.finish();
            }
            Err(e) => {
                self.state.items.clear();
                self.state.fail("案件の取得に失敗しました", &e);
            }
        }
        &self.state.items
    }

    pub async fn create(&mut self, input: &ProjectInput) -> ApiResult<Project> {
        self.state.begin();
        match self
            .service
            .create_project(&self.tenant_id, &self.user_id, input)
            .await
        {
            Ok(project) => {
                self.state.items.insert(0, project.clone());
                self.state.finish();
                self.state
                    .notify(Notice::success("成功", "案件が正常に作成されました"));
                Ok(project)
            }
            Err(e) => {
                self.state.fail("案件の作成に失敗しました", &e);
                Err(e)
            }
        }
    }

    pub async fn update(&mut self, project_id: &str, input: &ProjectInput) -> ApiResult<Project> {
        self.state.begin();
        match self
            .service
            .update_project(project_id, &self.tenant_id, input)
            .await
        {
            Ok(project) => {
                if let Some(slot) = self.state.items.iter_mut().find(|p| p.id == project.id) {
                    *slot = project.clone();
                }
                self.state.finish();
                self.state
                    .notify(Notice::success("成功", "案件が正常に更新されました"));
                Ok(project)
            }
            Err(e) => {
                self.state.fail("案件の更新に失敗しました", &e);
                Err(e)
            }
        }
    }

    pub async fn delete(&mut self, project_id: &str) -> ApiResult<()> {
        self.state.begin();
        match self.service.delete_project(project_id, &self.tenant_id).await {
            Ok(()) => {
                self.state.items.retain(|p| p.id != project_id);
                self.state.finish();
                self.state
                    .notify(Notice::success("成功", "案件が正常に削除されました"));
                Ok(())
            }
            Err(e) => {
                self.state.fail("案件の削除に失敗しました", &e);
                Err(e)
            }
        }
    }

    pub async fn archive(&mut self, project_id: &str, reason: Option<&str>) -> ApiResult<ProjectArchive> {
        self.state.begin();
        match self
            .service
            .archive_project(project_id, &self.tenant_id, reason, &self.user_id)
            .await
        {
            Ok(archive) => {
                self.state.items.retain(|p| p.id != project_id);
                self.state.finish();
                self.state
                    .notify(Notice::success("成功", "案件をアーカイブしました"));
                Ok(archive)
            }
            Err(e) => {
                self.state.fail("案件のアーカイブに失敗しました", &e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::projects::PROJECTS_TABLE;
    use crate::services::test_support::manager;
    use crate::supabase::InMemoryTables;
    use serde_json::json;

    fn seeded() -> (InMemoryTables, ProjectStore) {
        let tables = InMemoryTables::new();
        tables.seed(
            PROJECTS_TABLE,
            vec![
                json!({"id": "p1", "title": "Java案件", "tenant_id": "t1", "is_active": true,
                       "created_at": "2024-01-01"}),
                json!({"id": "p2", "title": "Go案件", "tenant_id": "t1", "is_active": true,
                       "created_at": "2024-02-01"}),
            ],
        );
        let store = ProjectStore::new(ProjectService::new(manager(&tables)), "t1", "u1");
        (tables, store)
    }

    #[tokio::test]
    async fn soft_deleted_project_drops_out_of_listing() {
        let (tables, mut store) = seeded();
        let listed: Vec<String> = store.fetch().await.iter().map(|p| p.id.clone()).collect();
        assert_eq!(listed, vec!["p2", "p1"]);

        store.delete("p1").await.unwrap();
        assert_eq!(store.fetch().await.len(), 1);
        assert!(tables.find_by_id(PROJECTS_TABLE, "p1").is_some());
    }

    #[tokio::test]
    async fn missing_title_is_rejected_without_saving() {
        let (tables, mut store) = seeded();
        let err = store.create(&ProjectInput::default()).await.unwrap_err();
        assert!(matches!(err, crate::error::ApiError::BadRequest(_)));
        assert_eq!(store.state.notices[0].title, "案件の作成に失敗しました");
        assert_eq!(tables.rows(PROJECTS_TABLE).len(), 2);
    }

    #[tokio::test]
    async fn archive_removes_project_from_list() {
        let (_, mut store) = seeded();
        store.fetch().await;
        let archive = store.archive("p2", Some("終了")).await.unwrap();
        assert_eq!(archive.original_project_id, "p2");
        assert_eq!(store.state.items.len(), 1);
    }
}
