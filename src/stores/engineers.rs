use tracing::instrument;

use crate::domain::{CompanyType, Engineer, EngineerInput};
use crate::error::ApiResult;
use crate::services::EngineerService;

use super::{Notice, StoreState};

/// Engineers of one tenant, optionally narrowed to one company type.
pub struct EngineerStore {
    service: EngineerService,
    tenant_id: String,
    company_type: Option<CompanyType>,
    pub state: StoreState<Engineer>,
}

impl EngineerStore {
    pub fn new(service: EngineerService, tenant_id: &str, company_type: Option<CompanyType>) -> Self {
        Self {
            service,
            tenant_id: tenant_id.to_string(),
            company_type,
            state: StoreState::default(),
        }
    }

    /// Reload the list. On failure the list is emptied.
    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    pub async fn fetch(&mut self) -> &[Engineer] {
        self.state.begin();
        match self
            .service
            .get_active_engineers(&self.tenant_id, self.company_type)
            .await
        {
            Ok(engineers) => {
                self.state.items = engineers;
                self.state.finish();
            }
            Err(e) => {
                self.state.items.clear();
                self.state.fail("人材データの取得に失敗しました", &e);
            }
        }
        &self.state.items
    }

    /// Create under the store's company type (自社 when unset).
    pub async fn create(&mut self, input: &EngineerInput) -> ApiResult<Engineer> {
        self.state.begin();
        let company_type = self.company_type.unwrap_or(CompanyType::Own);
        match self
            .service
            .create_engineer(&self.tenant_id, company_type, input)
            .await
        {
            Ok(engineer) => {
                self.state.items.insert(0, engineer.clone());
                self.state.finish();
                self.state
                    .notify(Notice::success("成功", "技術者情報を登録しました"));
                Ok(engineer)
            }
            Err(e) => {
                self.state.fail("技術者情報の登録に失敗しました", &e);
                Err(e)
            }
        }
    }

    pub async fn update(&mut self, engineer_id: &str, input: &EngineerInput) -> ApiResult<Engineer> {
        self.state.begin();
        match self
            .service
            .update_engineer(engineer_id, &self.tenant_id, input)
            .await
        {
            Ok(engineer) => {
                if let Some(slot) = self.state.items.iter_mut().find(|e| e.id == engineer.id) {
                    *slot = engineer.clone();
                }
                self.state.finish();
                self.state
                    .notify(Notice::success("成功", "技術者情報を更新しました"));
                Ok(engineer)
            }
            Err(e) => {
                self.state.fail("技術者情報の更新に失敗しました", &e);
                Err(e)
            }
        }
    }

    pub async fn delete(&mut self, engineer_id: &str) -> ApiResult<()> {
        self.state.begin();
        match self.service.delete_engineer(engineer_id, &self.tenant_id).await {
            Ok(()) => {
                self.state.items.retain(|e| e.id != engineer_id);
                self.state.finish();
                self.state.notify(Notice::success("成功", "技術者を削除しました"));
                Ok(())
            }
            Err(e) => {
                self.state.fail("技術者の削除に失敗しました", &e);
                Err(e)
            }
        }
    }

    pub async fn permanently_delete(&mut self, engineer_id: &str) -> ApiResult<()> {
        self.state.begin();
        match self
            .service
            .permanently_delete_engineer(engineer_id, &self.tenant_id)
            .await
        {
            Ok(()) => {
                self.state.items.retain(|e| e.id != engineer_id);
                self.state.finish();
                self.state
                    .notify(Notice::success("成功", "技術者を完全に削除しました"));
                Ok(())
            }
            Err(e) => {
                self.state.fail("技術者の完全削除に失敗しました", &e);
                Err(e)
            }
        }
    }

    pub async fn batch_update(
        &mut self,
        engineer_ids: &[String],
        input: &EngineerInput,
    ) -> ApiResult<Vec<Engineer>> {
        self.state.begin();
        match self
            .service
            .batch_update_engineers(&self.tenant_id, engineer_ids, input)
            .await
        {
            Ok(updated) => {
                for engineer in &updated {
                    if let Some(slot) = self.state.items.iter_mut().find(|e| e.id == engineer.id) {
                        *slot = engineer.clone();
                    }
                }
                self.state.finish();
                self.state.notify(Notice::success(
                    "成功",
                    format!("{}件の技術者情報を更新しました", engineer_ids.len()),
                ));
                Ok(updated)
            }
            Err(e) => {
                self.state.fail("技術者情報の一括更新に失敗しました", &e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::engineers::ENGINEERS_TABLE;
    use crate::services::test_support::manager;
    use crate::stores::NoticeLevel;
    use crate::supabase::InMemoryTables;
    use serde_json::json;

    fn store(tables: &InMemoryTables) -> EngineerStore {
        EngineerStore::new(EngineerService::new(manager(tables)), "t1", None)
    }

    fn seeded() -> InMemoryTables {
        let tables = InMemoryTables::new();
        tables.seed(
            ENGINEERS_TABLE,
            vec![
                json!({"id": "e1", "name": "山田", "tenant_id": "t1", "is_active": true,
                       "skills": ["Java"], "created_at": "2024-01-01"}),
                json!({"id": "e2", "name": "佐藤", "tenant_id": "t1", "is_active": true,
                       "skills": ["Go"], "created_at": "2024-01-02"}),
            ],
        );
        tables
    }

    #[tokio::test]
    async fn soft_deleted_engineer_leaves_active_list_but_stays_retrievable() {
        let tables = seeded();
        let mut store = store(&tables);
        assert_eq!(store.fetch().await.len(), 2);

        store.delete("e1").await.unwrap();
        assert_eq!(store.state.items.len(), 1);
        assert_eq!(store.state.notices[0].description.as_deref(), Some("技術者を削除しました"));

        assert_eq!(store.fetch().await.len(), 1);
        let raw = tables.find_by_id(ENGINEERS_TABLE, "e1").unwrap();
        assert_eq!(raw["is_active"], false);
    }

    #[tokio::test]
    async fn validation_failure_aborts_create_with_a_notice() {
        let tables = seeded();
        let mut store = store(&tables);
        let input: EngineerInput = serde_json::from_value(json!({"name": "新人"})).unwrap();

        assert!(store.create(&input).await.is_err());
        assert!(!store.state.loading);
        let notice = &store.state.notices[0];
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.title, "技術者情報の登録に失敗しました");
        assert_eq!(tables.rows(ENGINEERS_TABLE).len(), 2);
    }

    #[tokio::test]
    async fn batch_update_reports_count() {
        let tables = seeded();
        let mut store = store(&tables);
        store.fetch().await;

        let input: EngineerInput =
            serde_json::from_value(json!({"current_status": "面談"})).unwrap();
        let ids = vec!["e1".to_string(), "e2".to_string()];
        let updated = store.batch_update(&ids, &input).await.unwrap();

        assert_eq!(updated.len(), 2);
        assert!(store
            .state
            .items
            .iter()
            .all(|e| e.current_status.as_deref() == Some("面談")));
        assert_eq!(
            store.state.notices[0].description.as_deref(),
            Some("2件の技術者情報を更新しました")
        );
    }
}
