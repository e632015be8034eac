//! Engineer (candidate) queries and writes.

use chrono::Utc;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::business_client::BusinessClientManager;
use crate::domain::{
    CompanyType, Engineer, EngineerInput, EngineerSearch, DEFAULT_ENGINEER_STATUS,
};
use crate::error::{ApiError, ApiResult};
use crate::supabase::{decode_first, decode_rows, TableQuery};

use super::is_filter_set;

pub const ENGINEERS_TABLE: &str = "engineers";

#[derive(Clone)]
pub struct EngineerService {
    client: Arc<BusinessClientManager>,
}

impl EngineerService {
    pub fn new(client: Arc<BusinessClientManager>) -> Self {
        Self { client }
    }

    fn active(tenant_id: &str) -> TableQuery {
        TableQuery::table(ENGINEERS_TABLE)
            .eq("tenant_id", tenant_id)
            .eq("is_active", true)
    }

    fn by_id(engineer_id: &str, tenant_id: &str) -> TableQuery {
        TableQuery::table(ENGINEERS_TABLE)
            .eq("id", engineer_id)
            .eq("tenant_id", tenant_id)
    }

    #[instrument(skip(self))]
    pub async fn get_active_engineers(
        &self,
        tenant_id: &str,
        company_type: Option<CompanyType>,
    ) -> ApiResult<Vec<Engineer>> {
        let mut query = Self::active(tenant_id);
        if let Some(company_type) = company_type {
            query = query.eq("company_type", company_type.label());
        }

        let rows = self.client.select(&query.order("created_at", false)).await?;
        decode_rows(rows)
    }

    #[instrument(skip(self))]
    pub async fn get_engineer_by_id(&self, engineer_id: &str, tenant_id: &str) -> Option<Engineer> {
        let query = Self::active(tenant_id).eq("id", engineer_id).single();

        match self.client.select(&query).await.and_then(decode_first) {
            Ok(engineer) => engineer,
            Err(e) => {
                warn!(error = %e, engineer_id, "Engineer lookup failed");
                None
            }
        }
    }

    #[instrument(skip(self, search))]
    pub async fn search_engineers(
        &self,
        tenant_id: &str,
        search: &EngineerSearch,
    ) -> ApiResult<Vec<Engineer>> {
        let mut query = Self::active(tenant_id);

        if let Some(term) = search.query.as_deref().filter(|q| !q.trim().is_empty()) {
            query = query.or_ilike_contains(&["name", "email", "company_name"], term);
        }
        if let Some(company_type) = search.company_type.as_deref().filter(|v| is_filter_set(v)) {
            query = query.eq("company_type", company_type);
        }
        if let Some(status) = search.status.as_deref().filter(|v| is_filter_set(v)) {
            query = query.eq("current_status", status);
        }
        if let Some(skills) = search.skills.as_ref().filter(|s| !s.is_empty()) {
            query = query.overlaps("skills", skills.iter().cloned());
        }
        if let Some(level) = search.japanese_level.as_deref().filter(|v| is_filter_set(v)) {
            query = query.eq("japanese_level", level);
        }
        if let Some(nationality) = search.nationality.as_deref().filter(|v| is_filter_set(v)) {
            query = query.eq("nationality", nationality);
        }

        let rows = self.client.select(&query.order("created_at", false)).await?;
        decode_rows(rows)
    }

    /// Every skill across active engineers, distinct and sorted.
    #[instrument(skip(self))]
    pub async fn get_skills_list(&self, tenant_id: &str) -> ApiResult<Vec<String>> {
        let rows = self
            .client
            .select(&Self::active(tenant_id).select("skills"))
            .await?;

        let skills: BTreeSet<String> = rows
            .iter()
            .filter_map(|row| row.get("skills").and_then(Value::as_array))
            .flatten()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Ok(skills.into_iter().collect())
    }

    #[instrument(skip(self))]
    pub async fn get_nationality_list(&self, tenant_id: &str) -> ApiResult<Vec<String>> {
        let query = Self::active(tenant_id)
            .select("nationality")
            .not_null("nationality");
        let rows = self.client.select(&query).await?;

        let nationalities: BTreeSet<String> = rows
            .iter()
            .filter_map(|row| row.get("nationality").and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Ok(nationalities.into_iter().collect())
    }

    #[instrument(skip(self, input))]
    pub async fn create_engineer(
        &self,
        tenant_id: &str,
        company_type: CompanyType,
        input: &EngineerInput,
    ) -> ApiResult<Engineer> {
        input.validate_for_create().map_err(ApiError::bad_request)?;

        let now = Utc::now().to_rfc3339();
        let mut row = input.to_patch();
        row.entry("current_status")
            .or_insert_with(|| json!(DEFAULT_ENGINEER_STATUS));
        row.entry("source").or_insert_with(|| json!("manual"));
        row.insert("company_type".into(), json!(company_type.label()));
        row.insert("tenant_id".into(), json!(tenant_id));
        row.insert("is_active".into(), json!(true));
        row.insert("created_at".into(), json!(now));
        row.insert("updated_at".into(), json!(now));

        let rows = self
            .client
            .insert(ENGINEERS_TABLE, vec![Value::Object(row)])
            .await?;
        let engineer: Engineer = decode_first(rows)?
            .ok_or_else(|| ApiError::internal("Insert returned no engineer row"))?;

        info!(engineer_id = %engineer.id, "Engineer created");
        Ok(engineer)
    }

    #[instrument(skip(self, input))]
    pub async fn update_engineer(
        &self,
        engineer_id: &str,
        tenant_id: &str,
        input: &EngineerInput,
    ) -> ApiResult<Engineer> {
        let mut patch = input.to_patch();
        patch.insert("updated_at".into(), json!(Utc::now().to_rfc3339()));

        let rows = self
            .client
            .update(&Self::by_id(engineer_id, tenant_id), Value::Object(patch))
            .await?;

        decode_first(rows)?
            .ok_or_else(|| ApiError::not_found(format!("Engineer {} not found", engineer_id)))
    }

    /// Soft delete.
    #[instrument(skip(self))]
    pub async fn delete_engineer(&self, engineer_id: &str, tenant_id: &str) -> ApiResult<()> {
        let patch = json!({"is_active": false, "updated_at": Utc::now().to_rfc3339()});
        let updated = self
            .client
            .update(&Self::by_id(engineer_id, tenant_id), patch)
            .await?;

        if updated.is_empty() {
            return Err(ApiError::not_found(format!("Engineer {} not found", engineer_id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn permanently_delete_engineer(
        &self,
        engineer_id: &str,
        tenant_id: &str,
    ) -> ApiResult<()> {
        let removed = self
            .client
            .delete(&Self::by_id(engineer_id, tenant_id))
            .await?;

        if removed.is_empty() {
            return Err(ApiError::not_found(format!("Engineer {} not found", engineer_id)));
        }
        info!(engineer_id, "Engineer permanently deleted");
        Ok(())
    }

    /// Apply the same patch to every listed engineer.
    #[instrument(skip(self, ids, input), fields(count = ids.len()))]
    pub async fn batch_update_engineers(
        &self,
        tenant_id: &str,
        ids: &[String],
        input: &EngineerInput,
    ) -> ApiResult<Vec<Engineer>> {
        if ids.is_empty() {
            return Err(ApiError::bad_request("更新対象の技術者が選択されていません"));
        }

        let mut patch = input.to_patch();
        patch.insert("updated_at".into(), json!(Utc::now().to_rfc3339()));

        let query = TableQuery::table(ENGINEERS_TABLE)
            .in_list("id", ids.iter().cloned())
            .eq("tenant_id", tenant_id);
        let rows = self.client.update(&query, Value::Object(patch)).await?;

        info!(updated = rows.len(), "Engineers batch updated");
        decode_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::manager;
    use crate::supabase::InMemoryTables;

    fn seeded() -> (InMemoryTables, EngineerService) {
        let tables = InMemoryTables::new();
        tables.seed(
            ENGINEERS_TABLE,
            vec![
                json!({"id": "e1", "name": "山田太郎", "tenant_id": "t1", "is_active": true,
                       "company_type": "自社", "skills": ["Java", "AWS"], "nationality": "日本",
                       "japanese_level": "ネイティブ", "created_at": "2024-01-01"}),
                json!({"id": "e2", "name": "Li Wei", "tenant_id": "t1", "is_active": true,
                       "company_type": "他社", "skills": ["Go", "AWS"], "nationality": "中国",
                       "japanese_level": "N1", "created_at": "2024-01-02"}),
                json!({"id": "e3", "name": "Hidden", "tenant_id": "t1", "is_active": false,
                       "company_type": "自社", "skills": ["COBOL"], "nationality": "日本"}),
            ],
        );
        let service = EngineerService::new(manager(&tables));
        (tables, service)
    }

    #[tokio::test]
    async fn active_engineers_filter_by_company_label() {
        let (_, service) = seeded();
        let own = service
            .get_active_engineers("t1", Some(CompanyType::Own))
            .await
            .unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id, "e1");

        let all = service.get_active_engineers("t1", None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn skills_and_nationalities_are_distinct_and_sorted() {
        let (_, service) = seeded();
        assert_eq!(
            service.get_skills_list("t1").await.unwrap(),
            vec!["AWS", "Go", "Java"]
        );
        assert_eq!(
            service.get_nationality_list("t1").await.unwrap(),
            vec!["中国", "日本"]
        );
    }

    #[tokio::test]
    async fn search_maps_status_to_current_status() {
        let (tables, service) = seeded();
        tables.seed(
            ENGINEERS_TABLE,
            vec![json!({"id": "e4", "name": "Sato", "tenant_id": "t1", "is_active": true,
                        "current_status": "面談", "skills": []})],
        );

        let search = EngineerSearch {
            status: Some("面談".into()),
            ..Default::default()
        };
        let found = service.search_engineers("t1", &search).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "e4");
    }

    #[tokio::test]
    async fn create_validates_and_defaults_status() {
        let (_, service) = seeded();
        let missing: EngineerInput = serde_json::from_value(json!({"name": "X"})).unwrap();
        let err = service
            .create_engineer("t1", CompanyType::Own, &missing)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "スキルは必須です"));

        let input: EngineerInput = serde_json::from_value(json!({
            "name": "鈴木",
            "skills": "Rust, Go",
            "japanese_level": "N2",
            "experience": 5,
            "current_status": "unknown",
        }))
        .unwrap();
        let engineer = service
            .create_engineer("t1", CompanyType::Other, &input)
            .await
            .unwrap();
        assert_eq!(engineer.skills, vec!["Rust", "Go"]);
        assert_eq!(engineer.current_status.as_deref(), Some("提案中"));
        assert_eq!(engineer.company_type.as_deref(), Some("他社"));
        assert_eq!(engineer.source.as_deref(), Some("manual"));
    }

    #[tokio::test]
    async fn soft_delete_keeps_row_but_hides_it() {
        let (tables, service) = seeded();
        service.delete_engineer("e1", "t1").await.unwrap();

        assert!(tables.find_by_id(ENGINEERS_TABLE, "e1").is_some());
        assert!(service.get_engineer_by_id("e1", "t1").await.is_none());
        let listed = service.get_active_engineers("t1", None).await.unwrap();
        assert!(listed.iter().all(|e| e.id != "e1"));
    }

    #[tokio::test]
    async fn permanent_delete_removes_row() {
        let (tables, service) = seeded();
        service.permanently_delete_engineer("e3", "t1").await.unwrap();
        assert!(tables.find_by_id(ENGINEERS_TABLE, "e3").is_none());

        let err = service
            .permanently_delete_engineer("e3", "t1")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn batch_update_touches_listed_rows_only() {
        let (tables, service) = seeded();
        let updates: EngineerInput =
            serde_json::from_value(json!({"current_status": "契約中"})).unwrap();

        let updated = service
            .batch_update_engineers("t1", &["e1".into(), "e2".into()], &updates)
            .await
            .unwrap();
        assert_eq!(updated.len(), 2);
        assert_eq!(
            tables.find_by_id(ENGINEERS_TABLE, "e3").unwrap().get("current_status"),
            None
        );
    }
}
