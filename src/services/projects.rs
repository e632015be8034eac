//! Case (project) queries and writes.

use chrono::Utc;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::business_client::BusinessClientManager;
use crate::domain::{Project, ProjectArchive, ProjectInput, ProjectSearch};
use crate::error::{ApiError, ApiResult};
use crate::supabase::{decode_first, decode_rows, TableQuery};

use super::is_filter_set;

pub const PROJECTS_TABLE: &str = "projects";
pub const ARCHIVES_TABLE: &str = "project_archives";

#[derive(Clone)]
pub struct ProjectService {
    client: Arc<BusinessClientManager>,
}

impl ProjectService {
    pub fn new(client: Arc<BusinessClientManager>) -> Self {
        Self { client }
    }

    fn active(tenant_id: &str) -> TableQuery {
        TableQuery::table(PROJECTS_TABLE)
            .eq("tenant_id", tenant_id)
            .eq("is_active", true)
    }

    #[instrument(skip(self))]
    pub async fn get_active_projects(&self, tenant_id: &str) -> ApiResult<Vec<Project>> {
        let rows = self
            .client
            .select(&Self::active(tenant_id).order("created_at", false))
            .await?;
        decode_rows(rows)
    }

    /// Active project by id. Lookup failures are logged and read as absent.
    #[instrument(skip(self))]
    pub async fn get_project_by_id(&self, project_id: &str, tenant_id: &str) -> Option<Project> {
        let query = Self::active(tenant_id).eq("id", project_id).single();

        match self.client.select(&query).await.and_then(decode_first) {
            Ok(project) => project,
            Err(e) => {
                warn!(error = %e, project_id, "Project lookup failed");
                None
            }
        }
    }

    #[instrument(skip(self, search))]
    pub async fn search_projects(
        &self,
        tenant_id: &str,
        search: &ProjectSearch,
    ) -> ApiResult<Vec<Project>> {
        let mut query = Self::active(tenant_id);

        if let Some(term) = search.query.as_deref().filter(|q| !q.trim().is_empty()) {
            query = query.or_ilike_contains(&["title", "description", "client_company"], term);
        }
        if let Some(company_type) = search.company_type.as_deref().filter(|v| is_filter_set(v)) {
            query = query.eq("company_type", company_type);
        }
        if let Some(status) = search.status.as_deref().filter(|v| is_filter_set(v)) {
            query = query.eq("status", status);
        }
        if let Some(skills) = search.skills.as_ref().filter(|s| !s.is_empty()) {
            query = query.overlaps("skills", skills.iter().cloned());
        }

        let rows = self.client.select(&query.order("created_at", false)).await?;
        decode_rows(rows)
    }

    /// Distinct client companies of active projects, in first-seen order.
    #[instrument(skip(self))]
    pub async fn get_company_list(&self, tenant_id: &str) -> Vec<String> {
        let query = Self::active(tenant_id)
            .select("client_company")
            .not_null("client_company");

        let rows = match self.client.select(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Company list lookup failed");
                return Vec::new();
            }
        };

        let mut seen = BTreeSet::new();
        rows.iter()
            .filter_map(|row| row.get("client_company").and_then(Value::as_str))
            .filter(|c| !c.is_empty())
            .filter(|c| seen.insert(c.to_string()))
            .map(String::from)
            .collect()
    }

    #[instrument(skip(self, input))]
    pub async fn create_project(
        &self,
        tenant_id: &str,
        created_by: &str,
        input: &ProjectInput,
    ) -> ApiResult<Project> {
        input.validate_for_create().map_err(ApiError::bad_request)?;

        let now = Utc::now().to_rfc3339();
        let mut row = serde_json::to_value(input).map_err(|e| ApiError::internal(e.to_string()))?;
        if let Value::Object(obj) = &mut row {
            obj.insert("tenant_id".into(), json!(tenant_id));
            obj.insert("created_by".into(), json!(created_by));
            obj.insert("created_at".into(), json!(now));
            obj.insert("updated_at".into(), json!(now));
            obj.insert("is_active".into(), json!(true));
        }

        let rows = self.client.insert(PROJECTS_TABLE, vec![row]).await?;
        let project: Project = decode_first(rows)?
            .ok_or_else(|| ApiError::internal("Insert returned no project row"))?;

        info!(project_id = %project.id, "Project created");
        Ok(project)
    }

    #[instrument(skip(self, input))]
    pub async fn update_project(
        &self,
        project_id: &str,
        tenant_id: &str,
        input: &ProjectInput,
    ) -> ApiResult<Project> {
        let mut patch = serde_json::to_value(input).map_err(|e| ApiError::internal(e.to_string()))?;
        if let Value::Object(obj) = &mut patch {
            obj.insert("updated_at".into(), json!(Utc::now().to_rfc3339()));
        }

        let query = TableQuery::table(PROJECTS_TABLE)
            .eq("id", project_id)
            .eq("tenant_id", tenant_id);

        decode_first(self.client.update(&query, patch).await?)?
            .ok_or_else(|| ApiError::not_found(format!("Project {} not found", project_id)))
    }

    /// Soft delete: the row stays but drops out of active listings.
    #[instrument(skip(self))]
    pub async fn delete_project(&self, project_id: &str, tenant_id: &str) -> ApiResult<()> {
        self.deactivate(project_id, tenant_id).await
    }

    async fn deactivate(&self, project_id: &str, tenant_id: &str) -> ApiResult<()> {
        let query = TableQuery::table(PROJECTS_TABLE)
            .eq("id", project_id)
            .eq("tenant_id", tenant_id);
        let patch = json!({"is_active": false, "updated_at": Utc::now().to_rfc3339()});

        let updated = self.client.update(&query, patch).await?;
        if updated.is_empty() {
            return Err(ApiError::not_found(format!("Project {} not found", project_id)));
        }
        Ok(())
    }

    /// Snapshot the project into `project_archives`, then deactivate it.
    #[instrument(skip(self))]
    pub async fn archive_project(
        &self,
        project_id: &str,
        tenant_id: &str,
        reason: Option<&str>,
        archived_by: &str,
    ) -> ApiResult<ProjectArchive> {
        let query = TableQuery::table(PROJECTS_TABLE)
            .eq("id", project_id)
            .eq("tenant_id", tenant_id)
            .single();
        let snapshot = self
            .client
            .select(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::not_found(format!("Project {} not found", project_id)))?;

        let archive = json!({
            "original_project_id": project_id,
            "project_data": snapshot,
            "archive_reason": reason,
            "archived_by": archived_by,
            "archived_at": Utc::now().to_rfc3339(),
            "tenant_id": tenant_id,
        });
        let archive: ProjectArchive =
            decode_first(self.client.insert(ARCHIVES_TABLE, vec![archive]).await?)?
                .ok_or_else(|| ApiError::internal("Insert returned no archive row"))?;

        self.deactivate(project_id, tenant_id).await?;

        info!(project_id, archive_id = %archive.id, "Project archived");
        Ok(archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::manager;
    use crate::supabase::InMemoryTables;

    fn seeded() -> (InMemoryTables, ProjectService) {
        let tables = InMemoryTables::new();
        tables.seed(
            PROJECTS_TABLE,
            vec![
                json!({"id": "p1", "title": "Java開発", "tenant_id": "t1", "is_active": true,
                       "client_company": "ACME", "skills": ["Java", "Spring"], "status": "募集中",
                       "created_at": "2024-01-02"}),
                json!({"id": "p2", "title": "Go API", "tenant_id": "t1", "is_active": true,
                       "client_company": "ACME", "skills": ["Go"], "status": "終了",
                       "created_at": "2024-01-03"}),
                json!({"id": "p3", "title": "Other tenant", "tenant_id": "t2", "is_active": true,
                       "client_company": "Beta"}),
                json!({"id": "p4", "title": "Inactive", "tenant_id": "t1", "is_active": false,
                       "client_company": "Gamma"}),
            ],
        );
        let service = ProjectService::new(manager(&tables));
        (tables, service)
    }

    #[tokio::test]
    async fn active_projects_are_tenant_scoped_and_newest_first() {
        let (_, service) = seeded();
        let projects = service.get_active_projects("t1").await.unwrap();
        let ids: Vec<_> = projects.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
    }

    #[tokio::test]
    async fn search_ignores_all_and_applies_skill_overlap() {
        let (_, service) = seeded();
        let search = ProjectSearch {
            query: Some("java".into()),
            company_type: Some("all".into()),
            skills: Some(vec!["Spring".into()]),
            ..Default::default()
        };
        let projects = service.search_projects("t1", &search).await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, "p1");
    }

    #[tokio::test]
    async fn company_list_is_distinct() {
        let (_, service) = seeded();
        assert_eq!(service.get_company_list("t1").await, vec!["ACME".to_string()]);
    }

    #[tokio::test]
    async fn soft_delete_keeps_row_but_hides_it() {
        let (tables, service) = seeded();
        service.delete_project("p1", "t1").await.unwrap();

        assert!(tables.find_by_id(PROJECTS_TABLE, "p1").is_some());
        assert!(service.get_project_by_id("p1", "t1").await.is_none());
        let ids: Vec<_> = service
            .get_active_projects("t1")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["p2".to_string()]);
    }

    #[tokio::test]
    async fn create_requires_title_and_sets_system_fields() {
        let (_, service) = seeded();
        let err = service
            .create_project("t1", "u1", &ProjectInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let input = ProjectInput {
            title: Some("新規案件".into()),
            skills: Some(vec!["Rust".into()]),
            ..Default::default()
        };
        let project = service.create_project("t1", "u1", &input).await.unwrap();
        assert_eq!(project.tenant_id.as_deref(), Some("t1"));
        assert_eq!(project.created_by.as_deref(), Some("u1"));
        assert_eq!(project.is_active, Some(true));
    }

    #[tokio::test]
    async fn archive_snapshots_then_deactivates() {
        let (tables, service) = seeded();
        let archive = service
            .archive_project("p2", "t1", Some("終了"), "u1")
            .await
            .unwrap();

        assert_eq!(archive.original_project_id, "p2");
        assert_eq!(archive.project_data["title"], "Go API");
        assert_eq!(
            tables.find_by_id(PROJECTS_TABLE, "p2").unwrap()["is_active"],
            false
        );
    }

    #[tokio::test]
    async fn update_of_unknown_project_is_not_found() {
        let (_, service) = seeded();
        let err = service
            .update_project("missing", "t1", &ProjectInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
