//! Email template CRUD over `email_templates`.

use chrono::Utc;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::business_client::BusinessClientManager;
use crate::domain::{
    CreateEmailTemplateRequest, EmailTemplate, TemplateListParams, TemplateSearchParams,
    UpdateEmailTemplateRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::supabase::{decode_first, decode_rows, TableQuery};

pub const TEMPLATES_TABLE: &str = "email_templates";

#[derive(Clone)]
pub struct EmailTemplateService {
    client: Arc<BusinessClientManager>,
}

impl EmailTemplateService {
    pub fn new(client: Arc<BusinessClientManager>) -> Self {
        Self { client }
    }

    fn live(tenant_id: &str) -> TableQuery {
        TableQuery::table(TEMPLATES_TABLE)
            .eq("tenant_id", tenant_id)
            .is_null("deleted_at")
    }

    fn by_id(template_id: &str, tenant_id: &str) -> TableQuery {
        Self::live(tenant_id).eq("id", template_id)
    }

    #[instrument(skip(self, params))]
    pub async fn get_templates(
        &self,
        tenant_id: &str,
        params: &TemplateListParams,
    ) -> ApiResult<Vec<EmailTemplate>> {
        let mut query = Self::live(tenant_id);
        if let Some(category) = params.category.as_deref().filter(|c| !c.is_empty()) {
            query = query.eq("category", category);
        }
        if let Some(is_active) = params.is_active {
            query = query.eq("is_active", is_active);
        }
        query = query.order("created_at", false);
        if let Some(limit) = params.limit {
            query = query.limit(limit);
        }

        decode_rows(self.client.select(&query).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_template_by_id(
        &self,
        template_id: &str,
        tenant_id: &str,
    ) -> Option<EmailTemplate> {
        let query = Self::by_id(template_id, tenant_id).single();
        match self.client.select(&query).await.and_then(decode_first) {
            Ok(template) => template,
            Err(e) => {
                warn!(error = %e, template_id, "Template lookup failed");
                None
            }
        }
    }

    pub async fn get_templates_by_category(
        &self,
        tenant_id: &str,
        category: &str,
    ) -> ApiResult<Vec<EmailTemplate>> {
        let params = TemplateListParams {
            category: Some(category.to_string()),
            is_active: Some(true),
            limit: None,
        };
        self.get_templates(tenant_id, &params).await
    }

    /// Most used active template of a category.
    #[instrument(skip(self))]
    pub async fn get_default_template_by_category(
        &self,
        tenant_id: &str,
        category: &str,
    ) -> ApiResult<Option<EmailTemplate>> {
        let query = Self::live(tenant_id)
            .eq("category", category)
            .eq("is_active", true)
            .order("usage_count", false)
            .order("created_at", false)
            .limit(1);

        decode_first(self.client.select(&query).await?)
    }

    #[instrument(skip(self, request))]
    pub async fn create_template(
        &self,
        tenant_id: &str,
        created_by: &str,
        request: &CreateEmailTemplateRequest,
    ) -> ApiResult<EmailTemplate> {
        request.validate().map_err(ApiError::bad_request)?;

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "name": request.name,
            "description": request.description,
            "category": request.category,
            "subject_template": request.subject_template,
            "body_template_text": request.body_template_text,
            "body_template_html": request.body_template_html,
            "signature_template": request.signature_template,
            "available_placeholders": request.available_placeholders.clone().unwrap_or_default(),
            "required_placeholders": request.required_placeholders.clone().unwrap_or_default(),
            "ai_summary_enabled": request.ai_summary_enabled.unwrap_or(false),
            "is_active": true,
            "usage_count": 0,
            "created_by": created_by,
            "tenant_id": tenant_id,
            "created_at": now,
            "updated_at": now,
        });

        let template: EmailTemplate =
            decode_first(self.client.insert(TEMPLATES_TABLE, vec![row]).await?)?
                .ok_or_else(|| ApiError::internal("Insert returned no template row"))?;

        info!(template_id = %template.id, "Email template created");
        Ok(template)
    }

    #[instrument(skip(self, request))]
    pub async fn update_template(
        &self,
        template_id: &str,
        tenant_id: &str,
        request: &UpdateEmailTemplateRequest,
    ) -> ApiResult<EmailTemplate> {
        let mut patch =
            serde_json::to_value(request).map_err(|e| ApiError::internal(e.to_string()))?;
        if let Value::Object(obj) = &mut patch {
            obj.insert("updated_at".into(), json!(Utc::now().to_rfc3339()));
        }

        decode_first(
            self.client
                .update(&Self::by_id(template_id, tenant_id), patch)
                .await?,
        )?
        .ok_or_else(|| ApiError::not_found(format!("Template {} not found", template_id)))
    }

    /// Soft delete: deactivated and stamped with `deleted_at`.
    #[instrument(skip(self))]
    pub async fn delete_template(&self, template_id: &str, tenant_id: &str) -> ApiResult<()> {
        let now = Utc::now().to_rfc3339();
        let patch = json!({"is_active": false, "deleted_at": now, "updated_at": now});

        let updated = self
            .client
            .update(&Self::by_id(template_id, tenant_id), patch)
            .await?;
        if updated.is_empty() {
            return Err(ApiError::not_found(format!("Template {} not found", template_id)));
        }
        Ok(())
    }

    /// Read-modify-write bump of `usage_count`; also stamps `last_used_at`.
    #[instrument(skip(self))]
    pub async fn increment_usage_count(&self, template_id: &str, tenant_id: &str) -> ApiResult<i64> {
        let current = self
            .get_template_by_id(template_id, tenant_id)
            .await
            .ok_or_else(|| ApiError::not_found(format!("Template {} not found", template_id)))?;

        let usage_count = current.usage_count + 1;
        let now = Utc::now().to_rfc3339();
        let patch = json!({"usage_count": usage_count, "last_used_at": now, "updated_at": now});

        self.client
            .update(&Self::by_id(template_id, tenant_id), patch)
            .await?;
        Ok(usage_count)
    }

    #[instrument(skip(self, params))]
    pub async fn search_templates(
        &self,
        tenant_id: &str,
        params: &TemplateSearchParams,
    ) -> ApiResult<Vec<EmailTemplate>> {
        let mut query = Self::live(tenant_id);
        if let Some(term) = params.query.as_deref().filter(|q| !q.trim().is_empty()) {
            query = query.or_ilike_contains(&["name", "description", "category"], term);
        }
        if let Some(category) = params.category.as_deref().filter(|c| !c.is_empty()) {
            query = query.eq("category", category);
        }
        if let Some(is_active) = params.is_active {
            query = query.eq("is_active", is_active);
        }

        decode_rows(self.client.select(&query.order("created_at", false)).await?)
    }

    /// Categories of active templates, distinct and sorted.
    #[instrument(skip(self))]
    pub async fn get_available_categories(&self, tenant_id: &str) -> ApiResult<Vec<String>> {
        let query = Self::live(tenant_id)
            .select("category")
            .eq("is_active", true);
        let rows = self.client.select(&query).await?;

        let categories: BTreeSet<String> = rows
            .iter()
            .filter_map(|r| r.get("category").and_then(Value::as_str))
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect();
        Ok(categories.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::manager;
    use crate::supabase::InMemoryTables;

    fn template(id: &str, category: &str, usage: i64, created: &str) -> Value {
        json!({
            "id": id, "name": format!("tpl {}", id), "category": category,
            "subject_template": "件名", "body_template_text": "本文",
            "usage_count": usage, "is_active": true, "tenant_id": "t1",
            "created_at": created, "deleted_at": null,
        })
    }

    fn seeded() -> (InMemoryTables, EmailTemplateService) {
        let tables = InMemoryTables::new();
        tables.seed(
            TEMPLATES_TABLE,
            vec![
                template("a", "project_introduction", 3, "2024-01-01"),
                template("b", "project_introduction", 9, "2024-01-02"),
                template("c", "follow_up", 0, "2024-01-03"),
            ],
        );
        (tables.clone(), EmailTemplateService::new(manager(&tables)))
    }

    #[tokio::test]
    async fn default_template_is_most_used() {
        let (_, service) = seeded();
        let template = service
            .get_default_template_by_category("t1", "project_introduction")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(template.id, "b");

        assert!(service
            .get_default_template_by_category("t1", "missing")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn deleted_templates_disappear_from_listings() {
        let (tables, service) = seeded();
        service.delete_template("c", "t1").await.unwrap();

        let row = tables.find_by_id(TEMPLATES_TABLE, "c").unwrap();
        assert_eq!(row["is_active"], false);
        assert!(row["deleted_at"].is_string());

        let all = service
            .get_templates("t1", &TemplateListParams::default())
            .await
            .unwrap();
        let ids: Vec<_> = all.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(
            service.get_available_categories("t1").await.unwrap(),
            vec!["project_introduction"]
        );
    }

    #[tokio::test]
    async fn usage_count_increments_and_stamps_last_used() {
        let (tables, service) = seeded();
        assert_eq!(service.increment_usage_count("a", "t1").await.unwrap(), 4);

        let row = tables.find_by_id(TEMPLATES_TABLE, "a").unwrap();
        assert_eq!(row["usage_count"], 4);
        assert!(row["last_used_at"].is_string());
    }

    #[tokio::test]
    async fn create_validates_required_fields() {
        let (_, service) = seeded();
        let request: CreateEmailTemplateRequest = serde_json::from_value(json!({
            "name": "紹介", "category": "", "subject_template": "s", "body_template_text": "b"
        }))
        .unwrap();
        let err = service.create_template("t1", "u1", &request).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "カテゴリーは必須です"));
    }

    #[tokio::test]
    async fn search_matches_name_or_category() {
        let (_, service) = seeded();
        let params = TemplateSearchParams {
            query: Some("follow".into()),
            ..Default::default()
        };
        let found = service.search_templates("t1", &params).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "c");
    }
}
