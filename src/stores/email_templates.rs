use tracing::warn;

use crate::domain::{
    CreateEmailTemplateRequest, EmailTemplate, TemplateListParams, TemplateSearchParams,
    UpdateEmailTemplateRequest,
};
use crate::error::ApiResult;
use crate::services::EmailTemplateService;

use super::{Notice, StoreState};

const ERROR_TITLE: &str = "エラー";

pub struct TemplateStore {
    service: EmailTemplateService,
    tenant_id: String,
    user_id: String,
    pub state: StoreState<EmailTemplate>,
}

impl TemplateStore {
    pub fn new(service: EmailTemplateService, tenant_id: &str, user_id: &str) -> Self {
        Self {
            service,
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            state: StoreState::default(),
        }
    }

    pub async fn fetch(&mut self, params: &TemplateListParams) -> &[EmailTemplate] {
        self.state.begin();
        match self.service.get_templates(&self.tenant_id, params).await {
            Ok(templates) => {
                self.state.items = templates;
                self.state.finish();
            }
            Err(e) => {
                self.state.items.clear();
                self.state.fail(ERROR_TITLE, &e);
            }
        }
        &self.state.items
    }

    pub async fn get(&self, template_id: &str) -> Option<EmailTemplate> {
        self.service
            .get_template_by_id(template_id, &self.tenant_id)
            .await
    }

    pub async fn by_category(&mut self, category: &str) -> Vec<EmailTemplate> {
        match self
            .service
            .get_templates_by_category(&self.tenant_id, category)
            .await
        {
            Ok(templates) => templates,
            Err(e) => {
                self.state.fail(ERROR_TITLE, &e);
                Vec::new()
            }
        }
    }

    pub async fn default_for(&mut self, category: &str) -> Option<EmailTemplate> {
        match self
            .service
            .get_default_template_by_category(&self.tenant_id, category)
            .await
        {
            Ok(template) => template,
            Err(e) => {
                self.state.fail(ERROR_TITLE, &e);
                None
            }
        }
    }

    pub async fn create(&mut self, request: &CreateEmailTemplateRequest) -> ApiResult<EmailTemplate> {
        self.state.begin();
        match self
            .service
            .create_template(&self.tenant_id, &self.user_id, request)
            .await
        {
            Ok(template) => {
                self.state.items.insert(0, template.clone());
                self.state.finish();
                self.state
                    .notify(Notice::success("成功", "テンプレートを作成しました"));
                Ok(template)
            }
            Err(e) => {
                self.state.fail(ERROR_TITLE, &e);
                Err(e)
            }
        }
    }

    pub async fn update(
        &mut self,
        template_id: &str,
        request: &UpdateEmailTemplateRequest,
    ) -> ApiResult<EmailTemplate> {
        self.state.begin();
        match self
            .service
            .update_template(template_id, &self.tenant_id, request)
            .await
        {
            Ok(template) => {
                if let Some(slot) = self.state.items.iter_mut().find(|t| t.id == template.id) {
                    *slot = template.clone();
                }
                self.state.finish();
                self.state
                    .notify(Notice::success("成功", "テンプレートを更新しました"));
                Ok(template)
            }
            Err(e) => {
                self.state.fail(ERROR_TITLE, &e);
                Err(e)
            }
        }
    }

    pub async fn delete(&mut self, template_id: &str) -> ApiResult<()> {
        self.state.begin();
        match self.service.delete_template(template_id, &self.tenant_id).await {
            Ok(()) => {
                self.state.items.retain(|t| t.id != template_id);
                self.state.finish();
                self.state
                    .notify(Notice::success("成功", "テンプレートを削除しました"));
                Ok(())
            }
            Err(e) => {
                self.state.fail(ERROR_TITLE, &e);
                Err(e)
            }
        }
    }

    /// Bump the usage counter. Failures are logged only.
    pub async fn increment_usage(&self, template_id: &str) -> bool {
        match self
            .service
            .increment_usage_count(template_id, &self.tenant_id)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, template_id, "Usage count update failed");
                false
            }
        }
    }

    pub async fn search(&mut self, params: &TemplateSearchParams) -> Vec<EmailTemplate> {
        match self.service.search_templates(&self.tenant_id, params).await {
            Ok(templates) => templates,
            Err(e) => {
                self.state.fail(ERROR_TITLE, &e);
                Vec::new()
            }
        }
    }

    pub async fn categories(&mut self) -> Vec<String> {
        match self.service.get_available_categories(&self.tenant_id).await {
            Ok(categories) => categories,
            Err(e) => {
                self.state.fail(ERROR_TITLE, &e);
                Vec::new()
            }
        }
    }
}
