use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::null_as_default;

/// Category whose templates introduce several engineers at once.
pub const MULTI_ENGINEER_CATEGORY: &str = "multi_engineer_introduction";

/// Row from `email_templates`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subject_template: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body_template_text: String,
    #[serde(default)]
    pub body_template_html: Option<String>,
    #[serde(default)]
    pub signature_template: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub available_placeholders: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub required_placeholders: Vec<String>,
    #[serde(default)]
    pub ai_summary_enabled: bool,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub usage_count: i64,
    #[serde(default)]
    pub last_used_at: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEmailTemplateRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    pub subject_template: String,
    pub body_template_text: String,
    #[serde(default)]
    pub body_template_html: Option<String>,
    #[serde(default)]
    pub signature_template: Option<String>,
    #[serde(default)]
    pub available_placeholders: Option<Vec<String>>,
    #[serde(default)]
    pub required_placeholders: Option<Vec<String>>,
    #[serde(default)]
    pub ai_summary_enabled: Option<bool>,
}

impl CreateEmailTemplateRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("テンプレート名は必須です");
        }
        if self.category.trim().is_empty() {
            return Err("カテゴリーは必須です");
        }
        if self.subject_template.trim().is_empty() {
            return Err("件名は必須です");
        }
        if self.body_template_text.trim().is_empty() {
            return Err("本文は必須です");
        }
        Ok(())
    }
}

/// Partial template update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEmailTemplateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_template_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_template_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_placeholders: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_placeholders: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_summary_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateListParams {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateSearchParams {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Rendered subject, body and signature.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
    pub signature: String,
}

impl RenderedEmail {
    /// Body with the signature appended after a blank line.
    pub fn full_body(&self) -> String {
        if self.signature.is_empty() {
            self.body.clone()
        } else {
            format!("{}\n\n{}", self.body, self.signature)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_request_requires_text_fields() {
        let req: CreateEmailTemplateRequest = serde_json::from_value(json!({
            "name": "紹介",
            "category": "engineer_introduction",
            "subject_template": "",
            "body_template_text": "本文"
        }))
        .unwrap();
        assert_eq!(req.validate(), Err("件名は必須です"));
    }

    #[test]
    fn update_request_serializes_only_present_fields() {
        let req = UpdateEmailTemplateRequest {
            name: Some("新しい名前".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(req).unwrap(), json!({"name": "新しい名前"}));
    }

    #[test]
    fn full_body_appends_signature() {
        let rendered = RenderedEmail {
            subject: "s".into(),
            body: "本文".into(),
            signature: "署名".into(),
        };
        assert_eq!(rendered.full_body(), "本文\n\n署名");
        let unsigned = RenderedEmail {
            signature: String::new(),
            ..rendered
        };
        assert_eq!(unsigned.full_body(), "本文");
    }
}
