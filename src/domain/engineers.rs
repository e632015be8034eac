use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{lenient_string, null_as_default, string_or_list, text_or_null};

/// Values accepted by the `current_status` column constraint.
pub const ENGINEER_STATUSES: [&str; 7] = [
    "提案中",
    "事前面談",
    "面談",
    "結果待ち",
    "契約中",
    "営業終了",
    "アーカイブ",
];

pub const DEFAULT_ENGINEER_STATUS: &str = "提案中";

/// Company affiliation as used in URLs (`own`/`other`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanyType {
    Own,
    Other,
}

impl CompanyType {
    /// Stored column value.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Own => "自社",
            Self::Other => "他社",
        }
    }
}

/// Engineer (candidate) row from `engineers`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Engineer {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub age: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub nearest_station: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub arrival_year_japan: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub certifications: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub technical_keywords: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub experience: Option<String>,
    #[serde(default)]
    pub work_scope: Option<String>,
    #[serde(default)]
    pub work_experience: Option<String>,
    #[serde(default)]
    pub japanese_level: Option<String>,
    #[serde(default)]
    pub english_level: Option<String>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub current_status: Option<String>,
    #[serde(default)]
    pub company_type: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub manager_name: Option<String>,
    #[serde(default)]
    pub manager_email: Option<String>,
    #[serde(default)]
    pub self_promotion: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub resume_url: Option<String>,
    #[serde(default)]
    pub resume_text: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub desired_rate_min: Option<f64>,
    #[serde(default)]
    pub desired_rate_max: Option<f64>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Engineer {
    /// Desired rate in 万円, as a range when both bounds are set.
    pub fn desired_rate(&self) -> String {
        match (self.desired_rate_min, self.desired_rate_max) {
            (Some(min), Some(max)) if min != max => format!("{}〜{}万円", min, max),
            (Some(rate), _) | (None, Some(rate)) => format!("{}万円", rate),
            (None, None) => String::new(),
        }
    }
}

/// `status` arrives either as a single value or as the UI's multi-select list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StatusInput {
    One(String),
    Many(Vec<String>),
}

/// Engineer fields as submitted by clients. List fields accept comma-separated
/// strings. Empty text clears the column on update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineerInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub skills: Option<Vec<String>>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub technical_keywords: Option<Vec<String>>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub certifications: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub experience: Option<String>,
    #[serde(default)]
    pub current_status: Option<String>,
    #[serde(default)]
    pub status: Option<StatusInput>,
    #[serde(default)]
    pub desired_rate_min: Option<f64>,
    #[serde(default)]
    pub desired_rate_max: Option<f64>,
    /// Optional text columns (`japanese_level`, `email`, ...).
    #[serde(flatten)]
    pub text: Map<String, Value>,
}

/// Optional text columns an engineer write may carry.
pub const ENGINEER_TEXT_FIELDS: [&str; 22] = [
    "japanese_level",
    "english_level",
    "availability",
    "remarks",
    "company_name",
    "self_promotion",
    "work_scope",
    "work_experience",
    "nationality",
    "age",
    "gender",
    "nearest_station",
    "education",
    "arrival_year_japan",
    "email",
    "phone",
    "manager_name",
    "manager_email",
    "recommendation",
    "resume_url",
    "resume_text",
    "source",
];

impl EngineerInput {
    pub fn text_field(&self, key: &str) -> Option<String> {
        match self.text.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn validate_for_create(&self) -> Result<(), &'static str> {
        let present = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.trim().is_empty());

        if !present(&self.name) {
            return Err("氏名は必須です");
        }
        if self.skills.as_ref().map_or(true, |s| s.is_empty()) {
            return Err("スキルは必須です");
        }
        if !present(&self.text_field("japanese_level")) {
            return Err("日本語レベルは必須です");
        }
        if !present(&self.experience) {
            return Err("経験年数は必須です");
        }
        Ok(())
    }

    /// Status resolved against the column constraint, if one was submitted.
    pub fn resolved_status(&self) -> Option<String> {
        let submitted = match (&self.current_status, &self.status) {
            (Some(s), _) if !s.is_empty() => Some(s.clone()),
            (_, Some(StatusInput::One(s))) => Some(s.clone()),
            (_, Some(StatusInput::Many(list))) => list.first().cloned(),
            _ => None,
        }?;
        Some(normalize_status(&submitted).to_string())
    }

    /// Column patch: lists normalized, empty text nulled, status resolved.
    pub fn to_patch(&self) -> Map<String, Value> {
        let mut patch = Map::new();

        if let Some(name) = &self.name {
            patch.insert("name".into(), Value::String(name.clone()));
        }
        for (key, list) in [
            ("skills", &self.skills),
            ("technical_keywords", &self.technical_keywords),
            ("certifications", &self.certifications),
        ] {
            if let Some(list) = list {
                patch.insert(key.into(), Value::from(list.clone()));
            }
        }
        if let Some(experience) = &self.experience {
            patch.insert("experience".into(), Value::String(experience.clone()));
        }
        if let Some(status) = self.resolved_status() {
            patch.insert("current_status".into(), Value::String(status));
        }
        for (key, rate) in [
            ("desired_rate_min", self.desired_rate_min),
            ("desired_rate_max", self.desired_rate_max),
        ] {
            if let Some(rate) = rate {
                patch.insert(key.into(), Value::from(rate));
            }
        }
        for key in ENGINEER_TEXT_FIELDS {
            if self.text.contains_key(key) {
                let value = self
                    .text_field(key)
                    .map_or(Value::Null, |s| text_or_null(&s));
                patch.insert(key.into(), value);
            }
        }

        patch
    }
}

/// Map a submitted status onto the allowed set.
pub fn normalize_status(status: &str) -> &str {
    if ENGINEER_STATUSES.contains(&status) {
        status
    } else {
        DEFAULT_ENGINEER_STATUS
    }
}

/// Filters for engineer search. `"all"` and empty values are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineerSearch {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub company_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub skills: Option<Vec<String>>,
    #[serde(default)]
    pub japanese_level: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchUpdateEngineersRequest {
    pub ids: Vec<String>,
    pub updates: EngineerInput,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(value: Value) -> EngineerInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn patch_normalizes_lists_and_empty_text() {
        let patch = input(json!({
            "name": "Taro",
            "skills": "Java, Spring ,AWS",
            "certifications": ["AWS SAA"],
            "nearest_station": "",
            "email": "taro@example.com",
            "unknown": "ignored"
        }))
        .to_patch();

        assert_eq!(patch["skills"], json!(["Java", "Spring", "AWS"]));
        assert_eq!(patch["certifications"], json!(["AWS SAA"]));
        assert_eq!(patch["nearest_station"], Value::Null);
        assert_eq!(patch["email"], "taro@example.com");
        assert!(!patch.contains_key("unknown"));
        assert!(!patch.contains_key("current_status"));
    }

    #[test]
    fn status_resolution_falls_back_to_default() {
        assert_eq!(
            input(json!({"status": ["面談", "契約中"]})).resolved_status().as_deref(),
            Some("面談")
        );
        assert_eq!(
            input(json!({"current_status": "営業終了", "status": "面談"}))
                .resolved_status()
                .as_deref(),
            Some("営業終了")
        );
        assert_eq!(
            input(json!({"status": "unknown"})).resolved_status().as_deref(),
            Some(DEFAULT_ENGINEER_STATUS)
        );
        assert_eq!(input(json!({})).resolved_status(), None);
    }

    #[test]
    fn create_requires_core_fields() {
        let ok = input(json!({
            "name": "Taro",
            "skills": "Java",
            "japanese_level": "N1",
            "experience": 5
        }));
        assert!(ok.validate_for_create().is_ok());

        let missing_skills = input(json!({"name": "Taro", "japanese_level": "N1", "experience": "5"}));
        assert_eq!(missing_skills.validate_for_create(), Err("スキルは必須です"));
    }

    #[test]
    fn desired_rate_formats_ranges() {
        let mut engineer = Engineer::default();
        assert_eq!(engineer.desired_rate(), "");
        engineer.desired_rate_min = Some(50.0);
        assert_eq!(engineer.desired_rate(), "50万円");
        engineer.desired_rate_max = Some(60.0);
        assert_eq!(engineer.desired_rate(), "50〜60万円");
    }

    #[test]
    fn company_type_labels() {
        let own: CompanyType = serde_json::from_value(json!("own")).unwrap();
        assert_eq!(own.label(), "自社");
        assert_eq!(CompanyType::Other.label(), "他社");
    }
}
