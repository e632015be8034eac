use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{lenient_string, null_as_default};

/// A contact person attached to a case.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Sender {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub position: Option<String>,
}

/// Case (staffing request) row from `projects`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub client_company: Option<String>,
    #[serde(default)]
    pub partner_company: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub detail_description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub manager_name: Option<String>,
    #[serde(default)]
    pub manager_email: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub experience: Option<String>,
    #[serde(default)]
    pub key_technologies: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub budget: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub desired_budget: Option<String>,
    #[serde(default)]
    pub work_type: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub application_deadline: Option<String>,
    #[serde(default)]
    pub japanese_level: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub processes: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub interview_count: Option<String>,
    #[serde(default)]
    pub max_candidates: Option<i64>,
    #[serde(default)]
    pub foreigner_accepted: Option<bool>,
    #[serde(default)]
    pub freelancer_accepted: Option<bool>,
    #[serde(default)]
    pub company_type: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub senders: Vec<Sender>,
    /// Legacy single-contact columns.
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub sender_email: Option<String>,
    #[serde(default)]
    pub registered_at: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Columns not modelled above, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Project {
    /// Client company, else partner company.
    pub fn company(&self) -> Option<&str> {
        super::first_non_empty(&[
            self.client_company.as_deref(),
            self.partner_company.as_deref(),
        ])
    }

    /// Legacy contact name: `sender`, else `sender_name`.
    pub fn legacy_sender(&self) -> Option<&str> {
        super::first_non_empty(&[self.sender.as_deref(), self.sender_name.as_deref()])
    }
}

/// Writable project columns. Used for create (title required) and as a
/// partial patch for update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_technologies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_deadline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub japanese_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview_count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_candidates: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreigner_accepted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freelancer_accepted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub senders: Option<Vec<Sender>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<String>,
}

impl ProjectInput {
    /// Required-field check for create.
    pub fn validate_for_create(&self) -> Result<(), &'static str> {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => Ok(()),
            _ => Err("案件名は必須です"),
        }
    }
}

/// Filters for project search. `"all"` and empty values are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectSearch {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub company_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "super::string_or_list")]
    pub skills: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveProjectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn project_row_tolerates_nulls_and_keeps_unknown_columns() {
        let project: Project = serde_json::from_value(json!({
            "id": "p1",
            "title": null,
            "skills": null,
            "budget": 60,
            "senders": [{"name": "Sato", "email": null}],
            "custom_column": "kept"
        }))
        .unwrap();

        assert_eq!(project.title, "");
        assert!(project.skills.is_empty());
        assert_eq!(project.budget.as_deref(), Some("60"));
        assert_eq!(project.senders[0].name.as_deref(), Some("Sato"));
        assert_eq!(project.extra["custom_column"], "kept");
    }

    #[test]
    fn create_requires_title() {
        assert!(ProjectInput::default().validate_for_create().is_err());
        let input = ProjectInput {
            title: Some("  ".into()),
            ..Default::default()
        };
        assert!(input.validate_for_create().is_err());
        let input = ProjectInput {
            title: Some("Java案件".into()),
            ..Default::default()
        };
        assert!(input.validate_for_create().is_ok());
    }

    #[test]
    fn company_prefers_client_over_partner() {
        let mut project = Project {
            partner_company: Some("Partner".into()),
            ..Default::default()
        };
        assert_eq!(project.company(), Some("Partner"));
        project.client_company = Some("Client".into());
        assert_eq!(project.company(), Some("Client"));
    }

    #[test]
    fn legacy_sender_column_wins_over_sender_name() {
        let project: Project = serde_json::from_value(serde_json::json!({
            "id": "c9",
            "title": "案件",
            "sender": "佐藤",
            "sender_name": "旧担当",
            "sender_email": "sato@x.jp"
        }))
        .unwrap();
        assert_eq!(project.legacy_sender(), Some("佐藤"));

        let project: Project = serde_json::from_value(serde_json::json!({
            "id": "c10",
            "title": "案件",
            "sender": "",
            "sender_name": "鈴木"
        }))
        .unwrap();
        assert_eq!(project.legacy_sender(), Some("鈴木"));
    }
}
