use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::null_as_default;

/// Number of cases per page on the mail case list.
pub const MAIL_CASES_PER_PAGE: usize = 10;

/// Default queue priority for individual sends.
pub const DEFAULT_SEND_PRIORITY: u8 = 5;

/// One contact row of the mail case list: a case paired with one sender.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SenderRow {
    pub row_id: String,
    pub case_id: String,
    pub case_title: String,
    pub company: String,
    pub key_technologies: String,
    pub sender: String,
    pub email: String,
    pub position: String,
    pub registration_type: String,
    pub registered_at: String,
    pub start_date: String,
}

/// Query for the mail case list. `"all"` or empty disables a filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailCaseQuery {
    #[serde(default)]
    pub company: Option<String>,
    /// Substring of the key technologies or skills.
    #[serde(default)]
    pub tech: Option<String>,
    /// Exact start date.
    #[serde(default)]
    pub start_date: Option<String>,
    /// `asc` or `desc` on start date; unsorted when absent.
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SenderPage {
    pub rows: Vec<SenderRow>,
    pub page: usize,
    pub total_pages: usize,
    pub total_cases: usize,
    pub companies: Vec<String>,
    pub start_dates: Vec<String>,
}

/// Bulk send: one email per selected contact row.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkSendRequest {
    pub template_id: String,
    pub row_ids: Vec<String>,
    #[serde(default)]
    pub engineer_ids: Vec<String>,
    /// Extra placeholder values, applied over the computed ones.
    #[serde(default)]
    pub placeholders: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BulkSendOutcome {
    pub row_id: String,
    pub email: String,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkSendReport {
    pub sent: usize,
    pub failed: usize,
    pub results: Vec<BulkSendOutcome>,
}

/// SMTP setting as listed by the email API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmtpSetting {
    pub id: String,
    #[serde(default)]
    pub setting_name: Option<String>,
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `/api/v1/email/send-individual`.
#[derive(Debug, Clone, Serialize)]
pub struct SendIndividualEmail {
    pub tenant_id: String,
    pub to_emails: Vec<String>,
    pub subject: String,
    pub body_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    pub smtp_setting_id: String,
    pub priority: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_engineer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendEmailResponse {
    #[serde(default)]
    pub queue_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub to_emails: Vec<String>,
    #[serde(default)]
    pub scheduled_at: Option<String>,
    #[serde(default)]
    pub attachments_count: Option<u32>,
}

impl SendEmailResponse {
    /// The queue reports some failures in the body with a 2xx status.
    pub fn is_failure(&self) -> bool {
        matches!(self.status.as_deref(), Some("failed") | Some("error"))
    }
}

/// Test send to the caller's own address.
#[derive(Debug, Clone, Deserialize)]
pub struct TestEmailRequest {
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub test_email: Option<String>,
}

/// Attachment registered with the email API.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInfo {
    pub id: String,
    pub filename: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub url: Option<String>,
    pub engineer_id: Option<String>,
    pub engineer_name: Option<String>,
}

/// Response of `/api/v1/email/attachments/upload`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachmentUploadResponse {
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub upload_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailWithAttachments {
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub attachment_ids: Vec<String>,
    #[serde(default)]
    pub attachment_filenames: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn send_response_failure_is_read_from_status() {
        let ok: SendEmailResponse =
            serde_json::from_value(json!({"queue_id": "q1", "status": "queued"})).unwrap();
        assert!(!ok.is_failure());
        let failed: SendEmailResponse =
            serde_json::from_value(json!({"status": "error", "to_emails": null})).unwrap();
        assert!(failed.is_failure());
    }
}
