//! Email queue endpoints of the backend API.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::domain::{SendEmailResponse, SendIndividualEmail, SmtpSetting, DEFAULT_SEND_PRIORITY};
use crate::error::ApiError;

use super::{BackendAuth, BackendClient};

pub const NO_SMTP_SETTING_MESSAGE: &str =
    "SMTP設定が見つかりません。先にSMTP設定を保存してください。";

#[derive(Clone)]
pub struct EmailApiClient {
    backend: BackendClient,
}

/// One outgoing email before the SMTP setting is resolved.
#[derive(Debug, Clone, Default)]
pub struct OutgoingEmail {
    pub to_emails: Vec<String>,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
    pub related_project_id: Option<String>,
    pub related_engineer_id: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Serialize)]
struct TestEmailBody<'a> {
    tenant_id: &'a str,
    smtp_setting_id: &'a str,
    test_email: &'a str,
    subject: &'a str,
    body: String,
}

impl EmailApiClient {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    fn tenant<'a>(auth: BackendAuth<'a>) -> Result<&'a str, ApiError> {
        auth.tenant_id
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::bad_request("テナント情報が見つかりません"))
    }

    /// SMTP settings of the tenant. The endpoint answers with either a bare
    /// array or `{data: [...]}`.
    #[instrument(skip(self, auth))]
    pub async fn smtp_settings(&self, auth: BackendAuth<'_>) -> Result<Vec<SmtpSetting>, ApiError> {
        let tenant_id = Self::tenant(auth)?;
        let body: Value = self
            .backend
            .get(&format!("/api/v1/email/smtp-settings/{}", tenant_id), &[], auth)
            .await?;

        parse_smtp_settings(body)
    }

    /// Default SMTP setting, else the first one.
    pub async fn default_smtp_setting_id(&self, auth: BackendAuth<'_>) -> Result<String, ApiError> {
        let settings = self.smtp_settings(auth).await?;
        pick_default_setting(&settings)
            .map(|s| s.id.clone())
            .ok_or_else(|| ApiError::bad_request(NO_SMTP_SETTING_MESSAGE))
    }

    #[instrument(skip(self, email, auth), fields(recipients = email.to_emails.len()))]
    pub async fn send_individual(
        &self,
        email: OutgoingEmail,
        smtp_setting_id: &str,
        auth: BackendAuth<'_>,
    ) -> Result<SendEmailResponse, ApiError> {
        let tenant_id = Self::tenant(auth)?;
        let body = SendIndividualEmail {
            tenant_id: tenant_id.to_string(),
            to_emails: email.to_emails,
            subject: email.subject,
            body_text: email.body_text,
            body_html: email.body_html,
            smtp_setting_id: smtp_setting_id.to_string(),
            priority: DEFAULT_SEND_PRIORITY,
            scheduled_at: None,
            related_project_id: email.related_project_id,
            related_engineer_id: email.related_engineer_id,
            metadata: email.metadata,
        };

        let response: SendEmailResponse = self
            .backend
            .post("/api/v1/email/send-individual", &body, auth)
            .await?;
        check_send_response(response, "メール送信に失敗しました")
    }

    /// Send the rendered email to the caller's own address.
    #[instrument(skip(self, subject, body, signature, auth))]
    pub async fn send_test(
        &self,
        subject: &str,
        body: &str,
        signature: Option<&str>,
        test_email: &str,
        auth: BackendAuth<'_>,
    ) -> Result<SendEmailResponse, ApiError> {
        let tenant_id = Self::tenant(auth)?;
        if test_email.is_empty() {
            return Err(ApiError::bad_request("ユーザー情報が見つかりません"));
        }
        let smtp_setting_id = self.default_smtp_setting_id(auth).await?;

        let body = TestEmailBody {
            tenant_id,
            smtp_setting_id: &smtp_setting_id,
            test_email,
            subject,
            body: match signature.filter(|s| !s.is_empty()) {
                Some(signature) => format!("{}\n\n{}", body, signature),
                None => body.to_string(),
            },
        };

        let response: SendEmailResponse = self
            .backend
            .post("/api/v1/email/send-test", &body, auth)
            .await?;
        let response = check_send_response(response, "テストメール送信に失敗しました")?;

        info!(test_email, "Test email queued");
        Ok(response)
    }
}

pub fn parse_smtp_settings(body: Value) -> Result<Vec<SmtpSetting>, ApiError> {
    let list = match body {
        Value::Array(_) => body,
        Value::Object(mut obj) => obj.remove("data").unwrap_or(Value::Array(Vec::new())),
        _ => Value::Array(Vec::new()),
    };
    serde_json::from_value(list)
        .map_err(|e| ApiError::internal(format!("Invalid SMTP settings: {}", e)))
}

pub fn pick_default_setting(settings: &[SmtpSetting]) -> Option<&SmtpSetting> {
    settings
        .iter()
        .find(|s| s.is_default)
        .or_else(|| settings.first())
}

/// 2xx bodies can still report `failed`/`error`.
pub fn check_send_response(
    response: SendEmailResponse,
    fallback: &str,
) -> Result<SendEmailResponse, ApiError> {
    if response.is_failure() {
        let message = response
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_string());
        warn!(message = %message, "Email queue rejected the send");
        return Err(ApiError::Upstream {
            status: 502,
            message,
        });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn smtp_settings_accept_both_shapes() {
        let bare = parse_smtp_settings(json!([{"id": "s1"}, {"id": "s2", "is_default": true}]))
            .unwrap();
        assert_eq!(pick_default_setting(&bare).unwrap().id, "s2");

        let wrapped = parse_smtp_settings(json!({"data": [{"id": "s9"}]})).unwrap();
        assert_eq!(pick_default_setting(&wrapped).unwrap().id, "s9");

        let empty = parse_smtp_settings(json!({"status": "ok"})).unwrap();
        assert!(pick_default_setting(&empty).is_none());
    }

    #[test]
    fn failed_status_becomes_error() {
        let response: SendEmailResponse =
            serde_json::from_value(json!({"status": "failed", "message": "quota"})).unwrap();
        let err = check_send_response(response, "fallback").unwrap_err();
        assert!(matches!(err, ApiError::Upstream { ref message, .. } if message == "quota"));

        let ok: SendEmailResponse =
            serde_json::from_value(json!({"status": "queued", "queue_id": "q1"})).unwrap();
        assert_eq!(
            check_send_response(ok, "fallback").unwrap().queue_id.as_deref(),
            Some("q1")
        );
    }
}
