//! Resume attachments and attachment-bearing sends.

use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::domain::{AttachmentInfo, AttachmentUploadResponse, EmailWithAttachments};
use crate::error::ApiError;

use super::{BackendAuth, BackendClient};

#[derive(Clone)]
pub struct AttachmentService {
    backend: BackendClient,
}

#[derive(Serialize)]
struct AttachmentSendBody<'a> {
    tenant_id: &'a str,
    to_emails: &'a [String],
    #[serde(skip_serializing_if = "no_addresses")]
    cc_emails: &'a [String],
    #[serde(skip_serializing_if = "no_addresses")]
    bcc_emails: &'a [String],
    subject: &'a str,
    body_text: String,
    body_html: String,
    scheduled_at: String,
    attachment_ids: &'a [String],
    attachment_filenames: &'a [String],
}

fn no_addresses(list: &&[String]) -> bool {
    list.is_empty()
}

/// Queue acknowledgement for an attachment send.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueuedEmail {
    #[serde(default)]
    pub queue_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AttachmentService {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// Fetch an engineer's stored resume and register it as an attachment
    /// named `{engineer}_履歴書.{ext}`.
    #[instrument(skip(self, auth, resume_url))]
    pub async fn upload_resume_from_storage(
        &self,
        engineer_id: &str,
        engineer_name: &str,
        resume_url: &str,
        auth: BackendAuth<'_>,
    ) -> Result<AttachmentInfo, ApiError> {
        let tenant_id = auth.tenant_id.unwrap_or_default();

        let (bytes, content_type) = self.backend.download(resume_url).await.map_err(|e| {
            error!(error = %e, "Resume download failed");
            ApiError::bad_request("履歴書ファイルの取得に失敗しました")
        })?;

        let extension = file_extension(resume_url).unwrap_or_else(|| "pdf".to_string());
        let filename = format!("{}_履歴書.{}", engineer_name, extension);

        let mut part = Part::bytes(bytes).file_name(filename.clone());
        if let Some(content_type) = content_type.as_deref() {
            part = part
                .mime_str(content_type)
                .map_err(|e| ApiError::internal(format!("Invalid content type: {}", e)))?;
        }
        let form = Form::new()
            .text("tenant_id", tenant_id.to_string())
            .part("file", part);

        let uploaded: AttachmentUploadResponse = self
            .backend
            .post_multipart(
                &self.backend.url("/api/v1/email/attachments/upload"),
                form,
                auth,
            )
            .await?;

        let info = attachment_from_upload(uploaded, engineer_id, engineer_name)?;
        info!(attachment_id = %info.id, filename = %filename, "Resume attached");
        Ok(info)
    }

    #[instrument(skip(self, email, auth), fields(recipients = email.to.len(), attachments = email.attachment_ids.len()))]
    pub async fn send_email_with_attachments(
        &self,
        email: &EmailWithAttachments,
        auth: BackendAuth<'_>,
    ) -> Result<QueuedEmail, ApiError> {
        let tenant_id = auth
            .tenant_id
            .ok_or_else(|| ApiError::bad_request("テナント情報が見つかりません"))?;
        if email.to.is_empty() {
            return Err(ApiError::bad_request("送信先を選択してください。"));
        }

        let (body_text, body_html) = compose_bodies(&email.body, email.signature.as_deref());
        let body = AttachmentSendBody {
            tenant_id,
            to_emails: &email.to,
            cc_emails: &email.cc,
            bcc_emails: &email.bcc,
            subject: &email.subject,
            body_text,
            body_html,
            scheduled_at: Utc::now().to_rfc3339(),
            attachment_ids: &email.attachment_ids,
            attachment_filenames: &email.attachment_filenames,
        };

        self.backend
            .post("/api/v1/email/send-individual-with-attachments", &body, auth)
            .await
    }
}

fn attachment_from_upload(
    uploaded: AttachmentUploadResponse,
    engineer_id: &str,
    engineer_name: &str,
) -> Result<AttachmentInfo, ApiError> {
    match uploaded.attachment_id.filter(|id| !id.is_empty()) {
        Some(id) if uploaded.status.as_deref() == Some("uploaded") => Ok(AttachmentInfo {
            id,
            filename: uploaded.filename,
            size: uploaded.file_size,
            content_type: uploaded.content_type,
            url: uploaded.upload_url,
            engineer_id: Some(engineer_id.to_string()),
            engineer_name: Some(engineer_name.to_string()),
        }),
        _ => Err(ApiError::Upstream {
            status: 502,
            message: uploaded
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "アップロード結果が不正です".to_string()),
        }),
    }
}

/// Plain-text and HTML bodies with the signature appended.
pub fn compose_bodies(body: &str, signature: Option<&str>) -> (String, String) {
    let html = |s: &str| s.replace('\n', "<br>");
    match signature.filter(|s| !s.is_empty()) {
        Some(signature) => (
            format!("{}\n\n{}", body, signature),
            format!("{}<br><br>{}", html(body), html(signature)),
        ),
        None => (body.to_string(), html(body)),
    }
}

/// Extension of the last path segment of a URL.
pub fn file_extension(raw_url: &str) -> Option<String> {
    let parsed = url::Url::parse(raw_url).ok()?;
    let segment = parsed.path_segments()?.last()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_string())
}

/// Human-readable size: `1536` → `"1.5 KB"`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rendered = format!("{:.2}", value);
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", rendered, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sizes_are_trimmed() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
        assert_eq!(format_file_size(1_288_490_189), "1.2 GB");
    }

    #[test]
    fn extensions_come_from_the_url_path() {
        assert_eq!(
            file_extension("https://x.supabase.co/storage/v1/object/resumes/a/cv.docx?token=1")
                .as_deref(),
            Some("docx")
        );
        assert_eq!(file_extension("https://x/resumes/noext"), None);
        assert_eq!(file_extension("not a url"), None);
    }

    #[test]
    fn bodies_append_signature() {
        let (text, html) = compose_bodies("a\nb", Some("sig"));
        assert_eq!(text, "a\nb\n\nsig");
        assert_eq!(html, "a<br>b<br><br>sig");

        let (text, html) = compose_bodies("a\nb", None);
        assert_eq!(text, "a\nb");
        assert_eq!(html, "a<br>b");
    }

    #[test]
    fn upload_requires_uploaded_status() {
        let ok = AttachmentUploadResponse {
            attachment_id: Some("att1".into()),
            filename: "山田_履歴書.pdf".into(),
            content_type: "application/pdf".into(),
            file_size: 10,
            status: Some("uploaded".into()),
            ..Default::default()
        };
        let info = attachment_from_upload(ok, "e1", "山田").unwrap();
        assert_eq!(info.id, "att1");
        assert_eq!(info.engineer_name.as_deref(), Some("山田"));

        let pending = AttachmentUploadResponse {
            attachment_id: Some("att2".into()),
            status: Some("pending".into()),
            ..Default::default()
        };
        let err = attachment_from_upload(pending, "e1", "山田").unwrap_err();
        assert!(matches!(err, ApiError::Upstream { ref message, .. } if message == "アップロード結果が不正です"));
    }
}
