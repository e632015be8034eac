use reqwest::multipart::{Form, Part};
use tracing::{info, instrument};

use crate::domain::{ParsedResume, ResumeEnvelope, ResumeUpload, ResumeValidation};
use crate::error::ApiError;

use super::{BackendAuth, BackendClient};

/// Client for the resume parser's `/validate` and `/parse` endpoints.
#[derive(Clone)]
pub struct ResumeParserClient {
    backend: BackendClient,
    base_url: String,
}

impl ResumeParserClient {
    pub fn new(backend: BackendClient, base_url: &str) -> Self {
        Self {
            backend,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn form(upload: &ResumeUpload, tenant_id: &str) -> Result<Form, ApiError> {
        let mut part = Part::bytes(upload.bytes.clone()).file_name(upload.filename.clone());
        if let Some(content_type) = &upload.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| ApiError::bad_request(format!("Invalid content type: {}", e)))?;
        }
        Ok(Form::new()
            .part("file", part)
            .text("tenant_id", tenant_id.to_string()))
    }

    #[instrument(skip(self, upload, auth), fields(filename = %upload.filename))]
    pub async fn validate(
        &self,
        upload: &ResumeUpload,
        auth: BackendAuth<'_>,
    ) -> Result<ResumeValidation, ApiError> {
        let tenant_id = auth.tenant_id.unwrap_or_default();
        let envelope: ResumeEnvelope<ResumeValidation> = self
            .backend
            .post_multipart(
                &format!("{}/validate", self.base_url),
                Self::form(upload, tenant_id)?,
                auth,
            )
            .await?;

        unwrap_envelope(envelope, "履歴書ファイルの検証に失敗しました")
    }

    #[instrument(skip(self, upload, auth), fields(filename = %upload.filename))]
    pub async fn parse(
        &self,
        upload: &ResumeUpload,
        auth: BackendAuth<'_>,
    ) -> Result<ParsedResume, ApiError> {
        let tenant_id = auth.tenant_id.unwrap_or_default();
        let envelope: ResumeEnvelope<ParsedResume> = self
            .backend
            .post_multipart(
                &format!("{}/parse", self.base_url),
                Self::form(upload, tenant_id)?,
                auth,
            )
            .await?;

        let parsed = unwrap_envelope(envelope, "履歴書の解析に失敗しました")?;
        info!(name = parsed.name.as_deref().unwrap_or_default(), "Resume parsed");
        Ok(parsed)
    }
}

/// Data of a successful envelope, else the parser's message as a bad request.
pub fn unwrap_envelope<T>(envelope: ResumeEnvelope<T>, fallback: &str) -> Result<T, ApiError> {
    match envelope {
        ResumeEnvelope {
            success: true,
            data: Some(data),
            ..
        } => Ok(data),
        ResumeEnvelope { message, .. } => Err(ApiError::bad_request(
            message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| fallback.to_string()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failed_envelope_surfaces_parser_message() {
        let envelope: ResumeEnvelope<ParsedResume> =
            serde_json::from_value(json!({"success": false, "message": "unsupported file"}))
                .unwrap();
        let err = unwrap_envelope(envelope, "fallback").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "unsupported file"));
    }

    #[test]
    fn success_without_data_is_a_failure() {
        let envelope: ResumeEnvelope<ParsedResume> =
            serde_json::from_value(json!({"success": true})).unwrap();
        let err = unwrap_envelope(envelope, "履歴書の解析に失敗しました").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "履歴書の解析に失敗しました"));
    }

    #[test]
    fn form_rejects_bad_content_type() {
        let upload = ResumeUpload {
            filename: "cv.pdf".into(),
            content_type: Some("not a mime".into()),
            bytes: vec![1, 2, 3],
        };
        assert!(ResumeParserClient::form(&upload, "t1").is_err());
    }
}
