use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use tracing::{error, info, instrument};

use crate::domain::{
    BulkSendOutcome, BulkSendReport, EmailTemplate, Engineer, Project, SendEmailResponse,
    SenderRow,
};
use crate::error::ApiError;
use crate::services::attachments::compose_bodies;
use crate::services::{BackendAuth, EmailApiClient, OutgoingEmail};
use crate::templating::{render_for_case, PlaceholderValues};

/// Delivery seam for bulk sends.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<SendEmailResponse, ApiError>;
}

/// Sends through the backend email queue with a fixed SMTP setting.
pub struct QueueTransport<'a> {
    pub api: &'a EmailApiClient,
    pub smtp_setting_id: String,
    pub auth: BackendAuth<'a>,
}

#[async_trait]
impl<'a> MailTransport for QueueTransport<'a> {
    async fn send(&self, email: OutgoingEmail) -> Result<SendEmailResponse, ApiError> {
        self.api
            .send_individual(email, &self.smtp_setting_id, self.auth)
            .await
    }
}

/// Everything a bulk send renders from.
pub struct BulkEmailPlan<'a> {
    pub template: &'a EmailTemplate,
    pub cases: &'a [Project],
    pub rows: &'a [SenderRow],
    pub engineers: &'a [Engineer],
    pub additional: &'a PlaceholderValues,
}

fn outcome(row_id: &str, email: &str, result: Result<SendEmailResponse, String>) -> BulkSendOutcome {
    match result {
        Ok(response) => BulkSendOutcome {
            row_id: row_id.to_string(),
            email: email.to_string(),
            success: true,
            message: response
                .message
                .unwrap_or_else(|| "送信キューに追加しました".to_string()),
            queue_id: response.queue_id,
        },
        Err(message) => BulkSendOutcome {
            row_id: row_id.to_string(),
            email: email.to_string(),
            success: false,
            message,
            queue_id: None,
        },
    }
}

/// Send one email per selected row, one after another. Every selected id
/// gets an outcome; failures never stop the batch.
#[instrument(skip_all, fields(template_id = %plan.template.id, selected = row_ids.len()))]
pub async fn send_to_rows(
    plan: &BulkEmailPlan<'_>,
    row_ids: &[String],
    transport: &dyn MailTransport,
) -> BulkSendReport {
    let rows: HashMap<&str, &SenderRow> =
        plan.rows.iter().map(|r| (r.row_id.as_str(), r)).collect();
    let cases: HashMap<&str, &Project> =
        plan.cases.iter().map(|c| (c.id.as_str(), c)).collect();

    let mut results = Vec::with_capacity(row_ids.len());
    for row_id in row_ids {
        let Some(row) = rows.get(row_id.as_str()) else {
            results.push(outcome(row_id, "", Err("送信先が見つかりません".to_string())));
            continue;
        };
        if row.email.trim().is_empty() {
            results.push(outcome(
                row_id,
                "",
                Err("メールアドレスが設定されていません".to_string()),
            ));
            continue;
        }
        let Some(case) = cases.get(row.case_id.as_str()) else {
            results.push(outcome(row_id, &row.email, Err("案件が見つかりません".to_string())));
            continue;
        };

        let sender = Some(row.sender.as_str()).filter(|s| !s.is_empty());
        let rendered = render_for_case(plan.template, case, sender, plan.engineers, plan.additional);
        let signature = Some(rendered.signature.as_str());
        let (body_text, body_html) = compose_bodies(&rendered.body, signature);

        let email = OutgoingEmail {
            to_emails: vec![row.email.clone()],
            subject: rendered.subject,
            body_text,
            body_html: Some(body_html),
            related_project_id: Some(case.id.clone()),
            related_engineer_id: plan.engineers.first().map(|e| e.id.clone()),
            metadata: Some(json!({
                "template_id": plan.template.id,
                "row_id": row.row_id,
                "engineer_ids": plan.engineers.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
            })),
        };

        let result = transport.send(email).await.map_err(|e| {
            error!(row_id = %row.row_id, error = %e, "Bulk send failed for row");
            e.to_string()
        });
        results.push(outcome(row_id, &row.email, result));
    }

    let sent = results.iter().filter(|r| r.success).count();
    let failed = results.len() - sent;
    info!(sent, failed, "Bulk send finished");

    BulkSendReport {
        sent,
        failed,
        results,
    }
}
