//! Saved matches from `project_engineer_matches`.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::business_client::BusinessClientManager;
use crate::domain::{MatchRecord, SavedMatch, SAVED_MATCH_STATUS, SAVED_STATUS_VARIANTS};
use crate::error::{ApiError, ApiResult};
use crate::supabase::{decode_first, decode_rows, TableQuery};

use super::DetailLookup;

pub const MATCHES_TABLE: &str = "project_engineer_matches";

#[derive(Clone)]
pub struct MatchingHistoryService {
    client: Arc<BusinessClientManager>,
    concurrency: usize,
}

impl MatchingHistoryService {
    pub fn new(client: Arc<BusinessClientManager>, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    /// Saved matches, newest first, each with its project and engineer rows.
    #[instrument(skip(self, details))]
    pub async fn get_saved_matching_history(
        &self,
        tenant_id: &str,
        details: &dyn DetailLookup,
    ) -> ApiResult<Vec<SavedMatch>> {
        let query = TableQuery::table(MATCHES_TABLE)
            .eq("tenant_id", tenant_id)
            .eq("status", SAVED_MATCH_STATUS)
            .eq("is_active", true)
            .order("updated_at", false);
        let records: Vec<MatchRecord> = decode_rows(self.client.select(&query).await?)?;

        if records.is_empty() {
            self.log_status_diagnostics(tenant_id).await;
            return Ok(Vec::new());
        }

        debug!(count = records.len(), "Enriching saved matches");
        Ok(self.enrich(records, details).await)
    }

    /// Which status spellings exist when nothing matched the canonical one.
    async fn log_status_diagnostics(&self, tenant_id: &str) {
        let query = TableQuery::table(MATCHES_TABLE)
            .select("id,status")
            .eq("tenant_id", tenant_id)
            .in_list("status", SAVED_STATUS_VARIANTS);

        match self.client.select(&query).await {
            Ok(rows) => {
                let statuses: Vec<&str> = rows
                    .iter()
                    .filter_map(|r| r.get("status").and_then(Value::as_str))
                    .collect();
                info!(
                    matches = rows.len(),
                    statuses = ?statuses,
                    "No saved matches under canonical status"
                );
            }
            Err(e) => warn!(error = %e, "Saved match diagnostic query failed"),
        }
    }

    async fn enrich(&self, records: Vec<MatchRecord>, details: &dyn DetailLookup) -> Vec<SavedMatch> {
        stream::iter(records)
            .map(|record| async move {
                let project_id = record.project_id.clone().unwrap_or_default();
                let engineer_id = record.engineer_id.clone().unwrap_or_default();
                let (project_detail, engineer_detail) =
                    tokio::join!(details.project(&project_id), details.engineer(&engineer_id));
                SavedMatch {
                    record,
                    project_detail,
                    engineer_detail,
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    #[instrument(skip(self, details))]
    pub async fn get_matching_history_by_id(
        &self,
        match_id: &str,
        tenant_id: &str,
        details: &dyn DetailLookup,
    ) -> ApiResult<SavedMatch> {
        let query = TableQuery::table(MATCHES_TABLE)
            .eq("id", match_id)
            .eq("tenant_id", tenant_id)
            .single();
        let record: MatchRecord = decode_first(self.client.select(&query).await?)?
            .ok_or_else(|| ApiError::not_found(format!("Match {} not found", match_id)))?;

        self.enrich(vec![record], details)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::internal("Enrichment dropped the match"))
    }

    /// Soft delete. Fails when no row matched.
    #[instrument(skip(self))]
    pub async fn delete_matching_history(&self, match_id: &str, tenant_id: &str) -> ApiResult<()> {
        let query = TableQuery::table(MATCHES_TABLE)
            .eq("id", match_id)
            .eq("tenant_id", tenant_id);
        let patch = json!({"is_active": false, "updated_at": Utc::now().to_rfc3339()});

        let updated = self.client.update(&query, patch).await?;
        if updated.is_empty() {
            return Err(ApiError::not_found(
                "削除対象のレコードが見つかりませんでした",
            ));
        }

        info!(match_id, "Matching history deleted");
        Ok(())
    }
}
