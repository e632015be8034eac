//! Batch matching screen state: filters, last search and current page.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::domain::{
    BatchMatchingFilters, BulkMatchingRequest, BulkMatchingResponse, EnhancedMatchingResult,
};
use crate::error::ApiError;
use crate::services::{AiMatchingClient, BackendAuth, DetailLookup};
use crate::stores::Notice;

use super::aggregate::{convert_bulk_matches_to_results, paginate, total_pages};

const SEARCH_MAX_MATCHES: u32 = 100;

/// Bulk matching seam.
#[async_trait]
pub trait BulkMatcher: Send + Sync {
    async fn bulk_match(&self, request: &BulkMatchingRequest) -> Result<BulkMatchingResponse, ApiError>;
}

/// The AI matching client bound to one caller.
pub struct RemoteMatcher<'a> {
    pub client: &'a AiMatchingClient,
    pub auth: BackendAuth<'a>,
}

#[async_trait]
impl<'a> BulkMatcher for RemoteMatcher<'a> {
    async fn bulk_match(&self, request: &BulkMatchingRequest) -> Result<BulkMatchingResponse, ApiError> {
        self.client.perform_bulk_matching(request, self.auth).await
    }
}

/// Counts from the last bulk response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchingSummary {
    pub total_matches: u64,
    pub high_quality_matches: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matching_history: Option<Value>,
}

/// What the batch matching table renders.
#[derive(Debug, Clone, Serialize)]
pub struct BatchMatchingPage {
    pub searched: bool,
    pub results: Vec<EnhancedMatchingResult>,
    pub page: usize,
    pub total_pages: usize,
    pub total_results: usize,
    pub summary: Option<MatchingSummary>,
}

pub struct BatchMatchingSession {
    pub filters: BatchMatchingFilters,
    pub is_searched: bool,
    pub is_loading: bool,
    pub results: Vec<EnhancedMatchingResult>,
    pub summary: Option<MatchingSummary>,
    pub current_page: usize,
    pub notices: Vec<Notice>,
}

impl BatchMatchingSession {
    pub fn new(filters: BatchMatchingFilters) -> Self {
        Self {
            filters,
            is_searched: false,
            is_loading: false,
            results: Vec::new(),
            summary: None,
            current_page: 1,
            notices: Vec::new(),
        }
    }

    /// Request for the current filters. `"all"` and empty values are left out.
    pub fn request(&self, tenant_id: &str, executed_by: Option<&str>) -> BulkMatchingRequest {
        let set = |value: &str| {
            let value = value.trim();
            (!value.is_empty() && value != "all").then(|| value.to_string())
        };

        BulkMatchingRequest {
            max_matches: SEARCH_MAX_MATCHES,
            min_score: self.filters.min_score,
            executed_by: executed_by.map(String::from),
            project_company_type: set(&self.filters.case_affiliation),
            engineer_company_type: set(&self.filters.candidate_affiliation),
            project_start_date: set(&self.filters.case_start_date),
            ..BulkMatchingRequest::new(tenant_id)
        }
    }

    /// Run a bulk match and enrich the rows. The page resets to 1. A failure
    /// leaves the previous results in place and adds an error notice.
    pub async fn search(
        &mut self,
        tenant_id: &str,
        executed_by: Option<&str>,
        matcher: &dyn BulkMatcher,
        details: &dyn DetailLookup,
        concurrency: usize,
    ) {
        self.is_loading = true;
        self.is_searched = false;
        let request = self.request(tenant_id, executed_by);
        info!(min_score = request.min_score, "Bulk matching started");

        match matcher.bulk_match(&request).await {
            Ok(response) => {
                let BulkMatchingResponse {
                    matching_history,
                    matches,
                    total_matches,
                    high_quality_matches,
                    ..
                } = response;

                self.results = convert_bulk_matches_to_results(matches, details, concurrency).await;
                self.summary = Some(MatchingSummary {
                    total_matches,
                    high_quality_matches,
                    matching_history,
                });
                self.is_searched = true;
                self.current_page = 1;
                self.notices.push(Notice::success(
                    "一括マッチング完了",
                    format!("{}件のマッチが見つかりました", total_matches),
                ));
            }
            Err(e) => {
                error!(error = %e, "Bulk matching failed");
                let description = match e {
                    ApiError::Internal(_) => "マッチング処理中にエラーが発生しました".to_string(),
                    ref other => other.notice_message(),
                };
                self.notices.push(Notice::error("一括マッチング失敗", description));
            }
        }
        self.is_loading = false;
    }

    pub fn set_page(&mut self, page: usize) {
        self.current_page = page.max(1);
    }

    pub fn page(&self) -> BatchMatchingPage {
        BatchMatchingPage {
            searched: self.is_searched,
            results: paginate(&self.results, self.current_page).to_vec(),
            page: self.current_page,
            total_pages: total_pages(self.results.len()),
            total_results: self.results.len(),
            summary: self.summary.clone(),
        }
    }
}

struct StoredSession {
    session: BatchMatchingSession,
    last_used: Instant,
}

/// Last batch search per tenant and user. Entries idle longer than the TTL
/// are treated as gone and evicted on the next insert.
pub struct BatchSessions {
    entries: Mutex<HashMap<String, StoredSession>>,
    ttl: Duration,
}

impl BatchSessions {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    fn is_fresh(&self, entry: &StoredSession) -> bool {
        entry.last_used.elapsed() < self.ttl
    }

    /// Remove the session for a search in progress.
    pub fn take(&self, key: &str) -> Option<BatchMatchingSession> {
        self.entries
            .lock()
            .remove(key)
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| entry.session)
    }

    pub fn put(&self, key: String, session: BatchMatchingSession) {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.last_used.elapsed() < self.ttl);
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "Evicted idle batch matching sessions");
        }
        entries.insert(
            key,
            StoredSession {
                session,
                last_used: Instant::now(),
            },
        );
    }

    /// Run `f` on a fresh session and mark it used.
    pub fn with_session<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut BatchMatchingSession) -> R,
    ) -> Option<R> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(key).filter(|entry| self.is_fresh(entry))?;
        entry.last_used = Instant::now();
        Some(f(&mut entry.session))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
