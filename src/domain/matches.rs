use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{lenient_string, null_as_default, Engineer, Project};

/// Status stored for matches the user chose to keep.
pub const SAVED_MATCH_STATUS: &str = "保存済み";

/// Alternative spellings probed when the saved list comes back empty.
pub const SAVED_STATUS_VARIANTS: [&str; 4] = ["保存済み", "保存済", "saved", "SAVED"];

/// Row from `project_engineer_matches`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub engineer_id: Option<String>,
    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub skill_match_score: Option<f64>,
    #[serde(default)]
    pub experience_match_score: Option<f64>,
    #[serde(default)]
    pub japanese_level_match_score: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub matched_skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub missing_skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub match_reasons: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
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

/// Saved match with its project and engineer rows attached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedMatch {
    #[serde(flatten)]
    pub record: MatchRecord,
    pub project_detail: Option<Project>,
    pub engineer_detail: Option<Engineer>,
}

/// One item of a bulk-matching response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkMatch {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub engineer_id: Option<String>,
    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub matched_skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub missing_skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub match_reasons: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub project_title: Option<String>,
    #[serde(default)]
    pub engineer_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub project_manager_name: Option<String>,
    #[serde(default)]
    pub project_manager_email: Option<String>,
    #[serde(default)]
    pub engineer_company_name: Option<String>,
    #[serde(default)]
    pub engineer_company_type: Option<String>,
    #[serde(default)]
    pub engineer_manager_name: Option<String>,
    #[serde(default)]
    pub engineer_manager_email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Request body for `/api/v1/ai-matching/bulk-matching`.
#[derive(Debug, Clone, Serialize)]
pub struct BulkMatchingRequest {
    pub tenant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engineer_ids: Option<Vec<String>>,
    pub max_matches: u32,
    pub min_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_by: Option<String>,
    pub matching_type: String,
    pub trigger_type: String,
    pub batch_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_company_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engineer_company_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_start_date: Option<String>,
}

impl BulkMatchingRequest {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            project_ids: None,
            engineer_ids: None,
            max_matches: 100,
            min_score: 0.7,
            executed_by: None,
            matching_type: "bulk_matching".to_string(),
            trigger_type: "api".to_string(),
            batch_size: 50,
            project_company_type: None,
            engineer_company_type: None,
            project_start_date: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkMatchingResponse {
    #[serde(default)]
    pub matching_history: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub matches: Vec<BulkMatch>,
    #[serde(default)]
    pub total_matches: u64,
    #[serde(default)]
    pub high_quality_matches: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Options for the single-sided matching endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchOptions {
    #[serde(default)]
    pub max_matches: Option<u32>,
    #[serde(default)]
    pub min_score: Option<f64>,
    #[serde(default)]
    pub filters: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchStatusUpdate {
    pub status: String,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Enriched bulk-match row shown in the batch matching table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedMatchingResult {
    pub id: String,
    pub case_id: String,
    pub candidate_id: String,
    pub case_name: String,
    pub candidate_name: String,
    pub matching_rate: String,
    pub matching_reason: String,
    pub case_company: String,
    pub candidate_company: String,
    pub case_manager: String,
    pub case_manager_email: String,
    pub affiliation_manager: String,
    pub affiliation_manager_email: String,
    pub memo: String,
    pub recommendation_comment: String,
    pub skills: Vec<String>,
    pub matched_skills: String,
    pub experience: String,
    pub nationality: String,
    pub age: String,
    pub gender: String,
    #[serde(skip)]
    pub project_detail: Option<Project>,
    #[serde(skip)]
    pub engineer_detail: Option<Engineer>,
}

/// Case detail view derived from a matching row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseDetail {
    pub id: String,
    pub name: String,
    pub company: String,
    pub location: String,
    pub work_type: String,
    pub budget: String,
    pub experience_required: String,
    pub skills: Vec<String>,
    pub manager: String,
    pub manager_email: String,
    pub priority: String,
    pub detail_description: String,
    pub project_detail: Option<Project>,
}

/// Candidate detail view derived from a matching row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDetail {
    pub id: String,
    pub name: String,
    pub company: String,
    pub skills: Vec<String>,
    pub experience: String,
    pub japanese_level: String,
    pub english_level: String,
    pub current_status: String,
    pub nearest_station: String,
    pub company_type: String,
    pub arrival_year_japan: String,
    pub manager: String,
    pub manager_email: String,
    pub nationality: String,
    pub age: String,
    pub gender: String,
    pub bio: String,
    pub engineer_detail: Option<Engineer>,
}

/// Batch matching filters. `"all"` and empty values are dropped from the
/// outgoing request.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchMatchingFilters {
    #[serde(default = "all_filter")]
    pub case_affiliation: String,
    #[serde(default = "all_filter")]
    pub candidate_affiliation: String,
    #[serde(default)]
    pub case_start_date: String,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

impl Default for BatchMatchingFilters {
    fn default() -> Self {
        Self {
            case_affiliation: all_filter(),
            candidate_affiliation: all_filter(),
            case_start_date: String::new(),
            min_score: default_min_score(),
        }
    }
}

fn all_filter() -> String {
    "all".to_string()
}

fn default_min_score() -> f64 {
    0.7
}

/// Quality bucket for a match score.
pub fn score_label(score: f64) -> &'static str {
    if score >= 0.8 {
        "高品質マッチ"
    } else if score >= 0.6 {
        "中程度マッチ"
    } else {
        "低品質マッチ"
    }
}

/// `0.82` renders as `"82%"`.
pub fn format_match_score(score: f64) -> String {
    format!("{}%", (score * 100.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn formats_scores_as_rounded_percent() {
        assert_eq!(format_match_score(0.82), "82%");
        assert_eq!(format_match_score(0.756), "76%");
        assert_eq!(format_match_score(0.0), "0%");
        assert_eq!(format_match_score(1.0), "100%");
    }

    #[test]
    fn score_labels_use_quality_buckets() {
        assert_eq!(score_label(0.8), "高品質マッチ");
        assert_eq!(score_label(0.65), "中程度マッチ");
        assert_eq!(score_label(0.1), "低品質マッチ");
    }

    #[test]
    fn bulk_request_omits_unset_filters() {
        let body = serde_json::to_value(BulkMatchingRequest::new("t1")).unwrap();
        assert_eq!(body["max_matches"], 100);
        assert_eq!(body["matching_type"], "bulk_matching");
        assert_eq!(body["batch_size"], 50);
        assert!(body.get("project_company_type").is_none());
        assert!(body.get("project_ids").is_none());
    }

    #[test]
    fn bulk_match_accepts_numeric_ids_and_null_lists() {
        let item: BulkMatch = serde_json::from_value(json!({
            "id": 7,
            "match_reasons": null,
            "match_score": 0.5
        }))
        .unwrap();
        assert_eq!(item.id.as_deref(), Some("7"));
        assert!(item.match_reasons.is_empty());
    }
}
