//! Bulk-match rows enriched with project and engineer details.

use futures::stream::{self, StreamExt};
use tracing::debug;

use crate::domain::{
    first_non_empty, format_match_score, BulkMatch, CandidateDetail, CaseDetail,
    EnhancedMatchingResult, UNSET,
};
use crate::services::DetailLookup;

/// Rows per page of the batch matching table.
pub const RESULTS_PER_PAGE: usize = 3;

const UNNAMED_CASE: &str = "案件名未設定";
const UNNAMED_CANDIDATE: &str = "候補者名未設定";
const NO_CASE_DESCRIPTION: &str = "案件の詳細情報が登録されていません。";
const NO_CANDIDATE_BIO: &str = "技術者の詳細情報が登録されていません。";

fn or_unset(value: Option<&str>) -> String {
    first_non_empty(&[value]).unwrap_or(UNSET).to_string()
}

fn owned(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

/// Enrich every match with its detail records. Output order and length
/// follow the input; at most `concurrency` matches are in flight, each with
/// its two lookups running together.
pub async fn convert_bulk_matches_to_results(
    matches: Vec<BulkMatch>,
    details: &dyn DetailLookup,
    concurrency: usize,
) -> Vec<EnhancedMatchingResult> {
    debug!(count = matches.len(), concurrency, "Converting bulk matches");

    stream::iter(matches.into_iter().enumerate())
        .map(|(index, item)| async move {
            let project_id = item.project_id.clone().unwrap_or_default();
            let engineer_id = item.engineer_id.clone().unwrap_or_default();
            let (project, engineer) = tokio::join!(
                async {
                    if project_id.is_empty() {
                        None
                    } else {
                        details.project(&project_id).await
                    }
                },
                async {
                    if engineer_id.is_empty() {
                        None
                    } else {
                        details.engineer(&engineer_id).await
                    }
                },
            );
            build_result(index, item, project, engineer)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

fn build_result(
    index: usize,
    item: BulkMatch,
    project: Option<crate::domain::Project>,
    engineer: Option<crate::domain::Engineer>,
) -> EnhancedMatchingResult {
    let p = project.as_ref();
    let e = engineer.as_ref();

    let id = item
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| (index + 1).to_string());

    let skills = match e.map(|e| &e.skills) {
        Some(skills) if !skills.is_empty() => skills.clone(),
        _ => item.matched_skills.clone(),
    };

    EnhancedMatchingResult {
        id,
        case_id: item.project_id.clone().unwrap_or_default(),
        candidate_id: item.engineer_id.clone().unwrap_or_default(),
        case_name: first_non_empty(&[p.map(|p| p.title.as_str()), item.project_title.as_deref()])
            .unwrap_or(UNNAMED_CASE)
            .to_string(),
        candidate_name: first_non_empty(&[e.map(|e| e.name.as_str()), item.engineer_name.as_deref()])
            .unwrap_or(UNNAMED_CANDIDATE)
            .to_string(),
        matching_rate: format_match_score(item.match_score.unwrap_or(0.0)),
        matching_reason: item.match_reasons.join(", "),
        case_company: or_unset(p.and_then(|p| p.company())),
        candidate_company: or_unset(first_non_empty(&[
            e.and_then(|e| e.company_name.as_deref()),
            item.engineer_company_name.as_deref(),
        ])),
        case_manager: owned(first_non_empty(&[
            p.and_then(|p| p.manager_name.as_deref()),
            item.project_manager_name.as_deref(),
        ])),
        case_manager_email: owned(first_non_empty(&[
            p.and_then(|p| p.manager_email.as_deref()),
            item.project_manager_email.as_deref(),
        ])),
        affiliation_manager: owned(first_non_empty(&[
            e.and_then(|e| e.manager_name.as_deref()),
            item.engineer_manager_name.as_deref(),
            e.map(|e| e.name.as_str()),
        ])),
        affiliation_manager_email: owned(first_non_empty(&[
            e.and_then(|e| e.manager_email.as_deref()),
            item.engineer_manager_email.as_deref(),
            e.and_then(|e| e.email.as_deref()),
        ])),
        memo: item.concerns.join(", "),
        recommendation_comment: item
            .match_reasons
            .iter()
            .take(2)
            .cloned()
            .collect::<Vec<_>>()
            .join(", "),
        matched_skills: skills.join(", "),
        skills,
        experience: or_unset(e.and_then(|e| e.experience.as_deref())),
        nationality: or_unset(e.and_then(|e| e.nationality.as_deref())),
        age: or_unset(e.and_then(|e| e.age.as_deref())),
        gender: or_unset(e.and_then(|e| e.gender.as_deref())),
        project_detail: project,
        engineer_detail: engineer,
    }
}

/// One page of results, 1-based. Out-of-range pages are empty.
pub fn paginate(results: &[EnhancedMatchingResult], page: usize) -> &[EnhancedMatchingResult] {
    let start = page.max(1).saturating_sub(1).saturating_mul(RESULTS_PER_PAGE);
    if start >= results.len() {
        return &[];
    }
    let end = (start + RESULTS_PER_PAGE).min(results.len());
    &results[start..end]
}

pub fn total_pages(count: usize) -> usize {
    count.div_ceil(RESULTS_PER_PAGE)
}

pub fn case_detail(result: &EnhancedMatchingResult) -> CaseDetail {
    let p = result.project_detail.as_ref();
    let skills = match p.map(|p| &p.skills) {
        Some(skills) if !skills.is_empty() => skills.clone(),
        _ => result.skills.clone(),
    };

    CaseDetail {
        id: result.case_id.clone(),
        name: result.case_name.clone(),
        company: result.case_company.clone(),
        location: or_unset(p.and_then(|p| p.location.as_deref())),
        work_type: or_unset(p.and_then(|p| p.work_type.as_deref())),
        budget: or_unset(p.and_then(|p| {
            first_non_empty(&[p.budget.as_deref(), p.desired_budget.as_deref()])
        })),
        experience_required: or_unset(p.and_then(|p| p.experience.as_deref())),
        skills,
        manager: result.case_manager.clone(),
        manager_email: result.case_manager_email.clone(),
        priority: first_non_empty(&[p.and_then(|p| p.priority.as_deref())])
            .unwrap_or("medium")
            .to_string(),
        detail_description: p
            .and_then(|p| {
                first_non_empty(&[p.detail_description.as_deref(), p.description.as_deref()])
            })
            .unwrap_or(NO_CASE_DESCRIPTION)
            .to_string(),
        project_detail: result.project_detail.clone(),
    }
}

pub fn candidate_detail(result: &EnhancedMatchingResult) -> CandidateDetail {
    let e = result.engineer_detail.as_ref();

    CandidateDetail {
        id: result.candidate_id.clone(),
        name: result.candidate_name.clone(),
        company: result.candidate_company.clone(),
        skills: result.skills.clone(),
        experience: first_non_empty(&[
            e.and_then(|e| e.experience.as_deref()),
            Some(result.experience.as_str()),
        ])
        .unwrap_or(UNSET)
        .to_string(),
        japanese_level: or_unset(e.and_then(|e| e.japanese_level.as_deref())),
        english_level: or_unset(e.and_then(|e| e.english_level.as_deref())),
        current_status: or_unset(e.and_then(|e| e.current_status.as_deref())),
        nearest_station: or_unset(e.and_then(|e| e.nearest_station.as_deref())),
        company_type: or_unset(e.and_then(|e| e.company_type.as_deref())),
        arrival_year_japan: or_unset(e.and_then(|e| e.arrival_year_japan.as_deref())),
        manager: result.affiliation_manager.clone(),
        manager_email: result.affiliation_manager_email.clone(),
        nationality: result.nationality.clone(),
        age: result.age.clone(),
        gender: result.gender.clone(),
        bio: e
            .and_then(|e| {
                first_non_empty(&[e.self_promotion.as_deref(), e.work_experience.as_deref()])
            })
            .unwrap_or(NO_CANDIDATE_BIO)
            .to_string(),
        engineer_detail: result.engineer_detail.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Engineer, Project};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Lookups that find nothing but record how many run at once.
    #[derive(Default)]
    struct SlowLookup {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl SlowLookup {
        async fn track(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl DetailLookup for SlowLookup {
        async fn project(&self, _id: &str) -> Option<Project> {
            self.track().await;
            None
        }

        async fn engineer(&self, _id: &str) -> Option<Engineer> {
            self.track().await;
            None
        }
    }

    struct Found;

    #[async_trait]
    impl DetailLookup for Found {
        async fn project(&self, id: &str) -> Option<Project> {
            Some(Project {
                id: id.to_string(),
                title: "DB案件".into(),
                client_company: Some("顧客社".into()),
                ..Default::default()
            })
        }

        async fn engineer(&self, id: &str) -> Option<Engineer> {
            Some(Engineer {
                id: id.to_string(),
                name: "DB技術者".into(),
                skills: vec!["Rust".into()],
                ..Default::default()
            })
        }
    }

    fn bulk(i: usize) -> BulkMatch {
        BulkMatch {
            id: Some(format!("m{}", i)),
            project_id: Some(format!("p{}", i)),
            engineer_id: Some(format!("e{}", i)),
            match_score: Some(0.75),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn order_and_length_survive_bounded_fan_out() {
        let lookup = SlowLookup::default();
        let matches: Vec<BulkMatch> = (0..20).map(bulk).collect();

        let results = convert_bulk_matches_to_results(matches, &lookup, 4).await;

        assert_eq!(results.len(), 20);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.id, format!("m{}", i));
        }
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 40);
        assert!(lookup.peak.load(Ordering::SeqCst) <= 8);
        assert!(lookup.peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn missing_details_fall_back_to_embedded_values() {
        let lookup = SlowLookup::default();
        let item = BulkMatch {
            id: None,
            project_id: Some("p1".into()),
            engineer_id: Some("e1".into()),
            match_score: Some(0.82),
            project_title: Some("Case A".into()),
            match_reasons: vec!["Java".into(), "AWS".into(), "N1".into()],
            matched_skills: vec!["Java".into()],
            ..Default::default()
        };

        let results = convert_bulk_matches_to_results(vec![item], &lookup, 8).await;
        let row = &results[0];
        assert_eq!(row.id, "1");
        assert_eq!(row.case_name, "Case A");
        assert_eq!(row.matching_rate, "82%");
        assert_eq!(row.candidate_name, "候補者名未設定");
        assert_eq!(row.case_company, "未設定");
        assert_eq!(row.recommendation_comment, "Java, AWS");
        assert_eq!(row.matched_skills, "Java");
        assert_eq!(row.experience, "未設定");
    }

    #[tokio::test]
    async fn found_details_win_over_embedded_values() {
        let item = BulkMatch {
            project_title: Some("埋め込み案件".into()),
            engineer_name: Some("埋め込み技術者".into()),
            engineer_company_name: Some("埋め込み社".into()),
            ..bulk(1)
        };
        let results = convert_bulk_matches_to_results(vec![item], &Found, 2).await;
        let row = &results[0];
        assert_eq!(row.case_name, "DB案件");
        assert_eq!(row.candidate_name, "DB技術者");
        assert_eq!(row.case_company, "顧客社");
        assert_eq!(row.candidate_company, "埋め込み社");
        assert_eq!(row.skills, vec!["Rust"]);
        assert_eq!(row.affiliation_manager, "DB技術者");

        let case = case_detail(row);
        assert_eq!(case.location, "未設定");
        assert_eq!(case.priority, "medium");
        assert_eq!(case.detail_description, NO_CASE_DESCRIPTION);
        let candidate = candidate_detail(row);
        assert_eq!(candidate.bio, NO_CANDIDATE_BIO);
    }

    #[tokio::test]
    async fn pages_hold_three_rows() {
        let results = convert_bulk_matches_to_results((0..7).map(bulk).collect(), &Found, 8).await;
        assert_eq!(total_pages(results.len()), 3);
        assert_eq!(paginate(&results, 1).len(), 3);
        assert_eq!(paginate(&results, 3).len(), 1);
        assert_eq!(paginate(&results, 3)[0].id, "m6");
        assert!(paginate(&results, 4).is_empty());
        assert_eq!(paginate(&results, 0).len(), 3);
    }
}
