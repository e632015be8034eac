//! Mail case list and bulk outreach.
//!
//! A case can carry several contacts; the list shows one row per contact and
//! bulk sends address rows, not cases.

mod bulk;

pub use bulk::{send_to_rows, BulkEmailPlan, MailTransport, QueueTransport};

use std::collections::BTreeSet;

use crate::domain::{first_non_empty, MailCaseQuery, Project, SenderPage, SenderRow, MAIL_CASES_PER_PAGE};
use crate::services::is_filter_set;

/// Key technologies column, else the skills joined.
fn key_technologies(case: &Project) -> String {
    case.key_technologies
        .clone()
        .filter(|k| !k.trim().is_empty())
        .unwrap_or_else(|| case.skills.join(", "))
}

/// One row per contact. A case without contacts still yields one row.
pub fn flatten_senders(case: &Project) -> Vec<SenderRow> {
    let base = SenderRow {
        row_id: String::new(),
        case_id: case.id.clone(),
        case_title: case.title.clone(),
        company: case.company().unwrap_or_default().to_string(),
        key_technologies: key_technologies(case),
        sender: String::new(),
        email: String::new(),
        position: String::new(),
        registration_type: case.source.clone().unwrap_or_default(),
        registered_at: first_non_empty(&[case.registered_at.as_deref(), case.created_at.as_deref()])
            .unwrap_or_default()
            .to_string(),
        start_date: case.start_date.clone().unwrap_or_default(),
    };

    if case.senders.is_empty() {
        let email = case.sender_email.clone().unwrap_or_default();
        let row_id_email = if email.is_empty() { "default" } else { email.as_str() };
        return vec![SenderRow {
            row_id: format!("{}-{}-0", case.id, row_id_email),
            sender: case.legacy_sender().unwrap_or_default().to_string(),
            email,
            ..base
        }];
    }

    case.senders
        .iter()
        .enumerate()
        .map(|(index, sender)| {
            let name = sender.name.clone().unwrap_or_default();
            let email = sender.email.clone().unwrap_or_default();
            let id_part = if !email.is_empty() {
                email.clone()
            } else if !name.is_empty() {
                let compact: String = name.split_whitespace().collect();
                format!("{}@example.com", compact.to_lowercase())
            } else {
                format!("sender{}", index)
            };

            SenderRow {
                row_id: format!("{}-{}-{}", case.id, id_part, index),
                sender: name,
                email,
                position: sender.position.clone().unwrap_or_default(),
                ..base.clone()
            }
        })
        .collect()
}

/// Rows for every contact of every case, in case order.
pub fn flatten_all(cases: &[Project]) -> Vec<SenderRow> {
    cases.iter().flat_map(flatten_senders).collect()
}

fn matches_tech(case: &Project, tech: &str) -> bool {
    let tech = tech.to_lowercase();
    key_technologies(case).to_lowercase().contains(&tech)
        || case.skills.iter().any(|s| s.to_lowercase().contains(&tech))
}

/// Filter, sort and paginate cases, then flatten the page into rows.
pub fn case_page(cases: &[Project], query: &MailCaseQuery) -> SenderPage {
    let companies: Vec<String> = cases
        .iter()
        .filter_map(|c| c.company())
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let start_dates: Vec<String> = cases
        .iter()
        .filter_map(|c| c.start_date.clone())
        .filter(|d| !d.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let company = query.company.as_deref().filter(|c| is_filter_set(c));
    let tech = query.tech.as_deref().filter(|t| is_filter_set(t));
    let start_date = query.start_date.as_deref().filter(|d| is_filter_set(d));

    let mut selected: Vec<&Project> = cases
        .iter()
        .filter(|c| company.map_or(true, |want| c.company() == Some(want)))
        .filter(|c| tech.map_or(true, |want| matches_tech(c, want)))
        .filter(|c| start_date.map_or(true, |want| c.start_date.as_deref() == Some(want)))
        .collect();

    match query.sort.as_deref() {
        Some("asc") => selected.sort_by(|a, b| a.start_date.cmp(&b.start_date)),
        Some("desc") => selected.sort_by(|a, b| b.start_date.cmp(&a.start_date)),
        _ => {}
    }

    let total_cases = selected.len();
    let total_pages = total_cases.div_ceil(MAIL_CASES_PER_PAGE);
    let page = query.page.unwrap_or(1).max(1);
    let rows = selected
        .into_iter()
        .skip((page - 1) * MAIL_CASES_PER_PAGE)
        .take(MAIL_CASES_PER_PAGE)
        .flat_map(flatten_senders)
        .collect();

    SenderPage {
        rows,
        page,
        total_pages,
        total_cases,
        companies,
        start_dates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Sender;
    use std::collections::HashSet;

    fn case(id: &str) -> Project {
        Project {
            id: id.into(),
            title: format!("案件{}", id),
            client_company: Some("A社".into()),
            skills: vec!["Java".into(), "AWS".into()],
            source: Some("mail_import".into()),
            created_at: Some("2024-05-01T00:00:00Z".into()),
            ..Default::default()
        }
    }

    fn sender(name: Option<&str>, email: Option<&str>) -> Sender {
        Sender {
            name: name.map(String::from),
            email: email.map(String::from),
            position: Some("営業".into()),
        }
    }

    #[test]
    fn case_without_senders_yields_one_empty_row() {
        let rows = flatten_senders(&case("c1"));
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.row_id, "c1-default-0");
        assert_eq!(row.sender, "");
        assert_eq!(row.email, "");
        assert_eq!(row.key_technologies, "Java, AWS");
        assert_eq!(row.registration_type, "mail_import");
        assert_eq!(row.registered_at, "2024-05-01T00:00:00Z");
    }

    #[test]
    fn legacy_sender_columns_are_used() {
        let mut legacy = case("c2");
        legacy.sender_name = Some("佐藤".into());
        legacy.sender_email = Some("sato@example.jp".into());
        legacy.key_technologies = Some("Go".into());

        let rows = flatten_senders(&legacy);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_id, "c2-sato@example.jp-0");
        assert_eq!(rows[0].sender, "佐藤");
        assert_eq!(rows[0].key_technologies, "Go");
    }

    #[test]
    fn legacy_sender_column_is_read_from_rows() {
        let legacy: Project = serde_json::from_value(serde_json::json!({
            "id": "c9",
            "title": "案件",
            "sender": "佐藤",
            "sender_email": "sato@x.jp"
        }))
        .unwrap();

        let rows = flatten_senders(&legacy);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_id, "c9-sato@x.jp-0");
        assert_eq!(rows[0].sender, "佐藤");
        assert_eq!(rows[0].email, "sato@x.jp");
    }

    #[test]
    fn each_sender_gets_a_distinct_row() {
        let mut multi = case("c3");
        multi.senders = vec![
            sender(Some("田中"), Some("tanaka@example.jp")),
            sender(Some("Yamada Taro"), None),
            sender(None, None),
            sender(Some("田中"), Some("tanaka@example.jp")),
        ];

        let rows = flatten_senders(&multi);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].row_id, "c3-tanaka@example.jp-0");
        assert_eq!(rows[1].row_id, "c3-yamadataro@example.com-1");
        assert_eq!(rows[2].row_id, "c3-sender2-2");
        assert_eq!(rows[1].email, "");
        assert_eq!(rows[2].position, "営業");

        let ids: HashSet<_> = rows.iter().map(|r| r.row_id.as_str()).collect();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn case_page_filters_sorts_and_paginates() {
        let mut cases: Vec<Project> = (0..12)
            .map(|i| {
                let mut c = case(&format!("c{}", i));
                c.start_date = Some(format!("2024-06-{:02}", 12 - i));
                c
            })
            .collect();
        cases[0].client_company = Some("B社".into());
        cases[0].skills = vec!["Python".into()];

        let first = case_page(
            &cases,
            &MailCaseQuery {
                sort: Some("asc".into()),
                ..Default::default()
            },
        );
        assert_eq!(first.total_cases, 12);
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.rows.len(), 10);
        assert_eq!(first.rows[0].case_id, "c11");
        assert_eq!(first.companies, vec!["A社", "B社"]);
        assert_eq!(first.start_dates.len(), 12);

        let second = case_page(
            &cases,
            &MailCaseQuery {
                page: Some(2),
                ..Default::default()
            },
        );
        assert_eq!(second.rows.len(), 2);

        let filtered = case_page(
            &cases,
            &MailCaseQuery {
                company: Some("all".into()),
                tech: Some("python".into()),
                ..Default::default()
            },
        );
        assert_eq!(filtered.total_cases, 1);
        assert_eq!(filtered.rows[0].case_id, "c0");

        let by_date = case_page(
            &cases,
            &MailCaseQuery {
                start_date: Some("2024-06-05".into()),
                ..Default::default()
            },
        );
        assert_eq!(by_date.rows[0].case_id, "c7");
    }
}
