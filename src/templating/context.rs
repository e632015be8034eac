//! Placeholder values computed from cases and engineers.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{Engineer, Project, MULTI_ENGINEER_CATEGORY};

use super::PlaceholderValues;

/// Fixed contact label of the built-in case templates.
const COMPANY_CONTACT: &str = "AI採用担当";

const MAIN_SKILL_LIMIT: usize = 5;

static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").unwrap_or_else(|e| panic!("invalid number pattern: {e}")));

/// Ordered substring rules for grouping engineers by their first skill.
const SKILL_CATEGORIES: [(&[&str], &str); 10] = [
    (&["java", "spring"], "Java"),
    (&["python", "django"], "Python"),
    (&["javascript", "react", "vue", "node"], "JavaScript"),
    (&["php", "laravel"], "PHP"),
    (&["ruby", "rails"], "Ruby"),
    (&["c#", ".net"], "C#"),
    (&["go", "golang"], "Go"),
    (&["swift", "ios"], "iOS"),
    (&["kotlin", "android"], "Android"),
    (&["aws", "azure", "docker"], "インフラ"),
];

const OTHER_CATEGORY: &str = "その他";

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn insert(values: &mut PlaceholderValues, key: &str, value: impl Into<String>) {
    values.insert(key.to_string(), value.into());
}

/// Values for the built-in case templates: the legacy keys plus `project_*`
/// and `engineer_*`. Lists are joined with `、`.
pub fn case_context(
    case: Option<&Project>,
    sender_name: Option<&str>,
    engineer: Option<&Engineer>,
) -> PlaceholderValues {
    let mut values = PlaceholderValues::new();

    if let Some(case) = case {
        let case_sender = case
            .senders
            .first()
            .and_then(|s| s.name.as_deref())
            .filter(|name| !name.trim().is_empty())
            .or(case.legacy_sender());
        let sender = crate::domain::first_non_empty(&[case_sender, sender_name]).unwrap_or_default();
        let description = crate::domain::first_non_empty(&[
            case.description.as_deref(),
            case.detail_description.as_deref(),
        ])
        .unwrap_or_default();

        insert(&mut values, "title", case.title.as_str());
        insert(&mut values, "sender", sender);
        insert(&mut values, "description", description);
        insert(&mut values, "company", case.company().unwrap_or_default());
        insert(&mut values, "companyContact", COMPANY_CONTACT);

        insert(&mut values, "project_title", case.title.as_str());
        insert(&mut values, "project_description", description);
        insert(&mut values, "project_skills", case.skills.join("、"));
        insert(&mut values, "project_location", text(&case.location));
        insert(&mut values, "project_budget", text(&case.budget));
        insert(&mut values, "project_duration", text(&case.duration));
        insert(&mut values, "project_start_date", text(&case.start_date));
        insert(&mut values, "project_japanese_level", text(&case.japanese_level));
        insert(&mut values, "project_experience", text(&case.experience));
        insert(&mut values, "project_key_technologies", text(&case.key_technologies));
        insert(&mut values, "project_work_type", text(&case.work_type));
        insert(
            &mut values,
            "project_max_candidates",
            case.max_candidates.map(|n| n.to_string()).unwrap_or_default(),
        );
    } else if let Some(sender) = sender_name {
        insert(&mut values, "sender", sender);
    }

    if let Some(engineer) = engineer {
        insert(&mut values, "engineerName", engineer.name.as_str());
        insert(&mut values, "engineerYears", text(&engineer.experience));
        insert(&mut values, "engineerSkills", engineer.skills.join("、"));

        insert(&mut values, "engineer_name", engineer.name.as_str());
        insert(&mut values, "engineer_email", text(&engineer.email));
        insert(&mut values, "engineer_skills", engineer.skills.join("、"));
        insert(&mut values, "engineer_experience", text(&engineer.experience));
        insert(&mut values, "engineer_japanese_level", text(&engineer.japanese_level));
        insert(&mut values, "engineer_nearest_station", text(&engineer.nearest_station));
        insert(&mut values, "engineer_desired_rate", engineer.desired_rate());
        insert(&mut values, "engineer_availability", text(&engineer.availability));
        insert(&mut values, "engineer_nationality", text(&engineer.nationality));
        insert(&mut values, "engineer_education", text(&engineer.education));
        insert(
            &mut values,
            "engineer_certifications",
            engineer.certifications.join("、"),
        );
        insert(&mut values, "engineer_self_promotion", text(&engineer.self_promotion));
    }

    values
}

/// Values for stored templates introducing one or more engineers.
pub fn engineers_context(category: &str, engineers: &[Engineer]) -> PlaceholderValues {
    let mut values = PlaceholderValues::new();

    insert(&mut values, "engineer_count", engineers.len().to_string());
    insert(
        &mut values,
        "engineer_names",
        engineers
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>()
            .join("、"),
    );
    insert(&mut values, "main_skills", main_skills(engineers).join(", "));
    insert(&mut values, "experience_range", experience_range(engineers));

    if category == MULTI_ENGINEER_CATEGORY && engineers.len() > 1 {
        insert(&mut values, "engineer_list_detailed", engineer_list_detailed(engineers));
        insert(&mut values, "engineer_table", engineer_table(engineers));
        insert(&mut values, "engineer_list_summary", engineer_list_summary(engineers));
        insert(&mut values, "engineer_categories", engineer_categories(engineers));
    } else if let Some(engineer) = engineers.first() {
        insert(&mut values, "engineer_name", engineer.name.as_str());
        insert(&mut values, "engineer_email", text(&engineer.email));
        insert(&mut values, "engineer_skills", engineer.skills.join(", "));
        insert(&mut values, "engineer_experience", text(&engineer.experience));
        insert(&mut values, "engineer_japanese_level", text(&engineer.japanese_level));
        insert(&mut values, "engineer_nearest_station", text(&engineer.nearest_station));
        insert(&mut values, "engineer_desired_rate", engineer.desired_rate());
        insert(&mut values, "engineer_availability", text(&engineer.availability));
        insert(&mut values, "engineer_nationality", text(&engineer.nationality));
        insert(&mut values, "engineer_education", text(&engineer.education));
        insert(
            &mut values,
            "engineer_certifications",
            engineer.certifications.join(", "),
        );
        insert(&mut values, "engineer_self_promotion", text(&engineer.self_promotion));
    }

    values
}

/// First distinct skills across engineers, in first-seen order.
pub fn main_skills(engineers: &[Engineer]) -> Vec<String> {
    let mut skills: Vec<String> = Vec::new();
    for skill in engineers.iter().flat_map(|e| e.skills.iter()) {
        if !skills.contains(skill) {
            skills.push(skill.clone());
        }
    }
    skills.truncate(MAIN_SKILL_LIMIT);
    skills
}

/// `"N年"` or `"N〜M年"` from the first number in each experience text.
pub fn experience_range(engineers: &[Engineer]) -> String {
    let years: Vec<u32> = engineers
        .iter()
        .filter_map(|e| e.experience.as_deref())
        .filter_map(|exp| LEADING_NUMBER.find(exp))
        .filter_map(|m| m.as_str().parse().ok())
        .filter(|&n| n > 0)
        .collect();

    match (years.iter().min(), years.iter().max()) {
        (Some(min), Some(max)) if min == max => format!("{}年", min),
        (Some(min), Some(max)) => format!("{}〜{}年", min, max),
        _ => String::new(),
    }
}

/// Category of a single skill, matched case-insensitively by substring.
pub fn skill_category(skill: &str) -> &'static str {
    let lower = skill.to_lowercase();
    SKILL_CATEGORIES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
        .map(|(_, category)| *category)
        .unwrap_or(OTHER_CATEGORY)
}

fn engineer_list_detailed(engineers: &[Engineer]) -> String {
    engineers
        .iter()
        .enumerate()
        .map(|(i, e)| {
            format!(
                "【技術者{}】\n【技術者名】{}\n【スキル】{}\n【経験年数】{}\n【日本語レベル】{}\n【最寄り駅】{}\n【希望単価】{}\n【稼働可能日】{}",
                i + 1,
                e.name,
                e.skills.join(", "),
                text(&e.experience),
                text(&e.japanese_level),
                text(&e.nearest_station),
                e.desired_rate(),
                text(&e.availability),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn engineer_table(engineers: &[Engineer]) -> String {
    let mut lines = vec!["技術者名\tスキル\t経験年数\t日本語レベル\t希望単価".to_string()];
    lines.extend(engineers.iter().map(|e| {
        format!(
            "{}\t{}\t{}\t{}\t{}",
            e.name,
            e.skills.join(", "),
            text(&e.experience),
            text(&e.japanese_level),
            e.desired_rate(),
        )
    }));
    lines.join("\n")
}

fn engineer_list_summary(engineers: &[Engineer]) -> String {
    engineers
        .iter()
        .map(|e| {
            format!(
                "・{}\n  スキル：{}\n  経験：{}、日本語：{}\n  最寄り駅：{}、希望単価：{}\n  稼働可能日：{}",
                e.name,
                e.skills.join(", "),
                text(&e.experience),
                text(&e.japanese_level),
                text(&e.nearest_station),
                e.desired_rate(),
                text(&e.availability),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn engineer_categories(engineers: &[Engineer]) -> String {
    let mut groups: Vec<(&'static str, Vec<&str>)> = Vec::new();
    for engineer in engineers {
        let category = engineer
            .skills
            .first()
            .map(|s| skill_category(s))
            .unwrap_or(OTHER_CATEGORY);
        match groups.iter_mut().find(|(c, _)| *c == category) {
            Some((_, names)) => names.push(&engineer.name),
            None => groups.push((category, vec![&engineer.name])),
        }
    }

    groups
        .into_iter()
        .map(|(category, names)| format!("【{}系エンジニア】\n{}", category, names.join("、")))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engineer(name: &str, skills: &[&str], experience: &str) -> Engineer {
        Engineer {
            id: name.to_lowercase(),
            name: name.to_string(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            experience: Some(experience.to_string()),
            desired_rate_min: Some(60.0),
            desired_rate_max: Some(70.0),
            ..Default::default()
        }
    }

    #[test]
    fn skill_categories_follow_rule_order() {
        assert_eq!(skill_category("Spring Boot"), "Java");
        assert_eq!(skill_category("JavaScript"), "Java");
        assert_eq!(skill_category("React"), "JavaScript");
        assert_eq!(skill_category("Golang"), "Go");
        assert_eq!(skill_category("AWS"), "インフラ");
        assert_eq!(skill_category("COBOL"), "その他");
    }

    #[test]
    fn experience_range_uses_leading_numbers() {
        let engineers = vec![
            engineer("A", &[], "3年"),
            engineer("B", &[], "約10年以上"),
            engineer("C", &[], "未経験"),
        ];
        assert_eq!(experience_range(&engineers), "3〜10年");
        assert_eq!(experience_range(&engineers[..1]), "3年");
        assert_eq!(experience_range(&engineers[2..]), "");
    }

    #[test]
    fn main_skills_are_distinct_and_capped() {
        let engineers = vec![
            engineer("A", &["Java", "AWS", "SQL"], "5年"),
            engineer("B", &["AWS", "Go", "React", "Vue"], "2年"),
        ];
        assert_eq!(main_skills(&engineers), vec!["Java", "AWS", "SQL", "Go", "React"]);
    }

    #[test]
    fn multi_engineer_category_adds_list_renderings() {
        let engineers = vec![
            engineer("田中", &["Java"], "5年"),
            engineer("佐藤", &["Python"], "3年"),
            engineer("鈴木", &["Spring"], "7年"),
        ];
        let values = engineers_context(MULTI_ENGINEER_CATEGORY, &engineers);

        assert_eq!(values["engineer_count"], "3");
        assert_eq!(values["engineer_names"], "田中、佐藤、鈴木");
        assert_eq!(
            values["engineer_categories"],
            "【Java系エンジニア】\n田中、鈴木\n\n【Python系エンジニア】\n佐藤"
        );
        assert!(values["engineer_table"].starts_with("技術者名\tスキル"));
        assert_eq!(values["engineer_table"].lines().count(), 4);
        assert!(values["engineer_list_detailed"].contains("【技術者2】\n【技術者名】佐藤"));
        assert!(values["engineer_list_summary"].contains("希望単価：60〜70万円"));
        assert!(!values.contains_key("engineer_name"));
    }

    #[test]
    fn single_engineer_gets_engineer_keys() {
        let engineers = vec![engineer("田中", &["Java", "AWS"], "5年")];
        let values = engineers_context(MULTI_ENGINEER_CATEGORY, &engineers);
        assert_eq!(values["engineer_name"], "田中");
        assert_eq!(values["engineer_skills"], "Java, AWS");
        assert!(!values.contains_key("engineer_table"));
    }

    #[test]
    fn case_context_falls_back_to_selected_sender() {
        let case = Project {
            id: "p1".into(),
            title: "Java案件".into(),
            detail_description: Some("詳細".into()),
            partner_company: Some("パートナー社".into()),
            skills: vec!["Java".into(), "AWS".into()],
            ..Default::default()
        };
        let values = case_context(Some(&case), Some("山田"), None);
        assert_eq!(values["title"], "Java案件");
        assert_eq!(values["sender"], "山田");
        assert_eq!(values["description"], "詳細");
        assert_eq!(values["company"], "パートナー社");
        assert_eq!(values["project_skills"], "Java、AWS");
        assert_eq!(values["companyContact"], "AI採用担当");
        assert!(!values.contains_key("engineerName"));
    }
}
