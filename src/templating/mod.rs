//! Email template rendering.
//!
//! Stored templates use `{key}` tokens and the built-in case templates use
//! `{{key}}`. Rendering for sending drops unknown tokens; previews keep them
//! as tags (see [`tag_placeholders`]).

mod context;
mod engine;

pub use context::{
    case_context, engineers_context, experience_range, main_skills, skill_category,
};
pub use engine::{
    replace_placeholders, tag_placeholders, values_from_json, PlaceholderStyle,
    PlaceholderValues, Segment,
};

use crate::domain::{EmailTemplate, Engineer, Project, RenderedEmail};

/// Render subject, body and signature of a template.
pub fn render_template(
    template: &EmailTemplate,
    values: &PlaceholderValues,
    style: PlaceholderStyle,
) -> RenderedEmail {
    RenderedEmail {
        subject: replace_placeholders(&template.subject_template, values, style),
        body: replace_placeholders(&template.body_template_text, values, style),
        signature: template
            .signature_template
            .as_deref()
            .map(|s| replace_placeholders(s, values, style))
            .unwrap_or_default(),
    }
}

/// Render a stored template for the given engineers. `additional` values are
/// applied last and win over computed ones.
pub fn apply_template_with_engineers(
    template: &EmailTemplate,
    engineers: &[Engineer],
    additional: &PlaceholderValues,
) -> RenderedEmail {
    let mut values = engineers_context(&template.category, engineers);
    values.extend(additional.iter().map(|(k, v)| (k.clone(), v.clone())));
    render_template(template, &values, PlaceholderStyle::Single)
}

/// Render a built-in case template with the first selected case and the
/// first selected engineer.
pub fn apply_case_template(
    template: &EmailTemplate,
    cases: &[Project],
    engineers: &[Engineer],
    sender_name: Option<&str>,
) -> RenderedEmail {
    let values = case_context(cases.first(), sender_name, engineers.first());
    render_template(template, &values, PlaceholderStyle::Double)
}

/// Render a stored template for one case contact: case values, then engineer
/// values, then caller values. The contact's own name is the greeting, the
/// case's first contact only when none is given.
pub fn render_for_case(
    template: &EmailTemplate,
    case: &Project,
    sender_name: Option<&str>,
    engineers: &[Engineer],
    additional: &PlaceholderValues,
) -> RenderedEmail {
    let mut values = case_context(Some(case), sender_name, engineers.first());
    if let Some(sender) = sender_name.filter(|s| !s.trim().is_empty()) {
        values.insert("sender".to_string(), sender.to_string());
    }
    values.extend(engineers_context(&template.category, engineers));
    values.extend(additional.iter().map(|(k, v)| (k.clone(), v.clone())));
    render_template(template, &values, PlaceholderStyle::Single)
}
