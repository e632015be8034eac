use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{lenient_string, string_or_list};

/// `{success, message, data}` envelope returned by the resume parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

/// Structured fields extracted from a resume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedResume {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub age: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub nearest_station: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub skills: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub experience: Option<String>,
    #[serde(default)]
    pub japanese_level: Option<String>,
    #[serde(default)]
    pub english_level: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub certifications: Option<Vec<String>>,
    #[serde(default)]
    pub self_promotion: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of `/validate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeValidation {
    #[serde(default)]
    pub is_valid: Option<bool>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A resume file received from a client.
#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parsed_resume_accepts_mixed_shapes() {
        let envelope: ResumeEnvelope<ParsedResume> = serde_json::from_value(json!({
            "success": true,
            "message": "ok",
            "data": {"name": "山田太郎", "age": 29, "skills": "Java, Python", "education": "大学卒"}
        }))
        .unwrap();

        let data = envelope.data.unwrap();
        assert_eq!(data.age.as_deref(), Some("29"));
        assert_eq!(data.skills, Some(vec!["Java".to_string(), "Python".to_string()]));
        assert_eq!(data.extra["education"], "大学卒");
    }
}
