use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A job advertisement as supplied by the caller. Never mutated here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPosting {
    pub id: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    /// Free text, possibly HTML. Empty when the record carried none.
    pub description: String,
}

impl RawPosting {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    #[cfg(test)]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Reads a posting record leniently.
    ///
    /// Both historical field spellings are accepted (`Description`/`description`,
    /// `JobTitle`/`job_title`). A record that is not an object yields an empty
    /// posting so it still counts toward the analyzed total.
    pub fn from_value(index: usize, value: &Value) -> Self {
        let fallback_id = format!("posting-{index}");

        let Some(record) = value.as_object() else {
            warn!("Posting record {index} is not an object; it will contribute no terms");
            return Self::new(fallback_id, "");
        };

        let text = |keys: &[&str]| -> Option<String> {
            keys.iter()
                .filter_map(|k| record.get(*k))
                .find_map(|v| v.as_str())
                .map(|s| s.to_string())
                .filter(|s| !s.trim().is_empty())
        };

        let id = keys_as_id(record.get("JvId").or_else(|| record.get("id")))
            .unwrap_or(fallback_id);

        Self {
            id,
            title: text(&["JobTitle", "job_title", "title"]),
            company: text(&["Company", "company"]),
            location: text(&["Location", "location"]),
            description: text(&["Description", "description"]).unwrap_or_default(),
        }
    }

    /// Description followed by title, the text analyzed for this posting.
    pub fn analyzable_text(&self) -> String {
        match &self.title {
            Some(title) if !self.description.is_empty() => {
                format!("{} {}", self.description, title)
            }
            Some(title) => title.clone(),
            None => self.description.clone(),
        }
    }
}

fn keys_as_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reads_capitalized_fields() {
        let value = json!({
            "JvId": "ABC123",
            "JobTitle": "Registered Nurse",
            "Company": "General Hospital",
            "Location": "Washington, DC",
            "Description": "Responsible for coordinating patient care."
        });
        let posting = RawPosting::from_value(0, &value);
        assert_eq!(posting.id, "ABC123");
        assert_eq!(posting.title.as_deref(), Some("Registered Nurse"));
        assert_eq!(posting.company.as_deref(), Some("General Hospital"));
        assert_eq!(posting.description, "Responsible for coordinating patient care.");
    }

    #[test]
    fn test_reads_snake_case_fields() {
        let value = json!({
            "id": 42,
            "job_title": "Electrician",
            "description": "Install conduit."
        });
        let posting = RawPosting::from_value(3, &value);
        assert_eq!(posting.id, "42");
        assert_eq!(posting.title.as_deref(), Some("Electrician"));
        assert_eq!(posting.description, "Install conduit.");
    }

    #[test]
    fn test_missing_text_fields_yield_empty_posting() {
        let posting = RawPosting::from_value(7, &json!({"Company": "Acme"}));
        assert_eq!(posting.id, "posting-7");
        assert!(posting.description.is_empty());
        assert!(posting.title.is_none());
    }

    #[test]
    fn test_non_object_record_yields_empty_posting() {
        let posting = RawPosting::from_value(1, &json!("not a posting"));
        assert_eq!(posting.id, "posting-1");
        assert!(posting.analyzable_text().is_empty());
    }

    #[test]
    fn test_non_string_description_ignored() {
        let posting = RawPosting::from_value(0, &json!({"Description": 12, "description": "fallback text"}));
        assert_eq!(posting.description, "fallback text");
    }

    #[test]
    fn test_analyzable_text_joins_description_and_title() {
        let posting = RawPosting::new("1", "Maintain records.").with_title("Clerk");
        assert_eq!(posting.analyzable_text(), "Maintain records. Clerk");
    }
}
