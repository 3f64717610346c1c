//! Persisted snapshot of an unfinished session

use crate::forms::{FormValues, CURRENT_SCHEMA_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Values saved by autosave or an explicit draft save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub form_id: String,
    pub schema_version: u32,
    pub saved_at: DateTime<Utc>,
    pub values: FormValues,
}

impl Draft {
    pub fn new(form_id: &str, values: FormValues) -> Self {
        Self {
            form_id: form_id.to_string(),
            schema_version: CURRENT_SCHEMA_VERSION,
            saved_at: Utc::now(),
            values,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_new_stamps_current_version() {
        let draft = Draft::new("signup", FormValues::new());
        assert_eq!(draft.form_id, "signup");
        assert_eq!(draft.schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_json_uses_camel_case() {
        let values: FormValues = [("email".to_string(), json!("a@b.co"))].into();
        let draft = Draft::new("signup", values);
        let json: serde_json::Value = serde_json::from_str(&draft.to_json().unwrap()).unwrap();
        assert_eq!(json["formId"], "signup");
        assert_eq!(json["schemaVersion"], 1);
        assert_eq!(json["values"]["email"], "a@b.co");
        assert!(json["savedAt"].is_string());
    }

    #[test]
    fn test_parse_saved_draft() {
        let parsed = Draft::from_json(
            r#"{"formId":"signup","schemaVersion":1,"savedAt":"2024-05-01T10:00:00Z","values":{"age":30}}"#,
        )
        .unwrap();
        assert_eq!(parsed.values["age"], json!(30));
        assert_eq!(parsed.saved_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }
}
