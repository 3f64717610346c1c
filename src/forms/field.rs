//! Field definitions and the per-kind structural checks

use super::condition::{Condition, ConditionSet};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Identifier of a field, unique within a form
pub type FieldId = String;

/// Current values of a form, keyed by field id
pub type FormValues = HashMap<FieldId, Value>;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("url pattern is valid"));
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 ()\-.]{5,}[0-9]$").expect("phone pattern is valid"));
static COLOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").expect("color pattern is valid")
});

/// Closed set of input kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Email,
    Password,
    Number,
    Date,
    Datetime,
    Select,
    Multiselect,
    Radio,
    Checkbox,
    Textarea,
    File,
    Image,
    Boolean,
    Relation,
    Array,
    Object,
    Rating,
    Slider,
    Color,
    Url,
    Phone,
    Richtext,
}

impl FieldKind {
    /// Kinds whose values are picked from declared options
    pub fn is_choice(self) -> bool {
        matches!(self, Self::Select | Self::Multiselect | Self::Radio)
    }

    /// Kinds whose values are numbers
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Number | Self::Rating | Self::Slider)
    }

    /// Check that a non-empty value has the shape this kind expects.
    ///
    /// Returns the tail of the failure message; callers prefix the label.
    pub fn structural_check(self, value: &Value, options: &[FieldOption]) -> Result<(), &'static str> {
        let ok = match self {
            Self::Text | Self::Password | Self::Textarea | Self::Richtext => value.is_string(),
            Self::Email => matches_str(value, &EMAIL_RE),
            Self::Url => matches_str(value, &URL_RE),
            Self::Phone => matches_str(value, &PHONE_RE),
            Self::Color => matches_str(value, &COLOR_RE),
            Self::Number | Self::Rating | Self::Slider => numeric_value(value).is_some(),
            Self::Date => value
                .as_str()
                .is_some_and(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
            Self::Datetime => value.as_str().is_some_and(is_datetime),
            Self::Select | Self::Radio => is_option(value, options),
            Self::Multiselect => value
                .as_array()
                .is_some_and(|items| items.iter().all(|item| is_option(item, options))),
            Self::Checkbox | Self::Boolean => value.is_boolean(),
            Self::File | Self::Image => value.is_string() || value.is_object(),
            Self::Relation => value.is_string() || value.is_number(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        };
        if ok {
            return Ok(());
        }
        Err(match self {
            Self::Email => "must be a valid email address",
            Self::Url => "must be a valid URL",
            Self::Phone => "must be a valid phone number",
            Self::Color => "must be a hex color",
            Self::Number | Self::Rating | Self::Slider => "must be a number",
            Self::Date => "must be a date (YYYY-MM-DD)",
            Self::Datetime => "must be a date and time",
            Self::Select | Self::Radio | Self::Multiselect => "must be one of the available options",
            Self::Checkbox | Self::Boolean => "must be true or false",
            Self::Array => "must be a list",
            Self::Object => "must be an object",
            Self::File | Self::Image => "must be a file reference",
            Self::Relation => "must be a record reference",
            Self::Text | Self::Password | Self::Textarea | Self::Richtext => "must be text",
        })
    }
}

fn matches_str(value: &Value, re: &Regex) -> bool {
    value.as_str().is_some_and(|s| re.is_match(s))
}

fn is_datetime(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").is_ok()
}

fn is_option(value: &Value, options: &[FieldOption]) -> bool {
    options.iter().any(|opt| values_equal(&opt.value, value))
}

/// JSON equality where numbers compare by value (`18 == 18.0`)
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Numeric reading of a value: JSON numbers and numeric strings
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Whether a value counts as "not filled in"
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::Bool(_)) | Some(Value::Number(_)) => false,
    }
}

/// One selectable option of a choice field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub label: String,
    pub value: Value,
}

impl FieldOption {
    pub fn new(label: &str, value: impl Into<Value>) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
        }
    }
}

/// Structural limits and custom rules for a field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Full-string, case-sensitive regular expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Name of a predicate in the validator registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
    /// Overrides the default length/range/pattern messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Typed description of one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: FieldId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: FieldKind,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    /// Makes the field required while all of these conditions hold
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_when: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<FieldOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "ConditionSet::is_empty")]
    pub conditions: ConditionSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
}

impl FieldDefinition {
    /// Create a field of the given kind
    pub fn new(id: &str, kind: FieldKind, label: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            kind,
            label: label.to_string(),
            required: false,
            required_when: Vec::new(),
            constraints: None,
            options: None,
            default_value: None,
            conditions: ConditionSet::default(),
            placeholder: None,
            help_text: None,
        }
    }

    /// Create a text field
    pub fn text(id: &str, label: &str) -> Self {
        Self::new(id, FieldKind::Text, label)
    }

    /// Create a number field
    pub fn number(id: &str, label: &str) -> Self {
        Self::new(id, FieldKind::Number, label)
    }

    /// Create a boolean field
    pub fn boolean(id: &str, label: &str) -> Self {
        Self::new(id, FieldKind::Boolean, label)
    }

    /// Create a choice field with options
    pub fn choice(id: &str, kind: FieldKind, label: &str, options: Vec<FieldOption>) -> Self {
        Self {
            options: Some(options),
            ..Self::new(id, kind, label)
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn required_when(mut self, conditions: Vec<Condition>) -> Self {
        self.required_when = conditions;
        self
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_conditions(mut self, conditions: ConditionSet) -> Self {
        self.conditions = conditions;
        self
    }

    /// Label used in messages, falling back to name and id
    pub fn display_label(&self) -> &str {
        if !self.label.is_empty() {
            &self.label
        } else if !self.name.is_empty() {
            &self.name
        } else {
            &self.id
        }
    }

    /// Declared options, empty for non-choice kinds
    pub fn options(&self) -> &[FieldOption] {
        self.options.as_deref().unwrap_or_default()
    }

    /// Fields referenced by any of this field's conditions
    pub fn dependencies(&self) -> impl Iterator<Item = &FieldId> {
        self.conditions
            .referenced_fields()
            .chain(self.required_when.iter().map(|c| &c.field))
    }
}
