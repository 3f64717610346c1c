//! Field, step and form validation
//!
//! Per field, checks run in order and stop at the first failure: required,
//! kind shape, length/range bounds, pattern. A registered custom validator
//! runs last and has the final word, so business rules can override the
//! structural checks.

use super::field::{is_empty_value, numeric_value, FieldDefinition, FieldId, FormValues};
use super::registry::CustomVerdict;
use super::schema::{FormSchema, Step};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Outcome of validating one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationResult {
    Valid,
    Invalid { message: String },
}

impl ValidationResult {
    pub fn invalid(message: impl Into<String>) -> Self {
        ValidationResult::Invalid {
            message: message.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid { message } => Some(message),
        }
    }
}

/// Results keyed by field id, in id order
pub type ValidationReport = BTreeMap<FieldId, ValidationResult>;

/// Ids of the fields that failed
pub fn failed_fields(report: &ValidationReport) -> Vec<FieldId> {
    report
        .iter()
        .filter(|(_, result)| !result.is_valid())
        .map(|(id, _)| id.clone())
        .collect()
}

/// Validate one field against the current values
pub fn validate_field(
    schema: &FormSchema,
    field: &FieldDefinition,
    value: Option<&Value>,
    values: &FormValues,
) -> ValidationResult {
    validate_field_inner(schema, field, value, values, false)
}

/// Validate one field the way `validate_step` would on the given step
pub fn validate_field_on_step(
    schema: &FormSchema,
    step: &Step,
    field: &FieldDefinition,
    values: &FormValues,
) -> ValidationResult {
    validate_field_inner(
        schema,
        field,
        values.get(&field.id),
        values,
        step.required_all_fields,
    )
}

fn validate_field_inner(
    schema: &FormSchema,
    field: &FieldDefinition,
    value: Option<&Value>,
    values: &FormValues,
    force_required: bool,
) -> ValidationResult {
    let required = force_required || schema.is_required(field, values);
    let failure = structural_failure(schema, field, value, required);

    let custom = field
        .constraints
        .as_ref()
        .and_then(|c| c.custom.as_deref())
        .and_then(|name| schema.registry().get(name));

    let Some(custom) = custom else {
        return failure.map_or(ValidationResult::Valid, ValidationResult::invalid);
    };

    let null = Value::Null;
    match custom(value.unwrap_or(&null), values) {
        CustomVerdict::Pass => ValidationResult::Valid,
        CustomVerdict::Fail => ValidationResult::invalid(
            failure.unwrap_or_else(|| format!("{} is invalid", field.display_label())),
        ),
        CustomVerdict::FailWith(message) => ValidationResult::invalid(message),
    }
}

fn structural_failure(
    schema: &FormSchema,
    field: &FieldDefinition,
    value: Option<&Value>,
    required: bool,
) -> Option<String> {
    let label = field.display_label();
    let value = match value {
        Some(value) if !is_empty_value(Some(value)) => value,
        _ => return required.then(|| format!("{label} is required")),
    };

    if let Err(reason) = field.kind.structural_check(value, field.options()) {
        return Some(format!("{label} {reason}"));
    }

    let constraints = field.constraints.as_ref()?;
    let with_message =
        |default: String| Some(constraints.message.clone().unwrap_or(default));

    let length = match value {
        Value::String(s) => Some((s.chars().count(), "characters")),
        Value::Array(items) => Some((items.len(), "items")),
        _ => None,
    };
    if let Some((len, unit)) = length {
        if let Some(min) = constraints.min_length.filter(|&min| len < min) {
            return with_message(format!("{label} must have at least {min} {unit}"));
        }
        if let Some(max) = constraints.max_length.filter(|&max| len > max) {
            return with_message(format!("{label} must have at most {max} {unit}"));
        }
    }

    if field.kind.is_numeric() || value.is_number() {
        if let Some(n) = numeric_value(value) {
            if let Some(min) = constraints.min.filter(|&min| n < min) {
                return with_message(format!("{label} must be at least {min}"));
            }
            if let Some(max) = constraints.max.filter(|&max| n > max) {
                return with_message(format!("{label} must be at most {max}"));
            }
        }
    }

    if let Some(pattern) = schema.pattern(&field.id) {
        let text = match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        };
        if text.is_some_and(|text| !pattern.is_match(&text)) {
            return with_message(format!("{label} has an invalid format"));
        }
    }

    None
}

/// Validate the visible, enabled fields of one step
pub fn validate_step(schema: &FormSchema, step: &Step, values: &FormValues) -> ValidationReport {
    step.field_ids
        .iter()
        .filter_map(|id| schema.field(id))
        .filter(|field| schema.is_active(field, values))
        .map(|field| {
            let result = validate_field_inner(
                schema,
                field,
                values.get(&field.id),
                values,
                step.required_all_fields,
            );
            (field.id.clone(), result)
        })
        .collect()
}

/// Validate every visible, enabled field of every step that is not skipped
pub fn validate_form(schema: &FormSchema, values: &FormValues) -> ValidationReport {
    let mut report = ValidationReport::new();
    for step in schema.steps().iter().filter(|step| !step.is_skipped(values)) {
        for (id, result) in validate_step(schema, step, values) {
            // A field listed on several steps fails if any of them fails it
            let keep_existing = report.get(&id).is_some_and(|r| !r.is_valid());
            if !keep_existing {
                report.insert(id, result);
            }
        }
    }
    report
}

/// Whether a field counts as required while validating this step
pub fn is_required_on_step(
    schema: &FormSchema,
    step: &Step,
    field: &FieldDefinition,
    values: &FormValues,
) -> bool {
    step.required_all_fields || schema.is_required(field, values)
}
