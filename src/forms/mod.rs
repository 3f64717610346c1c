//! Form domain layer
//!
//! Field definitions, conditions, compiled schemas, validation and step
//! navigation. Everything here is synchronous and free of side effects;
//! sessions in [`crate::session`] drive it.

mod condition;
mod field;
mod navigator;
mod registry;
mod schema;
mod validation;

pub use condition::{evaluate, Condition, ConditionSet, Operator};
pub use field::{
    is_empty_value, numeric_value, values_equal, Constraints, FieldDefinition, FieldId, FieldKind,
    FieldOption, FormValues,
};
pub use navigator::{NavState, Navigator};
pub use registry::{CustomValidatorFn, CustomVerdict, ValidatorRegistry};
pub use schema::{
    FormConfig, FormSchema, FormSettings, Layout, Section, Step, CURRENT_SCHEMA_VERSION,
};
pub use validation::{
    failed_fields, is_required_on_step, validate_field, validate_field_on_step, validate_form,
    validate_step, ValidationReport, ValidationResult,
};
