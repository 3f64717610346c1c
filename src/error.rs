//! Error types for the form engine
//!
//! Only `ConfigError` is fatal: it stops a schema (and therefore a session)
//! from being created. Everything else is recoverable and is returned as a
//! value while the session state stays unchanged.

use crate::forms::FieldId;
use thiserror::Error;

/// Load-time configuration errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Malformed form config: {0}")]
    Malformed(String),

    #[error("Unsupported config version {found} (engine supports up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Duplicate field id: {0}")]
    DuplicateField(FieldId),

    #[error("Duplicate step id: {0}")]
    DuplicateStep(String),

    #[error("Duplicate section id: {0}")]
    DuplicateSection(String),

    #[error("{owner} references unknown field '{field}'")]
    UnknownField { owner: String, field: FieldId },

    #[error("Field '{0}' has a condition on itself")]
    SelfReference(FieldId),

    #[error("Condition cycle between fields: {}", .0.join(" -> "))]
    ConditionCycle(Vec<FieldId>),

    #[error("Field '{0}' is a choice field but declares no options")]
    MissingOptions(FieldId),

    #[error("Field '{0}' declares options but is not a choice field")]
    UnexpectedOptions(FieldId),

    #[error("Layout '{layout}' requires at least one {what}")]
    EmptyLayout { layout: String, what: &'static str },

    #[error("Field '{field}' has an invalid pattern: {reason}")]
    InvalidPattern { field: FieldId, reason: String },

    #[error("Field '{field}' references unknown custom validator '{name}'")]
    UnknownValidator { field: FieldId, name: String },

    #[error("Field '{field}' has inverted bounds: {detail}")]
    InvertedBounds { field: FieldId, detail: String },
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Malformed(err.to_string())
    }
}

/// Rejected navigation or submit attempts
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Current step has invalid fields: {}", .fields.join(", "))]
    StepInvalid { fields: Vec<FieldId> },

    #[error("Already on the last active step")]
    AtLastStep,

    #[error("No earlier step to go back to")]
    NoPreviousStep,

    #[error("Back navigation is disabled for this form")]
    BackNavigationDisabled,

    #[error("Step {0} has not been visited yet")]
    NotVisited(usize),

    #[error("Step {0} does not exist")]
    OutOfRange(usize),

    #[error("Step {0} is skipped for the current values")]
    StepSkipped(usize),

    #[error("Transition from step {from} to step {to} was vetoed")]
    Vetoed { from: usize, to: usize },

    #[error("Submit is only allowed from the last active step")]
    NotOnLastStep,

    #[error("Form has invalid fields: {}", .fields.join(", "))]
    FormInvalid { fields: Vec<FieldId> },

    #[error("Session is closed")]
    SessionClosed,
}

/// Failures reported by external collaborators
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallbackError {
    #[error("Draft save failed: {0}")]
    SaveDraft(String),

    #[error("Submit failed: {0}")]
    Submit(String),

    #[error("Step change hook failed: {0}")]
    StepChange(String),
}

/// Misuse of the session API
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Unknown field: {0}")]
    UnknownField(FieldId),

    #[error("Unknown section: {0}")]
    UnknownSection(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error("Draft belongs to form '{found}', expected '{expected}'")]
    DraftMismatch { expected: String, found: String },

    #[error("Draft version {0} is not supported")]
    DraftVersion(u32),
}

/// Outcome of a failed submit
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Callback(#[from] CallbackError),
}
