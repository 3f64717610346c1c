//! Named custom validators
//!
//! Form configs are plain JSON, so a field's `constraints.custom` holds the
//! name of a predicate registered here rather than the predicate itself.

use super::field::FormValues;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Verdict of a custom validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomVerdict {
    Pass,
    /// Failure with the default message
    Fail,
    /// Failure with a specific message
    FailWith(String),
}

impl From<bool> for CustomVerdict {
    fn from(ok: bool) -> Self {
        if ok {
            CustomVerdict::Pass
        } else {
            CustomVerdict::Fail
        }
    }
}

impl From<String> for CustomVerdict {
    fn from(message: String) -> Self {
        CustomVerdict::FailWith(message)
    }
}

impl From<&str> for CustomVerdict {
    fn from(message: &str) -> Self {
        CustomVerdict::FailWith(message.to_string())
    }
}

/// Custom predicate: `(value, all values) -> verdict`
pub type CustomValidatorFn = Arc<dyn Fn(&Value, &FormValues) -> CustomVerdict + Send + Sync>;

/// Registry of custom validators by name
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, CustomValidatorFn>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validator, replacing any previous one with the same name
    pub fn register<F, V>(&mut self, name: &str, validator: F)
    where
        F: Fn(&Value, &FormValues) -> V + Send + Sync + 'static,
        V: Into<CustomVerdict>,
    {
        self.validators.insert(
            name.to_string(),
            Arc::new(move |value, values| validator(value, values).into()),
        );
    }

    /// Builder-style registration
    pub fn with<F, V>(mut self, name: &str, validator: F) -> Self
    where
        F: Fn(&Value, &FormValues) -> V + Send + Sync + 'static,
        V: Into<CustomVerdict>,
    {
        self.register(name, validator);
        self
    }

    pub fn get(&self, name: &str) -> Option<&CustomValidatorFn> {
        self.validators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("validators", &self.names())
            .finish()
    }
}
