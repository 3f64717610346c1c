//! Form configuration and its load-time validation
//!
//! A `FormConfig` is the JSON aggregate authored by form builders. It only
//! becomes usable as a `FormSchema`, which checks every structural invariant
//! up front so that a running session never meets a dangling reference.

use super::condition::{evaluate, Condition};
use super::field::{FieldDefinition, FieldId, FormValues};
use super::registry::ValidatorRegistry;
use crate::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Newest config version this engine understands
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

fn current_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

fn default_true() -> bool {
    true
}

/// How fields are arranged and navigated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Single,
    Steps,
    Sections,
    Tabs,
    Accordion,
    Wizard,
}

impl Layout {
    /// Layouts navigated step by step
    pub fn is_multi_step(self) -> bool {
        matches!(self, Self::Steps | Self::Wizard)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Steps => "steps",
            Self::Sections => "sections",
            Self::Tabs => "tabs",
            Self::Accordion => "accordion",
            Self::Wizard => "wizard",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered page of fields in a multi-step form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub field_ids: Vec<FieldId>,
    /// Treat every visible, enabled field of the step as required
    #[serde(default)]
    pub required_all_fields: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_if: Vec<Condition>,
}

impl Step {
    pub fn new(id: &str, title: &str, field_ids: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            field_ids: field_ids.iter().map(|f| f.to_string()).collect(),
            required_all_fields: false,
            skip_if: Vec::new(),
        }
    }

    pub fn skip_if(mut self, conditions: Vec<Condition>) -> Self {
        self.skip_if = conditions;
        self
    }

    /// Whether the step is currently bypassed
    pub fn is_skipped(&self, values: &FormValues) -> bool {
        !self.skip_if.is_empty() && evaluate(&self.skip_if, values)
    }
}

/// Group of fields shown together, individually collapsible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub field_ids: Vec<FieldId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub show: Vec<Condition>,
    #[serde(default = "default_true")]
    pub collapsible: bool,
    #[serde(default)]
    pub collapsed: bool,
}

impl Section {
    pub fn new(id: &str, title: &str, field_ids: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            field_ids: field_ids.iter().map(|f| f.to_string()).collect(),
            show: Vec::new(),
            collapsible: true,
            collapsed: false,
        }
    }

    pub fn is_visible(&self, values: &FormValues) -> bool {
        evaluate(&self.show, values)
    }
}

/// Behavioural switches of a form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormSettings {
    pub allow_back_navigation: bool,
    pub allow_skip_optional_steps: bool,
    pub validate_on_change: bool,
    pub validate_on_blur: bool,
    pub auto_save: bool,
    /// Autosave debounce, in seconds
    pub auto_save_interval: u64,
    /// Inactivity timeout, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_timeout: Option<u64>,
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            allow_back_navigation: true,
            allow_skip_optional_steps: false,
            validate_on_change: true,
            validate_on_blur: true,
            auto_save: false,
            auto_save_interval: 30,
            session_timeout: None,
        }
    }
}

/// Root aggregate of a form configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormConfig {
    #[serde(default = "current_version")]
    pub version: u32,
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub layout: Layout,
    pub fields: Vec<FieldDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub settings: FormSettings,
}

impl FormConfig {
    pub fn new(id: &str, title: &str, layout: Layout, fields: Vec<FieldDefinition>) -> Self {
        Self {
            version: CURRENT_SCHEMA_VERSION,
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            layout,
            fields,
            steps: Vec::new(),
            sections: Vec::new(),
            settings: FormSettings::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A validated, compiled form configuration
#[derive(Debug, Clone)]
pub struct FormSchema {
    config: FormConfig,
    registry: ValidatorRegistry,
    field_index: HashMap<FieldId, usize>,
    patterns: HashMap<FieldId, Regex>,
    /// Steps used for navigation; one implicit step for non-step layouts
    steps: Vec<Step>,
    /// Indices of the sections containing each field
    field_sections: HashMap<FieldId, Vec<usize>>,
}

impl FormSchema {
    /// Validate and compile a config
    pub fn new(config: FormConfig, registry: ValidatorRegistry) -> Result<Self, ConfigError> {
        if config.version > CURRENT_SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: config.version,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }

        let mut field_index = HashMap::new();
        for (i, field) in config.fields.iter().enumerate() {
            if field_index.insert(field.id.clone(), i).is_some() {
                return Err(ConfigError::DuplicateField(field.id.clone()));
            }
        }

        let mut patterns = HashMap::new();
        for field in &config.fields {
            check_options(field)?;
            if let Some(pattern) = check_constraints(field, &registry)? {
                patterns.insert(field.id.clone(), pattern);
            }
            for dep in field.dependencies() {
                if dep == &field.id {
                    return Err(ConfigError::SelfReference(field.id.clone()));
                }
                ensure_known(&field_index, &format!("Field '{}'", field.id), dep)?;
            }
        }

        if config.layout.is_multi_step() && config.steps.is_empty() {
            return Err(ConfigError::EmptyLayout {
                layout: config.layout.to_string(),
                what: "step",
            });
        }
        let mut step_ids = HashSet::new();
        for step in &config.steps {
            if !step_ids.insert(step.id.as_str()) {
                return Err(ConfigError::DuplicateStep(step.id.clone()));
            }
            let owner = format!("Step '{}'", step.id);
            for field_id in step.field_ids.iter().chain(step.skip_if.iter().map(|c| &c.field)) {
                ensure_known(&field_index, &owner, field_id)?;
            }
        }

        if config.layout == Layout::Sections && config.sections.is_empty() {
            return Err(ConfigError::EmptyLayout {
                layout: config.layout.to_string(),
                what: "section",
            });
        }
        let mut section_ids = HashSet::new();
        let mut field_sections: HashMap<FieldId, Vec<usize>> = HashMap::new();
        for (i, section) in config.sections.iter().enumerate() {
            if !section_ids.insert(section.id.as_str()) {
                return Err(ConfigError::DuplicateSection(section.id.clone()));
            }
            let owner = format!("Section '{}'", section.id);
            for field_id in section.show.iter().map(|c| &c.field) {
                ensure_known(&field_index, &owner, field_id)?;
            }
            for field_id in &section.field_ids {
                ensure_known(&field_index, &owner, field_id)?;
                field_sections.entry(field_id.clone()).or_default().push(i);
            }
        }

        detect_cycles(&config.fields, &field_index)?;

        let steps = if config.layout.is_multi_step() {
            config.steps.clone()
        } else {
            vec![Step {
                id: "main".to_string(),
                title: config.title.clone(),
                description: None,
                field_ids: config.fields.iter().map(|f| f.id.clone()).collect(),
                required_all_fields: false,
                skip_if: Vec::new(),
            }]
        };

        tracing::debug!(
            form = %config.id,
            fields = config.fields.len(),
            steps = steps.len(),
            "Form schema compiled"
        );

        Ok(Self {
            config,
            registry,
            field_index,
            patterns,
            steps,
            field_sections,
        })
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str, registry: ValidatorRegistry) -> Result<Self, ConfigError> {
        Self::new(FormConfig::from_json(json)?, registry)
    }

    pub fn config(&self) -> &FormConfig {
        &self.config
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn settings(&self) -> &FormSettings {
        &self.config.settings
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.config.fields
    }

    pub fn field(&self, id: &str) -> Option<&FieldDefinition> {
        self.field_index.get(id).map(|&i| &self.config.fields[i])
    }

    pub fn sections(&self) -> &[Section] {
        &self.config.sections
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.config.sections.iter().find(|s| s.id == id)
    }

    /// Compiled full-string pattern of a field
    pub fn pattern(&self, field_id: &str) -> Option<&Regex> {
        self.patterns.get(field_id)
    }

    /// Navigation steps (a single implicit step for non-step layouts)
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Field visibility: own show/hide rules and every containing section
    pub fn is_visible(&self, field: &FieldDefinition, values: &FormValues) -> bool {
        field.conditions.is_visible(values)
            && self.field_sections.get(&field.id).map_or(true, |sections| {
                sections
                    .iter()
                    .all(|&i| self.config.sections[i].is_visible(values))
            })
    }

    pub fn is_enabled(&self, field: &FieldDefinition, values: &FormValues) -> bool {
        field.conditions.is_enabled(values)
    }

    /// Visible and enabled: validated and submitted
    pub fn is_active(&self, field: &FieldDefinition, values: &FormValues) -> bool {
        self.is_visible(field, values) && self.is_enabled(field, values)
    }

    /// Effective requiredness, including `requiredWhen`
    pub fn is_required(&self, field: &FieldDefinition, values: &FormValues) -> bool {
        field.required || (!field.required_when.is_empty() && evaluate(&field.required_when, values))
    }

    /// Initial values from field defaults
    pub fn default_values(&self) -> FormValues {
        self.config
            .fields
            .iter()
            .filter_map(|f| f.default_value.clone().map(|v| (f.id.clone(), v)))
            .collect()
    }

    /// Fields on steps that are not currently skipped, in step order
    pub fn fields_on_active_steps<'a>(
        &'a self,
        values: &'a FormValues,
    ) -> impl Iterator<Item = &'a FieldDefinition> + 'a {
        let mut seen = HashSet::new();
        self.steps
            .iter()
            .filter(move |step| !step.is_skipped(values))
            .flat_map(|step| step.field_ids.iter())
            .filter(move |id| seen.insert(id.as_str()))
            .filter_map(move |id| self.field(id))
    }
}

fn ensure_known(
    index: &HashMap<FieldId, usize>,
    owner: &str,
    field_id: &FieldId,
) -> Result<(), ConfigError> {
    if index.contains_key(field_id) {
        Ok(())
    } else {
        Err(ConfigError::UnknownField {
            owner: owner.to_string(),
            field: field_id.clone(),
        })
    }
}

fn check_options(field: &FieldDefinition) -> Result<(), ConfigError> {
    let has_options = !field.options().is_empty();
    match (field.kind.is_choice(), has_options) {
        (true, false) => Err(ConfigError::MissingOptions(field.id.clone())),
        (false, true) => Err(ConfigError::UnexpectedOptions(field.id.clone())),
        _ => Ok(()),
    }
}

fn check_constraints(
    field: &FieldDefinition,
    registry: &ValidatorRegistry,
) -> Result<Option<Regex>, ConfigError> {
    let Some(constraints) = &field.constraints else {
        return Ok(None);
    };
    if let (Some(min), Some(max)) = (constraints.min_length, constraints.max_length) {
        if min > max {
            return Err(ConfigError::InvertedBounds {
                field: field.id.clone(),
                detail: format!("minLength {min} > maxLength {max}"),
            });
        }
    }
    if let (Some(min), Some(max)) = (constraints.min, constraints.max) {
        if min > max {
            return Err(ConfigError::InvertedBounds {
                field: field.id.clone(),
                detail: format!("min {min} > max {max}"),
            });
        }
    }
    if let Some(name) = &constraints.custom {
        if !registry.contains(name) {
            return Err(ConfigError::UnknownValidator {
                field: field.id.clone(),
                name: name.clone(),
            });
        }
    }
    constraints
        .pattern
        .as_deref()
        .map(|pattern| {
            Regex::new(&format!("^(?:{pattern})$")).map_err(|err| ConfigError::InvalidPattern {
                field: field.id.clone(),
                reason: err.to_string(),
            })
        })
        .transpose()
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Reject dependency cycles among field conditions (A depends on B depends on A)
fn detect_cycles(
    fields: &[FieldDefinition],
    index: &HashMap<FieldId, usize>,
) -> Result<(), ConfigError> {
    fn visit(
        i: usize,
        fields: &[FieldDefinition],
        index: &HashMap<FieldId, usize>,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Result<(), ConfigError> {
        match marks[i] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                let start = path.iter().position(|&p| p == i).unwrap_or(0);
                let mut cycle: Vec<FieldId> =
                    path[start..].iter().map(|&p| fields[p].id.clone()).collect();
                cycle.push(fields[i].id.clone());
                return Err(ConfigError::ConditionCycle(cycle));
            }
            Mark::Unvisited => {}
        }
        marks[i] = Mark::InProgress;
        path.push(i);
        for dep in fields[i].dependencies() {
            if let Some(&j) = index.get(dep) {
                visit(j, fields, index, marks, path)?;
            }
        }
        path.pop();
        marks[i] = Mark::Done;
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; fields.len()];
    let mut path = Vec::new();
    for i in 0..fields.len() {
        visit(i, fields, index, &mut marks, &mut path)?;
    }
    Ok(())
}
