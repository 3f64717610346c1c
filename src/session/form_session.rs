//! A live form-filling session
//!
//! The session owns the values, errors and navigation state of one user
//! filling one form. Every operation is applied atomically: when it is
//! rejected the session is left exactly as it was.

use super::autosave::{AutosaveStatus, Autosaver};
use super::Draft;
use crate::error::{CallbackError, ConfigError, SessionError, SubmitError, TransitionError};
use crate::forms::{
    validate_field, validate_field_on_step, validate_form, validate_step, FieldDefinition, FieldId,
    FormConfig, FormSchema, FormValues, NavState, Navigator, ValidationReport, ValidationResult,
    ValidatorRegistry, CURRENT_SCHEMA_VERSION,
};
use crate::hooks::FormHooks;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    User,
    TimedOut,
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Submitted,
    Cancelled(CancelReason),
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub form_id: String,
    pub status: SessionStatus,
    pub current_step: usize,
    pub step_id: String,
    pub visited_steps: Vec<usize>,
    pub progress: f32,
    pub values: BTreeMap<FieldId, Value>,
    pub errors: BTreeMap<FieldId, String>,
    pub dirty: Vec<FieldId>,
    pub visible_fields: Vec<FieldId>,
    pub step_fields: Vec<FieldId>,
    pub last_rejection: Option<String>,
    pub last_callback_error: Option<String>,
    pub last_auto_save_at: Option<DateTime<Utc>>,
}

pub struct FormSession {
    id: Uuid,
    schema: Arc<FormSchema>,
    hooks: Arc<dyn FormHooks>,
    values: FormValues,
    status: SessionStatus,
    current_step: usize,
    visited: BTreeSet<usize>,
    errors: BTreeMap<FieldId, String>,
    dirty: BTreeSet<FieldId>,
    touched: BTreeSet<FieldId>,
    collapsed: BTreeSet<String>,
    autosaver: Autosaver,
    last_rejection: Option<TransitionError>,
    last_callback_error: Option<CallbackError>,
    last_activity: Instant,
}

impl FormSession {
    pub fn new(schema: Arc<FormSchema>, hooks: Arc<dyn FormHooks>) -> Self {
        let values = schema.default_values();
        let current_step = Navigator::new(&schema).initial_step(&values);
        let collapsed = schema
            .sections()
            .iter()
            .filter(|section| section.collapsible && section.collapsed)
            .map(|section| section.id.clone())
            .collect();
        let interval = Duration::from_secs(schema.settings().auto_save_interval);
        let id = Uuid::new_v4();
        tracing::info!(session = %id, form = schema.id(), step = current_step, "session started");
        let last_activity = Instant::now();
        let autosaver = Autosaver::new(interval, Arc::clone(&hooks));
        autosaver.expire_at(deadline(&schema, last_activity));

        Self {
            id,
            autosaver,
            schema,
            hooks,
            values,
            status: SessionStatus::Active,
            current_step,
            visited: BTreeSet::from([current_step]),
            errors: BTreeMap::new(),
            dirty: BTreeSet::new(),
            touched: BTreeSet::new(),
            collapsed,
            last_rejection: None,
            last_callback_error: None,
            last_activity,
        }
    }

    /// Compile `config` and open a session on it
    pub fn start(
        config: FormConfig,
        registry: ValidatorRegistry,
        hooks: Arc<dyn FormHooks>,
    ) -> Result<Self, ConfigError> {
        let schema = FormSchema::new(config, registry)?;
        Ok(Self::new(Arc::new(schema), hooks))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn value(&self, field_id: &str) -> Option<&Value> {
        self.values.get(field_id)
    }

    pub fn errors(&self) -> &BTreeMap<FieldId, String> {
        &self.errors
    }

    pub fn error(&self, field_id: &str) -> Option<&str> {
        self.errors.get(field_id).map(String::as_str)
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn nav_state(&self) -> NavState {
        match self.status {
            SessionStatus::Active => NavState::Step(self.current_step),
            SessionStatus::Submitted => NavState::Submitted,
            SessionStatus::Cancelled(_) => NavState::Cancelled,
        }
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn visited_steps(&self) -> &BTreeSet<usize> {
        &self.visited
    }

    pub fn dirty_fields(&self) -> &BTreeSet<FieldId> {
        &self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn touched_fields(&self) -> &BTreeSet<FieldId> {
        &self.touched
    }

    pub fn last_rejection(&self) -> Option<&TransitionError> {
        self.last_rejection.as_ref()
    }

    pub fn last_callback_error(&self) -> Option<&CallbackError> {
        self.last_callback_error.as_ref()
    }

    pub fn autosave_status(&self) -> AutosaveStatus {
        self.autosaver.status()
    }

    pub fn last_auto_save_at(&self) -> Option<DateTime<Utc>> {
        self.autosaver.status().last_saved_at
    }

    pub fn progress(&self) -> f32 {
        Navigator::new(&self.schema).progress(self.current_step, &self.values)
    }

    pub fn is_last_step(&self) -> bool {
        self.current_step == Navigator::new(&self.schema).last_active_step(&self.values)
    }

    /// Fields currently visible, in config order
    pub fn visible_fields(&self) -> Vec<&FieldDefinition> {
        self.schema
            .fields()
            .iter()
            .filter(|field| self.schema.is_visible(field, &self.values))
            .collect()
    }

    /// Visible fields of the current step, in step order
    pub fn current_step_fields(&self) -> Vec<&FieldDefinition> {
        let Some(step) = self.schema.steps().get(self.current_step) else {
            return Vec::new();
        };
        step.field_ids
            .iter()
            .filter_map(|id| self.schema.field(id))
            .filter(|field| self.schema.is_visible(field, &self.values))
            .collect()
    }

    pub fn is_section_collapsed(&self, section_id: &str) -> bool {
        self.collapsed.contains(section_id)
    }

    /// Store a value and react to it
    pub fn set_value(&mut self, field_id: &str, value: impl Into<Value>) -> Result<(), SessionError> {
        self.ensure_open()?;
        let schema = Arc::clone(&self.schema);
        let field = schema
            .field(field_id)
            .ok_or_else(|| SessionError::UnknownField(field_id.to_string()))?;
        let value = value.into();

        self.touch();
        self.values.insert(field.id.clone(), value.clone());
        self.dirty.insert(field.id.clone());
        self.drop_inactive_errors();
        self.hooks.field_changed(&field.id, &value, &self.values);

        if schema.settings().validate_on_change {
            self.revalidate(field);
        }
        self.schedule_autosave();
        tracing::debug!(field = field_id, "value set");
        Ok(())
    }

    pub fn blur(&mut self, field_id: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        let schema = Arc::clone(&self.schema);
        let field = schema
            .field(field_id)
            .ok_or_else(|| SessionError::UnknownField(field_id.to_string()))?;

        self.touch();
        self.touched.insert(field.id.clone());
        if schema.settings().validate_on_blur {
            self.revalidate(field);
        }
        Ok(())
    }

    /// Restore a field to its default (or unset) value
    pub fn reset_field(&mut self, field_id: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        let schema = Arc::clone(&self.schema);
        let field = schema
            .field(field_id)
            .ok_or_else(|| SessionError::UnknownField(field_id.to_string()))?;

        self.touch();
        match &field.default_value {
            Some(default) => self.values.insert(field.id.clone(), default.clone()),
            None => self.values.remove(&field.id),
        };
        self.dirty.remove(&field.id);
        self.touched.remove(&field.id);
        self.errors.remove(&field.id);
        self.drop_inactive_errors();
        self.schedule_autosave();
        Ok(())
    }

    /// Collapse or expand a section; returns whether it is now collapsed
    pub fn toggle_section(&mut self, section_id: &str) -> Result<bool, SessionError> {
        let section = self
            .schema
            .section(section_id)
            .ok_or_else(|| SessionError::UnknownSection(section_id.to_string()))?;
        if !section.collapsible {
            return Ok(false);
        }
        if !self.collapsed.remove(section_id) {
            self.collapsed.insert(section_id.to_string());
        }
        Ok(self.collapsed.contains(section_id))
    }

    pub async fn go_next(&mut self) -> Result<usize, TransitionError> {
        self.ensure_active()?;
        let schema = Arc::clone(&self.schema);
        let navigator = Navigator::new(&schema);
        // A step that became skipped while current is left without validation
        let report = if navigator.is_skipped(self.current_step, &self.values) {
            ValidationReport::new()
        } else {
            validate_step(&schema, &schema.steps()[self.current_step], &self.values)
        };
        self.merge_report(&report);

        match navigator.plan_next(self.current_step, &report, &self.values) {
            Ok(target) => self.move_to(target, false).await,
            Err(err) => Err(self.reject(err)),
        }
    }

    pub async fn go_back(&mut self) -> Result<usize, TransitionError> {
        self.ensure_active()?;
        let schema = Arc::clone(&self.schema);
        match Navigator::new(&schema).plan_back(self.current_step, &self.values) {
            Ok(target) => self.move_to(target, true).await,
            Err(err) => Err(self.reject(err)),
        }
    }

    pub async fn jump_to(&mut self, index: usize) -> Result<usize, TransitionError> {
        self.ensure_active()?;
        let schema = Arc::clone(&self.schema);
        let plan = Navigator::new(&schema).plan_jump(
            self.current_step,
            index,
            &self.visited,
            &self.values,
        );
        match plan {
            Ok(target) => self.move_to(target, false).await,
            Err(err) => Err(self.reject(err)),
        }
    }

    /// Validate the whole form and hand the payload to the submit hook
    pub async fn submit(&mut self) -> Result<(), SubmitError> {
        self.ensure_active()?;
        let schema = Arc::clone(&self.schema);
        let report = validate_form(&schema, &self.values);
        self.merge_report(&report);
        if let Err(err) = Navigator::new(&schema).plan_submit(self.current_step, &report, &self.values) {
            return Err(self.reject(err).into());
        }

        self.autosaver.cancel();
        let payload = self.payload();
        let fields = payload.len();
        let outcome = self.hooks.submit(payload).await;
        match outcome {
            Ok(()) => {
                self.status = SessionStatus::Submitted;
                self.last_rejection = None;
                self.last_callback_error = None;
                tracing::info!(session = %self.id, fields, "session submitted");
                Ok(())
            }
            Err(err) => {
                let err = CallbackError::Submit(err.to_string());
                tracing::warn!(session = %self.id, error = %err, "submit rejected by host");
                self.last_callback_error = Some(err.clone());
                self.schedule_autosave();
                Err(err.into())
            }
        }
    }

    /// Values of active fields on steps that are not skipped
    pub fn payload(&self) -> FormValues {
        self.schema
            .fields_on_active_steps(&self.values)
            .filter(|field| self.schema.is_active(field, &self.values))
            .filter_map(|field| {
                self.values
                    .get(&field.id)
                    .map(|value| (field.id.clone(), value.clone()))
            })
            .collect()
    }

    pub fn cancel(&mut self) {
        if self.is_open() {
            self.close(CancelReason::User);
        }
    }

    /// Cancel the session if it has been idle longer than its timeout
    pub fn check_timeout(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        let Some(timeout) = self.schema.settings().session_timeout else {
            return false;
        };
        if self.last_activity.elapsed() < Duration::from_secs(timeout) {
            return false;
        }
        self.close(CancelReason::TimedOut);
        true
    }

    pub fn draft(&self) -> Draft {
        Draft::new(self.schema.id(), self.values.clone())
    }

    /// Save a draft now, outside the autosave schedule
    pub async fn save_draft(&mut self) -> Result<(), CallbackError> {
        let draft = self.draft();
        let result = self.autosaver.save_now(draft).await;
        if let Err(err) = &result {
            self.last_callback_error = Some(err.clone());
        }
        result
    }

    /// Replace the values with those of a saved draft
    pub fn restore_draft(&mut self, draft: &Draft) -> Result<(), SessionError> {
        self.ensure_open()?;
        if draft.form_id != self.schema.id() {
            return Err(SessionError::DraftMismatch {
                expected: self.schema.id().to_string(),
                found: draft.form_id.clone(),
            });
        }
        if draft.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(SessionError::DraftVersion(draft.schema_version));
        }

        let schema = Arc::clone(&self.schema);
        self.values = draft
            .values
            .iter()
            .filter(|(id, _)| schema.field(id).is_some())
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect();
        let ignored = draft.values.len() - self.values.len();
        if ignored > 0 {
            tracing::debug!(ignored, "draft values for unknown fields dropped");
        }

        self.dirty = self.values.keys().cloned().collect();
        self.touched.clear();
        self.errors.clear();
        self.current_step = Navigator::new(&schema).initial_step(&self.values);
        self.visited = BTreeSet::from([self.current_step]);
        self.last_rejection = None;
        self.touch();
        tracing::info!(session = %self.id, saved_at = %draft.saved_at, "draft restored");
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            form_id: self.schema.id().to_string(),
            status: self.status,
            current_step: self.current_step,
            step_id: self
                .schema
                .steps()
                .get(self.current_step)
                .map(|step| step.id.clone())
                .unwrap_or_default(),
            visited_steps: self.visited.iter().copied().collect(),
            progress: self.progress(),
            values: self
                .values
                .iter()
                .map(|(id, value)| (id.clone(), value.clone()))
                .collect(),
            errors: self.errors.clone(),
            dirty: self.dirty.iter().cloned().collect(),
            visible_fields: self.visible_fields().iter().map(|f| f.id.clone()).collect(),
            step_fields: self.current_step_fields().iter().map(|f| f.id.clone()).collect(),
            last_rejection: self.last_rejection.as_ref().map(ToString::to_string),
            last_callback_error: self.last_callback_error.as_ref().map(ToString::to_string),
            last_auto_save_at: self.last_auto_save_at(),
        }
    }

    async fn move_to(&mut self, target: usize, forget_left: bool) -> Result<usize, TransitionError> {
        let from = self.current_step;
        if target == from {
            self.touch();
            return Ok(target);
        }

        let outcome = self.hooks.step_change(from, target, self.values.clone()).await;
        let approved = match outcome {
            Ok(approved) => approved,
            Err(err) => {
                let err = CallbackError::StepChange(err.to_string());
                tracing::warn!(from, to = target, error = %err, "step change hook failed");
                self.last_callback_error = Some(err);
                false
            }
        };
        if !approved {
            return Err(self.reject(TransitionError::Vetoed { from, to: target }));
        }

        if forget_left {
            self.visited.remove(&from);
        }
        self.current_step = target;
        self.visited.insert(target);
        self.last_rejection = None;
        self.touch();
        tracing::info!(session = %self.id, from, to = target, "step changed");
        Ok(target)
    }

    fn reject(&mut self, err: TransitionError) -> TransitionError {
        tracing::debug!(session = %self.id, error = %err, "transition rejected");
        self.last_rejection = Some(err.clone());
        err
    }

    fn revalidate(&mut self, field: &FieldDefinition) {
        let schema = &self.schema;
        if !schema.is_active(field, &self.values) {
            self.errors.remove(&field.id);
            return;
        }
        let on_current_step = schema
            .steps()
            .get(self.current_step)
            .filter(|step| step.field_ids.contains(&field.id));
        let result = match on_current_step {
            Some(step) => validate_field_on_step(schema, step, field, &self.values),
            None => validate_field(schema, field, self.values.get(&field.id), &self.values),
        };
        match result {
            ValidationResult::Valid => self.errors.remove(&field.id),
            ValidationResult::Invalid { message } => self.errors.insert(field.id.clone(), message),
        };
    }

    fn merge_report(&mut self, report: &ValidationReport) {
        for (id, result) in report {
            match result.message() {
                Some(message) => self.errors.insert(id.clone(), message.to_string()),
                None => self.errors.remove(id),
            };
        }
    }

    fn drop_inactive_errors(&mut self) {
        let schema = &self.schema;
        let values = &self.values;
        self.errors
            .retain(|id, _| schema.field(id).is_some_and(|field| schema.is_active(field, values)));
    }

    fn schedule_autosave(&mut self) {
        if self.schema.settings().auto_save {
            let draft = self.draft();
            self.autosaver.schedule(draft);
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
        self.autosaver.expire_at(deadline(&self.schema, self.last_activity));
    }

    fn close(&mut self, reason: CancelReason) {
        self.status = SessionStatus::Cancelled(reason);
        self.autosaver.cancel();
        tracing::info!(session = %self.id, ?reason, "session cancelled");
    }

    fn ensure_open(&mut self) -> Result<(), SessionError> {
        self.check_timeout();
        if self.is_open() {
            Ok(())
        } else {
            Err(SessionError::SessionClosed)
        }
    }

    fn ensure_active(&mut self) -> Result<(), TransitionError> {
        self.check_timeout();
        if self.is_open() {
            Ok(())
        } else {
            Err(self.reject(TransitionError::SessionClosed))
        }
    }
}

impl fmt::Debug for FormSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormSession")
            .field("id", &self.id)
            .field("form", &self.schema.id())
            .field("status", &self.status)
            .field("current_step", &self.current_step)
            .field("values", &self.values)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

fn deadline(schema: &FormSchema, last_activity: Instant) -> Option<Instant> {
    schema
        .settings()
        .session_timeout
        .map(|timeout| last_activity + Duration::from_secs(timeout))
}
