//! Hooks that log every callback and keep what was persisted

use super::FormHooks;
use crate::forms::FormValues;
use crate::session::Draft;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Recorded {
    drafts: Vec<Draft>,
    submitted: Option<FormValues>,
}

/// Logs callbacks through `tracing` and records drafts and the submission
#[derive(Debug, Default)]
pub struct TracingHooks {
    recorded: Mutex<Recorded>,
}

impl TracingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn drafts(&self) -> Vec<Draft> {
        self.recorded().drafts.clone()
    }

    pub fn latest_draft(&self) -> Option<Draft> {
        self.recorded().drafts.last().cloned()
    }

    pub fn submitted(&self) -> Option<FormValues> {
        self.recorded().submitted.clone()
    }
}

#[async_trait]
impl FormHooks for TracingHooks {
    async fn save_draft(&self, draft: Draft) -> Result<()> {
        tracing::info!(form = %draft.form_id, fields = draft.values.len(), "draft saved");
        self.recorded().drafts.push(draft);
        Ok(())
    }

    async fn submit(&self, payload: FormValues) -> Result<()> {
        tracing::info!(fields = payload.len(), "form submitted");
        self.recorded().submitted = Some(payload);
        Ok(())
    }

    async fn step_change(&self, from: usize, to: usize, _values: FormValues) -> Result<bool> {
        tracing::info!(from, to, "step change");
        Ok(true)
    }

    fn field_changed(&self, field: &str, value: &Value, _values: &FormValues) {
        tracing::debug!(field, %value, "field changed");
    }
}
