//! Debounced draft saving
//!
//! Every change schedules a save `interval` after it; a newer schedule
//! supersedes older ones, so a burst of edits produces one save carrying the
//! latest values. At most one save runs at a time, and none runs once the
//! session deadline has passed.

use super::Draft;
use crate::error::CallbackError;
use crate::hooks::FormHooks;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Outcome of the saves performed so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutosaveStatus {
    pub saves: u64,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_error: Option<CallbackError>,
}

pub(crate) struct Autosaver {
    interval: Duration,
    hooks: Arc<dyn FormHooks>,
    generation: Arc<AtomicU64>,
    deadline: Arc<Mutex<Option<Instant>>>,
    in_flight: Arc<tokio::sync::Mutex<()>>,
    status: Arc<Mutex<AutosaveStatus>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Autosaver {
    pub fn new(interval: Duration, hooks: Arc<dyn FormHooks>) -> Self {
        Self {
            interval,
            hooks,
            generation: Arc::new(AtomicU64::new(0)),
            deadline: Arc::new(Mutex::new(None)),
            in_flight: Arc::new(tokio::sync::Mutex::new(())),
            status: Arc::new(Mutex::new(AutosaveStatus::default())),
            tasks: Vec::new(),
        }
    }

    /// Pending saves that wake at or after `deadline` are dropped
    pub fn expire_at(&self, deadline: Option<Instant>) {
        *lock(&self.deadline) = deadline;
    }

    /// Schedule a save of `draft`, superseding any pending one
    pub fn schedule(&mut self, draft: Draft) {
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("no async runtime, autosave skipped");
            return;
        };
        self.tasks.retain(|task| !task.is_finished());

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let latest = Arc::clone(&self.generation);
        let deadline = Arc::clone(&self.deadline);
        let in_flight = Arc::clone(&self.in_flight);
        let status = Arc::clone(&self.status);
        let hooks = Arc::clone(&self.hooks);
        let interval = self.interval;

        let task = runtime.spawn(async move {
            tokio::time::sleep(interval).await;
            if latest.load(Ordering::SeqCst) != generation {
                return;
            }
            let _guard = in_flight.lock().await;
            if latest.load(Ordering::SeqCst) != generation {
                tracing::debug!(generation, "autosave superseded while waiting");
                return;
            }
            if expired(&deadline) {
                tracing::debug!(generation, "session expired, autosave dropped");
                return;
            }
            let result = hooks.save_draft(draft).await;
            record(&status, result.map_err(|err| CallbackError::SaveDraft(err.to_string())));
        });
        self.tasks.push(task);
        tracing::debug!(generation, delay = ?interval, "autosave scheduled");
    }

    /// Save immediately, dropping any pending schedule
    pub async fn save_now(&mut self, draft: Draft) -> Result<(), CallbackError> {
        self.cancel_pending();
        let _guard = self.in_flight.lock().await;
        let result = self
            .hooks
            .save_draft(draft)
            .await
            .map_err(|err| CallbackError::SaveDraft(err.to_string()));
        record(&self.status, result.clone());
        result
    }

    /// Drop pending schedules and abort their tasks
    pub fn cancel(&mut self) {
        self.cancel_pending();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    fn cancel_pending(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_finished())
    }

    pub fn status(&self) -> AutosaveStatus {
        lock(&self.status).clone()
    }
}

impl Drop for Autosaver {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn expired(deadline: &Mutex<Option<Instant>>) -> bool {
    lock(deadline).is_some_and(|at| Instant::now() >= at)
}

fn record(status: &Mutex<AutosaveStatus>, result: Result<(), CallbackError>) {
    let mut status = lock(status);
    match result {
        Ok(()) => {
            status.saves += 1;
            status.last_saved_at = Some(Utc::now());
            status.last_error = None;
            tracing::info!(saves = status.saves, "draft saved");
        }
        Err(err) => {
            tracing::warn!(error = %err, "draft save failed");
            status.last_error = Some(err);
        }
    }
}
