//! Session shared between concurrent event handlers

use super::form_session::{FormSession, SessionSnapshot};
use crate::error::{CallbackError, SessionError, SubmitError, TransitionError};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Cloneable handle that serializes access to one session.
///
/// Each call holds the lock for the whole operation, so events are applied
/// one at a time in lock order.
#[derive(Debug, Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<FormSession>>,
}

impl SharedSession {
    pub fn new(session: FormSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub async fn set_value(&self, field_id: &str, value: Value) -> Result<(), SessionError> {
        self.inner.lock().await.set_value(field_id, value)
    }

    pub async fn blur(&self, field_id: &str) -> Result<(), SessionError> {
        self.inner.lock().await.blur(field_id)
    }

    pub async fn go_next(&self) -> Result<usize, TransitionError> {
        let mut session = self.inner.lock().await;
        session.go_next().await
    }

    pub async fn go_back(&self) -> Result<usize, TransitionError> {
        let mut session = self.inner.lock().await;
        session.go_back().await
    }

    pub async fn jump_to(&self, index: usize) -> Result<usize, TransitionError> {
        let mut session = self.inner.lock().await;
        session.jump_to(index).await
    }

    pub async fn submit(&self) -> Result<(), SubmitError> {
        let mut session = self.inner.lock().await;
        session.submit().await
    }

    pub async fn save_draft(&self) -> Result<(), CallbackError> {
        let mut session = self.inner.lock().await;
        session.save_draft().await
    }

    pub async fn cancel(&self) {
        self.inner.lock().await.cancel();
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().await.snapshot()
    }

    /// Run `f` with exclusive access to the session
    pub async fn with<R>(&self, f: impl FnOnce(&mut FormSession) -> R) -> R {
        let mut session = self.inner.lock().await;
        f(&mut session)
    }
}
