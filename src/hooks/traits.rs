//! Trait abstraction for the host application's callbacks

use crate::forms::FormValues;
use crate::session::Draft;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Callbacks a session invokes on the host, enabling mocking in tests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FormHooks: Send + Sync {
    /// Persist a draft; called by autosave and explicit draft saves
    async fn save_draft(&self, draft: Draft) -> Result<()>;

    /// Receive the final payload of a valid form
    async fn submit(&self, payload: FormValues) -> Result<()>;

    /// Approve a step transition. Returning `false` vetoes it.
    async fn step_change(&self, from: usize, to: usize, values: FormValues) -> Result<bool>;

    /// Notification after a value was stored
    fn field_changed(&self, field: &str, value: &Value, values: &FormValues);
}

/// Hooks that accept everything and persist nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

#[async_trait]
impl FormHooks for NoopHooks {
    async fn save_draft(&self, _draft: Draft) -> Result<()> {
        Ok(())
    }

    async fn submit(&self, _payload: FormValues) -> Result<()> {
        Ok(())
    }

    async fn step_change(&self, _from: usize, _to: usize, _values: FormValues) -> Result<bool> {
        Ok(true)
    }

    fn field_changed(&self, _field: &str, _value: &Value, _values: &FormValues) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_accepts_everything() {
        let hooks = NoopHooks;
        assert!(hooks.save_draft(Draft::new("f", FormValues::new())).await.is_ok());
        assert!(hooks.submit(FormValues::new()).await.is_ok());
        assert!(hooks.step_change(0, 1, FormValues::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_mock_can_veto() {
        let mut hooks = MockFormHooks::new();
        hooks
            .expect_step_change()
            .withf(|from, to, _| *from == 0 && *to == 1)
            .returning(|_, _, _| Ok(false));
        assert!(!hooks.step_change(0, 1, FormValues::new()).await.unwrap());
    }
}
