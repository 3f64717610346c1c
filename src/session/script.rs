//! Scripted session events, used by the `replay` command

use super::handle::SharedSession;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// One user interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptEvent {
    Set { field: String, value: Value },
    Blur { field: String },
    Next,
    Back,
    Jump { step: usize },
    Submit,
    Cancel,
    SaveDraft,
    /// Let time pass, e.g. for autosave to fire
    Wait { seconds: u64 },
}

/// What happened to one event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOutcome {
    pub event: ScriptEvent,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EventOutcome {
    fn from_result<T, E: ToString>(event: ScriptEvent, result: Result<T, E>) -> Self {
        let error = result.err().map(|err| err.to_string());
        Self {
            event,
            ok: error.is_none(),
            error,
        }
    }
}

/// Parse a JSON array of events
pub fn parse_script(json: &str) -> serde_json::Result<Vec<ScriptEvent>> {
    serde_json::from_str(json)
}

/// Apply events in order; a rejected event is recorded and the replay goes on
pub async fn replay(session: &SharedSession, events: Vec<ScriptEvent>) -> Vec<EventOutcome> {
    let mut outcomes = Vec::with_capacity(events.len());
    for event in events {
        let outcome = match &event {
            ScriptEvent::Set { field, value } => {
                let result = session.set_value(field, value.clone()).await;
                EventOutcome::from_result(event, result)
            }
            ScriptEvent::Blur { field } => {
                let result = session.blur(field).await;
                EventOutcome::from_result(event, result)
            }
            ScriptEvent::Next => {
                let result = session.go_next().await;
                EventOutcome::from_result(event, result)
            }
            ScriptEvent::Back => {
                let result = session.go_back().await;
                EventOutcome::from_result(event, result)
            }
            ScriptEvent::Jump { step } => {
                let result = session.jump_to(*step).await;
                EventOutcome::from_result(event, result)
            }
            ScriptEvent::Submit => {
                let result = session.submit().await;
                EventOutcome::from_result(event, result)
            }
            ScriptEvent::Cancel => {
                session.cancel().await;
                EventOutcome::from_result(event, Ok::<(), String>(()))
            }
            ScriptEvent::SaveDraft => {
                let result = session.save_draft().await;
                EventOutcome::from_result(event, result)
            }
            ScriptEvent::Wait { seconds } => {
                tokio::time::sleep(Duration::from_secs(*seconds)).await;
                session.with(|s| s.check_timeout()).await;
                EventOutcome::from_result(event, Ok::<(), String>(()))
            }
        };
        if let Some(error) = &outcome.error {
            tracing::debug!(event = ?outcome.event, error = %error, "event rejected");
        }
        outcomes.push(outcome);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::{FormConfig, ValidatorRegistry};
    use crate::hooks::TracingHooks;
    use crate::session::{FormSession, SessionStatus};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    const CHECKOUT: &str = r#"{
        "id": "checkout",
        "title": "Checkout",
        "layout": "wizard",
        "fields": [
            { "id": "hasCoupon", "type": "boolean", "label": "Has coupon" },
            { "id": "coupon", "type": "text", "label": "Coupon", "required": true },
            { "id": "name", "type": "text", "label": "Name", "required": true }
        ],
        "steps": [
            { "id": "start", "title": "Start", "fieldIds": ["hasCoupon"] },
            { "id": "coupon", "title": "Coupon", "fieldIds": ["coupon"],
              "skipIf": [{ "field": "hasCoupon", "operator": "equals", "value": false }] },
            { "id": "details", "title": "Details", "fieldIds": ["name"] }
        ]
    }"#;

    #[test]
    fn test_parse_script() {
        let events = parse_script(
            r#"[{"set": {"field": "name", "value": "Ada"}}, "next", {"jump": {"step": 0}}, {"wait": {"seconds": 5}}]"#,
        )
        .unwrap();
        assert_eq!(
            events,
            vec![
                ScriptEvent::Set {
                    field: "name".into(),
                    value: json!("Ada")
                },
                ScriptEvent::Next,
                ScriptEvent::Jump { step: 0 },
                ScriptEvent::Wait { seconds: 5 },
            ]
        );
    }

    #[tokio::test]
    async fn test_replay_records_rejections_and_continues() {
        let config = FormConfig::from_json(CHECKOUT).unwrap();
        let hooks = Arc::new(TracingHooks::new());
        let session = SharedSession::new(
            FormSession::start(config, ValidatorRegistry::new(), hooks.clone()).unwrap(),
        );
        let events = vec![
            ScriptEvent::Set {
                field: "hasCoupon".into(),
                value: json!(false),
            },
            ScriptEvent::Submit,
            ScriptEvent::Next,
            ScriptEvent::Set {
                field: "name".into(),
                value: json!("Ada"),
            },
            ScriptEvent::Next,
            ScriptEvent::Submit,
        ];

        let outcomes = replay(&session, events).await;
        let oks: Vec<bool> = outcomes.iter().map(|o| o.ok).collect();
        assert_eq!(oks, vec![true, false, true, true, false, true]);
        assert_eq!(
            outcomes[1].error.as_deref(),
            Some("Submit is only allowed from the last active step")
        );
        assert_eq!(outcomes[4].error.as_deref(), Some("Already on the last active step"));

        assert_eq!(session.snapshot().await.status, SessionStatus::Submitted);
        let payload = hooks.submitted().unwrap();
        assert_eq!(payload["name"], json!("Ada"));
        assert!(!payload.contains_key("coupon"));
    }
}
