//! Step navigation state machine
//!
//! The navigator is pure: it plans transitions from a step index and a
//! snapshot of values, and the session applies them.

use super::field::{FieldId, FormValues};
use super::schema::FormSchema;
use super::validation::{failed_fields, is_required_on_step, ValidationReport};
use crate::error::TransitionError;
use serde::Serialize;
use std::collections::BTreeSet;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum NavState {
    Step(usize),
    Submitted,
    Cancelled,
}

impl NavState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, NavState::Step(_))
    }
}

/// Plans moves between the steps of a schema
#[derive(Debug, Clone, Copy)]
pub struct Navigator<'a> {
    schema: &'a FormSchema,
}

impl<'a> Navigator<'a> {
    pub fn new(schema: &'a FormSchema) -> Self {
        Self { schema }
    }

    pub fn step_count(&self) -> usize {
        self.schema.step_count()
    }

    pub fn is_skipped(&self, index: usize, values: &FormValues) -> bool {
        self.schema
            .steps()
            .get(index)
            .is_some_and(|step| step.is_skipped(values))
    }

    /// First step that is not skipped, or 0 when every step is
    pub fn initial_step(&self, values: &FormValues) -> usize {
        (0..self.step_count())
            .find(|&i| !self.is_skipped(i, values))
            .unwrap_or(0)
    }

    /// Last step that is not skipped, or 0 when every step is
    pub fn last_active_step(&self, values: &FormValues) -> usize {
        (0..self.step_count())
            .rev()
            .find(|&i| !self.is_skipped(i, values))
            .unwrap_or(0)
    }

    /// Step indices that are currently not skipped
    pub fn active_steps(&self, values: &FormValues) -> Vec<usize> {
        (0..self.step_count())
            .filter(|&i| !self.is_skipped(i, values))
            .collect()
    }

    /// Target of `go_next`, given the validation report of the current step
    pub fn plan_next(
        &self,
        current: usize,
        report: &ValidationReport,
        values: &FormValues,
    ) -> Result<usize, TransitionError> {
        let failed = failed_fields(report);
        if !failed.is_empty() {
            let required = self.required_failures(current, &failed, values);
            let tolerated = required.is_empty() && self.schema.settings().allow_skip_optional_steps;
            if !tolerated {
                let fields = if required.is_empty() { failed } else { required };
                return Err(TransitionError::StepInvalid { fields });
            }
        }

        // Searching at most `step_count` indices bounds chains of skipped steps.
        let count = self.step_count();
        (current + 1..count)
            .take(count)
            .find(|&i| !self.is_skipped(i, values))
            .ok_or(TransitionError::AtLastStep)
    }

    /// Target of `go_back`: the nearest earlier step that is not skipped
    pub fn plan_back(&self, current: usize, values: &FormValues) -> Result<usize, TransitionError> {
        if !self.schema.settings().allow_back_navigation {
            return Err(TransitionError::BackNavigationDisabled);
        }
        (0..current)
            .rev()
            .find(|&i| !self.is_skipped(i, values))
            .ok_or(TransitionError::NoPreviousStep)
    }

    /// Jumps only go to visited steps that are not skipped
    pub fn plan_jump(
        &self,
        current: usize,
        target: usize,
        visited: &BTreeSet<usize>,
        values: &FormValues,
    ) -> Result<usize, TransitionError> {
        if target >= self.step_count() {
            return Err(TransitionError::OutOfRange(target));
        }
        if target != current && !visited.contains(&target) {
            return Err(TransitionError::NotVisited(target));
        }
        if target != current && self.is_skipped(target, values) {
            return Err(TransitionError::StepSkipped(target));
        }
        Ok(target)
    }

    /// Full-form gate for submit, given the report of `validate_form`.
    ///
    /// Only failures on required fields block submission.
    pub fn plan_submit(
        &self,
        current: usize,
        report: &ValidationReport,
        values: &FormValues,
    ) -> Result<(), TransitionError> {
        // The current step may itself be skipped after a value change;
        // submit is allowed once no active step follows it.
        if current < self.last_active_step(values) {
            return Err(TransitionError::NotOnLastStep);
        }
        let blocking: Vec<FieldId> = failed_fields(report)
            .into_iter()
            .filter(|id| self.is_required_anywhere(id, values))
            .collect();
        if blocking.is_empty() {
            Ok(())
        } else {
            Err(TransitionError::FormInvalid { fields: blocking })
        }
    }

    /// Fraction of active steps reached, in `0.0..=1.0`
    pub fn progress(&self, current: usize, values: &FormValues) -> f32 {
        let active = self.active_steps(values);
        if active.is_empty() {
            return 0.0;
        }
        let reached = active.iter().filter(|&&i| i <= current).count();
        reached as f32 / active.len() as f32
    }

    fn required_failures(&self, index: usize, failed: &[FieldId], values: &FormValues) -> Vec<FieldId> {
        let Some(step) = self.schema.steps().get(index) else {
            return Vec::new();
        };
        failed
            .iter()
            .filter(|id| {
                self.schema
                    .field(id)
                    .is_some_and(|field| is_required_on_step(self.schema, step, field, values))
            })
            .cloned()
            .collect()
    }

    fn is_required_anywhere(&self, id: &str, values: &FormValues) -> bool {
        let Some(field) = self.schema.field(id) else {
            return false;
        };
        self.schema
            .steps()
            .iter()
            .filter(|step| !step.is_skipped(values) && step.field_ids.iter().any(|f| f == id))
            .any(|step| is_required_on_step(self.schema, step, field, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::condition::Condition;
    use crate::forms::field::{Constraints, FieldDefinition, FieldKind};
    use crate::forms::registry::ValidatorRegistry;
    use crate::forms::schema::{FormConfig, Layout, Step};
    use crate::forms::validation::{validate_form, validate_step};
    use serde_json::{json, Value};

    fn values(pairs: &[(&str, Value)]) -> FormValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn coupon_wizard() -> FormSchema {
        let fields = vec![
            FieldDefinition::boolean("hasCoupon", "Has coupon"),
            FieldDefinition::text("coupon", "Coupon").required(),
            FieldDefinition::text("name", "Name").required(),
        ];
        let mut config = FormConfig::new("checkout", "Checkout", Layout::Wizard, fields);
        config.steps = vec![
            Step::new("start", "Start", &["hasCoupon"]),
            Step::new("coupon", "Coupon", &["coupon"])
                .skip_if(vec![Condition::equals("hasCoupon", false)]),
            Step::new("details", "Details", &["name"]),
        ];
        FormSchema::new(config, ValidatorRegistry::new()).unwrap()
    }

    fn next(nav: &Navigator, schema: &FormSchema, current: usize, v: &FormValues) -> Result<usize, TransitionError> {
        let report = validate_step(schema, &schema.steps()[current], v);
        nav.plan_next(current, &report, v)
    }

    mod forward {
        use super::*;

        #[test]
        fn test_skip_if_jumps_over_step() {
            let schema = coupon_wizard();
            let nav = Navigator::new(&schema);
            let v = values(&[("hasCoupon", json!(false))]);
            assert_eq!(next(&nav, &schema, 0, &v), Ok(2));

            let v = values(&[("hasCoupon", json!(true))]);
            assert_eq!(next(&nav, &schema, 0, &v), Ok(1));
        }

        #[test]
        fn test_required_failure_blocks() {
            let schema = coupon_wizard();
            let nav = Navigator::new(&schema);
            let v = values(&[("hasCoupon", json!(true))]);
            assert_eq!(
                next(&nav, &schema, 1, &v),
                Err(TransitionError::StepInvalid {
                    fields: vec!["coupon".into()]
                })
            );
        }

        #[test]
        fn test_last_step_has_no_next() {
            let schema = coupon_wizard();
            let nav = Navigator::new(&schema);
            let v = values(&[("name", json!("Ada"))]);
            assert_eq!(next(&nav, &schema, 2, &v), Err(TransitionError::AtLastStep));
        }

        #[test]
        fn test_skip_chain_terminates() {
            let fields = (0..6)
                .map(|i| FieldDefinition::text(&format!("f{i}"), "F"))
                .chain(std::iter::once(FieldDefinition::boolean("skip", "Skip")))
                .collect();
            let mut config = FormConfig::new("chain", "Chain", Layout::Steps, fields);
            config.steps = (0..6)
                .map(|i| {
                    let step = Step::new(&format!("s{i}"), "S", &[]);
                    if i == 0 {
                        step
                    } else {
                        step.skip_if(vec![Condition::equals("skip", true)])
                    }
                })
                .collect();
            let schema = FormSchema::new(config, ValidatorRegistry::new()).unwrap();
            let nav = Navigator::new(&schema);
            let v = values(&[("skip", json!(true))]);
            assert_eq!(next(&nav, &schema, 0, &v), Err(TransitionError::AtLastStep));
            assert_eq!(nav.last_active_step(&v), 0);
        }

        #[test]
        fn test_optional_failures_with_allow_skip() {
            let fields = vec![
                FieldDefinition::new("site", FieldKind::Url, "Website"),
                FieldDefinition::text("done", "Done"),
            ];
            let mut config = FormConfig::new("f", "F", Layout::Steps, fields);
            config.steps = vec![Step::new("a", "A", &["site"]), Step::new("b", "B", &["done"])];

            let strict = FormSchema::new(config.clone(), ValidatorRegistry::new()).unwrap();
            let v = values(&[("site", json!("not a url"))]);
            let nav = Navigator::new(&strict);
            assert_eq!(
                next(&nav, &strict, 0, &v),
                Err(TransitionError::StepInvalid {
                    fields: vec!["site".into()]
                })
            );

            config.settings.allow_skip_optional_steps = true;
            let lenient = FormSchema::new(config, ValidatorRegistry::new()).unwrap();
            let nav = Navigator::new(&lenient);
            assert_eq!(next(&nav, &lenient, 0, &v), Ok(1));
        }
    }

    mod backward {
        use super::*;

        #[test]
        fn test_back_skips_skipped_steps() {
            let schema = coupon_wizard();
            let nav = Navigator::new(&schema);
            let v = values(&[("hasCoupon", json!(false))]);
            assert_eq!(nav.plan_back(2, &v), Ok(0));
            assert_eq!(nav.plan_back(0, &v), Err(TransitionError::NoPreviousStep));
        }

        #[test]
        fn test_back_then_next_returns() {
            let schema = coupon_wizard();
            let nav = Navigator::new(&schema);
            for v in [
                values(&[("hasCoupon", json!(false))]),
                values(&[("hasCoupon", json!(true)), ("coupon", json!("SAVE10"))]),
            ] {
                let back = nav.plan_back(2, &v).unwrap();
                assert_eq!(next(&nav, &schema, back, &v), Ok(2));
            }
        }

        #[test]
        fn test_back_disabled() {
            let mut config = coupon_wizard().config().clone();
            config.settings.allow_back_navigation = false;
            let schema = FormSchema::new(config, ValidatorRegistry::new()).unwrap();
            let nav = Navigator::new(&schema);
            assert_eq!(
                nav.plan_back(2, &FormValues::new()),
                Err(TransitionError::BackNavigationDisabled)
            );
        }
    }

    mod jumps_and_submit {
        use super::*;

        #[test]
        fn test_jump_only_to_visited() {
            let schema = coupon_wizard();
            let nav = Navigator::new(&schema);
            let visited: BTreeSet<usize> = [0, 1].into();
            let v = values(&[("hasCoupon", json!(true))]);
            assert_eq!(nav.plan_jump(1, 0, &visited, &v), Ok(0));
            assert_eq!(nav.plan_jump(1, 2, &visited, &v), Err(TransitionError::NotVisited(2)));
            assert_eq!(nav.plan_jump(1, 9, &visited, &v), Err(TransitionError::OutOfRange(9)));
        }

        #[test]
        fn test_jump_refuses_skipped_step() {
            let schema = coupon_wizard();
            let nav = Navigator::new(&schema);
            let visited: BTreeSet<usize> = [0, 1, 2].into();
            let v = values(&[("hasCoupon", json!(false))]);
            assert_eq!(nav.plan_jump(0, 1, &visited, &v), Err(TransitionError::StepSkipped(1)));
            assert_eq!(nav.plan_jump(0, 2, &visited, &v), Ok(2));
        }

        #[test]
        fn test_submit_from_skipped_step_with_no_active_successor() {
            let fields = vec![
                FieldDefinition::boolean("express", "Express"),
                FieldDefinition::text("notes", "Notes").required(),
            ];
            let mut config = FormConfig::new("order", "Order", Layout::Steps, fields);
            config.steps = vec![
                Step::new("start", "Start", &["express"]),
                Step::new("notes", "Notes", &["notes"])
                    .skip_if(vec![Condition::equals("express", true)]),
            ];
            let schema = FormSchema::new(config, ValidatorRegistry::new()).unwrap();
            let nav = Navigator::new(&schema);

            let v = values(&[("express", json!(true))]);
            let report = validate_form(&schema, &v);
            assert_eq!(nav.last_active_step(&v), 0);
            assert_eq!(nav.plan_submit(1, &report, &v), Ok(()));
        }

        #[test]
        fn test_submit_only_from_last_active_step() {
            let schema = coupon_wizard();
            let nav = Navigator::new(&schema);
            let v = values(&[("hasCoupon", json!(false)), ("name", json!("Ada"))]);
            let report = validate_form(&schema, &v);
            assert_eq!(nav.plan_submit(0, &report, &v), Err(TransitionError::NotOnLastStep));
            assert_eq!(nav.plan_submit(2, &report, &v), Ok(()));
        }

        #[test]
        fn test_submit_revalidates_whole_form() {
            let schema = coupon_wizard();
            let nav = Navigator::new(&schema);
            let v = values(&[("hasCoupon", json!(true)), ("name", json!("Ada"))]);
            assert_eq!(
                nav.plan_submit(2, &validate_form(&schema, &v), &v),
                Err(TransitionError::FormInvalid {
                    fields: vec!["coupon".into()]
                })
            );
        }

        #[test]
        fn test_submit_ignores_optional_failures() {
            let fields = vec![
                FieldDefinition::text("name", "Name").required(),
                FieldDefinition::number("age", "Age").with_constraints(Constraints {
                    min: Some(18.0),
                    ..Constraints::default()
                }),
            ];
            let schema = FormSchema::new(
                FormConfig::new("f", "F", Layout::Single, fields),
                ValidatorRegistry::new(),
            )
            .unwrap();
            let nav = Navigator::new(&schema);
            let v = values(&[("name", json!("Ada")), ("age", json!(12))]);
            let report = validate_form(&schema, &v);
            assert!(!report["age"].is_valid());
            assert_eq!(nav.plan_submit(0, &report, &v), Ok(()));
        }

        #[test]
        fn test_progress() {
            let schema = coupon_wizard();
            let nav = Navigator::new(&schema);
            let v = values(&[("hasCoupon", json!(false))]);
            assert_eq!(nav.progress(0, &v), 0.5);
            assert_eq!(nav.progress(2, &v), 1.0);
        }
    }

    #[test]
    fn test_initial_step_skips() {
        let mut config = coupon_wizard().config().clone();
        config.steps[0].skip_if = vec![Condition::is_empty("name")];
        let schema = FormSchema::new(config, ValidatorRegistry::new()).unwrap();
        let nav = Navigator::new(&schema);
        assert_eq!(nav.initial_step(&FormValues::new()), 1);
    }

    #[test]
    fn test_nav_state_terminal() {
        assert!(!NavState::Step(0).is_terminal());
        assert!(NavState::Submitted.is_terminal());
        assert!(NavState::Cancelled.is_terminal());
    }
}
