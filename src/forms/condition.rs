//! Condition evaluation over a snapshot of form values
//!
//! Evaluation is pure and total: type mismatches and missing values degrade
//! to `false` instead of failing.

use super::field::{is_empty_value, values_equal, FieldId, FormValues};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Comparison applied to the referenced field's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    IsEmpty,
    IsNotEmpty,
}

/// Predicate over another field's current value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: FieldId,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(field: &str, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            operator,
            value: value.into(),
        }
    }

    pub fn equals(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Equals, value)
    }

    pub fn is_empty(field: &str) -> Self {
        Self::new(field, Operator::IsEmpty, Value::Null)
    }

    pub fn is_not_empty(field: &str) -> Self {
        Self::new(field, Operator::IsNotEmpty, Value::Null)
    }

    /// Whether this condition holds for the given values
    pub fn holds(&self, values: &FormValues) -> bool {
        let actual = values.get(&self.field);
        match self.operator {
            Operator::IsEmpty => is_empty_value(actual),
            Operator::IsNotEmpty => !is_empty_value(actual),
            Operator::Equals => actual.is_some_and(|a| values_equal(a, &self.value)),
            Operator::NotEquals => actual.is_some_and(|a| !values_equal(a, &self.value)),
            Operator::Contains => {
                actual.is_some_and(|a| stringify(a).contains(&stringify(&self.value)))
            }
            Operator::GreaterThan => actual.is_some_and(|a| compare(a, &self.value, |x, y| x > y)),
            Operator::LessThan => actual.is_some_and(|a| compare(a, &self.value, |x, y| x < y)),
        }
    }
}

/// All conditions must hold; an empty list always holds
pub fn evaluate(conditions: &[Condition], values: &FormValues) -> bool {
    conditions.iter().all(|condition| condition.holds(values))
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .unwrap_or(f64::NAN),
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => f64::NAN,
    }
}

// NaN on either side makes both orderings false.
fn compare(actual: &Value, expected: &Value, cmp: fn(f64, f64) -> bool) -> bool {
    cmp(to_number(actual), to_number(expected))
}

/// Visibility and enablement rules for one field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionSet {
    #[serde(default, deserialize_with = "deserialize_slot", skip_serializing_if = "Vec::is_empty")]
    pub show: Vec<Condition>,
    #[serde(default, deserialize_with = "deserialize_slot", skip_serializing_if = "Vec::is_empty")]
    pub hide: Vec<Condition>,
    #[serde(default, deserialize_with = "deserialize_slot", skip_serializing_if = "Vec::is_empty")]
    pub enable: Vec<Condition>,
    #[serde(default, deserialize_with = "deserialize_slot", skip_serializing_if = "Vec::is_empty")]
    pub disable: Vec<Condition>,
}

impl ConditionSet {
    pub fn show_when(conditions: Vec<Condition>) -> Self {
        Self {
            show: conditions,
            ..Self::default()
        }
    }

    pub fn hide_when(conditions: Vec<Condition>) -> Self {
        Self {
            hide: conditions,
            ..Self::default()
        }
    }

    pub fn disable_when(conditions: Vec<Condition>) -> Self {
        Self {
            disable: conditions,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.show.is_empty() && self.hide.is_empty() && self.enable.is_empty() && self.disable.is_empty()
    }

    /// `hide` wins over `show` when both are active
    pub fn is_visible(&self, values: &FormValues) -> bool {
        let shown = self.show.is_empty() || evaluate(&self.show, values);
        shown && !slot_active(&self.hide, values)
    }

    /// `disable` wins over `enable` when both are active
    pub fn is_enabled(&self, values: &FormValues) -> bool {
        let enabled = self.enable.is_empty() || evaluate(&self.enable, values);
        enabled && !slot_active(&self.disable, values)
    }

    /// Every field id referenced by any slot
    pub fn referenced_fields(&self) -> impl Iterator<Item = &FieldId> {
        self.show
            .iter()
            .chain(&self.hide)
            .chain(&self.enable)
            .chain(&self.disable)
            .map(|c| &c.field)
    }
}

fn slot_active(slot: &[Condition], values: &FormValues) -> bool {
    !slot.is_empty() && evaluate(slot, values)
}

#[derive(Deserialize)]
struct Clause {
    operator: Operator,
    #[serde(default)]
    value: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SlotRepr {
    List(Vec<Condition>),
    ByField(BTreeMap<FieldId, Vec<Clause>>),
}

/// A slot is either a list of conditions or a map of field id to clauses
fn deserialize_slot<'de, D>(deserializer: D) -> Result<Vec<Condition>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match SlotRepr::deserialize(deserializer)? {
        SlotRepr::List(conditions) => conditions,
        SlotRepr::ByField(by_field) => by_field
            .into_iter()
            .flat_map(|(field, clauses)| {
                clauses.into_iter().map(move |clause| Condition {
                    field: field.clone(),
                    operator: clause.operator,
                    value: clause.value,
                })
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(pairs: &[(&str, Value)]) -> FormValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    mod evaluate_fn {
        use super::*;

        #[test]
        fn test_empty_list_is_true() {
            assert!(evaluate(&[], &FormValues::new()));
            assert!(evaluate(&[], &values(&[("a", json!(1))])));
        }

        #[test]
        fn test_all_conditions_must_hold() {
            let v = values(&[("a", json!(1)), ("b", json!("x"))]);
            let both = [Condition::equals("a", 1), Condition::equals("b", "x")];
            let one_fails = [Condition::equals("a", 1), Condition::equals("b", "y")];
            assert!(evaluate(&both, &v));
            assert!(!evaluate(&one_fails, &v));
        }
    }

    mod operators {
        use super::*;

        #[test]
        fn test_missing_value_fails_closed() {
            let empty = FormValues::new();
            for op in [
                Operator::Equals,
                Operator::NotEquals,
                Operator::Contains,
                Operator::GreaterThan,
                Operator::LessThan,
            ] {
                assert!(!Condition::new("a", op, json!(1)).holds(&empty), "{op:?}");
            }
            assert!(Condition::is_empty("a").holds(&empty));
            assert!(!Condition::is_not_empty("a").holds(&empty));
        }

        #[test]
        fn test_equals_numbers_by_value() {
            let v = values(&[("age", json!(18.0))]);
            assert!(Condition::equals("age", 18).holds(&v));
            assert!(!Condition::new("age", Operator::NotEquals, json!(18)).holds(&v));
        }

        #[test]
        fn test_equals_false() {
            let v = values(&[("notify", json!(false))]);
            assert!(Condition::equals("notify", false).holds(&v));
            assert!(!Condition::equals("notify", true).holds(&v));
        }

        #[test]
        fn test_non_finite_strings_do_not_compare() {
            for text in ["inf", "-infinity", "NaN", "1e400"] {
                let v = values(&[("n", json!(text))]);
                assert!(!Condition::new("n", Operator::GreaterThan, json!(5)).holds(&v), "{text}");
                assert!(!Condition::new("n", Operator::LessThan, json!(5)).holds(&v), "{text}");
            }
            let v = values(&[("n", json!(" 7.5 "))]);
            assert!(Condition::new("n", Operator::GreaterThan, json!(5)).holds(&v));
        }

        #[test]
        fn test_contains_stringifies() {
            let v = values(&[("code", json!(12345)), ("tags", json!(["red", "blue"]))]);
            assert!(Condition::new("code", Operator::Contains, json!("234")).holds(&v));
            assert!(Condition::new("code", Operator::Contains, json!(45)).holds(&v));
            assert!(Condition::new("tags", Operator::Contains, json!("blue")).holds(&v));
            assert!(!Condition::new("tags", Operator::Contains, json!("green")).holds(&v));
        }

        #[test]
        fn test_numeric_comparisons_coerce() {
            let v = values(&[("n", json!("10")), ("word", json!("ten")), ("flag", json!(true))]);
            assert!(Condition::new("n", Operator::GreaterThan, json!(9)).holds(&v));
            assert!(Condition::new("n", Operator::LessThan, json!("11")).holds(&v));
            assert!(!Condition::new("word", Operator::GreaterThan, json!(0)).holds(&v));
            assert!(!Condition::new("word", Operator::LessThan, json!(0)).holds(&v));
            assert!(Condition::new("flag", Operator::GreaterThan, json!(0)).holds(&v));
            assert!(!Condition::new("n", Operator::GreaterThan, json!(null)).holds(&v));
        }

        #[test]
        fn test_is_empty_variants() {
            let v = values(&[("s", json!(" ")), ("list", json!([])), ("zero", json!(0))]);
            assert!(Condition::is_empty("s").holds(&v));
            assert!(Condition::is_empty("list").holds(&v));
            assert!(Condition::is_not_empty("zero").holds(&v));
        }
    }

    mod condition_set {
        use super::*;

        #[test]
        fn test_empty_set_is_visible_and_enabled() {
            let set = ConditionSet::default();
            assert!(set.is_visible(&FormValues::new()));
            assert!(set.is_enabled(&FormValues::new()));
        }

        #[test]
        fn test_hide_wins_over_show() {
            let set = ConditionSet {
                show: vec![Condition::equals("a", 1)],
                hide: vec![Condition::equals("b", 2)],
                ..ConditionSet::default()
            };
            assert!(set.is_visible(&values(&[("a", json!(1))])));
            assert!(!set.is_visible(&values(&[("a", json!(1)), ("b", json!(2))])));
            assert!(!set.is_visible(&values(&[("a", json!(0))])));
        }

        #[test]
        fn test_disable_slot() {
            let set = ConditionSet::disable_when(vec![Condition::equals("locked", true)]);
            assert!(set.is_enabled(&values(&[("locked", json!(false))])));
            assert!(!set.is_enabled(&values(&[("locked", json!(true))])));
        }

        #[test]
        fn test_deserialize_list_slot() {
            let set: ConditionSet = serde_json::from_value(json!({
                "hide": [{ "field": "notifyByEmail", "operator": "equals", "value": false }]
            }))
            .unwrap();
            assert_eq!(set.hide, vec![Condition::equals("notifyByEmail", false)]);
        }

        #[test]
        fn test_deserialize_map_slot() {
            let set: ConditionSet = serde_json::from_value(json!({
                "show": { "country": [{ "operator": "equals", "value": "DE" }],
                          "age": [{ "operator": "greater_than", "value": 17 }] }
            }))
            .unwrap();
            assert_eq!(set.show.len(), 2);
            assert!(set.show.contains(&Condition::equals("country", "DE")));
            assert!(set.show.contains(&Condition::new("age", Operator::GreaterThan, 17)));
        }

        #[test]
        fn test_referenced_fields() {
            let set = ConditionSet {
                show: vec![Condition::equals("a", 1)],
                disable: vec![Condition::is_empty("b")],
                ..ConditionSet::default()
            };
            let refs: Vec<_> = set.referenced_fields().cloned().collect();
            assert_eq!(refs, vec!["a".to_string(), "b".to_string()]);
        }
    }
}
