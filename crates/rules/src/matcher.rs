//! Condition matcher: decides whether an event satisfies a rule's conditions.
//!
//! Matching is pure and total. Operand shapes an operator cannot handle make
//! the condition fail closed instead of erroring.

use serde_json::Value;

use crate::path::resolve;
use crate::schema::{DetectionRule, FieldCondition, OneOrMany, Operator};

/// Check the rule's event type, event action and field conditions, in that
/// order, against an event projection.
pub fn matches(doc: &Value, rule: &DetectionRule) -> bool {
    let conditions = &rule.conditions;

    if !filter_matches(conditions.event_type.as_ref(), doc.get("event_type")) {
        return false;
    }
    if !filter_matches(conditions.event_action.as_ref(), doc.get("event_action")) {
        return false;
    }

    conditions
        .field_conditions
        .iter()
        .all(|cond| condition_matches(doc, cond))
}

fn filter_matches(filter: Option<&OneOrMany>, actual: Option<&Value>) -> bool {
    match filter {
        None => true,
        Some(filter) => actual
            .and_then(Value::as_str)
            .is_some_and(|value| filter.matches(value)),
    }
}

/// Evaluate one field condition against the projection.
pub fn condition_matches(doc: &Value, cond: &FieldCondition) -> bool {
    compare(resolve(doc, &cond.field), &cond.operator, &cond.value)
}

/// Apply `op` to an actual value (`None` when the field is absent) and an
/// expected literal.
pub fn compare(actual: Option<&Value>, op: &Operator, expected: &Value) -> bool {
    match op {
        Operator::Eq => actual.is_some_and(|a| values_equal(a, expected)),
        Operator::Neq => !actual.is_some_and(|a| values_equal(a, expected)),
        Operator::Contains => contains(actual, expected),
        Operator::NotContains => !contains(actual, expected),
        Operator::In => member_of(actual, expected),
        Operator::NotIn => !member_of(actual, expected),
        Operator::Gt => numeric(actual, expected, |a, b| a > b),
        Operator::Lt => numeric(actual, expected, |a, b| a < b),
        Operator::Gte => numeric(actual, expected, |a, b| a >= b),
        Operator::Lte => numeric(actual, expected, |a, b| a <= b),
        Operator::Unknown(_) => false,
    }
}

/// Type-sensitive equality. Numbers compare numerically; arrays and objects
/// never equal anything.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => false,
    }
}

fn contains(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (Some(Value::String(haystack)), Value::String(needle)) => haystack.contains(needle.as_str()),
        _ => false,
    }
}

fn member_of(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (Some(value), Value::Array(set)) => set.iter().any(|item| values_equal(value, item)),
        _ => false,
    }
}

fn numeric(actual: Option<&Value>, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.and_then(Value::as_f64), expected.as_f64()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vigil_core::Severity;

    use crate::schema::RuleConditions;

    fn doc() -> Value {
        json!({
            "event_type": "authentication",
            "event_action": "login_failure",
            "outcome": "failure",
            "actor": {"user": "alice", "ip": "10.0.0.9"},
            "target": {"port": 22},
            "metadata": {"attempts": 3, "admin": true, "tags": ["vpn"], "note": null}
        })
    }

    fn rule(conditions: RuleConditions) -> DetectionRule {
        DetectionRule {
            id: "r".into(),
            name: "R".into(),
            description: None,
            enabled: true,
            severity: Severity::Low,
            conditions,
            actions: Vec::new(),
        }
    }

    fn cond(field: &str, op: Operator, value: Value) -> FieldCondition {
        FieldCondition {
            field: field.into(),
            operator: op,
            value,
        }
    }

    fn check(field: &str, op: Operator, value: Value) -> bool {
        condition_matches(&doc(), &cond(field, op, value))
    }

    #[test]
    fn empty_conditions_match_everything() {
        assert!(matches(&doc(), &rule(RuleConditions::default())));
    }

    #[test]
    fn event_type_and_action_filters() {
        let mut conditions = RuleConditions {
            event_type: Some(OneOrMany::One("authentication".into())),
            event_action: Some(OneOrMany::Many(vec!["login_success".into(), "login_failure".into()])),
            ..Default::default()
        };
        assert!(matches(&doc(), &rule(conditions.clone())));

        conditions.event_type = Some(OneOrMany::Many(vec!["network".into(), "file".into()]));
        assert!(!matches(&doc(), &rule(conditions)));
    }

    #[test]
    fn all_field_conditions_must_hold() {
        let conditions = RuleConditions {
            field_conditions: vec![
                cond("outcome", Operator::Eq, json!("failure")),
                cond("metadata.attempts", Operator::Gte, json!(3)),
            ],
            ..Default::default()
        };
        assert!(matches(&doc(), &rule(conditions.clone())));

        let mut failing = conditions;
        failing.field_conditions.push(cond("actor.user", Operator::Eq, json!("bob")));
        assert!(!matches(&doc(), &rule(failing)));
    }

    #[test]
    fn equality_is_type_sensitive() {
        assert!(check("target.port", Operator::Eq, json!(22)));
        assert!(check("target.port", Operator::Eq, json!(22.0)));
        assert!(!check("target.port", Operator::Eq, json!("22")));
        assert!(check("metadata.admin", Operator::Eq, json!(true)));
        assert!(!check("metadata.admin", Operator::Eq, json!("true")));
        assert!(check("metadata.note", Operator::Eq, Value::Null));
    }

    #[test]
    fn containers_never_equal() {
        assert!(!check("metadata.tags", Operator::Eq, json!(["vpn"])));
        assert!(check("metadata.tags", Operator::Neq, json!(["vpn"])));
    }

    #[test]
    fn contains_requires_strings() {
        assert!(check("actor.ip", Operator::Contains, json!("10.0.")));
        assert!(!check("target.port", Operator::Contains, json!("2")));
        assert!(check("target.port", Operator::NotContains, json!("2")));
        assert!(check("actor.ip", Operator::NotContains, json!("192.168")));
    }

    #[test]
    fn membership() {
        assert!(check("actor.user", Operator::In, json!(["bob", "alice"])));
        assert!(check("target.port", Operator::In, json!([22, 443])));
        assert!(!check("actor.user", Operator::In, json!("alice")));
        assert!(check("actor.user", Operator::NotIn, json!("alice")));
        assert!(check("actor.user", Operator::NotIn, json!(["bob"])));
    }

    #[test]
    fn numeric_comparisons() {
        assert!(check("metadata.attempts", Operator::Gt, json!(2)));
        assert!(!check("metadata.attempts", Operator::Gt, json!(3)));
        assert!(check("metadata.attempts", Operator::Lte, json!(3.0)));
        assert!(check("metadata.attempts", Operator::Lt, json!(10)));
        assert!(!check("actor.user", Operator::Gt, json!(1)));
        assert!(!check("metadata.attempts", Operator::Gt, json!("2")));
    }

    #[test]
    fn absent_field_semantics() {
        let v = json!("x");
        assert!(!check("actor.email", Operator::Eq, v.clone()));
        assert!(!check("actor.email", Operator::Gt, json!(1)));
        assert!(!check("actor.email", Operator::Contains, v.clone()));
        assert!(!check("actor.email", Operator::In, json!(["x"])));
        assert!(check("actor.email", Operator::Neq, v.clone()));
        assert!(check("actor.email", Operator::NotContains, v));
        assert!(check("actor.email", Operator::NotIn, json!(["x"])));
    }

    #[test]
    fn unknown_operator_fails_closed() {
        assert!(!check("actor.user", Operator::Unknown("regex".into()), json!("alice")));
        let conditions = RuleConditions {
            field_conditions: vec![cond("actor.user", Operator::Unknown("like".into()), json!("a%"))],
            ..Default::default()
        };
        assert!(!matches(&doc(), &rule(conditions)));
    }

    #[test]
    fn matching_is_repeatable() {
        let conditions = RuleConditions {
            event_type: Some(OneOrMany::One("authentication".into())),
            field_conditions: vec![cond("actor.ip", Operator::Eq, json!("10.0.0.9"))],
            ..Default::default()
        };
        let rule = rule(conditions);
        let doc = doc();
        let before = doc.clone();
        assert!(matches(&doc, &rule));
        assert!(matches(&doc, &rule));
        assert_eq!(doc, before);
    }
}
