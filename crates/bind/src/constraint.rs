//! The constraint rule table.
//!
//! Rules run in a fixed order: numeric bounds (`gt`, `ge`, `lt`, `le`), length bounds
//! (`min_length`, `max_length`), pattern, allowed values. Every rule is checked, so one value can
//! produce several violations. On a sequence, length bounds count items while the other rules
//! apply to each element, reported under the element index.

use crate::coerce::Issue;
use crate::error::{ConstraintKind, ErrorKind};
use crate::spec::{Constraints, Number};
use crate::value::Value;
use std::cmp::Ordering;

type Rule = fn(&Value, &Constraints, &mut Vec<Issue>);

const RULES: [Rule; 4] = [numeric, length, pattern, one_of];

/// Checks a coerced value. Nulls and defaults never reach here.
pub(crate) fn check(value: &Value, constraints: &Constraints) -> Vec<Issue> {
    let mut issues = Vec::new();
    if constraints.is_empty() {
        return issues;
    }
    for rule in RULES {
        rule(value, constraints, &mut issues);
    }
    issues
}

fn elements(value: &Value) -> Vec<(Vec<String>, &Value)> {
    match value {
        Value::Seq(items) => items.iter().enumerate().map(|(i, item)| (vec![i.to_string()], item)).collect(),
        other => vec![(Vec::new(), other)],
    }
}

fn violation(path: Vec<String>, kind: ConstraintKind, message: String, value: &Value) -> Issue {
    Issue { path, kind: ErrorKind::ConstraintViolated(kind), message, input: Some(value.to_json()) }
}

fn numeric(value: &Value, constraints: &Constraints, issues: &mut Vec<Issue>) {
    let bounds = [
        (constraints.gt, ConstraintKind::GreaterThan, "greater than", &[Ordering::Greater][..]),
        (constraints.ge, ConstraintKind::GreaterThanEqual, "greater than or equal to", &[Ordering::Greater, Ordering::Equal][..]),
        (constraints.lt, ConstraintKind::LessThan, "less than", &[Ordering::Less][..]),
        (constraints.le, ConstraintKind::LessThanEqual, "less than or equal to", &[Ordering::Less, Ordering::Equal][..]),
    ];
    for (path, element) in elements(value) {
        let number = match element {
            Value::Int(i) => Number::Int(*i),
            Value::Float(f) => Number::Float(*f),
            _ => continue,
        };
        for (bound, kind, relation, accepted) in &bounds {
            let Some(bound) = bound else { continue };
            let ok = number.compare(*bound).is_some_and(|ordering| accepted.contains(&ordering));
            if !ok {
                let message = format!("ensure this value is {relation} {bound}");
                issues.push(violation(path.clone(), *kind, message, element));
            }
        }
    }
}

fn length(value: &Value, constraints: &Constraints, issues: &mut Vec<Issue>) {
    let (len, unit) = match value {
        Value::Str(s) => (s.chars().count(), "characters"),
        Value::Seq(items) => (items.len(), "items"),
        _ => return,
    };
    if let Some(min) = constraints.min_length {
        if len < min {
            let message = format!("ensure this value has at least {min} {unit}");
            issues.push(violation(Vec::new(), ConstraintKind::MinLength, message, value));
        }
    }
    if let Some(max) = constraints.max_length {
        if len > max {
            let message = format!("ensure this value has at most {max} {unit}");
            issues.push(violation(Vec::new(), ConstraintKind::MaxLength, message, value));
        }
    }
}

fn pattern(value: &Value, constraints: &Constraints, issues: &mut Vec<Issue>) {
    let Some(pattern) = &constraints.pattern else { return };
    for (path, element) in elements(value) {
        if let Value::Str(s) = element {
            if !pattern.is_match(s) {
                let message = format!("string does not match regex \"{}\"", pattern.as_str());
                issues.push(violation(path, ConstraintKind::Pattern, message, element));
            }
        }
    }
}

fn one_of(value: &Value, constraints: &Constraints, issues: &mut Vec<Issue>) {
    let Some(allowed) = &constraints.one_of else { return };
    for (path, element) in elements(value) {
        let token = match element {
            Value::Str(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::DateTime(dt) => dt.to_rfc3339(),
            _ => continue,
        };
        if !allowed.contains(&token) {
            let permitted = allowed.iter().map(|a| format!("'{a}'")).collect::<Vec<_>>().join(", ");
            let message = format!("value is not a valid enumeration member; permitted: {permitted}");
            issues.push(violation(path, ConstraintKind::Enum, message, element));
        }
    }
}
