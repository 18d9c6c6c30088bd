//! Guard-to-restriction reconciliation.

use crate::grammar::{RestrictionKey, RestrictionValue};
use crate::mtt::predicate::{CompareOp, Literal};
use crate::mtt::Predicate;

/// Whether `guard` (over the matched node's children) logically implies
/// the target restriction `key=value` on `field`.
pub fn guard_implies_restriction(
    guard: Option<&Predicate>,
    field: &str,
    key: &RestrictionKey,
    value: &RestrictionValue,
) -> bool {
    let Some(guard) = guard else { return false };
    let mut compares = Vec::new();
    collect_compares(guard, field, &mut compares);

    match key {
        RestrictionKey::MinInclusive => {
            let Some(v) = as_number(value) else { return false };
            compares.iter().any(|(op, w)| match op {
                CompareOp::Ge => *w >= v,
                CompareOp::Gt => *w >= v - 1.0,
                _ => false,
            })
        }
        RestrictionKey::MaxInclusive => {
            let Some(v) = as_number(value) else { return false };
            compares.iter().any(|(op, w)| match op {
                CompareOp::Le => *w <= v,
                CompareOp::Lt => *w <= v + 1.0,
                _ => false,
            })
        }
        RestrictionKey::Enumeration => {
            let Some(values) = as_many(value) else { return false };
            let mut eq_strings = Vec::new();
            collect_eq_strings(guard, field, &mut eq_strings);
            !values.is_empty() && values.iter().all(|v| eq_strings.contains(v))
        }
        _ => false,
    }
}

/// Gather every `(op, numeric literal)` comparison against `field`
/// anywhere in the guard's boolean structure.
fn collect_compares(pred: &Predicate, field: &str, out: &mut Vec<(CompareOp, f64)>) {
    match pred {
        Predicate::Compare { path, op, literal } if path == field => {
            if let Literal::Number(n) = literal {
                out.push((*op, *n));
            }
        }
        Predicate::Compare { .. } => {}
        Predicate::And(parts) | Predicate::Or(parts) => {
            for p in parts {
                collect_compares(p, field, out);
            }
        }
        Predicate::Not(inner) => collect_compares(inner, field, out),
        Predicate::Opaque(_) => {}
    }
}

fn collect_eq_strings(pred: &Predicate, field: &str, out: &mut Vec<String>) {
    match pred {
        Predicate::Compare {
            path,
            op: CompareOp::Eq,
            literal: Literal::Str(s),
        } if path == field => out.push(s.clone()),
        Predicate::Compare { .. } => {}
        Predicate::And(parts) | Predicate::Or(parts) => {
            for p in parts {
                collect_eq_strings(p, field, out);
            }
        }
        Predicate::Not(inner) => collect_eq_strings(inner, field, out),
        Predicate::Opaque(_) => {}
    }
}

fn as_number(value: &RestrictionValue) -> Option<f64> {
    match value {
        RestrictionValue::Single(s) => s.parse().ok(),
        RestrictionValue::Many(_) => None,
    }
}

fn as_many(value: &RestrictionValue) -> Option<&[String]> {
    match value {
        RestrictionValue::Many(values) => Some(values),
        RestrictionValue::Single(_) => None,
    }
}
