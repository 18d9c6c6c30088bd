//! Constraint extraction for one rule's preimage pattern: the rule's guard, every `if`/`when` test inside its output, and
//! target restrictions propagated back through attribute-value templates.

use crate::grammar::{Grammar, RestrictionKey, RestrictionValue};
use crate::mtt::predicate::{CompareOp, Literal};
use crate::mtt::{AttrValue, MttRule, Predicate, RhsOutput};

pub fn extract(rule: &MttRule, target: &Grammar) -> Vec<Predicate> {
    let mut collected = Vec::new();

    if let Some(guard) = &rule.guard {
        flatten_top_level(guard, &mut collected);
    }
    collect_tests(&rule.rhs_output, &mut collected);
    collect_propagated(&rule.rhs_output, target, &mut collected);

    dedup_by_normalized_text(collected)
}

/// Split a top-level conjunction into its conjuncts; a top-level
/// disjunction is preserved as one constraint literal.
fn flatten_top_level(pred: &Predicate, out: &mut Vec<Predicate>) {
    match pred {
        Predicate::And(parts) => out.extend(parts.iter().cloned()),
        other => out.push(other.clone()),
    }
}

fn collect_tests(nodes: &[RhsOutput], out: &mut Vec<Predicate>) {
    for node in nodes {
        match node {
            RhsOutput::If { test, then } => {
                flatten_top_level(&crate::mtt::predicate::parse(test), out);
                collect_tests(then, out);
            }
            RhsOutput::Choose { branches } => {
                for branch in branches {
                    if let Some(test) = &branch.test {
                        flatten_top_level(&crate::mtt::predicate::parse(test), out);
                    }
                    collect_tests(&branch.body, out);
                }
            }
            RhsOutput::Element { children, .. } => collect_tests(children, out),
            RhsOutput::ForEach { body, .. } => collect_tests(body, out),
            RhsOutput::Text { .. } | RhsOutput::ValueOf { .. } | RhsOutput::ApplyTemplates { .. } => {}
        }
    }
}

/// Target restrictions propagated through attribute-value templates: an
/// attribute `(tgt_name, value_expr=src_path)` whose owning element
/// declares a restriction on `tgt_name` synthesizes a predicate over
/// `src_path`.
fn collect_propagated(nodes: &[RhsOutput], target: &Grammar, out: &mut Vec<Predicate>) {
    for node in nodes {
        match node {
            RhsOutput::Element { name, attrs, children } => {
                if let Some(decls) = target.attributes.get(name) {
                    for attr in attrs {
                        if let AttrValue::ValueExpr(path) = &attr.value {
                            if let Some(decl) = decls.iter().find(|d| d.name == attr.name) {
                                for (key, value) in &decl.restrictions {
                                    if let Some(pred) = synthesize(path, key, value) {
                                        out.push(pred);
                                    }
                                }
                            }
                        }
                    }
                }
                collect_propagated(children, target, out);
            }
            RhsOutput::ForEach { body, .. } => collect_propagated(body, target, out),
            RhsOutput::If { then, .. } => collect_propagated(then, target, out),
            RhsOutput::Choose { branches } => {
                for branch in branches {
                    collect_propagated(&branch.body, target, out);
                }
            }
            RhsOutput::Text { .. } | RhsOutput::ValueOf { .. } | RhsOutput::ApplyTemplates { .. } => {}
        }
    }
}

fn synthesize(path: &str, key: &RestrictionKey, value: &RestrictionValue) -> Option<Predicate> {
    match key {
        RestrictionKey::MinInclusive => numeric(path, CompareOp::Ge, value),
        RestrictionKey::MaxInclusive => numeric(path, CompareOp::Le, value),
        RestrictionKey::MinExclusive => numeric(path, CompareOp::Gt, value),
        RestrictionKey::MaxExclusive => numeric(path, CompareOp::Lt, value),
        RestrictionKey::Enumeration => match value {
            RestrictionValue::Many(values) if !values.is_empty() => {
                let eqs: Vec<Predicate> = values
                    .iter()
                    .map(|v| Predicate::Compare {
                        path: path.to_string(),
                        op: CompareOp::Eq,
                        literal: Literal::Str(v.clone()),
                    })
                    .collect();
                Some(if eqs.len() == 1 {
                    eqs.into_iter().next().unwrap()
                } else {
                    Predicate::Or(eqs)
                })
            }
            _ => None,
        },
        RestrictionKey::Pattern
        | RestrictionKey::Length
        | RestrictionKey::MinLength
        | RestrictionKey::MaxLength => None,
    }
}

fn numeric(path: &str, op: CompareOp, value: &RestrictionValue) -> Option<Predicate> {
    let RestrictionValue::Single(s) = value else {
        return None;
    };
    let n: f64 = s.parse().ok()?;
    Some(Predicate::Compare {
        path: path.to_string(),
        op,
        literal: Literal::Number(n),
    })
}

/// Deduplicate by normalized textual equality, keeping
/// first-occurrence order.
fn dedup_by_normalized_text(predicates: Vec<Predicate>) -> Vec<Predicate> {
    let mut seen = std::collections::HashSet::new();
    predicates
        .into_iter()
        .filter(|p| seen.insert(p.normalized_text()))
        .collect()
}
