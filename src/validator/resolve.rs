//! Resolves a source element/production to the target construct it maps to.

use std::collections::BTreeMap;

use crate::grammar::{AtomType, Grammar, RestrictionKey, RestrictionValue};
use crate::mtt::{AttrValue, Mtt, MttRule, Predicate, RhsOutput};

/// Where a source construct's value ends up in the target tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// The source element is itself templated, mapping to this target
    /// element (the outermost literal element the template produces).
    Element(String),
    /// The source element's value is read into an attribute-value
    /// template or dynamic `attribute` constructor on this target
    /// element.
    Attribute { owner: String, attr: String },
}

impl ResolvedTarget {
    pub fn display_name(&self) -> String {
        match self {
            ResolvedTarget::Element(name) => name.clone(),
            ResolvedTarget::Attribute { owner, attr } => format!("{}@{}", owner, attr),
        }
    }
}

/// Resolve `source_elem` to a target construct plus the guard of the rule
/// that produced the mapping.
pub fn resolve<'m>(
    mtt: &'m Mtt,
    target: &Grammar,
    source_elem: &str,
) -> Option<(ResolvedTarget, Option<&'m Predicate>)> {
    if let Some(rule) = mtt.rules_for_element(source_elem).next() {
        if let Some(name) = outermost_element_name(&rule.rhs_output) {
            return Some((ResolvedTarget::Element(name), rule.guard.as_ref()));
        }
    }
    for rule in &mtt.rules {
        if let Some(found) = find_reference(&rule.rhs_output, source_elem) {
            return Some((found, rule.guard.as_ref()));
        }
    }
    if target.type_constraints.contains_key(source_elem) {
        return Some((ResolvedTarget::Element(source_elem.to_string()), None));
    }
    None
}

fn outermost_element_name(nodes: &[RhsOutput]) -> Option<String> {
    nodes.iter().find_map(|n| match n {
        RhsOutput::Element { name, .. } => Some(name.clone()),
        RhsOutput::If { then, .. } => outermost_element_name(then),
        RhsOutput::Choose { branches } => {
            branches.iter().find_map(|b| outermost_element_name(&b.body))
        }
        _ => None,
    })
}

/// Walk an output skeleton looking for an attribute-value template or a
/// `value-of` whose path equals `source_elem`.
fn find_reference(nodes: &[RhsOutput], source_elem: &str) -> Option<ResolvedTarget> {
    for node in nodes {
        match node {
            RhsOutput::Element { name, attrs, children } => {
                for a in attrs {
                    if let AttrValue::ValueExpr(path) = &a.value {
                        if path == source_elem {
                            return Some(ResolvedTarget::Attribute {
                                owner: name.clone(),
                                attr: a.name.clone(),
                            });
                        }
                    }
                }
                if children.iter().any(|c| matches!(c, RhsOutput::ValueOf { path } if path == source_elem))
                {
                    return Some(ResolvedTarget::Element(name.clone()));
                }
                if let Some(found) = find_reference(children, source_elem) {
                    return Some(found);
                }
            }
            RhsOutput::ForEach { body, .. } => {
                if let Some(found) = find_reference(body, source_elem) {
                    return Some(found);
                }
            }
            RhsOutput::If { then, .. } => {
                if let Some(found) = find_reference(then, source_elem) {
                    return Some(found);
                }
            }
            RhsOutput::Choose { branches } => {
                for b in branches {
                    if let Some(found) = find_reference(&b.body, source_elem) {
                        return Some(found);
                    }
                }
            }
            RhsOutput::Text { .. } | RhsOutput::ValueOf { .. } | RhsOutput::ApplyTemplates { .. } => {}
        }
    }
    None
}

/// The resolved target's base type and restrictions, read from whichever
/// table (`type_constraints` or `attributes`) actually holds them.
pub fn target_info(
    target: &Grammar,
    resolved: &ResolvedTarget,
) -> Option<(AtomType, BTreeMap<RestrictionKey, RestrictionValue>)> {
    match resolved {
        ResolvedTarget::Element(name) => target
            .type_constraints
            .get(name)
            .map(|tc| (tc.base_type, tc.restrictions.clone())),
        ResolvedTarget::Attribute { owner, attr } => target
            .attributes
            .get(owner)?
            .iter()
            .find(|d| &d.name == attr)
            .map(|d| (d.type_ref, d.restrictions.clone())),
    }
}

/// `p.lhs`'s own occurrence cardinality in the target, needed for step 3.
/// An attribute's cardinality is synthesized from `required` (0/1 lo, hi
/// always 1 — an XML attribute never repeats).
pub fn target_cardinality(target: &Grammar, resolved: &ResolvedTarget) -> Option<crate::grammar::Cardinality> {
    match resolved {
        ResolvedTarget::Element(name) => target
            .productions_for(name)
            .next()
            .map(|p| p.cardinality),
        ResolvedTarget::Attribute { owner, attr } => target
            .attributes
            .get(owner)?
            .iter()
            .find(|d| &d.name == attr)
            .map(|d| crate::grammar::Cardinality::new(if d.required { 1 } else { 0 }, Some(1))),
    }
}

/// Whether any literal element in `rule`'s output, or its `lhs_pattern`,
/// references `lhs` at all — used by structural coverage.
pub fn rule_reaches(rule: &MttRule, lhs: &str) -> bool {
    rule.lhs_pattern.element == lhs || output_reaches(&rule.rhs_output, lhs)
}

fn output_reaches(nodes: &[RhsOutput], lhs: &str) -> bool {
    nodes.iter().any(|n| match n {
        RhsOutput::Element { name, children, .. } => name == lhs || output_reaches(children, lhs),
        RhsOutput::ForEach { body, .. } => output_reaches(body, lhs),
        RhsOutput::If { then, .. } => output_reaches(then, lhs),
        RhsOutput::Choose { branches } => branches.iter().any(|b| output_reaches(&b.body, lhs)),
        RhsOutput::Text { .. } | RhsOutput::ValueOf { .. } | RhsOutput::ApplyTemplates { .. } => false,
    })
}
