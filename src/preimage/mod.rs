//! Preimage computation and the validity decision: per-rule
//! output-skeleton validity, input-pattern reconstruction, constraint
//! extraction, and pattern-cover over the source grammar's top-level
//! patterns. Entirely symbolic: no tree is ever materialized or walked at
//! runtime, only the in-memory grammar/MTT objects.

mod constraints;

use serde::{Deserialize, Serialize};

use crate::grammar::Grammar;
use crate::mtt::{Mtt, MttRule, Predicate, RhsOutput};

/// An accepted rule's reconstructed input pattern plus the constraints
/// collected over the matched node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedPattern {
    pub state: String,
    pub element: String,
    pub children: Vec<String>,
    pub constraints: Vec<Predicate>,
}

/// A rule whose output skeleton is not valid against `G_T`, carrying the reason it was rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedPattern {
    pub state: String,
    pub element: String,
    pub reason: String,
}

/// Aggregate counts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Statistics {
    pub total_rules: usize,
    pub accepted_patterns: usize,
    pub rejected_patterns: usize,
    pub coverage: f64,
}

/// A top-level structural pattern drawn from `G_S`: the element and its declared children, used only
/// for elements whose production is not a simple scalar leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePattern {
    pub element: String,
    pub children: Vec<String>,
}

/// An uncovered source pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counterexample {
    pub element: String,
    pub reason: String,
}

/// `{valid, total, covered, counterexamples[], coverage_percent,
/// explanation}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidityResult {
    pub valid: bool,
    pub total: usize,
    pub covered: usize,
    pub counterexamples: Vec<Counterexample>,
    pub coverage_percent: f64,
    pub explanation: String,
}

/// `{accepted_patterns, rejected_patterns, statistics}` plus the decided
/// `ValidityResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreimageResult {
    pub accepted_patterns: Vec<AcceptedPattern>,
    pub rejected_patterns: Vec<RejectedPattern>,
    pub statistics: Statistics,
    pub validity: ValidityResult,
}

/// Compute the per-rule preimage of `M` against `G_T`, then decide
/// `L(G_S) \subseteq pre_M(L(G_T))` by pattern cover.
pub fn compute(target: &Grammar, mtt: &Mtt, source: &Grammar) -> PreimageResult {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for rule in &mtt.rules {
        match output_validity(&rule.rhs_output, target) {
            Ok(()) => accepted.push(AcceptedPattern {
                state: rule.state.clone(),
                element: rule.lhs_pattern.element.clone(),
                children: input_pattern_children(rule),
                constraints: constraints::extract(rule, target),
            }),
            Err(reason) => rejected.push(RejectedPattern {
                state: rule.state.clone(),
                element: rule.lhs_pattern.element.clone(),
                reason,
            }),
        }
    }

    let total_rules = mtt.rules.len();
    let statistics = Statistics {
        total_rules,
        accepted_patterns: accepted.len(),
        rejected_patterns: rejected.len(),
        coverage: if total_rules == 0 {
            0.0
        } else {
            accepted.len() as f64 / total_rules as f64
        },
    };

    let validity = decide_validity(source, &accepted);

    PreimageResult {
        accepted_patterns: accepted,
        rejected_patterns: rejected,
        statistics,
        validity,
    }
}

fn input_pattern_children(rule: &MttRule) -> Vec<String> {
    match &rule.lhs_pattern.children {
        Some(names) => names.clone(),
        None => vec!["*".to_string()],
    }
}

/// Recursively descend `nodes`, returning the first reason an output
/// skeleton is invalid against `target`.
fn output_validity(nodes: &[RhsOutput], target: &Grammar) -> Result<(), String> {
    for node in nodes {
        validate_node(node, target)?;
    }
    Ok(())
}

fn validate_node(node: &RhsOutput, target: &Grammar) -> Result<(), String> {
    match node {
        RhsOutput::Text { .. } | RhsOutput::ValueOf { .. } | RhsOutput::ApplyTemplates { .. } => {
            Ok(())
        }
        RhsOutput::Element { name, attrs, children } => {
            if !target.has_nonterminal(name) {
                return Err(format!(
                    "output element `{}` does not occur as the lhs of any target production",
                    name
                ));
            }
            let declared = target.attributes.get(name);
            for attr in attrs {
                let admissible = declared.map(|decls| decls.iter().any(|d| d.name == attr.name));
                if admissible != Some(true) {
                    return Err(format!(
                        "attribute `{}` is not declared on target element `{}`",
                        attr.name, name
                    ));
                }
            }
            output_validity(children, target)
        }
        RhsOutput::ForEach { body, .. } => output_validity(body, target),
        RhsOutput::If { then, .. } => output_validity(then, target),
        RhsOutput::Choose { branches } => {
            for branch in branches {
                output_validity(&branch.body, target)?;
            }
            Ok(())
        }
    }
}

/// Extract the top-level source patterns, attempt to cover each with an
/// accepted pattern, and report the uncovered ones as counterexamples.
fn decide_validity(source: &Grammar, accepted: &[AcceptedPattern]) -> ValidityResult {
    let patterns = top_level_source_patterns(source);
    let total = patterns.len();

    let mut covered = 0usize;
    let mut counterexamples = Vec::new();

    for pattern in &patterns {
        if accepted.iter().any(|ip| covers(ip, pattern)) {
            covered += 1;
        } else {
            counterexamples.push(Counterexample {
                element: pattern.element.clone(),
                reason: format!(
                    "no transformation rule produces a preimage pattern for `{}`",
                    pattern.element
                ),
            });
        }
    }

    let coverage_percent = if total == 0 {
        100.0
    } else {
        covered as f64 / total as f64 * 100.0
    };
    let valid = counterexamples.is_empty();
    let explanation = if valid {
        format!("all {} top-level source pattern(s) are covered", total)
    } else {
        format!(
            "{} of {} top-level source pattern(s) uncovered",
            counterexamples.len(),
            total
        )
    };

    ValidityResult {
        valid,
        total,
        covered,
        counterexamples,
        coverage_percent,
        explanation,
    }
}

/// Every production whose lhs is not a simple scalar leaf, plus the root
/// unconditionally.
fn top_level_source_patterns(source: &Grammar) -> Vec<SourcePattern> {
    let mut seen = std::collections::BTreeSet::new();
    let mut patterns = Vec::new();

    let mut push = |element: &str, source: &Grammar, seen: &mut std::collections::BTreeSet<String>, patterns: &mut Vec<SourcePattern>| {
        if !seen.insert(element.to_string()) {
            return;
        }
        let children = source
            .productions_for(element)
            .flat_map(|p| p.rhs.iter())
            .filter_map(|sym| match sym {
                crate::grammar::Symbol::NonTerminal(name) => Some(name.clone()),
                crate::grammar::Symbol::Atomic(_) => None,
            })
            .collect();
        patterns.push(SourcePattern {
            element: element.to_string(),
            children,
        });
    };

    push(&source.root, source, &mut seen, &mut patterns);
    for production in &source.productions {
        if !source.is_leaf(&production.lhs) {
            push(&production.lhs, source, &mut seen, &mut patterns);
        }
    }

    patterns
}

/// `sp.element == ip.element` and (`ip.children == ["*"]` or the child
/// sequences are compatible). The MTT builder only ever produces wildcard
/// `lhs_pattern.children`, so the second branch is unreachable in practice
/// but kept for fidelity to the decision rule as stated.
fn covers(ip: &AcceptedPattern, sp: &SourcePattern) -> bool {
    if sp.element != ip.element {
        return false;
    }
    ip.children == ["*"] || ip.children == sp.children
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::InputSource;
    use crate::{grammar, mtt, xmltree};

    fn build(source_xsd: &str, target_xsd: &str, stylesheet_xml: &str) -> (Grammar, Grammar, Mtt) {
        let source_tree = xmltree::parse(source_xsd, InputSource::SourceSchema).unwrap();
        let target_tree = xmltree::parse(target_xsd, InputSource::TargetSchema).unwrap();
        let stylesheet_tree = xmltree::parse(stylesheet_xml, InputSource::Stylesheet).unwrap();
        let source = grammar::build(&source_tree, InputSource::SourceSchema).unwrap().grammar;
        let target = grammar::build(&target_tree, InputSource::TargetSchema).unwrap().grammar;
        let mtt = mtt::build(&stylesheet_tree).unwrap();
        (source, target, mtt)
    }

    const PERSON_SCHEMA: &str = r#"<schema>
        <element name="Person">
            <complexType>
                <sequence>
                    <element name="Name" type="xs:string"/>
                    <element name="Age" type="xs:integer"/>
                </sequence>
            </complexType>
        </element>
    </schema>"#;

    const INDIVIDUAL_SCHEMA: &str = r#"<schema>
        <element name="Individual">
            <complexType>
                <attribute name="fullname" type="xs:string"/>
                <attribute name="years">
                    <simpleType>
                        <restriction base="xs:integer">
                            <minInclusive value="0"/>
                        </restriction>
                    </simpleType>
                </attribute>
            </complexType>
        </element>
    </schema>"#;

    #[test]
    fn guarded_rule_is_accepted_with_its_guard_as_a_constraint() {
        let stylesheet = r#"<stylesheet>
            <template match="Person">
                <if test="Age &gt;= 0">
                    <Individual fullname="{Name}" years="{Age}"/>
                </if>
            </template>
        </stylesheet>"#;
        let (source, target, mtt) = build(PERSON_SCHEMA, INDIVIDUAL_SCHEMA, stylesheet);
        let result = compute(&target, &mtt, &source);
        assert_eq!(result.accepted_patterns.len(), 1);
        assert!(result.rejected_patterns.is_empty());
        assert!(result.validity.valid);
        let pattern = &result.accepted_patterns[0];
        assert_eq!(pattern.element, "Person");
        assert!(pattern
            .constraints
            .iter()
            .any(|p| p.normalized_text() == "Age >= 0"));
    }

    #[test]
    fn unguarded_rule_still_covers_structurally() {
        let stylesheet = r#"<stylesheet>
            <template match="Person">
                <Individual fullname="{Name}" years="{Age}"/>
            </template>
        </stylesheet>"#;
        let (source, target, mtt) = build(PERSON_SCHEMA, INDIVIDUAL_SCHEMA, stylesheet);
        let result = compute(&target, &mtt, &source);
        assert!(result.validity.valid);
        assert_eq!(result.validity.coverage_percent, 100.0);
    }

    #[test]
    fn element_not_handled_by_any_rule_is_a_counterexample() {
        let schema = r#"<schema>
            <element name="Person">
                <complexType>
                    <sequence><element name="Name" type="xs:string"/></sequence>
                </complexType>
            </element>
            <element name="Organization">
                <complexType>
                    <sequence><element name="Title" type="xs:string"/></sequence>
                </complexType>
            </element>
        </schema>"#;
        let stylesheet = r#"<stylesheet>
            <template match="Person"><Individual/></template>
        </stylesheet>"#;
        let source_tree = xmltree::parse(schema, InputSource::SourceSchema).unwrap();
        let target_tree = xmltree::parse(INDIVIDUAL_SCHEMA, InputSource::TargetSchema).unwrap();
        let stylesheet_tree = xmltree::parse(stylesheet, InputSource::Stylesheet).unwrap();
        let source = grammar::build(&source_tree, InputSource::SourceSchema).unwrap().grammar;
        let target = grammar::build(&target_tree, InputSource::TargetSchema).unwrap().grammar;
        let mtt = mtt::build(&stylesheet_tree).unwrap();
        let result = compute(&target, &mtt, &source);
        assert!(!result.validity.valid);
        assert!(result
            .validity
            .counterexamples
            .iter()
            .any(|c| c.element == "Organization"));
    }

    #[test]
    fn output_element_outside_target_grammar_is_rejected() {
        let stylesheet = r#"<stylesheet>
            <template match="Person"><Bogus/></template>
        </stylesheet>"#;
        let (source, target, mtt) = build(PERSON_SCHEMA, INDIVIDUAL_SCHEMA, stylesheet);
        let result = compute(&target, &mtt, &source);
        assert_eq!(result.rejected_patterns.len(), 1);
        assert!(result.accepted_patterns.is_empty());
        assert!(!result.validity.valid);
    }
}
