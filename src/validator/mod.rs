//! The type-preservation validator: checks structural
//! coverage, type-constraint compatibility, and cardinality compatibility
//! between `G_S`, `G_T` via the MTT, producing a proof trace. Never
//! materializes trees.

mod reconcile;
pub mod errors;
mod resolve;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Diagnostic, Level};
use crate::grammar::Grammar;
use crate::mtt::Mtt;
use crate::reports::ProofTrace;

pub use resolve::ResolvedTarget;

/// Where a source production lhs ends up: a covered target element name,
/// or unmapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CoverageTarget {
    Mapped(String),
    Unmapped,
}

/// The outcome of type-preservation validation: whether the mapping is
/// type-preserving, plus the diagnostics and coverage accounting behind
/// that verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub proof_steps: ProofTrace,
    pub coverage: BTreeMap<String, CoverageTarget>,
}

/// Run the structural-coverage, type-constraint, and cardinality checks
/// and assemble a [`ValidationResult`]. Deterministic iteration over
/// `source.productions` and `source.type_constraints`.
pub fn validate(source: &Grammar, target: &Grammar, mtt: &Mtt) -> ValidationResult {
    let mut trace = ProofTrace::new();
    let mut result_errors = Vec::new();
    let mut result_warnings = Vec::new();

    trace.push(Level::Info, "Step 1: structural coverage");
    let mut coverage = BTreeMap::new();
    step1_structural_coverage(source, mtt, &mut trace, &mut result_errors, &mut result_warnings, &mut coverage);

    trace.push(Level::Info, "Step 2: type-constraint compatibility");
    step2_type_constraints(source, target, mtt, &mut trace, &mut result_errors, &mut result_warnings);

    trace.push(Level::Info, "Step 3: cardinality compatibility");
    step3_cardinality(source, target, mtt, &mut trace, &mut result_warnings);

    trace.push(Level::Info, "Step 4: coverage matrix");
    for production in &source.productions {
        coverage.entry(production.lhs.clone()).or_insert_with(|| {
            match resolve::resolve(mtt, target, &production.lhs) {
                Some((resolved, _)) => CoverageTarget::Mapped(resolved.display_name()),
                None => CoverageTarget::Unmapped,
            }
        });
    }

    let valid = result_errors.is_empty();
    trace.push(
        if valid { Level::Ok } else { Level::Error },
        format!("validation {}", if valid { "passed" } else { "failed" }),
    );

    ValidationResult {
        valid,
        errors: result_errors,
        warnings: result_warnings,
        proof_steps: trace,
        coverage,
    }
}

fn step1_structural_coverage(
    source: &Grammar,
    mtt: &Mtt,
    trace: &mut ProofTrace,
    result_errors: &mut Vec<Diagnostic>,
    result_warnings: &mut Vec<Diagnostic>,
    _coverage: &mut BTreeMap<String, CoverageTarget>,
) {
    let root_covered = mtt.rules.iter().any(|r| resolve::rule_reaches(r, &source.root));
    if !root_covered {
        let diagnostic = errors::no_rule_for_root(&source.root);
        trace.push_diagnostic(diagnostic.clone());
        result_errors.push(diagnostic);
    } else {
        trace.push(Level::Ok, format!("root `{}` is covered by a transformation rule", source.root));
    }

    for production in &source.productions {
        let covered = mtt.rules.iter().any(|r| resolve::rule_reaches(r, &production.lhs));
        if !covered {
            let diagnostic = errors::uncovered_production(&production.lhs);
            trace.push_diagnostic(diagnostic.clone());
            result_warnings.push(diagnostic);
        }
    }
}

fn step2_type_constraints(
    source: &Grammar,
    target: &Grammar,
    mtt: &Mtt,
    trace: &mut ProofTrace,
    result_errors: &mut Vec<Diagnostic>,
    result_warnings: &mut Vec<Diagnostic>,
) {
    for (source_elem, src_constraint) in &source.type_constraints {
        let Some((resolved, guard)) = resolve::resolve(mtt, target, source_elem) else {
            continue;
        };
        let Some((tgt_base, tgt_restrictions)) = resolve::target_info(target, &resolved) else {
            continue;
        };
        let target_name = resolved.display_name();

        if !src_constraint.base_type.compatible_with(&tgt_base) {
            let diagnostic = errors::incompatible_base_types(
                source_elem,
                &target_name,
                &format!("{:?}", src_constraint.base_type),
                &format!("{:?}", tgt_base),
            );
            trace.push_diagnostic(diagnostic.clone());
            result_errors.push(diagnostic);
            continue;
        }
        trace.push(
            Level::Ok,
            format!("`{}` is type-compatible with `{}`", source_elem, target_name),
        );

        for (key, value) in &tgt_restrictions {
            if src_constraint.restrictions.contains_key(key) {
                continue;
            }
            if reconcile::guard_implies_restriction(guard, source_elem, key, value) {
                trace.push_diagnostic(errors::restriction_reconciled(source_elem, key, value));
            } else {
                let diagnostic = errors::missing_restriction_warning(source_elem, &target_name, key, value);
                trace.push_diagnostic(diagnostic.clone());
                result_warnings.push(diagnostic);
            }
        }
    }
}

fn step3_cardinality(
    source: &Grammar,
    target: &Grammar,
    mtt: &Mtt,
    trace: &mut ProofTrace,
    result_warnings: &mut Vec<Diagnostic>,
) {
    for production in &source.productions {
        let Some((resolved, guard)) = resolve::resolve(mtt, target, &production.lhs) else {
            continue;
        };
        let Some(tgt_cardinality) = resolve::target_cardinality(target, &resolved) else {
            continue;
        };
        let src = production.cardinality;
        let tgt = tgt_cardinality;
        let target_name = resolved.display_name();

        let empty_vs_required = src.lo == 0 && tgt.lo > 0;
        let many_vs_one = src.hi.map(|h| h > 1).unwrap_or(true) && tgt.hi == Some(1);

        if !empty_vs_required && !many_vs_one {
            trace.push(
                Level::Ok,
                format!("`{}` -> `{}` cardinality is compatible", production.lhs, target_name),
            );
            continue;
        }

        if empty_vs_required && reconcile_absence(guard, &production.lhs) {
            trace.push_diagnostic(errors::cardinality_reconciled(&production.lhs));
            continue;
        }

        let diagnostic = errors::cardinality_warning(&production.lhs, &target_name, src, tgt);
        trace.push_diagnostic(diagnostic.clone());
        result_warnings.push(diagnostic);
    }
}

/// Heuristic for downgrading an empty-vs-required cardinality mismatch to
/// ok: a guard that mentions this field in any comparison is treated as
/// having ruled out the empty case, since any comparison against a field
/// requires the field to be evaluable.
fn reconcile_absence(guard: Option<&crate::mtt::Predicate>, field: &str) -> bool {
    fn mentions(pred: &crate::mtt::Predicate, field: &str) -> bool {
        use crate::mtt::Predicate;
        match pred {
            Predicate::Compare { path, .. } => path == field,
            Predicate::And(parts) | Predicate::Or(parts) => parts.iter().any(|p| mentions(p, field)),
            Predicate::Not(inner) => mentions(inner, field),
            Predicate::Opaque(_) => false,
        }
    }
    guard.map(|g| mentions(g, field)).unwrap_or(false)
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
    fn guarded_scenario_reconciles_warning() {
        let stylesheet = r#"<stylesheet>
            <template match="Person">
                <if test="Age &gt;= 0">
                    <Individual fullname="{Name}" years="{Age}"/>
                </if>
            </template>
        </stylesheet>"#;
        let (source, target, mtt) = build(PERSON_SCHEMA, INDIVIDUAL_SCHEMA, stylesheet);
        let result = validate(&source, &target, &mtt);
        assert!(result.valid, "{:?}", result.errors);
        assert!(
            !result.warnings.iter().any(|w| w.message.contains("minInclusive")),
            "guard should reconcile the minInclusive warning: {:?}",
            result.warnings
        );
    }

    #[test]
    fn missing_guard_surfaces_restriction_warning() {
        let stylesheet = r#"<stylesheet>
            <template match="Person">
                <Individual fullname="{Name}" years="{Age}"/>
            </template>
        </stylesheet>"#;
        let (source, target, mtt) = build(PERSON_SCHEMA, INDIVIDUAL_SCHEMA, stylesheet);
        let result = validate(&source, &target, &mtt);
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.message.contains("minInclusive")));
    }

    #[test]
    fn uncovered_sibling_element_is_a_warning_not_an_error() {
        let schema = r#"<schema>
            <element name="Person">
                <complexType>
                    <sequence><element name="Name" type="xs:string"/></sequence>
                </complexType>
            </element>
            <element name="Organization" type="xs:string"/>
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
        let result = validate(&source, &target, &mtt);
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.message.contains("Organization")));
        assert_eq!(result.coverage.get("Organization"), Some(&CoverageTarget::Unmapped));
    }

    #[test]
    fn many_to_one_cardinality_is_a_warning() {
        let source_schema = r#"<schema>
            <element name="Contact">
                <complexType>
                    <sequence>
                        <element name="Phone" type="xs:string" minOccurs="0" maxOccurs="unbounded"/>
                    </sequence>
                </complexType>
            </element>
        </schema>"#;
        let target_schema = r#"<schema>
            <element name="Person">
                <complexType>
                    <sequence>
                        <element name="Phone" type="xs:string"/>
                    </sequence>
                </complexType>
            </element>
        </schema>"#;
        let stylesheet = r#"<stylesheet>
            <template match="Contact"><Person><value-of select="Phone"/></Person></template>
        </stylesheet>"#;
        let (source, target, mtt) = build(source_schema, target_schema, stylesheet);
        let result = validate(&source, &target, &mtt);
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.message.contains("0")));
    }
}
