//! The external request surface: a single analysis endpoint plus
//! four diagnostic endpoints exposing intermediate pipeline outputs. This
//! module is a thin façade over the five pure components in `linter`,
//! `grammar`, `mtt`, `validator`, and `preimage` — it owns I/O-adjacent
//! concerns (parsing, stage sequencing, opportunistic parallelism,
//! logging) that those components deliberately don't.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::errors::{InputSource, Location, PipelineError};
use crate::grammar::{self, Grammar};
use crate::linter::{self, LintResult};
use crate::mtt::{self, Mtt};
use crate::preimage::{self, PreimageResult, ValidityResult};
use crate::validator::{self, ValidationResult};
use crate::xmltree;

/// `{valid, subset_check, source_grammar, target_grammar, mtt,
/// type_validation, preimage, validity}`. On a halting failure —
/// malformed input, a subset violation, or a schema defect — every field
/// but `valid` and `error` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subset_check: Option<LintResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_grammar: Option<Grammar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_grammar: Option<Grammar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtt: Option<Mtt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_validation: Option<ValidationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preimage: Option<PreimageResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity: Option<ValidityResult>,
}

impl AnalysisResult {
    fn failed(error: impl Into<String>) -> Self {
        AnalysisResult {
            valid: false,
            error: Some(error.into()),
            subset_check: None,
            source_grammar: None,
            target_grammar: None,
            mtt: None,
            type_validation: None,
            preimage: None,
            validity: None,
        }
    }
}

/// Threaded through each stage's top-level iteration to bound analysis of
/// pathological input. Not wired to
/// anything external in this deliverable; `cancel()` exists for embedders
/// that want to interrupt a long-running analysis from another thread.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    max_nodes: usize,
}

impl CancelToken {
    pub fn new(max_nodes: usize) -> Self {
        CancelToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            max_nodes,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check `count` (productions visited, rules visited, ...) against the
    /// node budget, and whether the token has been cancelled. Raises a
    /// `SchemaDefect`-shaped abort rather than looping unbounded.
    fn check(&self, count: usize, schema: InputSource, what: &str) -> Result<(), PipelineError> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(PipelineError::SchemaDefect {
                schema,
                message: "analysis cancelled".to_string(),
                location: Location::new(what),
            });
        }
        if count > self.max_nodes {
            return Err(PipelineError::SchemaDefect {
                schema,
                message: format!(
                    "{} ({}) exceeds max_pipeline_nodes ({})",
                    what, count, self.max_nodes
                ),
                location: Location::new(what),
            });
        }
        Ok(())
    }
}

/// Run the full pipeline: lint, then build the source and target grammars
/// in parallel, then translate the stylesheet to an MTT, validate, and
/// compute the preimage. Malformed input, subset violations, and schema
/// defects halt and are reported as `{valid: false, error}`; semantic
/// mismatches and coverage gaps never halt and are folded into
/// `type_validation`/`preimage`.
#[tracing::instrument(skip_all)]
pub fn run_analysis(source_schema: &str, target_schema: &str, stylesheet: &str) -> AnalysisResult {
    let cancel = CancelToken::new(crate::env::EnvConfig::load().max_pipeline_nodes);
    run_analysis_with_cancel(source_schema, target_schema, stylesheet, &cancel)
}

/// Same as [`run_analysis`], taking an explicit [`CancelToken`] so an
/// embedder can bound or interrupt the run.
pub fn run_analysis_with_cancel(
    source_schema: &str,
    target_schema: &str,
    stylesheet: &str,
    cancel: &CancelToken,
) -> AnalysisResult {
    let stylesheet_tree = match xmltree::parse(stylesheet, InputSource::Stylesheet) {
        Ok(tree) => tree,
        Err(e) => return AnalysisResult::failed(e.to_string()),
    };

    let subset_check = linter::lint(&stylesheet_tree);
    info!(
        "linter done: valid={} errors={} warnings={}",
        subset_check.valid,
        subset_check.errors.len(),
        subset_check.warnings.len()
    );
    if !subset_check.valid {
        return AnalysisResult {
            valid: false,
            error: Some("stylesheet uses constructs outside the analyzable subset".to_string()),
            subset_check: Some(subset_check),
            source_grammar: None,
            target_grammar: None,
            mtt: None,
            type_validation: None,
            preimage: None,
            validity: None,
        };
    }

    let source_tree = match xmltree::parse(source_schema, InputSource::SourceSchema) {
        Ok(tree) => tree,
        Err(e) => return AnalysisResult::failed(e.to_string()),
    };
    let target_tree = match xmltree::parse(target_schema, InputSource::TargetSchema) {
        Ok(tree) => tree,
        Err(e) => return AnalysisResult::failed(e.to_string()),
    };

    // B_S and B_T have no data dependency; run them on two
    // scoped threads rather than sequentially.
    let (source_result, target_result) = std::thread::scope(|scope| {
        let target_handle = scope.spawn(|| grammar::build(&target_tree, InputSource::TargetSchema));
        let source_result = grammar::build(&source_tree, InputSource::SourceSchema);
        let target_result = target_handle.join().expect("target grammar thread panicked");
        (source_result, target_result)
    });

    let source_build = match source_result {
        Ok(b) => b,
        Err(e) => return AnalysisResult::failed(e.to_string()),
    };
    let target_build = match target_result {
        Ok(b) => b,
        Err(e) => return AnalysisResult::failed(e.to_string()),
    };
    if let Err(e) = cancel.check(
        source_build.grammar.productions.len(),
        InputSource::SourceSchema,
        "source grammar productions",
    ) {
        return AnalysisResult::failed(e.to_string());
    }
    if let Err(e) = cancel.check(
        target_build.grammar.productions.len(),
        InputSource::TargetSchema,
        "target grammar productions",
    ) {
        return AnalysisResult::failed(e.to_string());
    }
    debug!(
        "grammars built: source_productions={} target_productions={}",
        source_build.grammar.productions.len(),
        target_build.grammar.productions.len()
    );

    #[cfg(feature = "invariant_violations")]
    {
        debug_assert!(
            source_build.grammar.root_has_production(),
            "grammar::build produced a source grammar whose root has no production"
        );
        debug_assert!(
            source_build.grammar.every_symbol_resolves(),
            "grammar::build produced a source grammar with a dangling nonterminal"
        );
        debug_assert!(
            target_build.grammar.root_has_production(),
            "grammar::build produced a target grammar whose root has no production"
        );
        debug_assert!(
            target_build.grammar.every_symbol_resolves(),
            "grammar::build produced a target grammar with a dangling nonterminal"
        );
    }

    let mtt = match mtt::build(&stylesheet_tree) {
        Ok(m) => m,
        Err(e) => return AnalysisResult::failed(e.to_string()),
    };
    if let Err(e) = cancel.check(mtt.rules.len(), InputSource::Stylesheet, "MTT rules") {
        return AnalysisResult::failed(e.to_string());
    }
    debug!("MTT built: rules={}", mtt.rules.len());

    #[cfg(feature = "invariant_violations")]
    {
        debug_assert!(
            mtt.every_callee_is_a_state(),
            "mtt::build produced an apply-templates callee with no matching state"
        );
        debug_assert!(
            mtt.rules_are_pairwise_distinct(),
            "mtt::build produced two rules with identical (state, lhs_pattern, guard)"
        );
    }

    let type_validation = validator::validate(&source_build.grammar, &target_build.grammar, &mtt);
    debug!(
        "validator done: valid={} errors={} warnings={}",
        type_validation.valid,
        type_validation.errors.len(),
        type_validation.warnings.len()
    );

    let preimage = preimage::compute(&target_build.grammar, &mtt, &source_build.grammar);
    debug!(
        "preimage done: accepted={} rejected={} validity={}",
        preimage.accepted_patterns.len(),
        preimage.rejected_patterns.len(),
        preimage.validity.valid
    );

    let valid = type_validation.valid && preimage.validity.valid;
    info!("analysis complete: valid={}", valid);

    AnalysisResult {
        valid,
        error: None,
        subset_check: Some(subset_check),
        source_grammar: Some(source_build.grammar),
        target_grammar: Some(target_build.grammar),
        mtt: Some(mtt),
        type_validation: Some(type_validation),
        validity: Some(preimage.validity.clone()),
        preimage: Some(preimage),
    }
}

/// Diagnostic endpoint: the subset linter alone.
pub fn lint_stylesheet(stylesheet: &str) -> Result<LintResult, PipelineError> {
    let tree = xmltree::parse(stylesheet, InputSource::Stylesheet)?;
    Ok(linter::lint(&tree))
}

/// Diagnostic endpoint: one schema translated to a grammar.
/// Non-fatal downgrade warnings are folded into
/// the returned grammar's sibling diagnostics by the caller if needed;
/// here they are surfaced as an accompanying list.
pub fn schema_to_grammar(
    schema: &str,
    source: InputSource,
) -> Result<grammar::errors::GrammarBuildOutput, PipelineError> {
    let tree = xmltree::parse(schema, source)?;
    grammar::build(&tree, source)
}

/// Diagnostic endpoint: the stylesheet translated to an MTT.
pub fn stylesheet_to_mtt(stylesheet: &str) -> Result<Mtt, PipelineError> {
    let tree = xmltree::parse(stylesheet, InputSource::Stylesheet)?;
    mtt::build(&tree)
}

/// Diagnostic endpoint: type-preservation validation plus preimage and
/// validity, skipping the subset-linter gate — the caller is assumed to have already
/// established the stylesheet lies in the analyzable subset.
pub fn validate_and_check(
    source_schema: &str,
    target_schema: &str,
    stylesheet: &str,
) -> Result<(ValidationResult, PreimageResult), PipelineError> {
    let source_tree = xmltree::parse(source_schema, InputSource::SourceSchema)?;
    let target_tree = xmltree::parse(target_schema, InputSource::TargetSchema)?;
    let stylesheet_tree = xmltree::parse(stylesheet, InputSource::Stylesheet)?;

    let source = grammar::build(&source_tree, InputSource::SourceSchema)?.grammar;
    let target = grammar::build(&target_tree, InputSource::TargetSchema)?.grammar;
    let mtt = mtt::build(&stylesheet_tree)?;

    let type_validation = validator::validate(&source, &target, &mtt);
    let preimage = preimage::compute(&target, &mtt, &source);
    Ok((type_validation, preimage))
}

#[cfg(test)]
mod tests {
    use super::*;

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

    const GUARDED_STYLESHEET: &str = r#"<stylesheet>
        <template match="Person">
            <if test="Age &gt;= 0">
                <Individual fullname="{Name}" years="{Age}"/>
            </if>
        </template>
    </stylesheet>"#;

    #[test]
    fn full_analysis_of_the_guarded_scenario_is_valid() {
        let result = run_analysis(PERSON_SCHEMA, INDIVIDUAL_SCHEMA, GUARDED_STYLESHEET);
        assert!(result.valid, "{:?}", result.error);
        assert!(result.subset_check.unwrap().valid);
        assert!(result.source_grammar.is_some());
        assert!(result.target_grammar.is_some());
        assert!(result.mtt.is_some());
        assert!(result.type_validation.unwrap().valid);
        assert!(result.preimage.unwrap().validity.valid);
        assert!(result.validity.unwrap().valid);
    }

    #[test]
    fn disallowed_construct_halts_before_any_grammar_is_built() {
        let stylesheet = r#"<stylesheet>
            <template match="Person"><variable name="x"/></template>
        </stylesheet>"#;
        let result = run_analysis(PERSON_SCHEMA, INDIVIDUAL_SCHEMA, stylesheet);
        assert!(!result.valid);
        assert!(result.subset_check.is_some());
        assert!(result.source_grammar.is_none());
        assert!(result.mtt.is_none());
    }

    #[test]
    fn malformed_xml_halts_with_an_error_message() {
        let result = run_analysis("<schema><unterminated", INDIVIDUAL_SCHEMA, GUARDED_STYLESHEET);
        assert!(!result.valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn lint_stylesheet_endpoint_reports_the_linter_alone() {
        let result = lint_stylesheet(GUARDED_STYLESHEET).unwrap();
        assert!(result.valid);
    }

    #[test]
    fn schema_to_grammar_endpoint_builds_a_standalone_grammar() {
        let output = schema_to_grammar(PERSON_SCHEMA, InputSource::SourceSchema).unwrap();
        assert_eq!(output.grammar.root, "Person");
    }

    #[test]
    fn stylesheet_to_mtt_endpoint_builds_a_standalone_mtt() {
        let mtt = stylesheet_to_mtt(GUARDED_STYLESHEET).unwrap();
        assert_eq!(mtt.rules.len(), 1);
    }

    #[test]
    fn validate_and_check_skips_the_linter_gate() {
        let (validation, preimage) =
            validate_and_check(PERSON_SCHEMA, INDIVIDUAL_SCHEMA, GUARDED_STYLESHEET).unwrap();
        assert!(validation.valid);
        assert!(preimage.validity.valid);
    }
}
