//! Macro tree transducers: the stylesheet-to-MTT output.

mod builder;
pub mod errors;
pub mod predicate;

pub use builder::build;
pub use errors::MttError;
pub use predicate::Predicate;

pub use MttRuleBuilder as RuleBuilder;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// An attribute on a `literal_element` output node: either a literal
/// string or a single-segment attribute-value template resolved against
/// the matched node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttrValue {
    Literal(String),
    ValueExpr(String),
}

/// One output attribute: its target name plus value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputAttr {
    pub name: String,
    pub value: AttrValue,
}

/// A `when(test, body)` or trailing `otherwise(body)` arm of a `choose`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChooseBranch {
    /// `None` marks the trailing `otherwise` arm.
    pub test: Option<String>,
    pub body: Vec<RhsOutput>,
}

/// The output-tree skeleton. A closed, exhaustively matched tagged sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RhsOutput {
    Element {
        name: String,
        attrs: Vec<OutputAttr>,
        children: Vec<RhsOutput>,
    },
    Text {
        literal: String,
    },
    ValueOf {
        path: String,
    },
    ApplyTemplates {
        select: String,
        callee: String,
    },
    ForEach {
        select: String,
        body: Vec<RhsOutput>,
        list_state: String,
    },
    If {
        test: String,
        then: Vec<RhsOutput>,
    },
    Choose {
        branches: Vec<ChooseBranch>,
    },
}

/// `lhs_pattern`: the element this rule matches, and either a literal
/// child-name list or the `*`/`children` wildcard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LhsPattern {
    pub element: String,
    /// `None` means the `*`/`children` wildcard ("any").
    pub children: Option<Vec<String>>,
}

impl LhsPattern {
    pub fn any(element: impl Into<String>) -> Self {
        LhsPattern {
            element: element.into(),
            children: None,
        }
    }
}

/// One MTT rule. Built via [`MttRuleBuilder`] at its one
/// construction site (the stylesheet-to-MTT translator) — `derive_builder`
/// suits a multi-field struct like this one with no natural single
/// dominant field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(pattern = "owned")]
pub struct MttRule {
    pub state: String,
    pub lhs_pattern: LhsPattern,
    /// Mirror of a top-level `if.test` wrapping the whole template body,
    /// preserved for downstream analysis.
    pub guard: Option<Predicate>,
    pub guard_text: Option<String>,
    pub rhs_output: Vec<RhsOutput>,
}

/// A macro tree transducer, M = (Q, Σ_in, Σ_out, q₀, R).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mtt {
    pub states: Vec<String>,
    pub initial_state: String,
    pub rules: Vec<MttRule>,
    pub input_alphabet: Vec<String>,
    pub output_alphabet: Vec<String>,
}

impl Mtt {
    pub fn rules_for_state(&self, state: &str) -> impl Iterator<Item = &MttRule> {
        self.rules.iter().filter(move |r| r.state == state)
    }

    pub fn rules_for_element(&self, element: &str) -> impl Iterator<Item = &MttRule> {
        self.rules.iter().filter(move |r| r.lhs_pattern.element == element)
    }

    pub fn has_state(&self, state: &str) -> bool {
        self.states.iter().any(|s| s == state)
    }

    /// Every `callee` referenced by any `apply_templates` node is a state
    /// of the MTT.
    pub fn every_callee_is_a_state(&self) -> bool {
        fn check(nodes: &[RhsOutput], mtt: &Mtt) -> bool {
            nodes.iter().all(|n| match n {
                RhsOutput::ApplyTemplates { callee, .. } => mtt.has_state(callee),
                RhsOutput::Element { children, .. } => check(children, mtt),
                RhsOutput::ForEach { body, .. } => check(body, mtt),
                RhsOutput::If { then, .. } => check(then, mtt),
                RhsOutput::Choose { branches } => branches.iter().all(|b| check(&b.body, mtt)),
                RhsOutput::Text { .. } | RhsOutput::ValueOf { .. } => true,
            })
        }
        self.rules.iter().all(|r| check(&r.rhs_output, self))
    }

    /// Pairwise-distinct `(state, lhs_pattern, guard)` triples.
    pub fn rules_are_pairwise_distinct(&self) -> bool {
        for (i, a) in self.rules.iter().enumerate() {
            for b in self.rules.iter().skip(i + 1) {
                if a.state == b.state && a.lhs_pattern == b.lhs_pattern && a.guard == b.guard {
                    return false;
                }
            }
        }
        true
    }
}
