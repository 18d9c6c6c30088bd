//! Diagnostics produced while translating a schema into a [`super::Grammar`].

use crate::errors::{Diagnostic, Level, Location, PipelineError};

/// Non-fatal conditions the schema-to-grammar translator downgrades to a
/// warning rather than aborting the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarWarning {
    /// `type="foo:Bar"` did not resolve to any known complex or simple
    /// type; downgraded to `xs:string`.
    UnknownTypeDowngraded { element: String, type_name: String },
}

impl GrammarWarning {
    pub fn into_diagnostic(self) -> Diagnostic {
        match self {
            GrammarWarning::UnknownTypeDowngraded { element, type_name } => Diagnostic::at(
                Level::Warn,
                format!(
                    "element `{}` references unknown type `{}`; downgraded to string",
                    element, type_name
                ),
                format!("/schema//element[@name='{}']", element),
            ),
        }
    }
}

/// Result of building a grammar: the grammar plus any downgrade warnings.
pub struct GrammarBuildOutput {
    pub grammar: super::Grammar,
    pub warnings: Vec<GrammarWarning>,
}

/// Non-fatal-to-the-enum, but still used to construct a [`PipelineError`]
/// when a schema defect admits no safe default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// `minOccurs`/`maxOccurs` produced `hi < lo`.
    InvalidCardinality { element: String, lo: u32, hi: u32 },
    /// A `ref=` attribute pointed at an element that was never declared.
    DanglingRef { element: String, ref_name: String },
    /// No top-level element was found to serve as the grammar root.
    NoRootElement,
}

impl GrammarError {
    pub fn into_pipeline_error(self, schema: crate::errors::InputSource) -> PipelineError {
        let (message, path) = match &self {
            GrammarError::InvalidCardinality { element, lo, hi } => (
                format!(
                    "cardinality (lo={}, hi={}) has hi < lo on element `{}`",
                    lo, hi, element
                ),
                format!("//element[@name='{}']", element),
            ),
            GrammarError::DanglingRef { element, ref_name } => (
                format!(
                    "element `{}` has ref=\"{}\" which is never declared",
                    element, ref_name
                ),
                format!("//element[@ref='{}']", ref_name),
            ),
            GrammarError::NoRootElement => (
                "schema declares no top-level element to serve as the grammar root".to_string(),
                "/schema".to_string(),
            ),
        };
        PipelineError::SchemaDefect {
            schema,
            message,
            location: Location::new(path),
        }
    }
}
