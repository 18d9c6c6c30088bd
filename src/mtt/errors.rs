//! Diagnostics produced while translating a stylesheet into an
//! [`super::Mtt`].

use crate::errors::{Location, PipelineError};

/// MTT-construction errors: these are reported
/// as `SchemaDefect`-shaped pipeline errors rather than accumulated,
/// because an ambiguous or dangling MTT cannot be analyzed at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MttError {
    /// Two templates share `match` + `mode` and their guards are not
    /// provably disjoint.
    AmbiguousTemplates {
        match_expr: String,
        mode: String,
    },
}

impl MttError {
    pub fn into_pipeline_error(self) -> PipelineError {
        let (message, path) = match &self {
            MttError::AmbiguousTemplates { match_expr, mode } => (
                format!(
                    "templates matching `{}` in mode `{}` are ambiguous: same match+mode and guards are not provably disjoint",
                    match_expr, mode
                ),
                format!("/stylesheet/template[@match='{}']", match_expr),
            ),
        };
        PipelineError::MttConstruction {
            message,
            location: Location::new(path),
        }
    }
}
