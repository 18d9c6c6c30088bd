//! Proof-trace and presentation helpers shared by the validator and
//! preimage/validity components, plus the CLI's pretty-printing.

mod pretty_print;
pub mod coverage_table;

pub use pretty_print::{render_diagnostic, render_trace};

use serde::{Deserialize, Serialize};

use crate::errors::{Diagnostic, Level};

/// An append-only, ordered log of `{level, message}` records. Shared by the validator and preimage/validity
/// components for their textual output; ordering is a load-bearing
/// contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofTrace(Vec<Diagnostic>);

impl ProofTrace {
    pub fn new() -> Self {
        ProofTrace(Vec::new())
    }

    pub fn push(&mut self, level: Level, message: impl Into<String>) {
        self.0.push(Diagnostic::new(level, message));
    }

    pub fn push_at(&mut self, level: Level, message: impl Into<String>, path: impl Into<String>) {
        self.0.push(Diagnostic::at(level, message, path));
    }

    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a ProofTrace {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
