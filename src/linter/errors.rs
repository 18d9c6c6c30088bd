//! Diagnostic categories the linter can raise.
//!
//! The linter itself represents diagnostics as plain [`crate::errors::Diagnostic`]
//! records (so they compose uniformly with the rest of the proof trace);
//! this enum exists for callers that want to branch on *why* a stylesheet
//! was rejected without re-parsing the diagnostic message.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinterDiagnosticKind {
    /// A tag in the stylesheet namespace outside the closed allowed set.
    Disallowed,
    /// One of the dedicated reserved-and-disallowed constructs
    /// (`variable`, `copy-of`, ...).
    ReservedDisallowed,
    /// A required attribute (`match`, `test`, `select`) is missing.
    MissingRequiredAttribute,
    /// `choose` with no `when` child.
    EmptyChoose,
    /// A multi-segment attribute-value template.
    MultiSegmentTemplate,
    /// A complex pattern (`//`, `ancestor::`, `following::`) in `match`.
    ComplexPattern,
    /// A complex string-function call in `test`/`select`.
    ComplexFunction,
}
