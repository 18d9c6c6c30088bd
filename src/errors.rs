//! Pipeline-wide error and diagnostic types.
//!
//! Input malformation, subset violation, and schema defect all short-circuit
//! the pipeline and are represented here as [`PipelineError`], an ordinary
//! `Result::Err`. Semantic mismatches and validity gaps never abort
//! anything; they accumulate as [`Diagnostic`] records inside a
//! [`crate::reports::ProofTrace`] or a validity counterexample list.

use std::fmt;

/// Where a diagnostic or error originates in one of the three input texts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    /// Human-readable path, e.g. `/stylesheet/template[2]/if`.
    pub path: String,
    /// Byte offset into the originating text, if known.
    pub byte_offset: Option<usize>,
}

impl Location {
    pub fn new(path: impl Into<String>) -> Self {
        Location {
            path: path.into(),
            byte_offset: None,
        }
    }

    pub fn at(path: impl Into<String>, byte_offset: usize) -> Self {
        Location {
            path: path.into(),
            byte_offset: Some(byte_offset),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.byte_offset {
            Some(off) => write!(f, "{} (byte {})", self.path, off),
            None => write!(f, "{}", self.path),
        }
    }
}

/// Malformed input, subset violations, and schema defects without a safe
/// default. Each short-circuits the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Non-parseable XML in one of the three inputs.
    InputMalformation {
        source: InputSource,
        message: String,
        byte_offset: Option<usize>,
    },
    /// The stylesheet uses a disallowed construct or omits a required
    /// attribute. Carries the linter diagnostics that caused the halt.
    SubsetViolation { message: String, location: Location },
    /// A schema defect that does not admit a safe default: an undefined
    /// type reference that could not even be downgraded, a circular
    /// definition that never terminates, or cardinality with `hi < lo`.
    SchemaDefect {
        schema: InputSource,
        message: String,
        location: Location,
    },
    /// An MTT could not be constructed deterministically: two templates
    /// share `match` + `mode` and their guards are not provably disjoint.
    MttConstruction { message: String, location: Location },
}

/// Which of the three input blobs an error or diagnostic originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    SourceSchema,
    TargetSchema,
    Stylesheet,
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InputSource::SourceSchema => "source schema",
            InputSource::TargetSchema => "target schema",
            InputSource::Stylesheet => "stylesheet",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InputMalformation {
                source, message, ..
            } => write!(f, "malformed {}: {}", source, message),
            PipelineError::SubsetViolation { message, location } => {
                write!(f, "subset violation at {}: {}", location, message)
            }
            PipelineError::SchemaDefect {
                schema,
                message,
                location,
            } => write!(f, "{} defect at {}: {}", schema, location, message),
            PipelineError::MttConstruction { message, location } => {
                write!(f, "MTT construction error at {}: {}", location, message)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// Severity of a [`Diagnostic`]. `Error` makes the enclosing validation
/// result invalid without aborting the pipeline; `Warning` and `Info`/`Ok`
/// are advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Ok,
    Warn,
    Error,
}

/// A single append-only proof-trace / diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Byte offset into the originating text, used by `reports::pretty_print`
    /// to anchor an `ariadne` span. Most diagnostics only carry a tree
    /// `path`; this is set by callers that parsed a byte-addressable span
    /// (e.g. the linter's node walk).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_offset: Option<usize>,
}

impl Diagnostic {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Diagnostic {
            level,
            message: message.into(),
            path: None,
            byte_offset: None,
        }
    }

    pub fn at(level: Level, message: impl Into<String>, path: impl Into<String>) -> Self {
        Diagnostic {
            level,
            message: message.into(),
            path: Some(path.into()),
            byte_offset: None,
        }
    }

    pub fn with_offset(mut self, byte_offset: usize) -> Self {
        self.byte_offset = Some(byte_offset);
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }

    pub fn is_warning(&self) -> bool {
        self.level == Level::Warn
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(p) => write!(f, "[{:?}] {} ({})", self.level, self.message, p),
            None => write!(f, "[{:?}] {}", self.level, self.message),
        }
    }
}
