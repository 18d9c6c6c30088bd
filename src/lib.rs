//! Static analysis of tree-to-tree transformation stylesheets.
//!
//! Given a source schema, a target schema, and a restricted stylesheet that
//! maps trees accepted by the source schema to trees, this crate decides
//! whether the stylesheet stays inside an analyzable syntactic subset and,
//! if so, whether it is type-preserving and valid with respect to the two
//! schemas. See `pipeline` for the five-stage analysis and `api` for the
//! external request surface.

pub mod env;
pub mod errors;
pub mod xmltree;

pub mod linter;
pub mod grammar;
pub mod mtt;
pub mod validator;
pub mod preimage;

pub mod reports;
pub mod helpers;

pub mod api;

pub use errors::PipelineError;
pub use api::{run_analysis, AnalysisResult};
