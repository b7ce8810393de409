//! Probabilistic hybrid model layer.
//!
//! A `.pdrh` file is a plain dReach `.drh` model extended with
//! random-variable declarations (`random uniform(0, 1) lambda;`). Lowering
//! strips the declarations and produces a deterministic template with one
//! `#define` slot per random variable; sampling draws an ordered tuple of
//! rendered values (the *assignment*); instantiation substitutes them and
//! writes the per-worker model file the reachability oracle consumes.

pub mod dist;
pub mod pdrh;

pub use dist::Dist;
pub use pdrh::{Model, RandomVar};

use thiserror::Error;

/// Model loading or instantiation error.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cannot open model file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line_no}: bad random variable declaration: {reason}")]
    BadDistribution { line_no: usize, reason: String },

    #[error("line {line_no}: duplicate random variable `{name}`")]
    DuplicateRv { line_no: usize, name: String },

    #[error("template has no slot for random variable `{name}`")]
    MissingPlaceholder { name: String },

    #[error("assignment has {got} values but the model declares {want} random variables")]
    AssignmentArity { got: usize, want: usize },
}

pub type ModelResult<T> = Result<T, ModelError>;
