//! Parallel Bernoulli-trial driver for statistical reachability analysis.
//!
//! Workers repeatedly sample the model's random parameters, deduplicate
//! repeated assignments through a memoization table, hand fresh assignments
//! to the external reachability oracle, and feed the aggregated tally into
//! the sequential statistical procedures until every procedure has decided.

pub mod cache;
pub mod driver;
pub mod oracle;

pub use cache::TrialCache;
pub use driver::{DriveConfig, DriveOutcome, Driver};
pub use oracle::{locate_output, DreachOracle, Oracle};

use thiserror::Error;

/// The ordered tuple of rendered parameter values drawn for one trial.
/// Two assignments are equal iff every value is byte-identical.
pub type Assignment = Vec<String>;

/// Outcome of one oracle evaluation: is the goal region reachable under the
/// sampled parameters?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Sat,
    Unsat,
}

/// One Bernoulli trial: the sampled assignment and the verdict it produced.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trial {
    pub assignment: Assignment,
    pub verdict: Verdict,
}

/// Driver or oracle error. All of these are fatal: every sample is expensive
/// and a corrupted Bernoulli stream would invalidate the statistics.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error(transparent)]
    Model(#[from] streach_model::ModelError),

    #[error("oracle failed: {reason}")]
    OracleFailed { reason: String },

    #[error("cannot open oracle output {path}: {source}")]
    CannotOpenOutput {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("oracle returned conflicting verdicts for assignment ({})", .assignment.join(", "))]
    OracleNondeterministic { assignment: Assignment },

    #[error("cannot prepare work directory {path}: {source}")]
    WorkDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type DriveResult<T> = Result<T, DriveError>;
