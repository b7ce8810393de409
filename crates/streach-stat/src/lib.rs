//! Sequential statistical procedures over a Bernoulli trial stream.
//!
//! Each procedure consumes a running tally `(n, x)` of trials and successes
//! and decides, at each update, whether enough evidence has accumulated.
//! Hypothesis tests (SPRT, BFT, BFTI, Lai) accept or reject the null
//! hypothesis `[theta, 1]`; estimators (CHB, NSAM, BEST) produce a point
//! estimate of the success probability.

pub mod estimate;
pub mod hypothesis;
pub mod spec;

pub use estimate::{Best, Chb, Nsam};
pub use hypothesis::{Bft, Bfti, Lai, Sprt};
pub use spec::{load_spec_file, load_spec_str, parse_line};

use statrs::distribution::{Beta, ContinuousCDF};
use thiserror::Error;

/// Spec parsing or validation error.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("{line}: {reason}")]
    BadSpec { line: String, reason: String },

    #[error("unknown test keyword `{keyword}`: {line}")]
    UnknownKeyword { line: String, keyword: String },

    #[error("cannot open test file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type SpecResult<T> = Result<T, SpecError>;

/// Verdict of a completed hypothesis test.
///
/// The null hypothesis is the interval `[theta, 1]` (or `[theta2, 1]` with an
/// indifference region); accepting it claims the true success probability is
/// at least the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    AcceptNull,
    RejectNull,
}

/// Where a procedure stands: still sampling, or decided with its verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Status {
    Open,
    Hypothesis(Decision),
    Estimate(f64),
}

/// Tally snapshot frozen at the moment a procedure decides.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Decided<T> {
    pub outcome: T,
    pub samples: u64,
    pub successes: u64,
}

/// Regularized incomplete beta `I_x(a, b)`, i.e. the CDF of `Beta(a, b)`.
pub(crate) fn beta_cdf(x: f64, a: f64, b: f64) -> f64 {
    // Shape parameters are validated strictly positive at spec load, and the
    // posterior shapes x+alpha, n-x+beta inherit that.
    Beta::new(a, b)
        .expect("beta shape parameters are validated positive")
        .cdf(x)
}

pub(crate) fn ensure(cond: bool, line: &str, reason: &str) -> SpecResult<()> {
    if cond {
        Ok(())
    } else {
        Err(SpecError::BadSpec {
            line: line.to_string(),
            reason: reason.to_string(),
        })
    }
}

/// One sequential statistical procedure.
///
/// A tagged sum over the seven supported kinds; dispatch is a plain match,
/// with `report` attached to each variant rather than recovered through
/// runtime type inspection.
#[derive(Debug)]
pub enum Procedure {
    Sprt(Sprt),
    Bft(Bft),
    Bfti(Bfti),
    Lai(Lai),
    Chb(Chb),
    Nsam(Nsam),
    Best(Best),
}

impl Procedure {
    /// Feed the cumulative tally `(n, x)`. Idempotent once decided.
    pub fn observe(&mut self, n: u64, x: u64) {
        match self {
            Procedure::Sprt(p) => p.observe(n, x),
            Procedure::Bft(p) => p.observe(n, x),
            Procedure::Bfti(p) => p.observe(n, x),
            Procedure::Lai(p) => p.observe(n, x),
            Procedure::Chb(p) => p.observe(n, x),
            Procedure::Nsam(p) => p.observe(n, x),
            Procedure::Best(p) => p.observe(n, x),
        }
    }

    /// Current state: `Open` until the procedure decides.
    pub fn status(&self) -> Status {
        match self {
            Procedure::Sprt(p) => p.decision().map_or(Status::Open, Status::Hypothesis),
            Procedure::Bft(p) => p.decision().map_or(Status::Open, Status::Hypothesis),
            Procedure::Bfti(p) => p.decision().map_or(Status::Open, Status::Hypothesis),
            Procedure::Lai(p) => p.decision().map_or(Status::Open, Status::Hypothesis),
            Procedure::Chb(p) => p.estimate().map_or(Status::Open, Status::Estimate),
            Procedure::Nsam(p) => p.estimate().map_or(Status::Open, Status::Estimate),
            Procedure::Best(p) => p.estimate().map_or(Status::Open, Status::Estimate),
        }
    }

    /// Whether the procedure has decided.
    pub fn done(&self) -> bool {
        match self {
            Procedure::Sprt(p) => p.done(),
            Procedure::Bft(p) => p.done(),
            Procedure::Bfti(p) => p.done(),
            Procedure::Lai(p) => p.done(),
            Procedure::Chb(p) => p.done(),
            Procedure::Nsam(p) => p.done(),
            Procedure::Best(p) => p.done(),
        }
    }

    /// Human-readable result line; `None` until the procedure decides.
    pub fn report(&self) -> Option<String> {
        match self {
            Procedure::Sprt(p) => p.report(),
            Procedure::Bft(p) => p.report(),
            Procedure::Bfti(p) => p.report(),
            Procedure::Lai(p) => p.report(),
            Procedure::Chb(p) => p.report(),
            Procedure::Nsam(p) => p.report(),
            Procedure::Best(p) => p.report(),
        }
    }

    /// Canonical spec text the procedure was built from.
    pub fn spec_text(&self) -> &str {
        match self {
            Procedure::Sprt(p) => p.spec_text(),
            Procedure::Bft(p) => p.spec_text(),
            Procedure::Bfti(p) => p.spec_text(),
            Procedure::Lai(p) => p.spec_text(),
            Procedure::Chb(p) => p.spec_text(),
            Procedure::Nsam(p) => p.spec_text(),
            Procedure::Best(p) => p.spec_text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beta_cdf_uniform_prior_is_identity() {
        // Beta(1, 1) is uniform on [0, 1].
        assert!((beta_cdf(0.3, 1.0, 1.0) - 0.3).abs() < 1e-12);
        assert!((beta_cdf(0.5, 1.0, 1.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn beta_cdf_integer_shapes_match_binomial_sum() {
        // I_x(a, b) with integer shapes equals P(Bin(a+b-1, x) >= a).
        // Beta(10, 2) at 0.5: sum_{j=10}^{11} C(11, j) / 2^11 = 12 / 2048.
        let exact = 12.0 / 2048.0;
        assert!((beta_cdf(0.5, 10.0, 2.0) - exact).abs() < 1e-12);
    }

    #[test]
    fn status_tracks_the_decision() {
        let mut proc = spec::parse_line("SPRT 0.5 100 0.1").unwrap().unwrap();
        assert_eq!(proc.status(), Status::Open);
        proc.observe(100, 95);
        assert_eq!(proc.status(), Status::Hypothesis(Decision::AcceptNull));

        let mut proc = spec::parse_line("NSAM 10").unwrap().unwrap();
        assert_eq!(proc.status(), Status::Open);
        proc.observe(10, 5);
        assert_eq!(proc.status(), Status::Estimate(0.5));
    }
}
