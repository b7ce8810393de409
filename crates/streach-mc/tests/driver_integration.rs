//! End-to-end driver scenarios against mock oracles with a fixed sat bias.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Barrier;
use streach_mc::{Assignment, DriveConfig, DriveError, DriveResult, Driver, Oracle, Verdict};
use streach_model::Model;
use streach_stat::{load_spec_str, Decision, Procedure, Status};

const ONE_RV_MODEL: &str = "random uniform(0, 1) rate;\ngoal: @1 (x >= 9);\n";
const NO_RV_MODEL: &str = "goal: @1 (x >= 9);\n";

/// Deterministic per-assignment verdicts with marginal sat probability `p`.
struct BiasedOracle {
    p: f64,
}

impl Oracle for BiasedOracle {
    fn evaluate(&self, assignment: &Assignment, _wid: usize) -> DriveResult<Verdict> {
        let mut hasher = DefaultHasher::new();
        assignment.hash(&mut hasher);
        let frac = hasher.finish() as f64 / u64::MAX as f64;
        Ok(if frac < self.p {
            Verdict::Sat
        } else {
            Verdict::Unsat
        })
    }
}

fn run(model: &str, spec: &str, p: f64, workers: usize) -> streach_mc::DriveOutcome {
    let model = Model::parse(model).unwrap();
    let procedures = load_spec_str(spec).unwrap();
    Driver::new(model, BiasedOracle { p }, DriveConfig { workers })
        .run(procedures)
        .unwrap()
}

#[test]
fn certain_sat_accepts_the_null_hypothesis() {
    let outcome = run(ONE_RV_MODEL, "SPRT 0.5 100 0.1", 1.0, 4);
    assert_eq!(
        outcome.procedures[0].status(),
        Status::Hypothesis(Decision::AcceptNull)
    );
    assert_eq!(outcome.reports.len(), 1);
    assert!(outcome.reports[0].contains("Accept Null hypothesis"));
    assert_eq!(outcome.samples % 4, 0, "samples must be a multiple of W");
    assert_eq!(outcome.successes, outcome.samples);
}

#[test]
fn certain_unsat_rejects_the_null_hypothesis() {
    let outcome = run(ONE_RV_MODEL, "SPRT 0.5 100 0.1", 0.0, 4);
    assert_eq!(
        outcome.procedures[0].status(),
        Status::Hypothesis(Decision::RejectNull)
    );
    assert_eq!(outcome.successes, 0);
}

#[test]
fn strongly_biased_sampling_accepts_null_by_bayes_factor() {
    let outcome = run(ONE_RV_MODEL, "BFT 0.5 1000 1 1", 0.9, 4);
    match &outcome.procedures[0] {
        Procedure::Bft(bft) => assert_eq!(bft.decision(), Some(Decision::AcceptNull)),
        other => panic!("expected BFT, got {other:?}"),
    }
}

#[test]
fn mixed_spec_terminates_after_the_slower_procedure() {
    // CHB 0.1 0.9 fixes N = 116; SPRT under certain sat decides within a few
    // rounds, so the run length is governed by the bound.
    let outcome = run(ONE_RV_MODEL, "CHB 0.1 0.9\nSPRT 0.5 100 0.1", 1.0, 3);
    assert_eq!(outcome.reports.len(), 2);
    // Reports come in finish order, procedures stay in spec order.
    assert!(outcome.reports[0].starts_with("SPRT"));
    assert!(outcome.reports[1].starts_with("CHB"));
    assert!(matches!(outcome.procedures[0], Procedure::Chb(_)));

    // The bound is overshot by at most W - 1.
    assert!(outcome.samples >= 116);
    assert!(outcome.samples < 116 + 3);
    assert_eq!(outcome.samples % 3, 0);
}

#[test]
fn nominal_stop_overshoots_by_less_than_a_round() {
    let outcome = run(ONE_RV_MODEL, "NSAM 10", 0.5, 4);
    assert_eq!(outcome.samples, 12);
    assert_eq!(outcome.rounds, 3);
}

#[test]
fn chb_estimate_tracks_the_oracle_bias() {
    let outcome = run(ONE_RV_MODEL, "CHB 0.05 0.9", 0.5, 4);
    match &outcome.procedures[0] {
        Procedure::Chb(chb) => {
            let estimate = chb.estimate().unwrap();
            assert!(
                (estimate - 0.5).abs() < 0.1,
                "estimate {estimate} too far from the bias"
            );
        }
        other => panic!("expected CHB, got {other:?}"),
    }
}

#[test]
fn repeated_assignments_skip_the_oracle_but_count_as_trials() {
    // With no random variables every sample is the same empty assignment:
    // the oracle runs at most once per worker in the first round, and every
    // later trial is served by the cache yet still enters the tally.
    let outcome = run(NO_RV_MODEL, "NSAM 10", 1.0, 2);
    assert_eq!(outcome.samples, 10);
    assert_eq!(outcome.successes, 10);
    assert_eq!(outcome.distinct_assignments, 1);
    assert!(outcome.cache_hits >= outcome.samples - 2);
}

/// Returns a different verdict per worker for the same (empty) assignment;
/// an internal barrier forces both workers past the cache lookup before
/// either records, so the conflict is guaranteed to reach the cache.
struct ConflictingOracle {
    rendezvous: Barrier,
}

impl Oracle for ConflictingOracle {
    fn evaluate(&self, _assignment: &Assignment, wid: usize) -> DriveResult<Verdict> {
        self.rendezvous.wait();
        Ok(if wid == 0 { Verdict::Sat } else { Verdict::Unsat })
    }
}

#[test]
fn conflicting_verdicts_for_one_assignment_abort_the_run() {
    let model = Model::parse(NO_RV_MODEL).unwrap();
    let procedures = load_spec_str("NSAM 100").unwrap();
    let oracle = ConflictingOracle {
        rendezvous: Barrier::new(2),
    };
    let err = Driver::new(model, oracle, DriveConfig { workers: 2 })
        .run(procedures)
        .unwrap_err();
    match err {
        DriveError::OracleNondeterministic { assignment } => assert!(assignment.is_empty()),
        other => panic!("expected OracleNondeterministic, got {other:?}"),
    }
}

struct FailingOracle;

impl Oracle for FailingOracle {
    fn evaluate(&self, _assignment: &Assignment, _wid: usize) -> DriveResult<Verdict> {
        Err(DriveError::OracleFailed {
            reason: "solver crashed".to_string(),
        })
    }
}

#[test]
fn oracle_failure_is_fatal() {
    let model = Model::parse(ONE_RV_MODEL).unwrap();
    let procedures = load_spec_str("NSAM 100").unwrap();
    let err = Driver::new(model, FailingOracle, DriveConfig { workers: 4 })
        .run(procedures)
        .unwrap_err();
    assert!(matches!(err, DriveError::OracleFailed { .. }));
}
