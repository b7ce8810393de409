//! Fixed-pool round driver.
//!
//! `W` persistent workers each contribute one trial per round. Two barriers
//! separate the phases: after the first, the elected leader folds the round's
//! verdicts into the global tally and feeds every unfinished procedure; after
//! the second, workers observe the completion flag and either loop or exit.
//! Procedures therefore see a strictly increasing `n` in steps of `W`, and a
//! procedure that nominally stops at `N` overshoots by at most `W - 1`.

use crate::{DriveError, DriveResult, Oracle, Trial, TrialCache, Verdict};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Barrier, Mutex};
use streach_model::Model;
use streach_stat::Procedure;
use tracing::{debug, info};

/// Driver configuration.
#[derive(Debug, Clone, Default)]
pub struct DriveConfig {
    /// Number of workers; 0 means all available threads. Fixed for the whole
    /// run, no dynamic sizing.
    pub workers: usize,
}

/// Result of a completed run.
#[derive(Debug)]
pub struct DriveOutcome {
    /// The procedures, all decided, in spec order.
    pub procedures: Vec<Procedure>,
    /// Report lines in the order the procedures finished.
    pub reports: Vec<String>,
    pub samples: u64,
    pub successes: u64,
    pub rounds: u64,
    pub cache_hits: u64,
    pub distinct_assignments: usize,
    pub workers: usize,
}

/// One worker's contribution to a round.
struct RoundTrial {
    trial: Trial,
    cache_hit: bool,
}

/// Tally and procedure state, touched only by the round leader between the
/// two barriers.
struct Aggregate {
    procedures: Vec<Procedure>,
    samples: u64,
    successes: u64,
    rounds: u64,
    cache_hits: u64,
    reports: Vec<String>,
    error: Option<DriveError>,
}

struct Shared<'a, O> {
    model: &'a Model,
    oracle: &'a O,
    cache: TrialCache,
    slots: Vec<Mutex<Option<DriveResult<RoundTrial>>>>,
    barrier: Barrier,
    all_done: AtomicBool,
    agg: Mutex<Aggregate>,
}

/// The parallel Bernoulli-trial driver.
pub struct Driver<O> {
    model: Model,
    oracle: O,
    config: DriveConfig,
}

impl<O: Oracle> Driver<O> {
    pub fn new(model: Model, oracle: O, config: DriveConfig) -> Self {
        Self {
            model,
            oracle,
            config,
        }
    }

    /// Run rounds until every procedure has decided, printing each report
    /// line as its procedure finishes. The first worker error aborts the run
    /// after the in-flight round drains.
    pub fn run(&self, procedures: Vec<Procedure>) -> DriveResult<DriveOutcome> {
        let workers = if self.config.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.config.workers
        };

        if procedures.is_empty() {
            info!("no procedures requested");
            return Ok(DriveOutcome {
                procedures,
                reports: Vec::new(),
                samples: 0,
                successes: 0,
                rounds: 0,
                cache_hits: 0,
                distinct_assignments: 0,
                workers,
            });
        }

        info!(
            workers,
            procedures = procedures.len(),
            "starting sampling rounds"
        );

        let shared = Shared {
            model: &self.model,
            oracle: &self.oracle,
            cache: TrialCache::new(),
            slots: (0..workers).map(|_| Mutex::new(None)).collect(),
            barrier: Barrier::new(workers),
            all_done: AtomicBool::new(false),
            agg: Mutex::new(Aggregate {
                procedures,
                samples: 0,
                successes: 0,
                rounds: 0,
                cache_hits: 0,
                reports: Vec::new(),
                error: None,
            }),
        };

        std::thread::scope(|scope| {
            for wid in 0..workers {
                let shared = &shared;
                scope.spawn(move || worker_loop(shared, wid));
            }
        });

        let distinct_assignments = shared.cache.len();
        let agg = shared
            .agg
            .into_inner()
            .expect("workers have exited, the tally lock cannot be poisoned");
        if let Some(error) = agg.error {
            return Err(error);
        }

        info!(
            samples = agg.samples,
            successes = agg.successes,
            rounds = agg.rounds,
            distinct_assignments,
            cache_hits = agg.cache_hits,
            "all procedures decided"
        );

        Ok(DriveOutcome {
            procedures: agg.procedures,
            reports: agg.reports,
            samples: agg.samples,
            successes: agg.successes,
            rounds: agg.rounds,
            cache_hits: agg.cache_hits,
            distinct_assignments,
            workers,
        })
    }
}

fn worker_loop<O: Oracle>(shared: &Shared<'_, O>, wid: usize) {
    let mut rng = StdRng::from_entropy();
    loop {
        let result = run_trial(shared, wid, &mut rng);
        *shared.slots[wid].lock().expect("slot lock") = Some(result);

        // Sample phase over; the leader aggregates while the other workers
        // park on the second barrier.
        if shared.barrier.wait().is_leader() {
            aggregate(shared);
        }
        shared.barrier.wait();

        if shared.all_done.load(Ordering::SeqCst) {
            break;
        }
    }
}

/// Draw one assignment and resolve its verdict, through the cache when the
/// assignment has been seen before. Cache hits count as fresh trials.
fn run_trial<O: Oracle>(
    shared: &Shared<'_, O>,
    wid: usize,
    rng: &mut StdRng,
) -> DriveResult<RoundTrial> {
    let assignment = shared.model.sample(rng);
    if let Some(verdict) = shared.cache.lookup(&assignment) {
        debug!(wid, ?verdict, "memoized assignment, skipping oracle");
        return Ok(RoundTrial {
            trial: Trial {
                assignment,
                verdict,
            },
            cache_hit: true,
        });
    }
    let verdict = shared.oracle.evaluate(&assignment, wid)?;
    shared.cache.insert(assignment.clone(), verdict)?;
    Ok(RoundTrial {
        trial: Trial {
            assignment,
            verdict,
        },
        cache_hit: false,
    })
}

/// Leader-only: fold the round's slots into the tally and update every
/// unfinished procedure.
fn aggregate<O: Oracle>(shared: &Shared<'_, O>) {
    let mut agg = shared.agg.lock().expect("tally lock");

    let mut sat = 0u64;
    let mut hits = 0u64;
    let mut first_error = None;
    for slot in &shared.slots {
        match slot.lock().expect("slot lock").take() {
            Some(Ok(round)) => {
                if round.trial.verdict == Verdict::Sat {
                    sat += 1;
                }
                if round.cache_hit {
                    hits += 1;
                }
            }
            Some(Err(error)) => {
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
            None => unreachable!("the barrier guarantees every slot is filled"),
        }
    }

    if let Some(error) = first_error {
        agg.error = Some(error);
        shared.all_done.store(true, Ordering::SeqCst);
        return;
    }

    agg.samples += shared.slots.len() as u64;
    agg.successes += sat;
    agg.cache_hits += hits;
    agg.rounds += 1;
    debug!(
        samples = agg.samples,
        successes = agg.successes,
        "round aggregated"
    );

    let Aggregate {
        procedures,
        samples,
        successes,
        reports,
        ..
    } = &mut *agg;

    let mut all_done = true;
    for proc in procedures.iter_mut() {
        if proc.done() {
            continue;
        }
        proc.observe(*samples, *successes);
        if proc.done() {
            if let Some(line) = proc.report() {
                println!("{line}");
                reports.push(line);
            }
        } else {
            all_done = false;
        }
    }
    if all_done {
        shared.all_done.store(true, Ordering::SeqCst);
    }
}
