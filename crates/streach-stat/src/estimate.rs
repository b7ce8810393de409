//! Estimation procedures: Chernoff-Hoeffding bound, naive sampling, and
//! Bayesian interval estimation with a Beta prior.

use crate::{beta_cdf, ensure, Decided, SpecResult};

/// Chernoff-Hoeffding bound estimator.
///
/// Fixes the sample size `N = ceil(ln(1/(1-c)) / (2 delta^2))` at
/// construction; Hoeffding's inequality then guarantees
/// `P(|x/n - p| > delta) <= 1 - c` once `n >= N`.
#[derive(Debug)]
pub struct Chb {
    spec: String,
    bound: u64,
    decided: Option<Decided<f64>>,
}

impl Chb {
    pub fn new(delta: f64, c: f64, line: &str) -> SpecResult<Self> {
        ensure(delta > 0.0 && delta < 0.5, line, "must have 0 < delta < 0.5")?;
        ensure(c > 0.0, line, "must have c > 0")?;
        // c = 1 would make the bound infinite; no finite sample size exists.
        ensure(c < 1.0, line, "must have c < 1")?;

        let bound = (1.0 / (2.0 * delta * delta) * (1.0 / (1.0 - c)).ln()).ceil() as u64;
        Ok(Self {
            spec: format!("CHB {} {}", delta, c),
            bound,
            decided: None,
        })
    }

    /// The fixed sample size computed at construction.
    pub fn bound(&self) -> u64 {
        self.bound
    }

    pub fn estimate(&self) -> Option<f64> {
        self.decided.map(|d| d.outcome)
    }

    pub fn observe(&mut self, n: u64, x: u64) {
        if self.decided.is_some() {
            return;
        }
        // A parallel driver overshoots the bound by up to W - 1.
        if n >= self.bound {
            self.decided = Some(Decided {
                outcome: x as f64 / n as f64,
                samples: n,
                successes: x,
            });
        }
    }

    pub fn done(&self) -> bool {
        self.decided.is_some()
    }

    pub fn report(&self) -> Option<String> {
        self.decided.map(|d| {
            format!(
                "{}: estimate = {}, successes = {}, samples = {}, C-H bound = {}",
                self.spec, d.outcome, d.successes, d.samples, self.bound
            )
        })
    }

    pub fn spec_text(&self) -> &str {
        &self.spec
    }
}

/// Naive fixed-size sampling: decide after `N` samples, estimate `x/n`.
#[derive(Debug)]
pub struct Nsam {
    spec: String,
    count: u64,
    decided: Option<Decided<f64>>,
}

impl Nsam {
    pub fn new(count: f64, line: &str) -> SpecResult<Self> {
        ensure(count.is_finite() && count >= 1.0, line, "must have N >= 1")?;
        let count = count as u64;
        Ok(Self {
            spec: format!("NSAM {}", count),
            count,
            decided: None,
        })
    }

    pub fn sample_count(&self) -> u64 {
        self.count
    }

    pub fn estimate(&self) -> Option<f64> {
        self.decided.map(|d| d.outcome)
    }

    pub fn observe(&mut self, n: u64, x: u64) {
        if self.decided.is_some() {
            return;
        }
        if n >= self.count {
            self.decided = Some(Decided {
                outcome: x as f64 / n as f64,
                samples: n,
                successes: x,
            });
        }
    }

    pub fn done(&self) -> bool {
        self.decided.is_some()
    }

    pub fn report(&self) -> Option<String> {
        self.decided.map(|d| {
            format!(
                "{}: estimate = {}, successes = {}, samples = {}",
                self.spec, d.outcome, d.successes, d.samples
            )
        })
    }

    pub fn spec_text(&self) -> &str {
        &self.spec
    }
}

/// Bayesian interval estimation with a Beta prior (Zuliani, Platzer, Clarke,
/// HSCC 2010).
///
/// After `(n, x)` the posterior is `Beta(x + alpha, n - x + beta)`. The
/// procedure decides once the posterior mass of the width-`2 delta` interval
/// around the posterior mean reaches the coverage `c`; the interval is
/// shifted (not shrunk) back into `[0, 1]` when it overhangs an endpoint.
#[derive(Debug)]
pub struct Best {
    spec: String,
    delta: f64,
    c: f64,
    alpha: f64,
    beta: f64,
    decided: Option<Decided<f64>>,
}

impl Best {
    pub fn new(delta: f64, c: f64, alpha: f64, beta: f64, line: &str) -> SpecResult<Self> {
        ensure(delta > 0.0 && delta <= 0.5, line, "must have 0 < delta <= 0.5")?;
        ensure(c > 0.0, line, "must have c > 0")?;
        ensure(alpha > 0.0 && beta > 0.0, line, "must have alpha, beta > 0")?;

        Ok(Self {
            spec: format!("BEST {} {} {} {}", delta, c, alpha, beta),
            delta,
            c,
            alpha,
            beta,
            decided: None,
        })
    }

    pub fn estimate(&self) -> Option<f64> {
        self.decided.map(|d| d.outcome)
    }

    pub fn observe(&mut self, n: u64, x: u64) {
        if self.decided.is_some() {
            return;
        }

        let a = x as f64 + self.alpha;
        let b = n as f64 + self.alpha + self.beta;
        let mean = a / b;

        // Interval around the posterior mean, shifted into [0, 1].
        let mut lo = mean - self.delta;
        let mut hi = mean + self.delta;
        if hi > 1.0 {
            hi = 1.0;
            lo = 1.0 - 2.0 * self.delta;
        }
        if lo < 0.0 {
            hi = 2.0 * self.delta;
            lo = 0.0;
        }

        let mass = beta_cdf(hi, a, b - a) - beta_cdf(lo, a, b - a);
        if mass >= self.c {
            self.decided = Some(Decided {
                outcome: mean,
                samples: n,
                successes: x,
            });
        }
    }

    pub fn done(&self) -> bool {
        self.decided.is_some()
    }

    pub fn report(&self) -> Option<String> {
        self.decided.map(|d| {
            format!(
                "{}: estimate = {}, successes = {}, samples = {}",
                self.spec, d.outcome, d.successes, d.samples
            )
        })
    }

    pub fn spec_text(&self) -> &str {
        &self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chb_bound_values() {
        let chb = Chb::new(0.01, 0.99, "CHB 0.01 0.99").unwrap();
        assert_eq!(chb.bound(), 23026);

        let chb = Chb::new(0.01, 0.95, "CHB 0.01 0.95").unwrap();
        assert_eq!(chb.bound(), 14979);
    }

    #[test]
    fn chb_decides_at_bound_with_ratio_estimate() {
        let mut chb = Chb::new(0.1, 0.9, "CHB 0.1 0.9").unwrap();
        let bound = chb.bound();
        chb.observe(bound - 1, 10);
        assert!(!chb.done());
        chb.observe(bound, bound / 2);
        assert!(chb.done());
        assert!((chb.estimate().unwrap() - (bound / 2) as f64 / bound as f64).abs() < 1e-12);
        let report = chb.report().unwrap();
        assert!(report.contains("C-H bound = 116"), "{report}");
    }

    #[test]
    fn chb_rejects_bad_parameters() {
        assert!(Chb::new(0.5, 0.9, "").is_err());
        assert!(Chb::new(0.0, 0.9, "").is_err());
        assert!(Chb::new(0.1, 0.0, "").is_err());
        assert!(Chb::new(0.1, 1.0, "").is_err());
    }

    #[test]
    fn nsam_decides_at_exactly_n() {
        let mut nsam = Nsam::new(100.0, "NSAM 100").unwrap();
        nsam.observe(99, 40);
        assert!(!nsam.done());
        nsam.observe(100, 41);
        assert!(nsam.done());
        assert!((nsam.estimate().unwrap() - 0.41).abs() < 1e-12);
        assert_eq!(
            nsam.report().unwrap(),
            "NSAM 100: estimate = 0.41, successes = 41, samples = 100"
        );
    }

    #[test]
    fn nsam_rejects_zero_count() {
        assert!(Nsam::new(0.0, "").is_err());
    }

    #[test]
    fn best_posterior_interval_coverage() {
        // Posterior after (100, 60) with uniform prior is Beta(61, 41);
        // mean 61/102 ~ 0.598, mass on the delta = 0.1 interval ~ 0.977.
        let mut best = Best::new(0.1, 0.95, 1.0, 1.0, "BEST 0.1 0.95 1 1").unwrap();
        best.observe(100, 60);
        assert!(best.done());
        let mean = best.estimate().unwrap();
        assert!((mean - 61.0 / 102.0).abs() < 1e-12);

        // A stricter coverage is not yet met at the same tally.
        let mut strict = Best::new(0.1, 0.99, 1.0, 1.0, "BEST 0.1 0.99 1 1").unwrap();
        strict.observe(100, 60);
        assert!(!strict.done());
    }

    #[test]
    fn best_interval_shifts_at_the_boundary() {
        // All successes push the interval against 1; it must shift, not
        // shrink, so the mass is computed over [1 - 2 delta, 1].
        let mut best = Best::new(0.05, 0.9, 1.0, 1.0, "BEST 0.05 0.9 1 1").unwrap();
        best.observe(200, 200);
        assert!(best.done());
    }

    #[test]
    fn estimators_are_idempotent_after_deciding() {
        let mut nsam = Nsam::new(10.0, "NSAM 10").unwrap();
        nsam.observe(10, 5);
        let first = nsam.report().unwrap();
        nsam.observe(20, 20);
        assert_eq!(nsam.report().unwrap(), first);
    }
}
