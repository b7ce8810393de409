//! Hypothesis tests: SPRT, Bayes factor tests, and Lai's sequential test.
//!
//! The null hypothesis is the interval `[theta, 1]` (or `[theta2, 1]` with an
//! indifference region); the alternative is `[0, theta]` (or `[0, theta1]`).

use crate::{beta_cdf, ensure, Decided, Decision, SpecError, SpecResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

fn report_line(spec: &str, d: &Decided<Decision>) -> String {
    let verdict = match d.outcome {
        Decision::AcceptNull => "Accept Null hypothesis",
        Decision::RejectNull => "Reject Null hypothesis",
    };
    format!(
        "{}: {}, successes = {}, samples = {}",
        spec, verdict, d.successes, d.samples
    )
}

/// Indifference region `(theta1, theta2)` around `theta`, clipped to `[0, 1]`.
/// Regions touching 0 or 1 are rejected: both tests that use one take
/// logarithms or Beta CDF values at the endpoints.
fn indifference_region(theta: f64, delta: f64, line: &str) -> SpecResult<(f64, f64)> {
    let theta1 = (theta - delta).max(0.0);
    let theta2 = (theta + delta).min(1.0);
    ensure(
        theta1 > 0.0 && theta2 < 1.0,
        line,
        "indifference region borders 0 or 1",
    )?;
    Ok((theta1, theta2))
}

/// Prior odds `P(H1) / P(H0)` where `P(H1) = F_Beta(alpha, beta)(threshold)`.
fn prior_odds(threshold: f64, alpha: f64, beta: f64, line: &str) -> SpecResult<f64> {
    let p1 = beta_cdf(threshold, alpha, beta);
    if p1 <= 0.0 || p1 >= 1.0 {
        return Err(SpecError::BadSpec {
            line: line.to_string(),
            reason: "Prob(H_1) is either 0 or 1".to_string(),
        });
    }
    Ok(p1 / (1.0 - p1))
}

/// Wald's Sequential Probability Ratio Test over the indifference region
/// `(theta - delta, theta + delta)`.
#[derive(Debug)]
pub struct Sprt {
    spec: String,
    log_sat: f64,
    log_unsat: f64,
    tau: f64,
    decided: Option<Decided<Decision>>,
}

impl Sprt {
    pub fn new(theta: f64, t: f64, delta: f64, line: &str) -> SpecResult<Self> {
        ensure(t > 1.0, line, "must have T > 1")?;
        ensure(theta > 0.0 && theta < 1.0, line, "must have 0 < theta < 1")?;
        ensure(delta > 0.0 && delta < 0.5, line, "must have 0 < delta < 0.5")?;
        let (theta1, theta2) = indifference_region(theta, delta, line)?;

        Ok(Self {
            spec: format!("SPRT {} {} {}", theta, t, delta),
            log_sat: (theta2 / theta1).ln(),
            log_unsat: ((1.0 - theta2) / (1.0 - theta1)).ln(),
            tau: t.ln(),
            decided: None,
        })
    }

    pub fn decision(&self) -> Option<Decision> {
        self.decided.map(|d| d.outcome)
    }

    pub fn observe(&mut self, n: u64, x: u64) {
        if self.decided.is_some() {
            return;
        }
        let r = x as f64 * self.log_sat + (n - x) as f64 * self.log_unsat;
        let outcome = if r > self.tau {
            Decision::AcceptNull
        } else if r < -self.tau {
            Decision::RejectNull
        } else {
            return;
        };
        self.decided = Some(Decided {
            outcome,
            samples: n,
            successes: x,
        });
    }

    pub fn done(&self) -> bool {
        self.decided.is_some()
    }

    pub fn report(&self) -> Option<String> {
        self.decided.as_ref().map(|d| report_line(&self.spec, d))
    }

    pub fn spec_text(&self) -> &str {
        &self.spec
    }
}

/// Bayes factor test with a Beta prior.
///
/// Decides once the Bayes factor `P(data|H0)/P(data|H1)`, scaled by the
/// prior odds, leaves `[1/T, T]`.
#[derive(Debug)]
pub struct Bft {
    spec: String,
    theta: f64,
    t: f64,
    alpha: f64,
    beta: f64,
    odds: f64,
    decided: Option<Decided<Decision>>,
}

impl Bft {
    pub fn new(theta: f64, t: f64, alpha: f64, beta: f64, line: &str) -> SpecResult<Self> {
        ensure(t > 1.0, line, "must have T > 1")?;
        ensure(theta > 0.0 && theta < 1.0, line, "must have 0 < theta < 1")?;
        ensure(alpha > 0.0 && beta > 0.0, line, "must have alpha, beta > 0")?;
        let odds = prior_odds(theta, alpha, beta, line)?;

        Ok(Self {
            spec: format!("BFT {} {} {} {}", theta, t, alpha, beta),
            theta,
            t,
            alpha,
            beta,
            odds,
            decided: None,
        })
    }

    pub fn decision(&self) -> Option<Decision> {
        self.decided.map(|d| d.outcome)
    }

    pub fn observe(&mut self, n: u64, x: u64) {
        if self.decided.is_some() {
            return;
        }
        let post = beta_cdf(self.theta, x as f64 + self.alpha, (n - x) as f64 + self.beta);
        let b = self.odds * (1.0 / post - 1.0);
        let outcome = if b > self.t {
            Decision::AcceptNull
        } else if b < 1.0 / self.t {
            Decision::RejectNull
        } else {
            return;
        };
        self.decided = Some(Decided {
            outcome,
            samples: n,
            successes: x,
        });
    }

    pub fn done(&self) -> bool {
        self.decided.is_some()
    }

    pub fn report(&self) -> Option<String> {
        self.decided.as_ref().map(|d| report_line(&self.spec, d))
    }

    pub fn spec_text(&self) -> &str {
        &self.spec
    }
}

/// Bayes factor test with a Beta prior and an indifference region.
///
/// The null hypothesis is `[theta2, 1]`, the alternative `[0, theta1]`; no
/// decision is required inside `(theta1, theta2)`.
#[derive(Debug)]
pub struct Bfti {
    spec: String,
    theta1: f64,
    theta2: f64,
    t: f64,
    alpha: f64,
    beta: f64,
    odds: f64,
    decided: Option<Decided<Decision>>,
}

impl Bfti {
    pub fn new(
        theta: f64,
        t: f64,
        alpha: f64,
        beta: f64,
        delta: f64,
        line: &str,
    ) -> SpecResult<Self> {
        ensure(t > 1.0, line, "must have T > 1")?;
        ensure(theta > 0.0 && theta < 1.0, line, "must have 0 < theta < 1")?;
        ensure(alpha > 0.0 && beta > 0.0, line, "must have alpha, beta > 0")?;
        ensure(delta > 0.0 && delta < 0.5, line, "must have 0 < delta < 0.5")?;
        let (theta1, theta2) = indifference_region(theta, delta, line)?;
        let odds = prior_odds(theta1, alpha, beta, line)?;

        Ok(Self {
            spec: format!("BFTI {} {} {} {} {}", theta, t, alpha, beta, delta),
            theta1,
            theta2,
            t,
            alpha,
            beta,
            odds,
            decided: None,
        })
    }

    pub fn decision(&self) -> Option<Decision> {
        self.decided.map(|d| d.outcome)
    }

    pub fn observe(&mut self, n: u64, x: u64) {
        if self.decided.is_some() {
            return;
        }
        let a = x as f64 + self.alpha;
        let b = (n - x) as f64 + self.beta;
        let bf = self.odds * (1.0 - beta_cdf(self.theta2, a, b)) / beta_cdf(self.theta1, a, b);
        let outcome = if bf > self.t {
            Decision::AcceptNull
        } else if bf < 1.0 / self.t {
            Decision::RejectNull
        } else {
            return;
        };
        self.decided = Some(Decided {
            outcome,
            samples: n,
            successes: x,
        });
    }

    pub fn done(&self) -> bool {
        self.decided.is_some()
    }

    pub fn report(&self) -> Option<String> {
        self.decided.as_ref().map(|d| report_line(&self.spec, d))
    }

    pub fn spec_text(&self) -> &str {
        &self.spec
    }
}

/// Lai's sequential test (Lai, "Nearly Optimal Sequential Tests of Composite
/// Hypotheses", Annals of Statistics 1988).
///
/// Decides when the KL information of the empirical rate against `theta`
/// crosses the boundary `g(c n) / n`; ties at the threshold are broken by a
/// fair coin from the instance's own generator.
#[derive(Debug)]
pub struct Lai {
    spec: String,
    theta: f64,
    cost: f64,
    rng: StdRng,
    decided: Option<Decided<Decision>>,
}

impl Lai {
    pub fn new(theta: f64, cost: f64, line: &str) -> SpecResult<Self> {
        ensure(theta > 0.0 && theta < 1.0, line, "must have 0 < theta < 1")?;
        ensure(cost > 0.0, line, "must have cost > 0")?;

        Ok(Self {
            spec: format!("LAI {} {}", theta, cost),
            theta,
            cost,
            // Tie-break generator, never shared across instances.
            rng: StdRng::from_entropy(),
            decided: None,
        })
    }

    /// Kullback-Leibler information `K(p_hat || theta)`; the branches keep
    /// `ln 0` out of the computation at the endpoints.
    fn kl(&self, p_hat: f64) -> f64 {
        if p_hat == 0.0 {
            (1.0 / (1.0 - self.theta)).ln()
        } else if p_hat == 1.0 {
            (1.0 / self.theta).ln()
        } else {
            p_hat * (p_hat / self.theta).ln()
                + (1.0 - p_hat) * ((1.0 - p_hat) / (1.0 - self.theta)).ln()
        }
    }

    /// Lai's boundary function `g(t)`, piecewise per the 1988 paper.
    fn g(t: f64) -> f64 {
        if t >= 0.8 {
            let w = 1.0 / t;
            (1.0 / (16.0 * PI))
                * (w.powi(2) - (10.0 / (48.0 * PI)) * w.powi(4)
                    + (5.0 / (48.0 * PI)).powi(2) * w.powi(6))
        } else if t >= 0.1 {
            (-1.38 * t - 2.0).exp() / (2.0 * t)
        } else if t >= 0.01 {
            (0.1521 + 0.000225 / t - 0.00585 / t.sqrt()) / (2.0 * t)
        } else {
            let w = 1.0 / t;
            0.5 * (2.0 * w.ln() + w.ln().ln() - (4.0 * PI).ln() - 3.0 * (-0.016 * w.sqrt()).exp())
        }
    }

    /// Fair coin for the `p_hat == theta` case.
    fn tie_break(&mut self) -> Decision {
        if self.rng.gen::<f64>() <= 0.5 {
            Decision::AcceptNull
        } else {
            Decision::RejectNull
        }
    }

    pub fn decision(&self) -> Option<Decision> {
        self.decided.map(|d| d.outcome)
    }

    pub fn observe(&mut self, n: u64, x: u64) {
        if self.decided.is_some() || n == 0 {
            return;
        }
        let p_hat = x as f64 / n as f64;
        let threshold = Self::g(self.cost * n as f64) / n as f64;
        if self.kl(p_hat) < threshold {
            return;
        }

        let outcome = if p_hat == self.theta {
            self.tie_break()
        } else if p_hat > self.theta {
            Decision::AcceptNull
        } else {
            Decision::RejectNull
        };
        self.decided = Some(Decided {
            outcome,
            samples: n,
            successes: x,
        });
    }

    pub fn done(&self) -> bool {
        self.decided.is_some()
    }

    pub fn report(&self) -> Option<String> {
        self.decided.as_ref().map(|d| report_line(&self.spec, d))
    }

    pub fn spec_text(&self) -> &str {
        &self.spec
    }
}
