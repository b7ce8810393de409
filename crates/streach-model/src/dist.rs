//! Named probability distributions for random model parameters.

use crate::{ModelError, ModelResult};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use statrs::distribution::{Beta, Exp, Gamma, Normal, Uniform};

/// A sampleable distribution attached to one random variable.
#[derive(Debug, Clone)]
pub enum Dist {
    Uniform(Uniform),
    Normal(Normal),
    Exp(Exp),
    Gamma(Gamma),
    Beta(Beta),
}

impl Dist {
    /// Build a distribution from its keyword and numeric arguments.
    pub fn new(keyword: &str, args: &[f64], line_no: usize) -> ModelResult<Self> {
        let bad = |reason: String| ModelError::BadDistribution { line_no, reason };
        let arity = |want: usize| -> ModelResult<()> {
            if args.len() == want {
                Ok(())
            } else {
                Err(bad(format!(
                    "`{}` takes {} arguments, got {}",
                    keyword,
                    want,
                    args.len()
                )))
            }
        };

        match keyword {
            "uniform" => {
                arity(2)?;
                Uniform::new(args[0], args[1])
                    .map(Dist::Uniform)
                    .map_err(|_| bad(format!("uniform needs lo < hi, got ({}, {})", args[0], args[1])))
            }
            "normal" => {
                arity(2)?;
                Normal::new(args[0], args[1])
                    .map(Dist::Normal)
                    .map_err(|_| bad(format!("normal needs std > 0, got {}", args[1])))
            }
            "exp" => {
                arity(1)?;
                Exp::new(args[0])
                    .map(Dist::Exp)
                    .map_err(|_| bad(format!("exp needs rate > 0, got {}", args[0])))
            }
            "gamma" => {
                arity(2)?;
                Gamma::new(args[0], args[1])
                    .map(Dist::Gamma)
                    .map_err(|_| bad(format!("gamma needs shape, rate > 0, got ({}, {})", args[0], args[1])))
            }
            "beta" => {
                arity(2)?;
                Beta::new(args[0], args[1])
                    .map(Dist::Beta)
                    .map_err(|_| bad(format!("beta needs alpha, beta > 0, got ({}, {})", args[0], args[1])))
            }
            other => Err(bad(format!("unknown distribution `{}`", other))),
        }
    }

    /// Draw one value.
    pub fn sample(&self, rng: &mut StdRng) -> f64 {
        match self {
            Dist::Uniform(d) => d.sample(rng),
            Dist::Normal(d) => d.sample(rng),
            Dist::Exp(d) => d.sample(rng),
            Dist::Gamma(d) => d.sample(rng),
            Dist::Beta(d) => d.sample(rng),
        }
    }
}
