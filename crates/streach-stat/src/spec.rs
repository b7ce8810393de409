//! Test-spec file loading.
//!
//! One procedure specification per line: a case-insensitive keyword followed
//! by whitespace-separated numeric parameters. Empty lines and lines starting
//! with `#` are skipped.

use crate::{Best, Bft, Bfti, Chb, Lai, Nsam, Procedure, SpecError, SpecResult, Sprt};
use std::path::Path;

/// Parse one spec line. Returns `None` for blank lines and comments.
pub fn parse_line(line: &str) -> Option<SpecResult<Procedure>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let mut tokens = trimmed.split_whitespace();
    let keyword = tokens.next()?;
    let args: Vec<&str> = tokens.collect();
    Some(build(keyword, &args, trimmed))
}

fn build(keyword: &str, args: &[&str], line: &str) -> SpecResult<Procedure> {
    match keyword.to_ascii_uppercase().as_str() {
        "SPRT" => {
            let [theta, t, delta] = numeric_args(args, line)?;
            Ok(Procedure::Sprt(Sprt::new(theta, t, delta, line)?))
        }
        "BFT" => {
            let [theta, t, alpha, beta] = numeric_args(args, line)?;
            Ok(Procedure::Bft(Bft::new(theta, t, alpha, beta, line)?))
        }
        "BFTI" => {
            let [theta, t, alpha, beta, delta] = numeric_args(args, line)?;
            Ok(Procedure::Bfti(Bfti::new(theta, t, alpha, beta, delta, line)?))
        }
        "LAI" => {
            let [theta, cost] = numeric_args(args, line)?;
            Ok(Procedure::Lai(Lai::new(theta, cost, line)?))
        }
        "CHB" => {
            let [delta, c] = numeric_args(args, line)?;
            Ok(Procedure::Chb(Chb::new(delta, c, line)?))
        }
        "BEST" => {
            let [delta, c, alpha, beta] = numeric_args(args, line)?;
            Ok(Procedure::Best(Best::new(delta, c, alpha, beta, line)?))
        }
        "NSAM" => {
            let [count] = numeric_args(args, line)?;
            Ok(Procedure::Nsam(Nsam::new(count, line)?))
        }
        _ => Err(SpecError::UnknownKeyword {
            line: line.to_string(),
            keyword: keyword.to_string(),
        }),
    }
}

fn numeric_args<const N: usize>(args: &[&str], line: &str) -> SpecResult<[f64; N]> {
    if args.len() != N {
        return Err(SpecError::BadSpec {
            line: line.to_string(),
            reason: format!("expected {} parameters, got {}", N, args.len()),
        });
    }
    let mut out = [0.0; N];
    for (slot, raw) in out.iter_mut().zip(args) {
        *slot = raw.parse().map_err(|_| SpecError::BadSpec {
            line: line.to_string(),
            reason: format!("`{}` is not a number", raw),
        })?;
    }
    Ok(out)
}

/// Parse a whole spec text; stops at the first bad line.
pub fn load_spec_str(text: &str) -> SpecResult<Vec<Procedure>> {
    text.lines().filter_map(parse_line).collect()
}

/// Read and parse a spec file.
pub fn load_spec_file(path: impl AsRef<Path>) -> SpecResult<Vec<Procedure>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_spec_str(&text)
}
