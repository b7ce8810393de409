//! External reachability oracle invocation and verdict recovery.
//!
//! The oracle is invoked as `<exe> -u <k> -precision=<eps> numodel_<wid>.drh`
//! with the work directory as CWD. It explores paths of increasing jump
//! depth, stops on the first sat path, and emits `"unsat"` only when it has
//! exhausted a depth, writing one file `numodel_<wid>_<k'>_<i>.output` per
//! explored path. The largest path index at the maximal reached depth is
//! therefore the definitive verdict.

use crate::{Assignment, DriveError, DriveResult, Verdict};
use std::path::{Path, PathBuf};
use std::process::Command;
use streach_model::Model;
use tracing::info;

/// One reachability query per sampled assignment. Implementations must be
/// callable from all workers concurrently; worker ids keep their scratch
/// files disjoint.
pub trait Oracle: Send + Sync {
    fn evaluate(&self, assignment: &Assignment, wid: usize) -> DriveResult<Verdict>;
}

/// The production oracle: a dReach-style executable driven per worker.
#[derive(Debug)]
pub struct DreachOracle {
    exe: PathBuf,
    model: Model,
    depth: u32,
    precision: f64,
    work_dir: PathBuf,
}

impl DreachOracle {
    pub fn new(exe: PathBuf, model: Model, depth: u32, precision: f64, work_dir: PathBuf) -> Self {
        Self {
            exe,
            model,
            depth,
            precision,
            work_dir,
        }
    }

    /// Drop this worker's output files from a previous round so discovery
    /// cannot pick up a stale path file.
    fn clear_outputs(&self, wid: usize) -> DriveResult<()> {
        let prefix = format!("numodel_{}_", wid);
        let entries = std::fs::read_dir(&self.work_dir).map_err(|source| DriveError::WorkDir {
            path: self.work_dir.clone(),
            source,
        })?;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let matches = name
                .to_str()
                .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".output"));
            if matches {
                let _ = std::fs::remove_file(entry.path());
            }
        }
        Ok(())
    }
}

impl Oracle for DreachOracle {
    fn evaluate(&self, assignment: &Assignment, wid: usize) -> DriveResult<Verdict> {
        let model_path = self.model.write_instance(assignment, &self.work_dir, wid)?;
        self.clear_outputs(wid)?;

        let model_name = format!("numodel_{}.drh", wid);
        info!(wid, model = %model_path.display(), "invoking reachability oracle");
        let status = Command::new(&self.exe)
            .arg("-u")
            .arg(self.depth.to_string())
            .arg(format!("-precision={}", self.precision))
            .arg(&model_name)
            .current_dir(&self.work_dir)
            .status()
            .map_err(|e| DriveError::OracleFailed {
                reason: format!("cannot run {}: {}", self.exe.display(), e),
            })?;

        if !status.success() {
            return Err(DriveError::OracleFailed {
                reason: format!("{} exited with {} on {}", self.exe.display(), status, model_name),
            });
        }

        let output = locate_output(&self.work_dir, wid, self.depth)?;
        let verdict = read_verdict(&output)?;
        info!(wid, output = %output.display(), ?verdict, "oracle verdict");
        Ok(verdict)
    }
}

fn output_path(work_dir: &Path, wid: usize, k: u32, i: u32) -> PathBuf {
    work_dir.join(format!("numodel_{}_{}_{}.output", wid, k, i))
}

/// Resolve the oracle's verdict file for one worker.
///
/// Finds the largest `k' <= depth` for which path file 0 exists, walking
/// past depths where no path was explored, then the largest consecutive path
/// index at that depth. No file down to depth 0 means the oracle produced no
/// verdict at all.
pub fn locate_output(work_dir: &Path, wid: usize, depth: u32) -> DriveResult<PathBuf> {
    let mut k = depth;
    loop {
        if output_path(work_dir, wid, k, 0).exists() {
            break;
        }
        if k == 0 {
            return Err(DriveError::OracleFailed {
                reason: format!(
                    "no output file for worker {} at any depth <= {} in {}",
                    wid,
                    depth,
                    work_dir.display()
                ),
            });
        }
        k -= 1;
    }

    let mut i = 0;
    while output_path(work_dir, wid, k, i + 1).exists() {
        i += 1;
    }
    Ok(output_path(work_dir, wid, k, i))
}

/// Read a verdict file: a first line of exactly `"unsat"` means the depth was
/// exhausted without reaching the goal; anything else is a delta-sat
/// statement.
pub fn read_verdict(path: &Path) -> DriveResult<Verdict> {
    let text = std::fs::read_to_string(path).map_err(|source| DriveError::CannotOpenOutput {
        path: path.to_path_buf(),
        source,
    })?;
    let first = text.lines().next().unwrap_or("");
    if first == "unsat" {
        Ok(Verdict::Unsat)
    } else {
        Ok(Verdict::Sat)
    }
}
