//! Command-line interface for statistical reachability analysis.

use clap::Parser;
use miette::{Diagnostic, NamedSource, SourceSpan};
use std::path::PathBuf;
use std::sync::Arc;
use streach_mc::{DreachOracle, DriveConfig, Driver};
use streach_model::Model;
use streach_stat::Procedure;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI error with source context for pretty printing.
#[derive(Debug, Error, Diagnostic)]
enum CliError {
    #[error("failed to read file: {message}")]
    IoError { message: String },

    #[error("bad test specification: {message}")]
    #[diagnostic(code(streach::bad_spec))]
    SpecError {
        message: String,
        #[source_code]
        src: NamedSource<Arc<String>>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("model error: {message}")]
    ModelError { message: String },

    #[error("{message}")]
    DriveError { message: String },
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "streach", version)]
#[command(
    about = "Estimate the probability that a probabilistic hybrid model reaches its goal region",
    long_about = None
)]
struct Cli {
    /// Test-spec file: one procedure specification per line
    /// (SPRT, BFT, BFTI, LAI, CHB, BEST, NSAM)
    #[arg(value_name = "TESTFILE")]
    testfile: PathBuf,

    /// Probabilistic model file (.pdrh)
    #[arg(value_name = "MODELFILE")]
    modelfile: PathBuf,

    /// Reachability oracle executable (dReach)
    #[arg(value_name = "ORACLE")]
    oracle: PathBuf,

    /// Unfolding depth for the reachability oracle
    #[arg(value_name = "K")]
    depth: u32,

    /// Precision handed to the reachability oracle
    #[arg(value_name = "PRECISION")]
    precision: f64,

    /// Number of workers (0 = all available threads)
    #[arg(long, default_value = "0")]
    workers: usize,

    /// Directory for per-worker model and oracle output files
    #[arg(long, value_name = "DIR", default_value = ".")]
    work_dir: PathBuf,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    // Install miette's fancy error handler
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{:?}", miette::Report::new(e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let procedures = load_procedures(&cli.testfile)?;
    if procedures.is_empty() {
        println!("No test requested - exiting ...");
        return Ok(());
    }

    let model = Model::load(&cli.modelfile).map_err(|e| CliError::ModelError {
        message: e.to_string(),
    })?;

    std::fs::create_dir_all(&cli.work_dir).map_err(|e| CliError::IoError {
        message: format!("cannot prepare work directory {}: {}", cli.work_dir.display(), e),
    })?;

    info!(
        tests = procedures.len(),
        model = %cli.modelfile.display(),
        oracle = %cli.oracle.display(),
        depth = cli.depth,
        precision = cli.precision,
        "starting statistical reachability analysis"
    );

    let oracle = DreachOracle::new(
        cli.oracle,
        model.clone(),
        cli.depth,
        cli.precision,
        cli.work_dir,
    );
    let driver = Driver::new(
        model,
        oracle,
        DriveConfig {
            workers: cli.workers,
        },
    );

    let outcome = driver.run(procedures).map_err(|e| CliError::DriveError {
        message: e.to_string(),
    })?;

    info!(
        samples = outcome.samples,
        successes = outcome.successes,
        distinct_assignments = outcome.distinct_assignments,
        cache_hits = outcome.cache_hits,
        workers = outcome.workers,
        "analysis complete"
    );
    Ok(())
}

/// Parse the test-spec file line by line, labeling the offending line on
/// failure.
fn load_procedures(path: &PathBuf) -> CliResult<Vec<Procedure>> {
    let filename = path.display().to_string();
    let source = Arc::new(std::fs::read_to_string(path).map_err(|e| CliError::IoError {
        message: format!("{}: {}", filename, e),
    })?);

    let mut procedures = Vec::new();
    let mut offset = 0usize;
    for line in source.lines() {
        if let Some(parsed) = streach_stat::parse_line(line) {
            match parsed {
                Ok(proc) => procedures.push(proc),
                Err(e) => {
                    return Err(CliError::SpecError {
                        message: e.to_string(),
                        src: NamedSource::new(&filename, source.clone()),
                        span: (offset, line.len()).into(),
                    });
                }
            }
        }
        offset += line.len() + 1;
    }
    Ok(procedures)
}
