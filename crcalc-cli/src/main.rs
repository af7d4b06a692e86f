//! crcalc CLI - Cosmic-ray track reconstruction.
//!
//! Reads a hit file, reconstructs every SM event and writes one record per
//! event.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

use clap::{Parser, Subcommand};
use crcalc_algorithms::Reconstructor;
use crcalc_core::{ReconstructionConfig, ReconstructionStatistics};
use crcalc_io::{load_config, scan_hits, HitFileReader, RecordWriter, StreamSummary};
use log::{debug, info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    CrcalcIo(#[from] crcalc_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] crcalc_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Cosmic-ray track reconstruction for pixel detector hit data.
#[derive(Parser, Debug)]
#[command(name = "crcalc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (per-event debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconstruct every SM event of a hit file
    Process {
        /// Input hit file (.csv, .bin/.dat, .h5/.hdf5)
        input: PathBuf,

        /// Output record file (.csv, .bin/.dat, .h5/.hdf5)
        #[arg(short, long)]
        output: PathBuf,

        /// File number written to every record (default: from the first hit)
        #[arg(long)]
        file_num: Option<u32>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Finite-difference step for the line fit
        #[arg(long)]
        step_size: Option<f64>,

        /// Iteration limit for the line fit
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Process events on a single thread
        #[arg(long)]
        serial: bool,

        /// Events reconstructed per batch
        #[arg(long)]
        batch_events: Option<usize>,

        /// Worker threads (default: one per core)
        #[arg(long)]
        threads: Option<usize>,

        /// Write a JSON run summary to this file
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Show information about a hit file
    Info {
        /// Input hit file
        input: PathBuf,
    },
}

/// Overrides taken from the command line.
#[derive(Debug, Default)]
struct Overrides {
    file_num: Option<u32>,
    step_size: Option<f64>,
    max_iterations: Option<usize>,
    serial: bool,
    batch_events: Option<usize>,
}

impl Overrides {
    fn apply(self, mut config: ReconstructionConfig) -> ReconstructionConfig {
        if let Some(file_num) = self.file_num {
            config = config.with_file_num(file_num);
        }
        if let Some(step_size) = self.step_size {
            config.fit = config.fit.with_step_size(step_size);
        }
        if let Some(max_iterations) = self.max_iterations {
            config.fit = config.fit.with_max_iterations(max_iterations);
        }
        if self.serial {
            config = config.with_parallel(false);
        }
        if let Some(batch_events) = self.batch_events {
            config = config.with_batch_events(batch_events);
        }
        config
    }
}

/// JSON run summary.
#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    input: &'a Path,
    output: &'a Path,
    elapsed_secs: f64,
    stream: &'a StreamSummary,
    statistics: &'a ReconstructionStatistics,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Process {
            input,
            output,
            file_num,
            config,
            step_size,
            max_iterations,
            serial,
            batch_events,
            threads,
            summary,
        } => {
            let base = match &config {
                Some(path) => {
                    debug!("loading configuration from {}", path.display());
                    load_config(path)?
                }
                None => ReconstructionConfig::default(),
            };
            let overrides = Overrides {
                file_num,
                step_size,
                max_iterations,
                serial,
                batch_events,
            };
            let config = overrides.apply(base);

            if let Some(threads) = threads {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build_global()?;
            }

            run_process(&input, &output, config, summary.as_deref())?;
        }

        Commands::Info { input } => {
            let reader = HitFileReader::open(&input)?;
            let hits = reader.read_hits()?;
            let stream = scan_hits(&hits);
            print_stream_summary(&input, &stream);
        }
    }

    Ok(())
}

fn run_process(
    input: &Path,
    output: &Path,
    config: ReconstructionConfig,
    summary: Option<&Path>,
) -> Result<()> {
    let start = Instant::now();
    let reconstructor = Reconstructor::new(config)?;

    info!("reading {}", input.display());
    let hits = HitFileReader::open(input)?.read_hits()?;
    let stream = scan_hits(&hits);
    if stream.out_of_order > 0 {
        warn!(
            "{} hits arrive after a larger SM event number; they stay in the surrounding event",
            stream.out_of_order
        );
    }

    let mut writer = RecordWriter::create(output)?;
    debug!("writing {:?} records to {}", writer.format(), output.display());
    let statistics = reconstructor.run(&hits, &mut writer)?;
    let elapsed = start.elapsed();

    println!(
        "Processed {} hits in {:.2}s",
        statistics.total_hits,
        elapsed.as_secs_f64()
    );
    println!("SM events: {}", statistics.events);
    println!("  fitted: {}", statistics.fitted());
    println!("  single-hit: {}", statistics.degenerate);
    println!("  fit failures: {}", statistics.fit_failures);
    println!("Missing SM event numbers: {}", statistics.missing_events);
    println!("Output: {}", output.display());

    if let Some(path) = summary {
        let run = RunSummary {
            input,
            output,
            elapsed_secs: elapsed.as_secs_f64(),
            stream: &stream,
            statistics: &statistics,
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &run)?;
        debug!("wrote run summary to {}", path.display());
    }

    Ok(())
}

fn print_stream_summary(input: &Path, stream: &StreamSummary) {
    println!("File: {}", input.display());
    if let Some(file_num) = stream.file_num {
        println!("File number: {}", file_num);
    }
    println!("Hits: {}", stream.hits);
    println!("SM events: {}", stream.events);
    if let (Some(first), Some(last)) = (stream.first_event, stream.last_event) {
        println!("SM event range: {} - {}", first, last);
    }
    println!("Missing SM event numbers: {}", stream.missing_events);
    println!("Out-of-order hits: {}", stream.out_of_order);
    println!("Unassigned hits: {}", stream.unassigned);
    if stream.hits > 0 {
        println!(
            "Mean hits per event: {:.2}",
            stream.hits as f64 / stream.events.max(1) as f64
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_process() {
        let cli = Cli::try_parse_from([
            "crcalc",
            "process",
            "hits.csv",
            "-o",
            "records.csv",
            "--file-num",
            "7",
            "--serial",
            "--max-iterations",
            "50",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Process {
                input,
                output,
                file_num,
                serial,
                max_iterations,
                ..
            } => {
                assert_eq!(input, PathBuf::from("hits.csv"));
                assert_eq!(output, PathBuf::from("records.csv"));
                assert_eq!(file_num, Some(7));
                assert!(serial);
                assert_eq!(max_iterations, Some(50));
            }
            Commands::Info { .. } => panic!("expected process"),
        }
    }

    #[test]
    fn test_process_requires_output() {
        assert!(Cli::try_parse_from(["crcalc", "process", "hits.csv"]).is_err());
    }

    #[test]
    fn test_overrides_apply_over_file_config() {
        let base = ReconstructionConfig::new().with_batch_events(16);
        let config = Overrides {
            file_num: Some(3),
            step_size: Some(0.5),
            serial: true,
            ..Overrides::default()
        }
        .apply(base);

        assert_eq!(config.file_num, Some(3));
        assert!((config.fit.step_size - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.fit.max_iterations, 1000);
        assert!(!config.parallel);
        assert_eq!(config.batch_events, 16);
    }
}
