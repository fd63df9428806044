//! CLI entrypoint for the firstfit harness.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use firstfit_core::config::parse_size_loose;
use firstfit_core::{Arena, ArenaConfig};
use firstfit_harness::HarnessError;
use firstfit_harness::occupancy::{self, LabelTable};
use firstfit_harness::scenario::{self, Lcg, StressConfig};
use firstfit_harness::structured_log::{
    ArtifactIndex, LogEmitter, LogEntry, LogLevel, StreamKind, sha256_hex, validate_log_file,
};

/// Tooling for the firstfit arena allocator.
#[derive(Debug, Parser)]
#[command(name = "firstfit-harness")]
#[command(about = "Demo, stress and inspection tooling for the firstfit arena")]
struct Cli {
    /// Arena capacity (decimal, 0x hex, or k/m suffix). Defaults to the
    /// environment override or 1m.
    #[arg(long, global = true, value_parser = parse_capacity)]
    capacity: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Plain,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the guided allocator demo.
    Demo {
        #[arg(long, value_enum, default_value = "plain")]
        format: Format,
        /// Directory for the JSON report, JSONL log and artifact index.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Run a seeded allocate/release/resize workload with integrity checks.
    Stress {
        /// Root seed (decimal or 0x...).
        #[arg(long, default_value = "0xDEAD_BEEF")]
        seed: String,
        /// Number of operations.
        #[arg(long, default_value_t = 10_000)]
        steps: usize,
        /// Largest single request in bytes.
        #[arg(long, default_value_t = 4096)]
        max_request: usize,
        /// Full integrity walk every N steps (0 = only at the end).
        #[arg(long, default_value_t = 1)]
        check_every: usize,
        /// Directory for the JSONL log, JSON report and artifact index.
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "plain")]
        format: Format,
    },
    /// Render arena occupancy after a labeled, seeded workload.
    Occupancy {
        /// Bar width in columns.
        #[arg(long, default_value_t = 100)]
        width: usize,
        /// Root seed (decimal or 0x...).
        #[arg(long, default_value = "0xDEAD_BEEF")]
        seed: String,
        /// Blocks to allocate before releasing a random half.
        #[arg(long, default_value_t = 24)]
        blocks: usize,
    },
    /// Validate a structured JSONL log against the schema.
    ValidateLog {
        #[arg(long)]
        log: PathBuf,
    },
    /// Re-hash every artifact listed in an index.
    VerifyArtifacts {
        #[arg(long)]
        index: PathBuf,
    },
}

fn main() -> Result<(), HarnessError> {
    let cli = Cli::parse();
    let config = match cli.capacity {
        Some(capacity) => ArenaConfig::from_env().with_capacity(capacity),
        None => ArenaConfig::from_env(),
    };

    match cli.command {
        Command::Demo { format, out_dir } => {
            let mut arena = Arena::new(config)?;
            let report = scenario::run_demo(&mut arena)?;
            if let Some(dir) = &out_dir {
                write_demo_artifacts(&report, dir)?;
            }
            match format {
                Format::Plain => println!("{report}"),
                Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
            if !report.is_clean() {
                return Err(HarnessError::Scenario {
                    scenario: "demo",
                    step: report.cycle_count,
                    message: format!("{} bytes leaked", report.leaked_bytes),
                });
            }
        }
        Command::Stress {
            seed,
            steps,
            max_request,
            check_every,
            out_dir,
            format,
        } => {
            let stress = StressConfig {
                seed: parse_seed(&seed)?,
                steps,
                max_request,
                check_every,
            };
            let mut arena = Arena::new(config)?;
            let report = match &out_dir {
                Some(dir) => run_stress_with_artifacts(&mut arena, stress, dir)?,
                None => scenario::run_stress(&mut arena, stress, None)?,
            };
            match format {
                Format::Plain => println!("{report}"),
                Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
            if !report.passed() {
                let first = report
                    .invariant_failures
                    .first()
                    .map_or_else(|| "leak after cleanup".to_string(), |f| f.message.clone());
                return Err(HarnessError::Scenario {
                    scenario: "stress",
                    step: report.invariant_failures.first().map_or(steps, |f| f.step),
                    message: first,
                });
            }
        }
        Command::Occupancy {
            width,
            seed,
            blocks,
        } => {
            let mut arena = Arena::initialized(config)?;
            let mut labels = LabelTable::new();
            let mut rng = Lcg::new(parse_seed(&seed)?);
            let max = (arena.config().capacity / blocks.max(1) / 2).max(1);
            let mut live = Vec::new();
            for _ in 0..blocks {
                let size = rng.below(max) + 1;
                if let Some(ptr) = arena.allocate(size) {
                    labels.track(ptr, "block");
                    live.push(ptr);
                }
            }
            for ptr in live {
                if rng.below(2) == 0 {
                    arena.release(ptr);
                    labels.forget(ptr);
                }
            }
            print!(
                "{}",
                occupancy::render(&arena.stats(), &arena.dump(), &labels, width)
            );
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            if let Some(first) = errors.first() {
                return Err(HarnessError::InvalidLog {
                    path: log,
                    count: errors.len(),
                    first: first.to_string(),
                });
            }
            eprintln!("{}: {lines} valid line(s)", log.display());
        }
        Command::VerifyArtifacts { index } => {
            let root = index.parent().unwrap_or_else(|| Path::new("."));
            let idx = ArtifactIndex::from_file(&index)?;
            let mismatches = idx.verify(root);
            if let Some(first) = mismatches.first() {
                return Err(HarnessError::ArtifactMismatch {
                    count: mismatches.len(),
                    first: first.path.clone(),
                });
            }
            eprintln!(
                "{}: {} artifact(s) verified",
                index.display(),
                idx.artifacts.len()
            );
        }
    }
    Ok(())
}

fn write_demo_artifacts(report: &scenario::DemoReport, dir: &Path) -> Result<(), HarnessError> {
    std::fs::create_dir_all(dir)?;
    let run_id = "demo";
    let report_name = "demo.report.json";
    let log_path = dir.join("demo.log.jsonl");

    let report_json = serde_json::to_string_pretty(report)?;
    std::fs::write(dir.join(report_name), &report_json)?;

    let mut emitter = LogEmitter::to_file(&log_path, StreamKind::Demo, run_id)?;
    scenario::emit_demo_log(report, &mut emitter, vec![report_name.to_string()])?;
    drop(emitter);

    let mut index = ArtifactIndex::new(run_id);
    index.add(report_name, "report", sha256_hex(report_json.as_bytes()));
    index.add_file(dir, &log_path, "log", Some("demo section log".to_string()))?;
    std::fs::write(dir.join("artifact_index.json"), index.to_json()?)?;
    eprintln!("Wrote demo artifacts to {}", dir.display());
    Ok(())
}

fn run_stress_with_artifacts(
    arena: &mut Arena,
    config: StressConfig,
    dir: &Path,
) -> Result<scenario::StressReport, HarnessError> {
    std::fs::create_dir_all(dir)?;
    let run_id = format!("stress-{:x}", config.seed);
    let log_path = dir.join("stress.log.jsonl");
    let report_path = dir.join("stress.report.json");

    let mut emitter = LogEmitter::to_file(&log_path, StreamKind::Stress, &run_id)?;
    emitter.emit_entry(
        LogEntry::new("", LogLevel::Info, "stress_start")
            .with_details(serde_json::to_value(config)?),
    )?;
    let report = scenario::run_stress(arena, config, Some(&mut emitter))?;
    emitter.flush()?;
    drop(emitter);

    std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;

    let mut index = ArtifactIndex::new(&run_id);
    index.add_file(dir, &log_path, "log", Some("stress step log".to_string()))?;
    index.add_file(dir, &report_path, "report", None)?;
    std::fs::write(dir.join("artifact_index.json"), index.to_json()?)?;
    eprintln!("Wrote stress artifacts to {}", dir.display());
    Ok(report)
}

fn parse_capacity(raw: &str) -> Result<usize, String> {
    parse_size_loose(raw).ok_or_else(|| format!("unparsable size '{raw}'"))
}

fn parse_seed(raw: &str) -> Result<u64, HarnessError> {
    let s = raw.trim().replace('_', "");
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    parsed.map_err(|err| HarnessError::InvalidArgument(format!("seed '{raw}': {err}")))
}
