//! CLI entrypoint for the lazy-allocation benchmark.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use lazyalloc_core::config::DEFAULT_SIZE_MIB;
use lazyalloc_core::structured_log::LogEmitter;
use lazyalloc_core::{BenchmarkConfig, LazyAllocationBenchmark};
use lazyalloc_harness::ArtifactIndex;
use lazyalloc_harness::render::{OutputFormat, render_json, render_markdown};

/// Measure the cost of lazy allocation for plain, zeroing and pre-faulted buffers.
///
/// Experiment settings come from the environment: LAZYALLOC_TRIAL_ORDER,
/// LAZYALLOC_SANITY_WRITE, LAZYALLOC_BYPASS_HEURISTIC, LAZYALLOC_GROUP_SEPARATOR.
#[derive(Debug, Parser)]
#[command(name = "lazyalloc")]
#[command(about = "Lazy allocation (demand paging) cost benchmark")]
struct Cli {
    /// Buffer size in MiB (at least 1).
    #[arg(
        default_value_t = DEFAULT_SIZE_MIB,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    size_mib: usize,
    /// Write a markdown report here, plus `.json` and `.artifacts.json` siblings.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Structured JSONL log path.
    #[arg(long)]
    log: Option<PathBuf>,
    /// What to print to stdout after the run.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = BenchmarkConfig::from_env(cli.size_mib)?;
    let run_id = make_run_id();

    let mut emitter = match &cli.log {
        Some(path) => {
            ensure_parent(path)?;
            Some(LogEmitter::to_file(path, &run_id)?)
        }
        None => None,
    };

    let bench = LazyAllocationBenchmark::with_config(config);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let run = bench.run_all(&mut out, emitter.as_mut())?;
    drop(emitter);

    if cli.format == OutputFormat::Json {
        writeln!(out)?;
        writeln!(out, "{}", render_json(&run)?)?;
    }
    out.flush()?;

    if let Some(path) = cli.output {
        ensure_parent(&path)?;
        std::fs::write(&path, render_markdown(&run))?;
        let json_path = path.with_extension("json");
        std::fs::write(&json_path, render_json(&run)?)?;

        let mut index = ArtifactIndex::new(&run_id);
        index.add_file(&path, "report")?;
        index.add_file(&json_path, "json")?;
        if let Some(log_path) = &cli.log {
            index.add_file(log_path, "log")?;
        }
        let index_path = path.with_extension("artifacts.json");
        index.write_to(&index_path)?;
        eprintln!(
            "Wrote report to {} (index: {})",
            path.display(),
            index_path.display()
        );
    }

    Ok(())
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn make_run_id() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("run-{secs}-{}", std::process::id())
}
