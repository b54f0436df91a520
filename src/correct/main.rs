use std::{fs, path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use rzc::{
    checkpoint::{self, Reconciliation},
    export,
    fetch::{DEFAULT_BASE_URL, ScoreClient},
    orchestrator::Orchestrator,
};

/// Correct the historical admission scores of a full dataset against the
/// live auxiliary endpoint, with checkpointed resume.
#[derive(Parser)]
struct Args {
    /// Original dataset, a JSON array of records
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for checkpoints, the manifest and the final artifacts
    #[arg(short, long, default_value = "out")]
    output_dir: PathBuf,

    /// Explicit starting checkpoint; defaults to the manifest's newest
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    #[arg(long, default_value_t = 20)]
    batch_size: usize,

    /// Write a checkpoint every this many batches
    #[arg(long, default_value_t = 5)]
    checkpoint_every: usize,

    /// Fetches in flight at once
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Inter-request delay in milliseconds
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    pretty_env_logger::init_timed();
    let args = Args::parse();

    fs::create_dir_all(&args.output_dir)?;

    let original = checkpoint::load_records(&args.input)?;
    tracing::info!(target: "main", "loaded {} records from {}", original.len(), args.input.display());

    let done = match &args.checkpoint {
        Some(path) => checkpoint::load_records(path)?,
        None => checkpoint::latest_checkpoint(&args.output_dir)?,
    };
    let done = checkpoint::dedup_by_identity(done);
    let remaining = checkpoint::pending(&original, &done);
    tracing::info!(
        target: "main",
        "progress {}/{}, {} remaining",
        done.len(),
        original.len(),
        remaining.len(),
    );

    let client = ScoreClient::new(&args.base_url)?;
    let mut orchestrator = Orchestrator::new(client, args.output_dir.clone());
    orchestrator.batch_size = args.batch_size;
    orchestrator.checkpoint_every = args.checkpoint_every;
    orchestrator.concurrency = args.concurrency;
    orchestrator.delay = Duration::from_millis(args.delay_ms);
    orchestrator.resume_from(done);

    orchestrator.run(remaining).await;
    tracing::info!(
        target: "main",
        "session finished: {} corrected, {} without scores",
        orchestrator.ok,
        orchestrator.failed,
    );

    let corrected = orchestrator.into_records();
    export::write_json(&args.output_dir.join("finale_corrected.json"), &corrected)?;
    export::write_csv(&args.output_dir.join("finale_corrected.csv"), &corrected)?;

    let report = Reconciliation::compute(&original, &corrected);
    tracing::info!(
        target: "report",
        "records {}/{}, {} still all-zero, score validity {:.1}%",
        report.corrected,
        report.original,
        report.all_zero,
        report.validity_ratio() * 100.0,
    );

    if report.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!(
            target: "report",
            "\x1b[31mcoverage mismatch: {} corrected vs {} original ({} duplicates, {} foreign) - rerun required\x1b[0m",
            report.corrected,
            report.original,
            report.duplicates,
            report.foreign,
        );
        Ok(ExitCode::FAILURE)
    }
}
