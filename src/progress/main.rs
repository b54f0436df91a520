use std::path::PathBuf;

use clap::Parser;
use rzc::checkpoint::{self, Reconciliation};

/// Report correction progress against the newest checkpoint, offline.
#[derive(Parser)]
struct Args {
    /// Original dataset, a JSON array of records
    #[arg(short, long)]
    input: PathBuf,

    /// Directory holding the manifest and checkpoints
    #[arg(short, long, default_value = "out")]
    output_dir: PathBuf,

    #[arg(long, default_value_t = 20)]
    batch_size: usize,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init_timed();
    let args = Args::parse();

    let original = checkpoint::load_records(&args.input)?;
    let done = checkpoint::dedup_by_identity(checkpoint::latest_checkpoint(&args.output_dir)?);

    if done.is_empty() {
        log::info!(target: "progress", "no checkpoint yet, {} records pending", original.len());
        return Ok(());
    }

    let remaining = checkpoint::pending(&original, &done);
    let percent = done.len() as f64 / original.len().max(1) as f64 * 100.0;
    log::info!(
        target: "progress",
        "{}/{} corrected ({percent:.1}%), {} remaining",
        done.len(),
        original.len(),
        remaining.len(),
    );

    let batch_size = args.batch_size.max(1);
    log::info!(
        target: "progress",
        "batches: {}/{} complete",
        done.len() / batch_size,
        original.len().div_ceil(batch_size),
    );

    let report = Reconciliation::compute(&original, &done);
    log::info!(
        target: "progress",
        "{} records still all-zero, score validity {:.1}%",
        report.all_zero,
        report.validity_ratio() * 100.0,
    );

    if remaining.is_empty() && report.is_complete() {
        log::info!(target: "progress", "\x1b[32mall records corrected\x1b[0m");
    }

    Ok(())
}
