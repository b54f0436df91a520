use std::{fs, path::PathBuf};

use clap::Parser;
use rzc::{checkpoint, export};

/// Re-export a corrected dataset as final JSON + flattened CSV without
/// touching the network.
#[derive(Parser)]
struct Args {
    /// Corrected dataset or checkpoint, a JSON array of records
    #[arg(short, long)]
    input: PathBuf,

    #[arg(short, long, default_value = "out")]
    output_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init_timed();
    let args = Args::parse();

    fs::create_dir_all(&args.output_dir)?;

    let records = checkpoint::dedup_by_identity(checkpoint::load_records(&args.input)?);

    let json_path = args.output_dir.join("final.json");
    let csv_path = args.output_dir.join("final.csv");
    export::write_json(&json_path, &records)?;
    export::write_csv(&csv_path, &records)?;

    log::info!(
        target: "export",
        "{} records written to {} and {}",
        records.len(),
        json_path.display(),
        csv_path.display(),
    );
    Ok(())
}
