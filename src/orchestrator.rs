use core::time::Duration;
use std::path::PathBuf;

use futures_util::{StreamExt as _, stream};
use rand::Rng as _;

use crate::{
    checkpoint,
    correct::apply_scores,
    fetch::{FetchOutcome, ScoreSource},
    model::{Record, ScoreTable},
    values::parse_values,
};

pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_CHECKPOINT_EVERY: usize = 5;
pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

/// Drives the whole corpus through fetch -> parse -> correct with periodic
/// checkpoints. Owns its score source and working list; constructed per
/// run, no process-wide state.
pub struct Orchestrator<S> {
    source: S,
    out_dir: PathBuf,
    pub batch_size: usize,
    pub checkpoint_every: usize,
    /// Fetches in flight at once. Results are re-sorted to input order by
    /// the order-preserving stream, so checkpoints stay reproducible.
    pub concurrency: usize,
    pub delay: Duration,
    corrected: Vec<Record>,
    pub ok: usize,
    pub failed: usize,
}

impl<S: ScoreSource> Orchestrator<S> {
    pub fn new(source: S, out_dir: PathBuf) -> Self {
        Self {
            source,
            out_dir,
            batch_size: DEFAULT_BATCH_SIZE,
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            concurrency: 1,
            delay: DEFAULT_DELAY,
            corrected: Vec::new(),
            ok: 0,
            failed: 0,
        }
    }

    /// Seed the working list with records already covered by a checkpoint.
    pub fn resume_from(&mut self, done: Vec<Record>) {
        self.corrected = done;
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.corrected
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.corrected
    }

    /// Process every pending record, appending each one (corrected or
    /// carried forward unmodified) to the working list. A final checkpoint
    /// is written at the end so the run is resumable even if the caller
    /// dies before exporting.
    pub async fn run(&mut self, pending: Vec<Record>) {
        let batch_size = self.batch_size.max(1);
        let width = self.concurrency.max(1);
        let total_batches = pending.len().div_ceil(batch_size);
        // number batches over the whole corpus, not just this session's slice
        let batch_offset = completed_batches(self.corrected.len(), batch_size);
        let display_total = batch_offset + total_batches;

        let mut records = pending.into_iter();
        for batch_idx in 0..total_batches {
            let batch: Vec<Record> = records.by_ref().take(batch_size).collect();
            let len = batch.len();
            tracing::info!(
                target: "worker",
                "batch {}/{display_total} ({len} records)",
                batch_offset + batch_idx + 1,
            );

            let source = &self.source;
            let delay = self.delay;
            let results: Vec<(Record, bool)> = stream::iter(batch.into_iter().enumerate())
                .map(|(i, record)| process_one(source, i + 1, len, record, delay))
                .buffered(width)
                .collect()
                .await;

            for (record, corrected) in results {
                if corrected {
                    self.ok += 1;
                } else {
                    self.failed += 1;
                }
                self.corrected.push(record);
            }

            if (batch_idx + 1) % self.checkpoint_every.max(1) == 0 {
                self.try_checkpoint();
            }
        }

        self.try_checkpoint();
    }

    /// Write failures are not fatal; the in-memory list is intact and the
    /// next cadence point retries.
    fn try_checkpoint(&self) {
        match checkpoint::write_checkpoint(&self.out_dir, &self.corrected) {
            Ok(path) => tracing::info!(
                target: "checkpoint",
                "saved {} records to {}",
                self.corrected.len(),
                path.display(),
            ),
            Err(e) => tracing::error!(target: "checkpoint", "\x1b[31mwrite failed: {e}\x1b[0m"),
        }
    }
}

/// Batches fully covered by the resumed count. A partially-done batch
/// counts as complete so the progress line never renumbers work from a
/// previous session.
fn completed_batches(done: usize, batch_size: usize) -> usize {
    done.div_ceil(batch_size)
}

async fn process_one<S: ScoreSource>(
    source: &S,
    seq: usize,
    len: usize,
    mut record: Record,
    delay: Duration,
) -> (Record, bool) {
    let scores = match source.fetch_values(&record.ramz_id).await {
        FetchOutcome::Payload(body) => parse_values(&body),
        FetchOutcome::Empty => ScoreTable::new(),
        FetchOutcome::Transient(reason) => {
            tracing::warn!(target: "worker", "{}: {reason}", record.ramz_id);
            ScoreTable::new()
        }
    };

    let c = apply_scores(&mut record, scores);
    if c.corrected {
        tracing::info!(
            target: "worker",
            "  {seq}/{len}: {} \x1b[32mok\x1b[0m ({} scores)",
            record.ramz_id,
            c.non_zero,
        );
    } else {
        tracing::info!(
            target: "worker",
            "  {seq}/{len}: {} \x1b[31mno scores\x1b[0m",
            record.ramz_id,
        );
    }

    if !delay.is_zero() {
        // polite pacing with a little jitter, the remote has anti-abuse
        // tripwires
        let jitter = rand::rng().random_range(0..=delay.as_millis() as u64 / 2);
        tokio::time::sleep(delay + Duration::from_millis(jitter)).await;
    }

    (record, c.corrected)
}
