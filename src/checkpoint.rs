//! Checkpoint files, the manifest that indexes them, and the identity-set
//! reconciliation that makes resumed runs idempotent.

use std::{
    fs,
    io::{BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use compact_str::CompactString;
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::model::{Record, in_score_range};

pub const MANIFEST_FILE: &str = "manifest.json";

/// Index of the newest checkpoint. Resume logic reads this, never a
/// directory listing, so recovery does not depend on lexical filename
/// order or on an operator picking "the latest temp file" by hand.
#[derive(Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub checkpoint: PathBuf,
    pub covered: usize,
}

pub fn load_records(path: &Path) -> anyhow::Result<Vec<Record>> {
    let file = fs::File::open(path)
        .map_err(|e| anyhow::anyhow!("open {}: {e}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| anyhow::anyhow!("parse {}: {e}", path.display()))
}

fn write_json(path: &Path, records: &[Record]) -> anyhow::Result<()> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

// distinguishes checkpoints written within the same millisecond
static CHECKPOINT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Persist the working list as a new timestamped checkpoint, then point
/// the manifest at it. The manifest is only updated after the checkpoint
/// write succeeded, so it never references a torn file.
pub fn write_checkpoint(dir: &Path, records: &[Record]) -> anyhow::Result<PathBuf> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let seq = CHECKPOINT_SEQ.fetch_add(1, Ordering::Relaxed);
    let path = dir.join(format!("checkpoint_{millis}_{seq:04}.json"));
    write_json(&path, records)?;

    let manifest = Manifest {
        checkpoint: path.clone(),
        covered: records.len(),
    };
    let file = fs::File::create(dir.join(MANIFEST_FILE))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &manifest)?;
    writer.flush()?;
    Ok(path)
}

pub fn load_manifest(dir: &Path) -> Option<Manifest> {
    let file = fs::File::open(dir.join(MANIFEST_FILE)).ok()?;
    match serde_json::from_reader(BufReader::new(file)) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            tracing::warn!(target: "checkpoint", "unreadable manifest, cold start: {e}");
            None
        }
    }
}

/// Records of the manifest's newest checkpoint, or an empty list when no
/// manifest exists yet.
pub fn latest_checkpoint(dir: &Path) -> anyhow::Result<Vec<Record>> {
    match load_manifest(dir) {
        Some(manifest) => {
            let records = load_records(&manifest.checkpoint)?;
            if records.len() != manifest.covered {
                tracing::warn!(
                    target: "checkpoint",
                    "manifest says {} records, checkpoint holds {}",
                    manifest.covered,
                    records.len(),
                );
            }
            Ok(records)
        }
        None => Ok(Vec::new()),
    }
}

/// Drop repeated identities, first occurrence wins. Merging several
/// checkpoint generations can legitimately produce repeats; processing a
/// record twice must not.
#[must_use]
pub fn dedup_by_identity(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| seen.insert(record.ramz_id.clone()))
        .collect()
}

/// Identity-set diff: original records not yet covered by the checkpoint,
/// in original order. This is the whole resume contract, so that work
/// done before an interruption is never redone and never lost.
#[must_use]
pub fn pending(original: &[Record], done: &[Record]) -> Vec<Record> {
    let covered: HashSet<&CompactString> = done.iter().map(|r| &r.ramz_id).collect();
    original
        .iter()
        .filter(|record| !covered.contains(&record.ramz_id))
        .cloned()
        .collect()
}

/// Final coverage check plus the human-readable statistics of the run
/// summary. A count mismatch here is the only hard failure of the whole
/// pipeline; silent record loss would defeat its purpose.
#[derive(Debug)]
pub struct Reconciliation {
    pub original: usize,
    pub corrected: usize,
    pub duplicates: usize,
    pub foreign: usize,
    pub all_zero: usize,
    pub total_entries: usize,
    pub valid_entries: usize,
}

impl Reconciliation {
    #[must_use]
    pub fn compute(original: &[Record], corrected: &[Record]) -> Self {
        let known: HashSet<&CompactString> = original.iter().map(|r| &r.ramz_id).collect();

        let mut seen = HashSet::with_capacity(corrected.len());
        let mut duplicates = 0;
        let mut foreign = 0;
        let mut all_zero = 0;
        let mut total_entries = 0;
        let mut valid_entries = 0;

        for record in corrected {
            if !seen.insert(&record.ramz_id) {
                duplicates += 1;
            }
            if !known.contains(&record.ramz_id) {
                foreign += 1;
            }
            if record.is_all_zero() {
                all_zero += 1;
            }
            total_entries += record.historical_scores.len();
            valid_entries += record
                .historical_scores
                .values()
                .filter(|s| in_score_range(**s))
                .count();
        }

        Self {
            original: original.len(),
            corrected: corrected.len(),
            duplicates,
            foreign,
            all_zero,
            total_entries,
            valid_entries,
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.corrected == self.original && self.duplicates == 0 && self.foreign == 0
    }

    /// Fraction of all score entries within the admitted scale.
    #[must_use]
    pub fn validity_ratio(&self) -> f64 {
        if self.total_entries == 0 {
            0.0
        } else {
            self.valid_entries as f64 / self.total_entries as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> Record {
        serde_json::from_str(&format!(r#"{{"ramz_id": "{id}"}}"#)).unwrap()
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.ramz_id.as_str()).collect()
    }

    #[test]
    fn pending_is_the_exact_set_difference_in_input_order() {
        let original = vec![record("A"), record("B"), record("C"), record("D")];
        let done = vec![record("C"), record("A")];
        assert_eq!(ids(&pending(&original, &done)), ["B", "D"]);
    }

    #[test]
    fn pending_with_empty_checkpoint_is_everything() {
        let original = vec![record("A"), record("B")];
        assert_eq!(pending(&original, &[]).len(), 2);
    }

    #[test]
    fn pending_with_full_checkpoint_is_empty() {
        let original = vec![record("A"), record("B")];
        let done = original.clone();
        assert!(pending(&original, &done).is_empty());
    }

    #[test]
    fn dedup_keeps_the_first_occurrence() {
        let mut first = record("A");
        first.historical_scores.insert(2020, 109.8251);
        let merged = vec![first, record("B"), record("A")];

        let deduped = dedup_by_identity(merged);
        assert_eq!(ids(&deduped), ["A", "B"]);
        assert_eq!(deduped[0].historical_scores[&2020], 109.8251);
    }

    #[test]
    fn reconciliation_flags_gaps_duplicates_and_foreign_records() {
        let original = vec![record("A"), record("B"), record("C")];

        let complete = Reconciliation::compute(&original, &original);
        assert!(complete.is_complete());

        let gap = Reconciliation::compute(&original, &original[..2]);
        assert!(!gap.is_complete());

        let dup = vec![record("A"), record("B"), record("A")];
        let r = Reconciliation::compute(&original, &dup);
        assert_eq!(r.duplicates, 1);
        assert!(!r.is_complete());

        let foreign = vec![record("A"), record("B"), record("Z")];
        let r = Reconciliation::compute(&original, &foreign);
        assert_eq!(r.foreign, 1);
        assert!(!r.is_complete());
    }

    #[test]
    fn reconciliation_counts_validity_and_blanks() {
        let mut a = record("A");
        a.historical_scores.insert(2020, 109.8251);
        a.historical_scores.insert(2021, 0.0);
        let b = record("B");

        let r = Reconciliation::compute(&[a.clone(), b.clone()], &[a, b]);
        assert_eq!(r.all_zero, 1);
        assert_eq!(r.total_entries, 2);
        assert_eq!(r.valid_entries, 2);
        assert!((r.validity_ratio() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn back_to_back_checkpoints_never_share_a_filename() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record("A")];

        let first = write_checkpoint(dir.path(), &records).unwrap();
        let second = write_checkpoint(dir.path(), &records).unwrap();
        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());

        // manifest tracks the newest of the two
        let manifest = load_manifest(dir.path()).unwrap();
        assert_eq!(manifest.checkpoint, second);
    }

    #[test]
    fn checkpoint_roundtrip_through_the_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record("A"), record("B")];

        assert!(latest_checkpoint(dir.path()).unwrap().is_empty());

        let path = write_checkpoint(dir.path(), &records).unwrap();
        assert!(path.exists());

        let manifest = load_manifest(dir.path()).unwrap();
        assert_eq!(manifest.covered, 2);
        assert_eq!(manifest.checkpoint, path);

        let loaded = latest_checkpoint(dir.path()).unwrap();
        assert_eq!(ids(&loaded), ["A", "B"]);
    }
}
