use std::time::SystemTime;

use crate::{
    model::{Record, ScoreTable},
    values::complete_scores,
};

/// What one correction attempt did to a record, for the progress line.
/// A failed attempt is not an error: the record simply keeps whatever
/// scores it already had.
#[derive(Clone, Copy, Debug)]
pub struct Correction {
    pub corrected: bool,
    pub non_zero: usize,
}

/// Apply a freshly parsed score table onto a record.
///
/// Non-empty table: the record's `historical_scores` is replaced wholesale
/// by the window-complete version (no field-by-field merge) and the
/// correction stamp is set. Re-applying a table the record already carries
/// changes nothing, stamp included, so correction is exactly idempotent.
/// Empty table: the record is left bit-for-bit untouched, so a failed
/// fetch can never zero out data from an earlier run.
pub fn apply_scores(record: &mut Record, scores: ScoreTable) -> Correction {
    if scores.is_empty() {
        return Correction {
            corrected: false,
            non_zero: 0,
        };
    }

    let completed = complete_scores(&scores);
    if record.historical_scores != completed {
        record.historical_scores = completed;
        record.scores_corrected_at = Some(httpdate::fmt_http_date(SystemTime::now()));
    } else if record.scores_corrected_at.is_none() {
        record.scores_corrected_at = Some(httpdate::fmt_http_date(SystemTime::now()));
    }

    Correction {
        corrected: true,
        non_zero: record.non_zero_scores(),
    }
}
