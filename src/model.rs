use std::collections::BTreeMap;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Admission-year window covered by the orientation site.
pub const FIRST_YEAR: u16 = 2011;
pub const LAST_YEAR: u16 = 2024;

/// Upper bound of the admission-score scale; scores outside [0, 220] are
/// discarded, never clamped.
pub const MAX_SCORE: f64 = 220.0;

/// Year -> minimum admission score. Integer keys serialize as JSON strings
/// (`{"2011": 0.0}`), matching the dataset files, with stable key order.
pub type ScoreTable = BTreeMap<u16, f64>;

/// One specialization/admission-track entry.
///
/// Only `historical_scores` and `scores_corrected_at` are ever mutated;
/// every other field of the source dataset (institution, specialization
/// name, capacities, Arabic labels, ...) rides along untouched in `extra`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Record {
    pub ramz_id: CompactString,
    #[serde(default)]
    pub historical_scores: ScoreTable,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores_corrected_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    #[must_use]
    pub fn non_zero_scores(&self) -> usize {
        self.historical_scores.values().filter(|s| **s > 0.0).count()
    }

    /// A record is "still blank" when no year carries a positive score,
    /// whether because correction never ran or because the track truly
    /// admitted nobody in the whole window.
    #[must_use]
    pub fn is_all_zero(&self) -> bool {
        self.non_zero_scores() == 0
    }
}

#[must_use]
pub fn in_year_window(year: u16) -> bool {
    (FIRST_YEAR..=LAST_YEAR).contains(&year)
}

#[must_use]
pub fn in_score_range(score: f64) -> bool {
    (0.0..=MAX_SCORE).contains(&score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_range_excludes_nan_and_out_of_scale() {
        assert!(in_score_range(0.0));
        assert!(in_score_range(220.0));
        assert!(!in_score_range(-0.5));
        assert!(!in_score_range(220.01));
        assert!(!in_score_range(f64::NAN));
    }

    #[test]
    fn record_roundtrips_with_opaque_fields() {
        let raw = r#"{
            "ramz_id": "10123",
            "university_name": "جامعة تونس",
            "table_capacity": "45",
            "historical_scores": {"2011": 0.0, "2020": 109.8251}
        }"#;
        let record: Record = serde_json::from_str(raw).unwrap();
        assert_eq!(record.ramz_id, "10123");
        assert_eq!(record.historical_scores.get(&2020), Some(&109.8251));
        assert_eq!(record.non_zero_scores(), 1);

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["university_name"], "جامعة تونس");
        assert_eq!(back["historical_scores"]["2011"], 0.0);
        // never corrected, so no stamp in the output
        assert!(back.get("scores_corrected_at").is_none());
    }

    #[test]
    fn all_zero_detection() {
        let mut record: Record = serde_json::from_str(r#"{"ramz_id": "10042"}"#).unwrap();
        assert!(record.is_all_zero());
        record.historical_scores.insert(2011, 0.0);
        assert!(record.is_all_zero());
        record.historical_scores.insert(2021, 93.4883);
        assert!(!record.is_all_zero());
    }
}
