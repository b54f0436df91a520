//! Final artifact writers: the merged JSON array and the denormalized CSV
//! where `historical_scores` becomes one `score_<year>` column per year.

use std::{
    fs,
    io::{BufWriter, Write as _},
    path::Path,
};

use serde_json::Value;

use crate::model::{FIRST_YEAR, LAST_YEAR, Record};

pub fn write_json(path: &Path, records: &[Record]) -> anyhow::Result<()> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

/// CSV columns: `ramz_id`, the union of descriptive fields in first-seen
/// order, the correction stamp, then `score_2011..score_2024`. Years a
/// record never fetched render as the empty string; an explicit 0 renders
/// as 0.
pub fn write_csv(path: &Path, records: &[Record]) -> anyhow::Result<()> {
    let mut extra_fields: Vec<&str> = Vec::new();
    for record in records {
        for key in record.extra.keys() {
            if !extra_fields.contains(&key.as_str()) {
                extra_fields.push(key);
            }
        }
    }

    let mut writer = csv::Writer::from_path(path)?;

    let mut header: Vec<String> = Vec::with_capacity(extra_fields.len() + 16);
    header.push("ramz_id".to_owned());
    header.extend(extra_fields.iter().map(|&f| f.to_owned()));
    header.push("scores_corrected_at".to_owned());
    header.extend((FIRST_YEAR..=LAST_YEAR).map(|year| format!("score_{year}")));
    writer.write_record(&header)?;

    for record in records {
        let mut row: Vec<String> = Vec::with_capacity(header.len());
        row.push(record.ramz_id.to_string());
        for field in &extra_fields {
            row.push(match record.extra.get(*field) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                // nested values are rare and kept as literal JSON
                Some(other) => other.to_string(),
            });
        }
        row.push(record.scores_corrected_at.clone().unwrap_or_default());
        for year in FIRST_YEAR..=LAST_YEAR {
            row.push(
                record
                    .historical_scores
                    .get(&year)
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            );
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<Record> {
        serde_json::from_str(
            r#"[
                {
                    "ramz_id": "10123",
                    "university_name": "جامعة تونس",
                    "historical_scores": {"2020": 109.8251, "2021": 0.0},
                    "scores_corrected_at": "Fri, 11 Jul 2025 23:07:35 GMT"
                },
                {
                    "ramz_id": "20456",
                    "table_capacity": 45,
                    "historical_scores": {}
                }
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn csv_flattens_scores_into_year_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_csv(&path, &records()).unwrap();

        let body = fs::read_to_string(&path).unwrap();
        let mut lines = body.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("ramz_id,university_name,table_capacity,"));
        assert!(header.ends_with("score_2023,score_2024"));
        assert_eq!(header.matches("score_").count(), 14);

        let first = lines.next().unwrap();
        // explicit zero survives, absent years are empty
        assert!(first.contains("109.8251,0,"));
        assert!(first.ends_with(",,,"));

        let second = lines.next().unwrap();
        assert!(second.starts_with("20456,,45,"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn json_roundtrip_preserves_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let original = records();
        write_json(&path, &original).unwrap();

        let reloaded = crate::checkpoint::load_records(&path).unwrap();
        assert_eq!(reloaded.len(), original.len());
        assert_eq!(reloaded[0].historical_scores[&2020], 109.8251);
        assert_eq!(reloaded[1].extra["table_capacity"], 45);
    }
}
