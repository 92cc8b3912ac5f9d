use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::model::{CollatedRow, PartialCollatedRow};
use crate::util::{ensure_directory, percentage};

pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open table: {}", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: T =
            record.with_context(|| format!("failed to parse row in {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    write_rows_inner(path, rows, true)
}

pub fn write_rows_headerless<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    write_rows_inner(path, rows, false)
}

fn write_rows_inner<T: Serialize>(path: &Path, rows: &[T], headers: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(headers)
        .from_path(path)
        .with_context(|| format!("failed to create table: {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("failed to write row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush table: {}", path.display()))?;
    Ok(())
}

pub fn read_collated(path: &Path) -> Result<Vec<CollatedRow>> {
    let partial: Vec<PartialCollatedRow> = read_rows(path)?;
    let complete = drop_missing(partial, path);
    let mut rows = drop_duplicates(complete, path);
    sort_canonical(&mut rows);
    Ok(rows)
}

pub fn write_collated(path: &Path, mut rows: Vec<CollatedRow>) -> Result<()> {
    sort_canonical(&mut rows);
    write_rows(path, &rows)
}

pub fn sort_canonical(rows: &mut [CollatedRow]) {
    rows.sort_by(|a, b| {
        a.question
            .cmp(&b.question)
            .then_with(|| a.system.cmp(&b.system))
    });
}

pub fn group_by_system(rows: &[CollatedRow]) -> BTreeMap<String, Vec<CollatedRow>> {
    let mut groups: BTreeMap<String, Vec<CollatedRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.system.clone()).or_default().push(row.clone());
    }
    groups
}

fn drop_missing(rows: Vec<PartialCollatedRow>, path: &Path) -> Vec<CollatedRow> {
    let total = rows.len();
    let mut complete = Vec::with_capacity(total);

    for row in rows {
        let PartialCollatedRow {
            question,
            system,
            answer,
            confidence,
            in_purview,
            correct,
            frequency,
        } = row;
        let answer = answer.unwrap_or_default();
        if question.is_empty() || system.is_empty() || answer.is_empty() {
            continue;
        }
        let (Some(confidence), Some(in_purview), Some(correct), Some(frequency)) =
            (confidence, in_purview, correct, frequency)
        else {
            continue;
        };
        complete.push(CollatedRow {
            question,
            system,
            answer,
            confidence,
            in_purview,
            correct,
            frequency,
        });
    }

    let dropped = total - complete.len();
    if dropped > 0 {
        warn!(
            dropped,
            total,
            percent = format!("{:.3}", percentage(dropped, total)),
            path = %path.display(),
            "dropped rows with missing values"
        );
    }
    complete
}

fn drop_duplicates(rows: Vec<CollatedRow>, path: &Path) -> Vec<CollatedRow> {
    let total = rows.len();
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(total);
    for row in rows {
        if seen.insert((row.question.clone(), row.system.clone())) {
            kept.push(row);
        }
    }

    let dropped = total - kept.len();
    if dropped > 0 {
        warn!(
            dropped,
            total,
            percent = format!("{:.3}", percentage(dropped, total)),
            path = %path.display(),
            "duplicate (Question, System) rows dropped, keeping the first of each"
        );
    }
    kept
}

#[cfg(test)]
mod tests {
    use crate::model::{CollatedRow, CombinedRow};

    use super::{group_by_system, read_collated, write_collated, write_rows};

    fn row(question: &str, system: &str, confidence: f64) -> CollatedRow {
        CollatedRow {
            question: question.to_string(),
            system: system.to_string(),
            answer: format!("answer to {question}"),
            confidence,
            in_purview: true,
            correct: true,
            frequency: 1,
        }
    }

    #[test]
    fn collated_round_trip_is_canonically_sorted() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("collated.csv");

        let rows = vec![
            row("q2", "alpha", 0.5),
            row("q1", "beta", 0.6),
            row("q1", "alpha", 0.7),
        ];
        write_collated(&path, rows).expect("write should succeed");

        let read = read_collated(&path).expect("read should succeed");
        let keys: Vec<(&str, &str)> = read
            .iter()
            .map(|r| (r.question.as_str(), r.system.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![("q1", "alpha"), ("q1", "beta"), ("q2", "alpha")]
        );
    }

    #[test]
    fn rows_with_missing_fields_are_dropped() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("collated.csv");
        std::fs::write(
            &path,
            "Question,System,Answer,Confidence,InPurview,Correct,Frequency\n\
             q1,alpha,a1,0.9,true,true,3\n\
             q2,alpha,,0.5,true,false,2\n\
             q3,alpha,a3,,true,false,2\n",
        )
        .expect("seed file");

        let read = read_collated(&path).expect("read should succeed");
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].question, "q1");
    }

    #[test]
    fn duplicate_rows_keep_first_occurrence() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("collated.csv");

        let mut first = row("q1", "alpha", 0.9);
        first.answer = "kept".to_string();
        let mut second = row("q1", "alpha", 0.1);
        second.answer = "shadowed".to_string();
        write_rows(&path, &[first, second]).expect("write should succeed");

        let read = read_collated(&path).expect("read should succeed");
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].answer, "kept");
    }

    #[test]
    fn readers_tolerate_provenance_column() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("combined.csv");

        let combined = CombinedRow {
            question: "q1".to_string(),
            system: "oracle".to_string(),
            answer: "a1".to_string(),
            confidence: 0.75,
            in_purview: true,
            correct: true,
            frequency: 4,
            provenance: "alpha".to_string(),
        };
        write_rows(&path, &[combined]).expect("write should succeed");

        let read = read_collated(&path).expect("read should succeed");
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].system, "oracle");
        assert_eq!(read[0].frequency, 4);
    }

    #[test]
    fn group_by_system_splits_in_label_order() {
        let rows = vec![
            row("q1", "beta", 0.1),
            row("q1", "alpha", 0.2),
            row("q2", "beta", 0.3),
        ];
        let groups = group_by_system(&rows);
        let labels: Vec<&String> = groups.keys().collect();
        assert_eq!(labels, vec!["alpha", "beta"]);
        assert_eq!(groups["beta"].len(), 2);
    }
}
