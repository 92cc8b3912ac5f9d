use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::model::{CollatedRow, THRESHOLD};
use crate::util::ensure_directory;

pub fn confidence_thresholds(rows: &[CollatedRow], add_sentinel: bool) -> Vec<f64> {
    let mut thresholds: Vec<f64> = rows.iter().map(|row| row.confidence).collect();
    thresholds.sort_by(|a, b| b.total_cmp(a));
    thresholds.dedup();
    if add_sentinel && thresholds.first() != Some(&f64::INFINITY) {
        thresholds.insert(0, f64::INFINITY);
    }
    thresholds
}

pub fn precision(rows: &[CollatedRow], threshold: f64) -> Option<f64> {
    let numerator = frequency_sum(rows, |row| row.correct && row.confidence >= threshold);
    let denominator = frequency_sum(rows, |row| row.in_purview && row.confidence >= threshold);
    ratio_or_undefined(numerator, denominator, "precision", threshold)
}

pub fn questions_attempted(rows: &[CollatedRow], threshold: f64) -> Option<f64> {
    let numerator = frequency_sum(rows, |row| row.in_purview && row.confidence >= threshold);
    let denominator = frequency_sum(rows, |row| row.in_purview);
    ratio_or_undefined(numerator, denominator, "questions_attempted", threshold)
}

pub fn true_positive_rate(rows: &[CollatedRow], threshold: f64) -> Option<f64> {
    let numerator = frequency_sum(rows, |row| row.correct && row.confidence >= threshold);
    let denominator = frequency_sum(rows, |row| row.in_purview);
    ratio_or_undefined(numerator, denominator, "true_positive_rate", threshold)
}

pub fn false_positive_rate(rows: &[CollatedRow], threshold: f64) -> Option<f64> {
    let numerator = frequency_sum(rows, |row| !row.in_purview && row.confidence >= threshold);
    let denominator = frequency_sum(rows, |row| !row.in_purview);
    ratio_or_undefined(numerator, denominator, "false_positive_rate", threshold)
}

fn frequency_sum<P>(rows: &[CollatedRow], qualifies: P) -> u64
where
    P: Fn(&CollatedRow) -> bool,
{
    rows.iter()
        .filter(|row| qualifies(row))
        .map(|row| row.frequency)
        .sum()
}

fn ratio_or_undefined(
    numerator: u64,
    denominator: u64,
    metric: &'static str,
    threshold: f64,
) -> Option<f64> {
    if denominator == 0 {
        warn!(
            metric,
            threshold = format!("{threshold:.3}"),
            "no qualifying frequency, metric undefined"
        );
        return None;
    }
    Some(numerator as f64 / denominator as f64)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub threshold: f64,
    pub x: f64,
    pub y: f64,
}

pub fn precision_curve(rows: &[CollatedRow]) -> Vec<CurvePoint> {
    sweep(rows, false, questions_attempted, precision)
}

pub fn roc_curve(rows: &[CollatedRow]) -> Vec<CurvePoint> {
    sweep(rows, true, false_positive_rate, true_positive_rate)
}

fn sweep(
    rows: &[CollatedRow],
    add_sentinel: bool,
    x_metric: fn(&[CollatedRow], f64) -> Option<f64>,
    y_metric: fn(&[CollatedRow], f64) -> Option<f64>,
) -> Vec<CurvePoint> {
    let mut points = Vec::new();
    for threshold in confidence_thresholds(rows, add_sentinel) {
        match (x_metric(rows, threshold), y_metric(rows, threshold)) {
            (Some(x), Some(y)) => points.push(CurvePoint { threshold, x, y }),
            _ => warn!(
                threshold = format!("{threshold:.3}"),
                "curve point undefined, omitted"
            ),
        }
    }
    points
}

pub fn write_curve(path: &Path, points: &[CurvePoint], x_name: &str, y_name: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }

    let mut ascending: Vec<CurvePoint> = points.to_vec();
    ascending.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create curve file: {}", path.display()))?;
    writer
        .write_record([THRESHOLD, x_name, y_name])
        .with_context(|| format!("failed to write curve header: {}", path.display()))?;
    for point in &ascending {
        writer
            .write_record([
                point.threshold.to_string(),
                point.x.to_string(),
                point.y.to_string(),
            ])
            .with_context(|| format!("failed to write curve row: {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush curve file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::model::CollatedRow;

    use super::{
        CurvePoint, confidence_thresholds, precision, precision_curve, questions_attempted,
        roc_curve, write_curve,
    };

    fn row(question: &str, confidence: f64, in_purview: bool, correct: bool, frequency: u64) -> CollatedRow {
        CollatedRow {
            question: question.to_string(),
            system: "alpha".to_string(),
            answer: format!("answer to {question}"),
            confidence,
            in_purview,
            correct,
            frequency,
        }
    }

    #[test]
    fn thresholds_are_distinct_and_descending() {
        let rows = vec![
            row("q1", 0.2, true, true, 1),
            row("q2", 0.9, true, true, 1),
            row("q3", 0.9, true, false, 1),
            row("q4", 0.5, false, false, 1),
        ];
        assert_eq!(confidence_thresholds(&rows, false), vec![0.9, 0.5, 0.2]);
        assert_eq!(
            confidence_thresholds(&rows, true),
            vec![f64::INFINITY, 0.9, 0.5, 0.2]
        );
    }

    #[test]
    fn nothing_is_attempted_at_infinity() {
        let rows = vec![row("q1", 0.9, true, true, 5), row("q2", 0.1, true, false, 2)];
        assert_eq!(questions_attempted(&rows, f64::INFINITY), Some(0.0));
    }

    #[test]
    fn precision_is_positive_at_the_top_threshold() {
        let rows = vec![row("q1", 0.9, true, true, 5), row("q2", 0.1, true, false, 2)];
        let top = precision(&rows, 0.9).expect("in-purview row qualifies");
        assert!(top > 0.0, "unexpected precision: {top}");
        assert_eq!(top, 1.0);
    }

    #[test]
    fn precision_is_frequency_weighted() {
        let rows = vec![
            row("q1", 0.9, true, true, 3),
            row("q2", 0.9, true, false, 1),
        ];
        assert_eq!(precision(&rows, 0.9), Some(0.75));
    }

    #[test]
    fn precision_with_no_qualifying_purview_is_undefined() {
        let rows = vec![row("q1", 0.4, false, false, 7)];
        assert_eq!(precision(&rows, 0.2), None, "sentinel, not zero");
    }

    #[test]
    fn roc_curve_starts_at_the_origin() {
        let rows = vec![
            row("q1", 0.9, true, true, 2),
            row("q2", 0.7, false, false, 1),
            row("q3", 0.3, true, false, 1),
        ];
        let curve = roc_curve(&rows);
        let origin = curve.first().expect("sentinel point should exist");
        assert_eq!(origin.threshold, f64::INFINITY);
        assert_eq!((origin.x, origin.y), (0.0, 0.0));
        assert!(curve.len() > 1);
    }

    #[test]
    fn roc_curve_is_empty_when_rates_are_undefined() {
        let rows = vec![row("q1", 0.9, true, true, 2)];
        assert!(roc_curve(&rows).is_empty(), "no out-of-purview rows");
    }

    #[test]
    fn precision_curve_spans_all_defined_thresholds() {
        let rows = vec![
            row("q1", 0.9, true, true, 2),
            row("q2", 0.5, true, false, 2),
            row("q3", 0.1, false, false, 1),
        ];
        let curve = precision_curve(&rows);
        let thresholds: Vec<f64> = curve.iter().map(|p| p.threshold).collect();
        assert_eq!(thresholds, vec![0.9, 0.5, 0.1]);
        assert_eq!(curve[0].y, 1.0);
        assert_eq!(curve[1].y, 0.5);
    }

    #[test]
    fn curve_files_are_sorted_ascending_by_threshold() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("precision.alpha.csv");
        let points = vec![
            CurvePoint { threshold: 0.9, x: 0.4, y: 1.0 },
            CurvePoint { threshold: 0.2, x: 1.0, y: 0.5 },
        ];

        write_curve(&path, &points, "QuestionsAttempted", "Precision")
            .expect("curve should be written");

        let contents = std::fs::read_to_string(&path).expect("curve file should be readable");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "Threshold,QuestionsAttempted,Precision");
        assert_eq!(lines[1], "0.2,1,0.5");
        assert_eq!(lines[2], "0.9,0.4,1");
    }
}
