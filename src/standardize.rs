use anyhow::{Result, bail};
use tracing::warn;

use crate::curves::{confidence_thresholds, precision, questions_attempted};
use crate::model::CollatedRow;

pub fn rank_standardize(confidences: &[f64]) -> Vec<f64> {
    let n = confidences.len();
    if n == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| confidences[a].total_cmp(&confidences[b]));

    let mut standardized = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start;
        while end + 1 < n
            && confidences[order[end + 1]].total_cmp(&confidences[order[start]]).is_eq()
        {
            end += 1;
        }
        let average_rank = (start + 1 + end + 1) as f64 / 2.0;
        let percentile = average_rank / n as f64;
        for &index in &order[start..=end] {
            standardized[index] = percentile;
        }
        start = end + 1;
    }
    standardized
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundedVariant {
    PrecisionOnly,
    InverseQa,
    InverseQaPCorrected,
}

impl GroundedVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrecisionOnly => "precision_only",
            Self::InverseQa => "inverse_qa",
            Self::InverseQaPCorrected => "inverse_qa_p_corrected",
        }
    }
}

pub struct GroundedScale {
    points: Vec<(f64, f64)>,
}

impl GroundedScale {
    pub fn fit(rows: &[CollatedRow], variant: GroundedVariant) -> Result<Self> {
        let mut points = Vec::new();
        for threshold in confidence_thresholds(rows, false) {
            let value = match variant {
                GroundedVariant::PrecisionOnly => precision(rows, threshold),
                GroundedVariant::InverseQa => {
                    questions_attempted(rows, threshold).map(|attempted| 1.0 - attempted)
                }
                GroundedVariant::InverseQaPCorrected => {
                    match (questions_attempted(rows, threshold), precision(rows, threshold)) {
                        (Some(attempted), Some(precision)) => {
                            Some((1.0 - attempted) * precision)
                        }
                        _ => None,
                    }
                }
            };
            match value {
                Some(value) => points.push((threshold, value)),
                None => warn!(
                    threshold = format!("{threshold:.3}"),
                    variant = variant.as_str(),
                    "metric undefined at threshold, excluded from grounding"
                ),
            }
        }
        if points.is_empty() {
            bail!(
                "no threshold with a defined {} metric, cannot standardize",
                variant.as_str()
            );
        }
        Ok(Self { points })
    }

    pub fn standardize(&self, confidence: f64) -> f64 {
        let mut best = self.points[0];
        let mut best_distance = (confidence - best.0).abs();
        for &(threshold, value) in &self.points[1..] {
            let distance = (confidence - threshold).abs();
            if distance < best_distance {
                best = (threshold, value);
                best_distance = distance;
            }
        }
        best.1
    }
}

pub fn precision_standardize(rows: &[CollatedRow], variant: GroundedVariant) -> Result<Vec<f64>> {
    let scale = GroundedScale::fit(rows, variant)?;
    Ok(rows.iter().map(|row| scale.standardize(row.confidence)).collect())
}

#[cfg(test)]
mod tests {
    use crate::model::CollatedRow;

    use super::{GroundedScale, GroundedVariant, precision_standardize, rank_standardize};

    fn row(question: &str, confidence: f64, in_purview: bool, correct: bool) -> CollatedRow {
        CollatedRow {
            question: question.to_string(),
            system: "alpha".to_string(),
            answer: format!("answer to {question}"),
            confidence,
            in_purview,
            correct,
            frequency: 1,
        }
    }

    #[test]
    fn rank_values_stay_in_half_open_unit_interval() {
        let standardized = rank_standardize(&[0.2, 0.9, 0.4, 0.9]);
        for value in &standardized {
            assert!(*value > 0.0 && *value <= 1.0, "out of range: {value}");
        }
        assert_eq!(standardized, vec![0.25, 0.875, 0.5, 0.875]);
    }

    #[test]
    fn rank_preserves_ordering_and_tops_out_at_one() {
        let standardized = rank_standardize(&[0.1, 0.5, 0.9]);
        assert_eq!(standardized, vec![1.0 / 3.0, 2.0 / 3.0, 1.0]);
        assert!(standardized.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn rank_of_empty_distribution_is_empty() {
        assert!(rank_standardize(&[]).is_empty());
    }

    #[test]
    fn precision_only_maps_rows_to_threshold_precision() {
        let rows = vec![
            row("q1", 0.9, true, true),
            row("q2", 0.5, true, false),
        ];
        let standardized = precision_standardize(&rows, GroundedVariant::PrecisionOnly)
            .expect("scale should fit");
        assert_eq!(standardized, vec![1.0, 0.5]);
    }

    #[test]
    fn nearest_threshold_tie_prefers_the_higher_one() {
        let rows = vec![
            row("q1", 0.75, true, true),
            row("q2", 0.25, true, false),
        ];
        let scale = GroundedScale::fit(&rows, GroundedVariant::PrecisionOnly)
            .expect("scale should fit");
        assert_eq!(scale.standardize(0.5), 1.0);
        assert_eq!(scale.standardize(0.3), 0.5);
        assert_eq!(scale.standardize(2.0), 1.0);
    }

    #[test]
    fn grounding_fails_when_no_threshold_is_defined() {
        let rows = vec![row("q1", 0.4, false, false)];
        assert!(precision_standardize(&rows, GroundedVariant::PrecisionOnly).is_err());
    }

    #[test]
    fn inverse_qa_is_one_minus_attempted() {
        let rows = vec![
            row("q1", 0.9, true, true),
            row("q2", 0.5, true, false),
        ];
        let standardized = precision_standardize(&rows, GroundedVariant::InverseQa)
            .expect("scale should fit");
        assert_eq!(standardized, vec![0.5, 0.0]);
    }
}
