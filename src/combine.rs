use std::collections::{BTreeMap, HashMap};

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::model::{CollatedRow, CombinedRow};
use crate::standardize::{GroundedVariant, precision_standardize, rank_standardize};

#[derive(Debug, Clone, Copy)]
pub struct FallbackChoice {
    pub threshold: f64,
    pub precision: f64,
}

type ScoredRows<'a> = HashMap<&'a str, (&'a CollatedRow, f64)>;

pub fn select_systems(
    mut groups: BTreeMap<String, Vec<CollatedRow>>,
    names: &[String],
) -> Result<BTreeMap<String, Vec<CollatedRow>>> {
    if names.is_empty() {
        return Ok(groups);
    }

    let mut selected = BTreeMap::new();
    for name in names {
        match groups.remove(name) {
            Some(rows) => {
                selected.insert(name.clone(), rows);
            }
            None if selected.contains_key(name) => {}
            None => bail!("no rows for system {name}"),
        }
    }
    Ok(selected)
}

pub fn oracle(
    groups: &BTreeMap<String, Vec<CollatedRow>>,
    name: &str,
) -> Result<Vec<CombinedRow>> {
    if groups.len() < 2 {
        bail!("oracle combination needs at least two systems, got {}", groups.len());
    }

    let scored = rank_scored_groups(groups);
    let shared = shared_questions(&scored);
    log_intersection(groups.len(), shared.len(), name);

    let mut combined = Vec::with_capacity(shared.len());
    for question in shared {
        let members: Vec<(&str, &CollatedRow, f64)> = scored
            .iter()
            .map(|(label, rows)| {
                let (row, standardized) = rows[question];
                (label.as_str(), row, standardized)
            })
            .collect();

        let in_purview = members.iter().all(|(_, row, _)| row.in_purview);
        let correct = members.iter().any(|(_, row, _)| row.correct);

        let winner = if correct {
            pick(members.iter().filter(|(_, row, _)| row.correct), |contender, best| {
                contender.2.total_cmp(&best.2).is_gt()
            })
        } else {
            pick(members.iter(), |contender, best| {
                contender.2.total_cmp(&best.2).is_lt()
            })
        };
        let (label, row, standardized) = winner;

        combined.push(CombinedRow {
            question: question.to_string(),
            system: name.to_string(),
            answer: row.answer.clone(),
            confidence: standardized,
            in_purview,
            correct,
            frequency: row.frequency,
            provenance: label.to_string(),
        });
    }

    combined.sort_by(|a, b| a.question.cmp(&b.question));
    Ok(combined)
}

pub fn fallback(
    default_rows: &[CollatedRow],
    secondary_rows: &[CollatedRow],
    name: &str,
) -> Result<(Vec<CombinedRow>, FallbackChoice)> {
    if default_rows.is_empty() || secondary_rows.is_empty() {
        bail!("fallback combination needs rows for both systems");
    }

    let secondary: HashMap<&str, &CollatedRow> = secondary_rows
        .iter()
        .map(|row| (row.question.as_str(), row))
        .collect();
    let mut shared: Vec<(&CollatedRow, &CollatedRow)> = default_rows
        .iter()
        .filter_map(|row| secondary.get(row.question.as_str()).map(|other| (row, *other)))
        .collect();
    shared.sort_by(|a, b| a.0.question.cmp(&b.0.question));
    log_intersection(2, shared.len(), name);
    if shared.is_empty() {
        return Ok((Vec::new(), FallbackChoice { threshold: 0.0, precision: 0.0 }));
    }

    let mut candidates: Vec<f64> = shared.iter().map(|(row, _)| row.confidence).collect();
    candidates.sort_by(|a, b| a.total_cmp(b));
    candidates.dedup();

    let mut choice: Option<FallbackChoice> = None;
    for threshold in candidates {
        let routed = route(&shared, threshold);
        let correct: u64 = routed
            .iter()
            .filter(|row| row.correct)
            .map(|row| row.frequency)
            .sum();
        let in_purview: u64 = routed
            .iter()
            .filter(|row| row.in_purview)
            .map(|row| row.frequency)
            .sum();
        if in_purview == 0 {
            warn!(
                threshold = format!("{threshold:.3}"),
                "combined precision undefined at threshold, candidate skipped"
            );
            continue;
        }
        let precision = correct as f64 / in_purview as f64;
        let improves = match &choice {
            Some(best) => precision > best.precision,
            None => true,
        };
        if improves {
            choice = Some(FallbackChoice { threshold, precision });
        }
    }
    let Some(choice) = choice else {
        bail!("no fallback threshold with defined combined precision");
    };
    info!(
        threshold = format!("{:.3}", choice.threshold),
        precision = format!("{:.3}", choice.precision),
        "selected fallback threshold"
    );

    let routed = route(&shared, choice.threshold);
    let confidences: Vec<f64> = routed.iter().map(|row| row.confidence).collect();
    let standardized = rank_standardize(&confidences);

    let combined = routed
        .iter()
        .zip(standardized)
        .map(|(row, confidence)| CombinedRow {
            question: row.question.clone(),
            system: name.to_string(),
            answer: row.answer.clone(),
            confidence,
            in_purview: row.in_purview,
            correct: row.correct,
            frequency: row.frequency,
            provenance: row.system.clone(),
        })
        .collect();
    Ok((combined, choice))
}

pub fn voting(
    groups: &BTreeMap<String, Vec<CollatedRow>>,
    name: &str,
    variant: GroundedVariant,
) -> Result<Vec<CombinedRow>> {
    if groups.len() < 2 {
        bail!("voting combination needs at least two systems, got {}", groups.len());
    }

    let mut scored: BTreeMap<&String, ScoredRows> = BTreeMap::new();
    for (label, rows) in groups {
        let standardized = precision_standardize(rows, variant)?;
        scored.insert(label, index_rows(rows, standardized));
    }
    let shared = shared_questions(&scored);
    log_intersection(groups.len(), shared.len(), name);

    let mut combined = Vec::with_capacity(shared.len());
    for question in shared {
        let members: Vec<(&str, &CollatedRow, f64)> = scored
            .iter()
            .map(|(label, rows)| {
                let (row, standardized) = rows[question];
                (label.as_str(), row, standardized)
            })
            .collect();
        let (label, row, standardized) = pick(members.iter(), |contender, best| {
            contender.2.total_cmp(&best.2).is_gt()
        });

        combined.push(CombinedRow {
            question: question.to_string(),
            system: name.to_string(),
            answer: row.answer.clone(),
            confidence: standardized,
            in_purview: row.in_purview,
            correct: row.correct,
            frequency: row.frequency,
            provenance: label.to_string(),
        });
    }

    combined.sort_by(|a, b| a.question.cmp(&b.question));
    Ok(combined)
}

fn rank_scored_groups(
    groups: &BTreeMap<String, Vec<CollatedRow>>,
) -> BTreeMap<&String, ScoredRows<'_>> {
    let mut scored = BTreeMap::new();
    for (label, rows) in groups {
        let confidences: Vec<f64> = rows.iter().map(|row| row.confidence).collect();
        let standardized = rank_standardize(&confidences);
        scored.insert(label, index_rows(rows, standardized));
    }
    scored
}

fn index_rows(rows: &[CollatedRow], standardized: Vec<f64>) -> ScoredRows<'_> {
    rows.iter()
        .zip(standardized)
        .map(|(row, value)| (row.question.as_str(), (row, value)))
        .collect()
}

fn shared_questions<'a>(scored: &BTreeMap<&String, ScoredRows<'a>>) -> Vec<&'a str> {
    let Some(first) = scored.values().next() else {
        return Vec::new();
    };
    let mut shared: Vec<&str> = first
        .keys()
        .copied()
        .filter(|question| scored.values().all(|rows| rows.contains_key(question)))
        .collect();
    shared.sort_unstable();
    shared
}

fn pick<'a, I, F>(mut members: I, beats: F) -> (&'a str, &'a CollatedRow, f64)
where
    I: Iterator<Item = &'a (&'a str, &'a CollatedRow, f64)>,
    F: Fn(&(&'a str, &'a CollatedRow, f64), &(&'a str, &'a CollatedRow, f64)) -> bool,
{
    let mut best = members.next().expect("combiners never pick from an empty set");
    for member in members {
        if beats(member, best) {
            best = member;
        }
    }
    *best
}

fn route<'a>(
    shared: &[(&'a CollatedRow, &'a CollatedRow)],
    threshold: f64,
) -> Vec<&'a CollatedRow> {
    shared
        .iter()
        .map(|(default, secondary)| {
            if default.confidence >= threshold {
                *default
            } else {
                *secondary
            }
        })
        .collect()
}

fn log_intersection(systems: usize, shared: usize, name: &str) {
    if shared == 0 {
        warn!(systems, name, "no shared questions to combine");
    } else {
        info!(systems, shared_questions = shared, name, "combining systems");
    }
}
