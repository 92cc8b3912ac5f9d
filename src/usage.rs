use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use tracing::{info, warn};

use crate::model::{AnswerRecord, QuestionRecord, UsageRecord};
use crate::table::read_rows;
use crate::util::{SeededRng, percentage};

const ALWAYS_EXCLUDED_EXPERIENCES: &[&str] = &["DIALOG", "Dialog Response"];

pub fn read_usage_log(path: &Path) -> Result<Vec<UsageRecord>> {
    let pattern = log_timestamp_pattern()?;
    let mut records: Vec<UsageRecord> = read_rows(path)?;

    let mut normalized = 0_usize;
    for record in &mut records {
        if let Some(standard) = normalize_log_timestamp(&pattern, &record.date_time) {
            record.date_time = standard;
            normalized += 1;
        }
    }
    info!(
        records = records.len(),
        normalized,
        path = %path.display(),
        "read usage log"
    );
    Ok(records)
}

fn log_timestamp_pattern() -> Result<Regex> {
    Regex::new(r"^(?P<month>\d\d)(?P<day>\d\d)(?P<year>\d{4}):(?P<hour>\d\d)(?P<min>\d\d)(?P<sec>\d\d):UTC$")
        .context("failed to compile usage log timestamp pattern")
}

fn normalize_log_timestamp(pattern: &Regex, raw: &str) -> Option<String> {
    let captures = pattern.captures(raw)?;
    Some(format!(
        "{}-{}-{}T{}:{}:{}Z",
        &captures["year"],
        &captures["month"],
        &captures["day"],
        &captures["hour"],
        &captures["min"],
        &captures["sec"]
    ))
}

pub fn filter_by_date(
    records: Vec<UsageRecord>,
    after: Option<NaiveDate>,
    before: Option<NaiveDate>,
) -> Vec<UsageRecord> {
    if after.is_none() && before.is_none() {
        return records;
    }

    let total = records.len();
    let mut unparseable = 0_usize;
    let kept: Vec<UsageRecord> = records
        .into_iter()
        .filter(|record| {
            let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(&record.date_time) else {
                unparseable += 1;
                return false;
            };
            let date = parsed.date_naive();
            after.is_none_or(|bound| date >= bound) && before.is_none_or(|bound| date <= bound)
        })
        .collect();

    if unparseable > 0 {
        warn!(
            records = unparseable,
            "records with unparseable timestamps dropped by the date filter"
        );
    }
    info!(removed = total - kept.len(), total, "filtered records by date");
    kept
}

pub fn filter_by_user_experience(
    records: Vec<UsageRecord>,
    excluded: &[String],
) -> Vec<UsageRecord> {
    let total = records.len();
    let kept: Vec<UsageRecord> = records
        .into_iter()
        .filter(|record| {
            let experience = record.user_experience.as_str();
            !ALWAYS_EXCLUDED_EXPERIENCES.contains(&experience)
                && !excluded.iter().any(|label| label == experience)
        })
        .collect();

    let removed = total - kept.len();
    info!(
        removed,
        total,
        percent = format!("{:.3}", percentage(removed, total)),
        "removed records with excluded user experiences"
    );
    kept
}

pub fn fix_confidence_ranges(records: &mut [UsageRecord]) {
    let mut maxima: BTreeMap<&str, f64> = BTreeMap::new();
    for record in records.iter() {
        if let Some(confidence) = record.confidence {
            let group = experience_group(&record.user_experience);
            let entry = maxima.entry(group).or_insert(f64::NEG_INFINITY);
            if confidence > *entry {
                *entry = confidence;
            }
        }
    }

    let divisors: HashMap<String, f64> = maxima
        .iter()
        .filter(|(_, max)| **max > 0.0)
        .map(|(group, max)| {
            let divisor = if *max > 1.0 { 100.0 } else { *max };
            (group.to_string(), divisor)
        })
        .collect();

    let rescaled: Vec<&String> = divisors
        .iter()
        .filter(|(_, divisor)| **divisor != 1.0)
        .map(|(group, _)| group)
        .collect();
    if !rescaled.is_empty() {
        let mut groups: Vec<&str> = rescaled.iter().map(|s| s.as_str()).collect();
        groups.sort_unstable();
        info!(groups = groups.join(","), "rescaled confidence ranges");
    }

    for record in records.iter_mut() {
        let group = experience_group(&record.user_experience).to_string();
        if let (Some(confidence), Some(divisor)) = (record.confidence, divisors.get(&group)) {
            record.confidence = Some(confidence / divisor);
        }
    }
}

fn experience_group(user_experience: &str) -> &str {
    if user_experience.is_empty() {
        "NA"
    } else {
        user_experience
    }
}

pub fn extract_questions(records: &[UsageRecord]) -> Vec<QuestionRecord> {
    let mut frequency: HashMap<&str, u64> = HashMap::new();
    for record in records {
        *frequency.entry(record.question.as_str()).or_insert(0) += 1;
    }

    let mut questions: Vec<QuestionRecord> = frequency
        .into_iter()
        .map(|(question, frequency)| QuestionRecord {
            question: question.to_string(),
            frequency,
        })
        .collect();
    sort_questions(&mut questions);
    info!(questions = questions.len(), "extracted unique questions");
    questions
}

pub fn answers_from_usage(records: &[UsageRecord]) -> Vec<AnswerRecord> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut duplicated: HashSet<&str> = HashSet::new();
    let mut answers: Vec<AnswerRecord> = Vec::new();

    for record in records {
        if seen.insert(record.question.as_str()) {
            answers.push(AnswerRecord {
                question: record.question.clone(),
                answer: record.answer.clone(),
                confidence: record.confidence,
            });
        } else {
            duplicated.insert(record.question.as_str());
        }
    }

    if !duplicated.is_empty() {
        warn!(
            questions = duplicated.len(),
            total = answers.len(),
            percent = format!("{:.3}", percentage(duplicated.len(), answers.len())),
            "questions have multiple answers, only keeping one answer per question"
        );
    }
    answers.sort_by(|a, b| a.question.cmp(&b.question));
    answers
}

pub fn sample_questions(
    questions: Vec<QuestionRecord>,
    n: usize,
    seed: u64,
) -> Vec<QuestionRecord> {
    if n >= questions.len() {
        info!(
            available = questions.len(),
            requested = n,
            "sample covers every question"
        );
        let mut all = questions;
        sort_questions(&mut all);
        return all;
    }

    let mut rng = SeededRng::new(seed);
    let mut remaining = questions;
    let mut picked = Vec::with_capacity(n);

    for _ in 0..n {
        let total: u64 = remaining.iter().map(|q| q.frequency).sum();
        let chosen = if total == 0 {
            rng.next_index(remaining.len())
        } else {
            let mut target = (rng.next_f64() * total as f64) as u64;
            let mut index = remaining.len() - 1;
            for (i, question) in remaining.iter().enumerate() {
                if target < question.frequency {
                    index = i;
                    break;
                }
                target -= question.frequency;
            }
            index
        };
        picked.push(remaining.swap_remove(chosen));
    }

    sort_questions(&mut picked);
    info!(sampled = picked.len(), "sampled questions");
    picked
}

fn sort_questions(questions: &mut [QuestionRecord]) {
    questions.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then_with(|| a.question.cmp(&b.question))
    });
}

#[cfg(test)]
mod tests {
    use crate::model::UsageRecord;

    use super::{
        answers_from_usage, extract_questions, filter_by_date, filter_by_user_experience,
        fix_confidence_ranges, log_timestamp_pattern, normalize_log_timestamp, sample_questions,
    };

    fn record(
        date_time: &str,
        question: &str,
        answer: &str,
        confidence: f64,
        user_experience: &str,
    ) -> UsageRecord {
        UsageRecord {
            date_time: date_time.to_string(),
            question: question.to_string(),
            answer: Some(answer.to_string()),
            confidence: Some(confidence),
            user_experience: user_experience.to_string(),
        }
    }

    #[test]
    fn log_timestamps_normalize_to_rfc3339() {
        let pattern = log_timestamp_pattern().expect("pattern should compile");
        assert_eq!(
            normalize_log_timestamp(&pattern, "05042016:123015:UTC").as_deref(),
            Some("2016-05-04T12:30:15Z")
        );
        assert_eq!(
            normalize_log_timestamp(&pattern, "2016-05-04T12:30:15Z"),
            None,
            "already-standard timestamps pass through"
        );
    }

    #[test]
    fn date_filter_keeps_the_inclusive_window() {
        let records = vec![
            record("2016-05-01T00:00:00Z", "q1", "a", 0.5, "web"),
            record("2016-05-02T10:00:00Z", "q2", "a", 0.5, "web"),
            record("2016-05-03T23:59:59Z", "q3", "a", 0.5, "web"),
            record("not a date", "q4", "a", 0.5, "web"),
        ];
        let after = chrono::NaiveDate::from_ymd_opt(2016, 5, 2).expect("valid date");
        let before = chrono::NaiveDate::from_ymd_opt(2016, 5, 3).expect("valid date");

        let kept = filter_by_date(records, Some(after), Some(before));
        let questions: Vec<&str> = kept.iter().map(|r| r.question.as_str()).collect();
        assert_eq!(questions, vec!["q2", "q3"]);
    }

    #[test]
    fn dialog_experiences_are_always_excluded() {
        let records = vec![
            record("2016-05-01T00:00:00Z", "q1", "a", 0.5, "DIALOG"),
            record("2016-05-01T00:00:00Z", "q2", "a", 0.5, "Dialog Response"),
            record("2016-05-01T00:00:00Z", "q3", "a", 0.5, "kiosk"),
            record("2016-05-01T00:00:00Z", "q4", "a", 0.5, "web"),
        ];
        let kept = filter_by_user_experience(records, &["kiosk".to_string()]);
        let questions: Vec<&str> = kept.iter().map(|r| r.question.as_str()).collect();
        assert_eq!(questions, vec!["q4"]);
    }

    #[test]
    fn confidence_ranges_rescale_per_experience_group() {
        let mut records = vec![
            record("t", "q1", "a", 0.8, "web"),
            record("t", "q2", "a", 0.4, "web"),
            record("t", "q3", "a", 85.0, "kiosk"),
            record("t", "q4", "a", 40.0, "kiosk"),
            record("t", "q5", "a", 0.5, ""),
        ];
        records[4].confidence = None;
        fix_confidence_ranges(&mut records);

        assert_eq!(records[0].confidence, Some(1.0), "group max scales to one");
        assert_eq!(records[1].confidence, Some(0.5));
        assert_eq!(records[2].confidence, Some(0.85), "percent groups divide by 100");
        assert_eq!(records[3].confidence, Some(0.4));
        assert_eq!(records[4].confidence, None, "missing confidences stay missing");
    }

    #[test]
    fn extraction_counts_and_orders_questions() {
        let records = vec![
            record("t", "rare", "a", 0.5, "web"),
            record("t", "common", "a", 0.5, "web"),
            record("t", "common", "a", 0.5, "web"),
            record("t", "also common", "a", 0.5, "web"),
            record("t", "also common", "a", 0.5, "web"),
        ];
        let questions = extract_questions(&records);
        let ordered: Vec<(&str, u64)> = questions
            .iter()
            .map(|q| (q.question.as_str(), q.frequency))
            .collect();
        assert_eq!(
            ordered,
            vec![("also common", 2), ("common", 2), ("rare", 1)]
        );
    }

    #[test]
    fn answers_keep_the_first_per_question() {
        let records = vec![
            record("t", "q1", "first", 0.9, "web"),
            record("t", "q1", "second", 0.2, "web"),
            record("t", "q2", "only", 0.7, "web"),
        ];
        let answers = answers_from_usage(&records);
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].answer.as_deref(), Some("first"));
        assert_eq!(answers[1].answer.as_deref(), Some("only"));
    }

    #[test]
    fn sampling_is_deterministic_and_without_replacement() {
        let questions: Vec<_> = (0..20)
            .map(|i| crate::model::QuestionRecord {
                question: format!("q{i:02}"),
                frequency: (i % 5) + 1,
            })
            .collect();

        let first = sample_questions(questions.clone(), 5, 17);
        let second = sample_questions(questions.clone(), 5, 17);
        assert_eq!(first.len(), 5);
        let names: Vec<&String> = first.iter().map(|q| &q.question).collect();
        let second_names: Vec<&String> = second.iter().map(|q| &q.question).collect();
        assert_eq!(names, second_names);

        let mut unique = names.clone();
        unique.dedup();
        assert_eq!(unique.len(), names.len(), "no question sampled twice");

        let everything = sample_questions(questions.clone(), 50, 17);
        assert_eq!(everything.len(), questions.len());
    }
}
