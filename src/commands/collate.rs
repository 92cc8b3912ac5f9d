use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::CollateArgs;
use crate::model::{AnswerRecord, CollatedRow, Judgment, QuestionRecord};
use crate::table::{read_rows, write_collated};
use crate::util::percentage;

pub fn run(args: CollateArgs) -> Result<()> {
    if args.answers.is_empty() {
        bail!("at least one --answers table is required");
    }
    if !args.labels.is_empty() && args.labels.len() != args.answers.len() {
        bail!(
            "{} --label values for {} --answers tables",
            args.labels.len(),
            args.answers.len()
        );
    }

    let judgments = judgment_index(&args.judgments)?;
    let frequencies = frequency_index(&args.frequencies)?;

    let mut collated: Vec<CollatedRow> = Vec::new();
    let mut labels_seen: HashSet<String> = HashSet::new();
    for (index, path) in args.answers.iter().enumerate() {
        let label = system_label(path, args.labels.get(index))?;
        if !labels_seen.insert(label.clone()) {
            bail!("duplicate system label: {label}");
        }
        collated.extend(collate_system(path, &label, &judgments, &frequencies)?);
    }

    let total = collated.len();
    write_collated(&args.output, collated)?;
    info!(
        rows = total,
        systems = labels_seen.len(),
        path = %args.output.display(),
        "wrote collated judgments"
    );
    Ok(())
}

fn system_label(path: &Path, label: Option<&String>) -> Result<String> {
    if let Some(label) = label {
        return Ok(label.clone());
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(ToOwned::to_owned)
        .with_context(|| format!("cannot derive a system label from {}", path.display()))
}

fn judgment_index(path: &Path) -> Result<HashMap<String, HashMap<String, (bool, bool)>>> {
    let judgments: Vec<Judgment> = read_rows(path)?;

    let mut index: HashMap<String, HashMap<String, (bool, bool)>> = HashMap::new();
    let mut duplicates = 0_usize;
    for judgment in judgments {
        let by_answer = index.entry(judgment.question).or_default();
        if by_answer.contains_key(&judgment.answer) {
            duplicates += 1;
            continue;
        }
        by_answer.insert(judgment.answer, (judgment.in_purview, judgment.correct));
    }
    if duplicates > 0 {
        warn!(
            judgments = duplicates,
            path = %path.display(),
            "duplicate judgment pairs, keeping the first"
        );
    }
    Ok(index)
}

fn frequency_index(path: &Path) -> Result<HashMap<String, u64>> {
    let questions: Vec<QuestionRecord> = read_rows(path)?;

    let mut index = HashMap::with_capacity(questions.len());
    for question in questions {
        index.entry(question.question).or_insert(question.frequency);
    }
    Ok(index)
}

fn collate_system(
    path: &Path,
    label: &str,
    judgments: &HashMap<String, HashMap<String, (bool, bool)>>,
    frequencies: &HashMap<String, u64>,
) -> Result<Vec<CollatedRow>> {
    let records: Vec<AnswerRecord> = read_rows(path)?;
    let total = records.len();

    let mut seen: HashSet<String> = HashSet::new();
    let mut duplicates = 0_usize;
    let mut unanswered = 0_usize;
    let mut unjudged = 0_usize;
    let mut unweighted = 0_usize;

    let mut rows = Vec::with_capacity(total);
    for record in records {
        if !seen.insert(record.question.clone()) {
            duplicates += 1;
            continue;
        }
        let (answer, confidence) = match (record.answer, record.confidence) {
            (Some(answer), Some(confidence)) => (answer, confidence),
            _ => {
                unanswered += 1;
                continue;
            }
        };
        let Some(&(in_purview, correct)) = judgments
            .get(&record.question)
            .and_then(|by_answer| by_answer.get(&answer))
        else {
            unjudged += 1;
            continue;
        };
        let Some(&frequency) = frequencies.get(&record.question) else {
            unweighted += 1;
            continue;
        };

        rows.push(CollatedRow {
            question: record.question,
            system: label.to_string(),
            answer,
            confidence,
            in_purview,
            correct,
            frequency,
        });
    }

    if duplicates > 0 {
        warn!(
            rows = duplicates,
            total,
            percent = format!("{:.3}", percentage(duplicates, total)),
            system = label,
            "duplicate questions, keeping the first answer"
        );
    }
    if unanswered > 0 {
        warn!(
            rows = unanswered,
            total,
            percent = format!("{:.3}", percentage(unanswered, total)),
            system = label,
            "rows with no answer or confidence dropped"
        );
    }
    if unjudged > 0 {
        warn!(
            rows = unjudged,
            total,
            percent = format!("{:.3}", percentage(unjudged, total)),
            system = label,
            "rows with no matching judgment dropped"
        );
    }
    if unweighted > 0 {
        warn!(
            rows = unweighted,
            total,
            percent = format!("{:.3}", percentage(unweighted, total)),
            system = label,
            "rows with no question frequency dropped"
        );
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use crate::cli::CollateArgs;
    use crate::table::read_collated;

    use super::run;

    fn write(path: &Path, contents: &str) {
        fs::write(path, contents).expect("fixture should be written");
    }

    #[test]
    fn collation_joins_answers_judgments_and_frequencies() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let alpha = dir.path().join("alpha.csv");
        let beta = dir.path().join("beta.csv");
        let judgments = dir.path().join("judgments.csv");
        let frequencies = dir.path().join("questions.csv");
        let output = dir.path().join("collated.csv");

        write(
            &alpha,
            "Question,Answer,Confidence\n\
             what is rust,a systems language,0.9\n\
             what is rust,duplicate answer,0.1\n\
             who wrote it,,\n\
             unjudged question,some answer,0.5\n",
        );
        write(
            &beta,
            "Question,Answer,Confidence\n\
             what is rust,an oxide,0.4\n",
        );
        write(
            &judgments,
            "Question,Answer,InPurview,Correct\n\
             what is rust,a systems language,true,true\n\
             what is rust,an oxide,true,false\n",
        );
        write(
            &frequencies,
            "Question,Frequency\n\
             what is rust,12\n\
             who wrote it,3\n\
             unjudged question,1\n",
        );

        run(CollateArgs {
            answers: vec![alpha, beta],
            labels: Vec::new(),
            judgments,
            frequencies,
            output: output.clone(),
        })
        .expect("collation should succeed");

        let rows = read_collated(&output).expect("output should be readable");
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].system, "alpha");
        assert_eq!(rows[0].question, "what is rust");
        assert_eq!(rows[0].answer, "a systems language");
        assert_eq!(rows[0].frequency, 12);
        assert!(rows[0].correct);

        assert_eq!(rows[1].system, "beta");
        assert!(!rows[1].correct);
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let answers = dir.path().join("alpha.csv");
        let judgments = dir.path().join("judgments.csv");
        let frequencies = dir.path().join("questions.csv");
        write(&answers, "Question,Answer,Confidence\n");
        write(&judgments, "Question,Answer,InPurview,Correct\n");
        write(&frequencies, "Question,Frequency\n");

        let result = run(CollateArgs {
            answers: vec![answers.clone(), answers],
            labels: Vec::new(),
            judgments,
            frequencies,
            output: dir.path().join("collated.csv"),
        });
        assert!(result.is_err(), "same stem twice must not collate");
    }
}
