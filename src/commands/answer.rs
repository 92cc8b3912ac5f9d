use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::batch::{BatchSink, BatchSummary, RetryOutcome, retry, run_batch};
use crate::checkpoint::{CheckpointStore, JsonCheckpoint};
use crate::cli::{AnswerArgs, AnswerFormat};
use crate::model::{
    ANSWER, AnswerCounts, AnswerPaths, AnswerRunManifest, CONFIDENCE, QUESTION, QuestionRecord,
    SourceHash,
};
use crate::service::{Answered, AnsweringService, LookupService};
use crate::table::read_rows;
use crate::util::{now_utc_string, sha256_file, utc_compact_string, write_json_pretty};

pub fn run(args: AnswerArgs) -> Result<()> {
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(Utc::now()));

    let questions: Vec<QuestionRecord> = read_rows(&args.questions)?;
    let items: Vec<String> = questions.iter().map(|q| q.question.clone()).collect();
    let questions_total = {
        let unique: HashSet<&String> = items.iter().collect();
        unique.len()
    };
    let mut service = LookupService::from_table(&args.answer_source)?;

    let mut recovered_at_start: Option<usize> = None;
    let mut last_summary: Option<BatchSummary> = None;
    let outcome = retry(
        || {
            answer_once(
                &args,
                &items,
                &mut service,
                &mut recovered_at_start,
                &mut last_summary,
            )
        },
        args.retries,
        Duration::from_secs(args.backoff_seconds),
    )?;

    let recovered = recovered_at_start.unwrap_or(0);
    let completed = last_summary
        .map(|summary| summary.skipped + summary.processed)
        .unwrap_or(recovered);
    let missing = service.missing_count();

    let mut warnings = Vec::new();
    if missing > 0 {
        warn!(
            questions = missing,
            total = questions_total,
            source = %args.answer_source.display(),
            "questions missing from the answer source, answered blank"
        );
        warnings.push(format!(
            "{missing} questions missing from the answer source, answered blank"
        ));
    }
    let status = match outcome {
        RetryOutcome::Completed => "completed",
        RetryOutcome::RetriesExhausted { attempts } => {
            warnings.push(format!(
                "gave up after {attempts} attempts, the checkpoint is partial"
            ));
            "retries-exhausted"
        }
    };

    let manifest_path = manifest_path(&args);
    let manifest = AnswerRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        status: status.to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: command_line(&args),
        format: args.format.as_str().to_string(),
        flush_interval: args.flush_interval,
        retries: args.retries,
        counts: AnswerCounts {
            questions_total,
            recovered,
            answered: completed.saturating_sub(recovered).saturating_sub(missing),
            missing_answers: missing,
        },
        paths: AnswerPaths {
            questions_path: args.questions.display().to_string(),
            answers_source_path: args.answer_source.display().to_string(),
            output_path: args.output.display().to_string(),
            manifest_path: manifest_path.display().to_string(),
        },
        source_hashes: vec![
            SourceHash {
                path: args.questions.display().to_string(),
                sha256: sha256_file(&args.questions)?,
            },
            SourceHash {
                path: args.answer_source.display().to_string(),
                sha256: sha256_file(&args.answer_source)?,
            },
        ],
        warnings,
    };

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote run manifest");
    info!(
        run = %run_id,
        status,
        answered = manifest.counts.answered,
        missing = manifest.counts.missing_answers,
        "answer run finished"
    );
    Ok(())
}

fn answer_once(
    args: &AnswerArgs,
    items: &[String],
    service: &mut LookupService,
    recovered_at_start: &mut Option<usize>,
    last_summary: &mut Option<BatchSummary>,
) -> Result<()> {
    match args.format {
        AnswerFormat::Csv => {
            let mut store = CheckpointStore::open(
                &args.output,
                &[QUESTION, ANSWER, CONFIDENCE],
                args.flush_interval,
            )?;
            let already_done = store.recovered().clone();
            recovered_at_start.get_or_insert(already_done.len());

            let summary = run_batch(
                items,
                &already_done,
                |question| Ok(answer_values(service.ask(question)?)),
                &mut store,
                args.flush_interval,
            )?;
            *last_summary = Some(summary);
        }
        AnswerFormat::Json => {
            let checkpoint = JsonCheckpoint::open(&args.output, args.flush_interval)?;
            let already_done: HashSet<String> = checkpoint.saved_keys().iter().cloned().collect();
            recovered_at_start.get_or_insert(already_done.len());
            let mut sink = JsonAnswerSink { checkpoint };

            let summary = run_batch(
                items,
                &already_done,
                |question| Ok(answer_values(service.ask(question)?)),
                &mut sink,
                args.flush_interval,
            )?;
            *last_summary = Some(summary);
        }
    }
    Ok(())
}

fn answer_values(answered: Answered) -> Vec<String> {
    vec![
        answered.answer.unwrap_or_default(),
        answered
            .confidence
            .map(|confidence| confidence.to_string())
            .unwrap_or_default(),
    ]
}

struct JsonAnswerSink {
    checkpoint: JsonCheckpoint,
}

impl BatchSink for JsonAnswerSink {
    fn write(&mut self, key: &str, values: &[String]) -> Result<()> {
        let answer = values
            .first()
            .filter(|answer| !answer.is_empty())
            .map(|answer| Value::String(answer.clone()))
            .unwrap_or(Value::Null);
        let confidence = values
            .get(1)
            .and_then(|confidence| confidence.parse::<f64>().ok())
            .map(|confidence| json!(confidence))
            .unwrap_or(Value::Null);
        self.checkpoint
            .write(key, json!({ ANSWER: answer, CONFIDENCE: confidence }))
    }

    fn close(&mut self) -> Result<()> {
        self.checkpoint.close()
    }
}

fn manifest_path(args: &AnswerArgs) -> PathBuf {
    args.manifest_path.clone().unwrap_or_else(|| {
        let mut path = args.output.clone();
        path.set_extension("manifest.json");
        path
    })
}

fn command_line(args: &AnswerArgs) -> String {
    format!(
        "verdict answer --questions {} --answer-source {} --output {} --format {}",
        args.questions.display(),
        args.answer_source.display(),
        args.output.display(),
        args.format.as_str()
    )
}
