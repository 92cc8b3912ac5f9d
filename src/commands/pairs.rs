use std::collections::{BTreeSet, HashSet};

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::info;

use crate::cli::PairsArgs;
use crate::model::{AnswerRecord, Judgment};
use crate::table::{read_rows, write_rows};

#[derive(Debug, Serialize)]
struct PairRow {
    #[serde(rename = "Question")]
    question: String,
    #[serde(rename = "Answer")]
    answer: String,
}

pub fn run(args: PairsArgs) -> Result<()> {
    if args.answers.is_empty() {
        bail!("at least one --answers table is required");
    }

    let mut judged: HashSet<(String, String)> = HashSet::new();
    if let Some(judgments_path) = &args.judgments {
        let judgments: Vec<Judgment> = read_rows(judgments_path)?;
        for judgment in judgments {
            judged.insert((judgment.question, judgment.answer));
        }
    }

    let mut pending: BTreeSet<(String, String)> = BTreeSet::new();
    let mut considered = 0_usize;
    for path in &args.answers {
        let answers: Vec<AnswerRecord> = read_rows(path)?;
        for record in answers {
            let Some(answer) = record.answer else {
                continue;
            };
            considered += 1;
            let pair = (record.question, answer);
            if !judged.contains(&pair) {
                pending.insert(pair);
            }
        }
    }

    let rows: Vec<PairRow> = pending
        .into_iter()
        .map(|(question, answer)| PairRow { question, answer })
        .collect();
    write_rows(&args.output, &rows)?;
    info!(
        pending = rows.len(),
        considered,
        judged = judged.len(),
        path = %args.output.display(),
        "wrote pairs awaiting judgment"
    );
    Ok(())
}
