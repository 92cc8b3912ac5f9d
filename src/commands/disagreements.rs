use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::DisagreementsArgs;
use crate::model::CollatedRow;
use crate::table::{read_collated, write_rows};
use crate::util::percentage;

pub fn run(args: DisagreementsArgs) -> Result<()> {
    let rows = read_collated(&args.collated)?;

    let mut by_question: BTreeMap<&str, Vec<&CollatedRow>> = BTreeMap::new();
    for row in &rows {
        by_question.entry(row.question.as_str()).or_default().push(row);
    }
    let questions = by_question.len();

    let divergent: BTreeSet<&str> = by_question
        .iter()
        .filter(|(_, members)| members.iter().any(|row| row.in_purview != members[0].in_purview))
        .map(|(question, _)| *question)
        .collect();

    if !divergent.is_empty() {
        warn!(
            questions = divergent.len(),
            total = questions,
            percent = format!("{:.3}", percentage(divergent.len(), questions)),
            "questions with divergent in-purview judgments"
        );
    }

    let report: Vec<CollatedRow> = rows
        .iter()
        .filter(|row| divergent.contains(row.question.as_str()))
        .cloned()
        .collect();
    write_rows(&args.output, &report)?;
    info!(
        questions = divergent.len(),
        rows = report.len(),
        path = %args.output.display(),
        "wrote purview disagreement report"
    );
    Ok(())
}
