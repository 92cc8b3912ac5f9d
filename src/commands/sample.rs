use anyhow::Result;
use tracing::info;

use crate::cli::SampleArgs;
use crate::model::QuestionRecord;
use crate::table::{read_rows, write_rows};
use crate::usage::sample_questions;

pub fn run(args: SampleArgs) -> Result<()> {
    let questions: Vec<QuestionRecord> = read_rows(&args.questions)?;
    let population = questions.len();

    let sampled = sample_questions(questions, args.size, args.seed);
    write_rows(&args.output, &sampled)?;
    info!(
        sampled = sampled.len(),
        population,
        seed = args.seed,
        path = %args.output.display(),
        "wrote sampled questions"
    );
    Ok(())
}
