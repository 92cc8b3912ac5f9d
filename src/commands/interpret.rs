use anyhow::Result;
use tracing::info;

use crate::cli::InterpretArgs;
use crate::model::{Judgment, RawJudgment};
use crate::table::{read_rows, write_rows};

pub fn run(args: InterpretArgs) -> Result<()> {
    let raw: Vec<RawJudgment> = read_rows(&args.judgments)?;
    let total = raw.len();

    let judgments = interpret_judgments(raw, args.threshold);
    let correct = judgments.iter().filter(|judgment| judgment.correct).count();

    write_rows(&args.output, &judgments)?;
    info!(
        judgments = total,
        correct,
        threshold = args.threshold,
        path = %args.output.display(),
        "wrote interpreted judgments"
    );
    Ok(())
}

fn interpret_judgments(raw: Vec<RawJudgment>, threshold: f64) -> Vec<Judgment> {
    raw.into_iter()
        .map(|judgment| Judgment {
            correct: judgment.in_purview && judgment.score >= threshold,
            question: judgment.question,
            answer: judgment.answer,
            in_purview: judgment.in_purview,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::model::RawJudgment;

    use super::interpret_judgments;

    fn raw(question: &str, in_purview: bool, score: f64) -> RawJudgment {
        RawJudgment {
            question: question.to_string(),
            answer: format!("answer to {question}"),
            in_purview,
            score,
        }
    }

    #[test]
    fn scores_collapse_against_the_threshold() {
        let judgments = interpret_judgments(
            vec![
                raw("q1", true, 75.0),
                raw("q2", true, 50.0),
                raw("q3", true, 49.9),
                raw("q4", false, 100.0),
            ],
            50.0,
        );

        let verdicts: Vec<bool> = judgments.iter().map(|judgment| judgment.correct).collect();
        assert_eq!(verdicts, vec![true, true, false, false]);
        assert!(
            !judgments[3].correct,
            "out-of-purview answers are never correct"
        );
    }
}
