use anyhow::Result;
use tracing::info;

use crate::cli::ExtractArgs;
use crate::table::write_rows;
use crate::usage::{
    answers_from_usage, extract_questions, filter_by_date, filter_by_user_experience,
    fix_confidence_ranges, read_usage_log,
};

pub fn run(args: ExtractArgs) -> Result<()> {
    let records = read_usage_log(&args.usage_log)?;
    let records = filter_by_date(records, args.after, args.before);
    let mut records = filter_by_user_experience(records, &args.drop_experiences);
    fix_confidence_ranges(&mut records);

    let questions = extract_questions(&records);
    write_rows(&args.output, &questions)?;
    info!(
        questions = questions.len(),
        path = %args.output.display(),
        "wrote question frequencies"
    );

    if let Some(answers_path) = args.answers {
        let answers = answers_from_usage(&records);
        write_rows(&answers_path, &answers)?;
        info!(
            answers = answers.len(),
            path = %answers_path.display(),
            "wrote recorded answers"
        );
    }

    Ok(())
}
