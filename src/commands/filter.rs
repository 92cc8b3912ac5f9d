use anyhow::Result;
use tracing::info;

use crate::cli::{FilterArgs, FilterMode};
use crate::model::CollatedRow;
use crate::table::{read_collated, write_collated};

pub fn run(args: FilterArgs) -> Result<()> {
    let rows = read_collated(&args.collated)?;
    let total = rows.len();

    let wanted = matches!(args.mode, FilterMode::Correct);
    let kept: Vec<CollatedRow> = rows
        .into_iter()
        .filter(|row| row.in_purview && row.correct == wanted)
        .collect();

    let written = kept.len();
    write_collated(&args.output, kept)?;
    info!(
        kept = written,
        total,
        mode = args.mode.as_str(),
        path = %args.output.display(),
        "wrote filtered judgments"
    );
    Ok(())
}
