use anyhow::Result;
use tracing::info;

use crate::cli::CurvesArgs;
use crate::curves::{precision_curve, roc_curve, write_curve};
use crate::model::{FALSE_POSITIVE_RATE, PRECISION, QUESTIONS_ATTEMPTED, TRUE_POSITIVE_RATE};
use crate::table::{group_by_system, read_collated};
use crate::util::ensure_directory;

pub fn run(args: CurvesArgs) -> Result<()> {
    let rows = read_collated(&args.collated)?;
    let groups = group_by_system(&rows);
    ensure_directory(&args.output_root)?;

    for (system, members) in &groups {
        let precision_points = precision_curve(members);
        let precision_path = args.output_root.join(format!("precision.{system}.csv"));
        write_curve(&precision_path, &precision_points, QUESTIONS_ATTEMPTED, PRECISION)?;

        let roc_points = roc_curve(members);
        let roc_path = args.output_root.join(format!("roc.{system}.csv"));
        write_curve(&roc_path, &roc_points, FALSE_POSITIVE_RATE, TRUE_POSITIVE_RATE)?;

        info!(
            system,
            precision_points = precision_points.len(),
            roc_points = roc_points.len(),
            "wrote system curves"
        );
    }

    info!(
        systems = groups.len(),
        root = %args.output_root.display(),
        "curve generation completed"
    );
    Ok(())
}
