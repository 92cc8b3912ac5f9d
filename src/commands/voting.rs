use anyhow::Result;
use tracing::info;

use crate::cli::{StandardizerVariant, VotingArgs};
use crate::combine::{select_systems, voting};
use crate::standardize::GroundedVariant;
use crate::table::{group_by_system, read_collated, write_rows};

pub fn run(args: VotingArgs) -> Result<()> {
    let rows = read_collated(&args.collated)?;
    let groups = select_systems(group_by_system(&rows), &args.systems)?;

    let variant = grounded_variant(args.standardizer);
    let combined = voting(&groups, &args.name, variant)?;
    write_rows(&args.output, &combined)?;
    info!(
        rows = combined.len(),
        systems = groups.len(),
        standardizer = args.standardizer.as_str(),
        name = %args.name,
        path = %args.output.display(),
        "wrote voting combination"
    );
    Ok(())
}

fn grounded_variant(standardizer: StandardizerVariant) -> GroundedVariant {
    match standardizer {
        StandardizerVariant::PrecisionOnly => GroundedVariant::PrecisionOnly,
        StandardizerVariant::InverseQa => GroundedVariant::InverseQa,
        StandardizerVariant::InverseQaPCorrected => GroundedVariant::InverseQaPCorrected,
    }
}
