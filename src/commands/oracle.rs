use anyhow::Result;
use tracing::info;

use crate::cli::OracleArgs;
use crate::combine::{oracle, select_systems};
use crate::table::{group_by_system, read_collated, write_rows};

pub fn run(args: OracleArgs) -> Result<()> {
    let rows = read_collated(&args.collated)?;
    let groups = select_systems(group_by_system(&rows), &args.systems)?;

    let combined = oracle(&groups, &args.name)?;
    write_rows(&args.output, &combined)?;
    info!(
        rows = combined.len(),
        systems = groups.len(),
        name = %args.name,
        path = %args.output.display(),
        "wrote oracle combination"
    );
    Ok(())
}
