use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::FallbackArgs;
use crate::combine::fallback;
use crate::table::{group_by_system, read_collated, write_rows};

pub fn run(args: FallbackArgs) -> Result<()> {
    if args.default_system == args.secondary_system {
        bail!("default and secondary system must differ: {}", args.default_system);
    }

    let rows = read_collated(&args.collated)?;
    let mut groups = group_by_system(&rows);
    let default_rows = groups
        .remove(&args.default_system)
        .with_context(|| format!("no rows for system {}", args.default_system))?;
    let secondary_rows = groups
        .remove(&args.secondary_system)
        .with_context(|| format!("no rows for system {}", args.secondary_system))?;

    let (combined, choice) = fallback(&default_rows, &secondary_rows, &args.name)?;
    write_rows(&args.output, &combined)?;
    info!(
        rows = combined.len(),
        threshold = choice.threshold,
        precision = choice.precision,
        name = %args.name,
        path = %args.output.display(),
        "wrote fallback combination"
    );
    Ok(())
}
