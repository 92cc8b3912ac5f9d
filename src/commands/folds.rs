use std::path::Path;

use anyhow::{Result, bail};
use tracing::info;

use crate::cli::FoldsArgs;
use crate::model::TruthRow;
use crate::table::{read_rows, write_rows, write_rows_headerless};
use crate::util::{SeededRng, ensure_directory};

pub fn run(args: FoldsArgs) -> Result<()> {
    if args.folds < 2 {
        bail!("fold count must be at least 2, got {}", args.folds);
    }

    let mut truth: Vec<TruthRow> = read_rows(&args.truth)?;
    if truth.len() < args.folds {
        bail!(
            "cannot split {} labeled questions into {} folds",
            truth.len(),
            args.folds
        );
    }

    ensure_directory(&args.output_root)?;
    if partition_complete(&args.output_root, args.folds) {
        info!(
            folds = args.folds,
            root = %args.output_root.display(),
            "fold partition already present, skipping"
        );
        return Ok(());
    }

    truth.sort_by(|a, b| a.question.cmp(&b.question));
    let mut rng = SeededRng::new(args.seed);
    rng.shuffle(&mut truth);

    for fold in 0..args.folds {
        let start = fold * truth.len() / args.folds;
        let end = (fold + 1) * truth.len() / args.folds;

        let test: Vec<TruthRow> = truth[start..end].to_vec();
        let train: Vec<TruthRow> = truth[..start]
            .iter()
            .chain(truth[end..].iter())
            .cloned()
            .collect();

        write_rows(&args.output_root.join(test_name(fold)), &test)?;
        write_rows_headerless(&args.output_root.join(train_name(fold)), &train)?;
        info!(fold, train = train.len(), test = test.len(), "wrote fold");
    }

    info!(
        folds = args.folds,
        questions = truth.len(),
        root = %args.output_root.display(),
        "wrote cross validation folds"
    );
    Ok(())
}

fn test_name(fold: usize) -> String {
    format!("test.{fold:03}.csv")
}

fn train_name(fold: usize) -> String {
    format!("train.{fold:03}.csv")
}

fn partition_complete(root: &Path, folds: usize) -> bool {
    (0..folds)
        .all(|fold| root.join(train_name(fold)).is_file() && root.join(test_name(fold)).is_file())
}
