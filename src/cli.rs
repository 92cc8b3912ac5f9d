use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::batch::DEFAULT_RETRY_BACKOFF;

#[derive(Parser, Debug)]
#[command(
    name = "verdict",
    version,
    about = "Evaluate and combine question answering systems against human judgments"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Extract(ExtractArgs),
    Sample(SampleArgs),
    Answer(AnswerArgs),
    Interpret(InterpretArgs),
    Pairs(PairsArgs),
    Collate(CollateArgs),
    Filter(FilterArgs),
    Disagreements(DisagreementsArgs),
    Curves(CurvesArgs),
    Oracle(OracleArgs),
    Fallback(FallbackArgs),
    Voting(VotingArgs),
    Folds(FoldsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long)]
    pub usage_log: PathBuf,

    #[arg(long, default_value = "questions.csv")]
    pub output: PathBuf,

    #[arg(long)]
    pub answers: Option<PathBuf>,

    #[arg(long)]
    pub after: Option<NaiveDate>,

    #[arg(long)]
    pub before: Option<NaiveDate>,

    #[arg(long = "drop-experience")]
    pub drop_experiences: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SampleArgs {
    #[arg(long)]
    pub questions: PathBuf,

    #[arg(long, default_value = "sample.csv")]
    pub output: PathBuf,

    #[arg(long)]
    pub size: usize,

    #[arg(long, default_value_t = 0xA5A5_1337)]
    pub seed: u64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum AnswerFormat {
    Csv,
    Json,
}

impl AnswerFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AnswerArgs {
    #[arg(long)]
    pub questions: PathBuf,

    #[arg(long)]
    pub answer_source: PathBuf,

    #[arg(long, default_value = "answers.csv")]
    pub output: PathBuf,

    #[arg(long, value_enum, default_value_t = AnswerFormat::Csv)]
    pub format: AnswerFormat,

    #[arg(long)]
    pub retries: Option<u32>,

    #[arg(long, default_value_t = DEFAULT_RETRY_BACKOFF.as_secs())]
    pub backoff_seconds: u64,

    #[arg(long, default_value_t = 100)]
    pub flush_interval: usize,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct InterpretArgs {
    #[arg(long)]
    pub judgments: PathBuf,

    #[arg(long, default_value = "interpreted.csv")]
    pub output: PathBuf,

    #[arg(long, default_value_t = 50.0)]
    pub threshold: f64,
}

#[derive(Args, Debug, Clone)]
pub struct PairsArgs {
    #[arg(long = "answers")]
    pub answers: Vec<PathBuf>,

    #[arg(long)]
    pub judgments: Option<PathBuf>,

    #[arg(long, default_value = "pairs.csv")]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct CollateArgs {
    #[arg(long = "answers")]
    pub answers: Vec<PathBuf>,

    #[arg(long = "label")]
    pub labels: Vec<String>,

    #[arg(long)]
    pub judgments: PathBuf,

    #[arg(long)]
    pub frequencies: PathBuf,

    #[arg(long, default_value = "collated.csv")]
    pub output: PathBuf,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum FilterMode {
    Correct,
    Incorrect,
}

impl FilterMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Incorrect => "incorrect",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    #[arg(long)]
    pub collated: PathBuf,

    #[arg(long, value_enum)]
    pub mode: FilterMode,

    #[arg(long, default_value = "filtered.csv")]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct DisagreementsArgs {
    #[arg(long)]
    pub collated: PathBuf,

    #[arg(long, default_value = "disagreements.csv")]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct CurvesArgs {
    #[arg(long)]
    pub collated: PathBuf,

    #[arg(long, default_value = "curves")]
    pub output_root: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct OracleArgs {
    #[arg(long)]
    pub collated: PathBuf,

    #[arg(long = "system")]
    pub systems: Vec<String>,

    #[arg(long, default_value = "oracle")]
    pub name: String,

    #[arg(long, default_value = "oracle.csv")]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct FallbackArgs {
    #[arg(long)]
    pub collated: PathBuf,

    #[arg(long)]
    pub default_system: String,

    #[arg(long)]
    pub secondary_system: String,

    #[arg(long, default_value = "fallback")]
    pub name: String,

    #[arg(long, default_value = "fallback.csv")]
    pub output: PathBuf,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum StandardizerVariant {
    PrecisionOnly,
    InverseQa,
    InverseQaPCorrected,
}

impl StandardizerVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrecisionOnly => "precision_only",
            Self::InverseQa => "inverse_qa",
            Self::InverseQaPCorrected => "inverse_qa_p_corrected",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct VotingArgs {
    #[arg(long)]
    pub collated: PathBuf,

    #[arg(long = "system")]
    pub systems: Vec<String>,

    #[arg(long, default_value = "voting")]
    pub name: String,

    #[arg(long, value_enum, default_value_t = StandardizerVariant::PrecisionOnly)]
    pub standardizer: StandardizerVariant,

    #[arg(long, default_value = "voting.csv")]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct FoldsArgs {
    #[arg(long)]
    pub truth: PathBuf,

    #[arg(long, default_value_t = 5)]
    pub folds: usize,

    #[arg(long, default_value_t = 0xA5A5_1337)]
    pub seed: u64,

    #[arg(long, default_value = "folds")]
    pub output_root: PathBuf,
}
