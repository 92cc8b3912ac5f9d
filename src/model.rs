use serde::{Deserialize, Serialize};

pub const QUESTION: &str = "Question";
pub const ANSWER: &str = "Answer";
pub const CONFIDENCE: &str = "Confidence";
pub const THRESHOLD: &str = "Threshold";
pub const PRECISION: &str = "Precision";
pub const QUESTIONS_ATTEMPTED: &str = "QuestionsAttempted";
pub const TRUE_POSITIVE_RATE: &str = "TruePositiveRate";
pub const FALSE_POSITIVE_RATE: &str = "FalsePositiveRate";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "Frequency")]
    pub frequency: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(rename = "DateTime")]
    pub date_time: String,
    #[serde(rename = "QuestionText")]
    pub question: String,
    #[serde(rename = "TopAnswerText")]
    pub answer: Option<String>,
    #[serde(rename = "TopAnswerConfidence")]
    pub confidence: Option<f64>,
    #[serde(rename = "UserExperience")]
    pub user_experience: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "Answer")]
    pub answer: Option<String>,
    #[serde(rename = "Confidence")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawJudgment {
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "Answer")]
    pub answer: String,
    #[serde(rename = "InPurview")]
    pub in_purview: bool,
    #[serde(rename = "Score")]
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judgment {
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "Answer")]
    pub answer: String,
    #[serde(rename = "InPurview")]
    pub in_purview: bool,
    #[serde(rename = "Correct")]
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollatedRow {
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "System")]
    pub system: String,
    #[serde(rename = "Answer")]
    pub answer: String,
    #[serde(rename = "Confidence")]
    pub confidence: f64,
    #[serde(rename = "InPurview")]
    pub in_purview: bool,
    #[serde(rename = "Correct")]
    pub correct: bool,
    #[serde(rename = "Frequency")]
    pub frequency: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialCollatedRow {
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "System")]
    pub system: String,
    #[serde(rename = "Answer")]
    pub answer: Option<String>,
    #[serde(rename = "Confidence")]
    pub confidence: Option<f64>,
    #[serde(rename = "InPurview")]
    pub in_purview: Option<bool>,
    #[serde(rename = "Correct")]
    pub correct: Option<bool>,
    #[serde(rename = "Frequency")]
    pub frequency: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedRow {
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "System")]
    pub system: String,
    #[serde(rename = "Answer")]
    pub answer: String,
    #[serde(rename = "Confidence")]
    pub confidence: f64,
    #[serde(rename = "InPurview")]
    pub in_purview: bool,
    #[serde(rename = "Correct")]
    pub correct: bool,
    #[serde(rename = "Frequency")]
    pub frequency: u64,
    #[serde(rename = "Provenance")]
    pub provenance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruthRow {
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "Label")]
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceHash {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerCounts {
    pub questions_total: usize,
    pub recovered: usize,
    pub answered: usize,
    pub missing_answers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerPaths {
    pub questions_path: String,
    pub answers_source_path: String,
    pub output_path: String,
    pub manifest_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub format: String,
    pub flush_interval: usize,
    pub retries: Option<u32>,
    pub counts: AnswerCounts,
    pub paths: AnswerPaths,
    pub source_hashes: Vec<SourceHash>,
    pub warnings: Vec<String>,
}
