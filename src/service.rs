use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::Result;
use tracing::warn;

use crate::model::AnswerRecord;
use crate::table::read_rows;
use crate::util::percentage;

#[derive(Debug, Clone, PartialEq)]
pub struct Answered {
    pub answer: Option<String>,
    pub confidence: Option<f64>,
}

pub trait AnsweringService {
    fn ask(&mut self, question: &str) -> Result<Answered>;
}

pub struct LookupService {
    answers: HashMap<String, Answered>,
    missing: HashSet<String>,
}

impl LookupService {
    pub fn from_table(path: &Path) -> Result<Self> {
        let records: Vec<AnswerRecord> = read_rows(path)?;

        let mut answers = HashMap::with_capacity(records.len());
        let mut duplicated: HashSet<String> = HashSet::new();
        for record in records {
            if answers.contains_key(&record.question) {
                duplicated.insert(record.question);
                continue;
            }
            answers.insert(
                record.question,
                Answered {
                    answer: record.answer,
                    confidence: record.confidence,
                },
            );
        }
        if !duplicated.is_empty() {
            warn!(
                questions = duplicated.len(),
                total = answers.len(),
                percent = format!("{:.3}", percentage(duplicated.len(), answers.len())),
                path = %path.display(),
                "questions with multiple answers, keeping the first answer per question"
            );
        }

        Ok(Self {
            answers,
            missing: HashSet::new(),
        })
    }

    pub fn missing_count(&self) -> usize {
        self.missing.len()
    }
}

impl AnsweringService for LookupService {
    fn ask(&mut self, question: &str) -> Result<Answered> {
        match self.answers.get(question) {
            Some(answered) => Ok(answered.clone()),
            None => {
                self.missing.insert(question.to_string());
                Ok(Answered {
                    answer: None,
                    confidence: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AnsweringService, LookupService};

    fn service_from(content: &str) -> LookupService {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("answers.csv");
        std::fs::write(&path, content).expect("seed answer table");
        LookupService::from_table(&path).expect("table should load")
    }

    #[test]
    fn lookup_returns_recorded_answers() {
        let mut service = service_from(
            "Question,Answer,Confidence\n\
             what is up,the sky,0.75\n",
        );
        let answered = service.ask("what is up").expect("ask never fails");
        assert_eq!(answered.answer.as_deref(), Some("the sky"));
        assert_eq!(answered.confidence, Some(0.75));
        assert_eq!(service.missing_count(), 0);
    }

    #[test]
    fn lookup_answers_blank_for_unknown_questions() {
        let mut service = service_from("Question,Answer,Confidence\nq1,a1,0.5\n");
        let answered = service.ask("q2").expect("ask never fails");
        assert_eq!(answered.answer, None);
        assert_eq!(answered.confidence, None);
        assert_eq!(service.missing_count(), 1);
    }

    #[test]
    fn duplicate_questions_keep_the_first_answer() {
        let mut service = service_from(
            "Question,Answer,Confidence\n\
             q1,first,0.9\n\
             q1,second,0.1\n",
        );
        let answered = service.ask("q1").expect("ask never fails");
        assert_eq!(answered.answer.as_deref(), Some("first"));
        assert_eq!(answered.confidence, Some(0.9));
    }
}
