//! subject_classification - 設問を固定の科目集合のどれかに分類する
//!
//! chunk 単位でまとめて投げるタイプ。応答は入力と同じ順序・同じ件数の配列。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{TaskTable, ValidationError};
use crate::typed::TaskKind;
use crate::typed::schema::require_one_of;

pub const DEFAULT_SUBJECTS: &[&str] = &[
    "mathematics",
    "physics",
    "chemistry",
    "biology",
    "computer_science",
    "history",
    "geography",
    "literature",
    "economics",
    "other",
];

#[derive(Debug, Clone)]
pub struct SubjectClassification {
    subjects: &'static [&'static str],
}

impl SubjectClassification {
    pub fn new(subjects: &'static [&'static str]) -> Self {
        Self { subjects }
    }

    pub fn subjects(&self) -> &'static [&'static str] {
        self.subjects
    }
}

impl Default for SubjectClassification {
    fn default() -> Self {
        Self::new(DEFAULT_SUBJECTS)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionPayload {
    pub question: String,

    #[serde(default)]
    pub choices: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectLabel {
    pub subject: String,
    pub confidence: f64,
}

impl TaskKind for SubjectClassification {
    const NAME: &'static str = "subject_classification";
    type Payload = QuestionPayload;
    type Output = SubjectLabel;

    fn default_table(&self) -> TaskTable {
        TaskTable::new("questions", &["question"], "subject_label")
    }

    fn build_prompt(&self, payloads: &[QuestionPayload]) -> String {
        let mut prompt = format!(
            "Classify each of the following {} questions into exactly one subject.\n\
             Allowed subjects: {}.\n\
             Answer with a JSON array of {} objects, in the same order as the questions, \
             each shaped like {{\"subject\": \"<subject>\", \"confidence\": <0.0-1.0>}}.\n\n",
            payloads.len(),
            self.subjects.join(", "),
            payloads.len(),
        );
        for (i, payload) in payloads.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, payload.question.trim()));
            for choice in &payload.choices {
                prompt.push_str(&format!("   - {}\n", choice.trim()));
            }
        }
        prompt
    }

    fn items_field(&self) -> Option<&'static str> {
        Some("results")
    }

    fn validate(
        &self,
        _payload: &QuestionPayload,
        item: Value,
    ) -> Result<SubjectLabel, ValidationError> {
        let subject = require_one_of(&item, "subject", self.subjects)?;
        let confidence = item
            .get("confidence")
            .and_then(Value::as_f64)
            .ok_or_else(|| ValidationError::MissingField("confidence".to_string()))?;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ValidationError::NotAllowed {
                field: "confidence".to_string(),
                value: confidence.to_string(),
            });
        }
        Ok(SubjectLabel {
            subject: subject.to_string(),
            confidence,
        })
    }
}
