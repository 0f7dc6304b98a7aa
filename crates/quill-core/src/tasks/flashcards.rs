//! flashcards - トピックから表裏のフラッシュカードを生成する
//!
//! 基本は 1 行 1 リクエスト（chunk_size = 1）。応答は `{"cards": [...]}` の
//! オブジェクト 1 つ。chunk_size > 1 で動かした場合は同じ形の配列を求める。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{TaskTable, ValidationError};
use crate::typed::TaskKind;
use crate::typed::schema::require_str;

pub const DEFAULT_CARDS_PER_TOPIC: usize = 5;

#[derive(Debug, Clone)]
pub struct Flashcards {
    cards_per_topic: usize,
}

impl Flashcards {
    pub fn new(cards_per_topic: usize) -> Self {
        Self {
            cards_per_topic: cards_per_topic.max(1),
        }
    }
}

impl Default for Flashcards {
    fn default() -> Self {
        Self::new(DEFAULT_CARDS_PER_TOPIC)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicPayload {
    pub topic: String,

    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardSet {
    pub cards: Vec<Flashcard>,
}

impl Flashcards {
    fn describe(payload: &TopicPayload) -> String {
        match payload.level.as_deref().map(str::trim) {
            Some(level) if !level.is_empty() => format!("{} (level: {level})", payload.topic.trim()),
            _ => payload.topic.trim().to_string(),
        }
    }
}

impl TaskKind for Flashcards {
    const NAME: &'static str = "flashcards";
    type Payload = TopicPayload;
    type Output = FlashcardSet;

    fn default_table(&self) -> TaskTable {
        TaskTable::new("topics", &["topic", "level"], "flashcards")
    }

    fn build_prompt(&self, payloads: &[TopicPayload]) -> String {
        let shape = r#"{"cards": [{"front": "<question>", "back": "<answer>"}]}"#;
        if let [payload] = payloads {
            return format!(
                "Write {} study flashcards about: {}.\n\
                 Answer with one JSON object shaped like {shape}.",
                self.cards_per_topic,
                Self::describe(payload),
            );
        }

        let mut prompt = format!(
            "Write {} study flashcards for each of the following {} topics.\n\
             Answer with a JSON array of {} objects, in the same order as the topics, \
             each shaped like {shape}.\n\n",
            self.cards_per_topic,
            payloads.len(),
            payloads.len(),
        );
        for (i, payload) in payloads.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, Self::describe(payload)));
        }
        prompt
    }

    fn validate(
        &self,
        _payload: &TopicPayload,
        item: Value,
    ) -> Result<FlashcardSet, ValidationError> {
        let cards = item
            .get("cards")
            .and_then(Value::as_array)
            .filter(|cards| !cards.is_empty())
            .ok_or_else(|| ValidationError::MissingField("cards".to_string()))?;

        let cards = cards
            .iter()
            .map(|card| -> Result<Flashcard, ValidationError> {
                Ok(Flashcard {
                    front: require_str(card, "front")?.to_string(),
                    back: require_str(card, "back")?.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FlashcardSet { cards })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn topic(name: &str, level: Option<&str>) -> TopicPayload {
        TopicPayload {
            topic: name.to_string(),
            level: level.map(str::to_string),
        }
    }

    #[test]
    fn single_topic_prompt_asks_for_one_object() {
        let prompt = Flashcards::new(3).build_prompt(&[topic("Photosynthesis", Some("beginner"))]);
        assert!(prompt.contains("Write 3 study flashcards about: Photosynthesis (level: beginner)"));
        assert!(prompt.contains("one JSON object"));
    }

    #[test]
    fn multi_topic_prompt_asks_for_array() {
        let prompt = Flashcards::default()
            .build_prompt(&[topic("Cells", None), topic("Atoms", Some(" "))]);
        assert!(prompt.contains("JSON array of 2 objects"));
        assert!(prompt.contains("1. Cells\n"));
        assert!(prompt.contains("2. Atoms\n"));
    }

    #[test]
    fn validates_cards() {
        let set = Flashcards::default()
            .validate(
                &topic("Cells", None),
                json!({"cards": [{"front": " What is a cell? ", "back": "The basic unit of life."}]}),
            )
            .unwrap();
        assert_eq!(set.cards[0].front, "What is a cell?");
    }

    #[test]
    fn rejects_empty_or_incomplete_cards() {
        let kind = Flashcards::default();
        let payload = topic("Cells", None);
        assert_eq!(
            kind.validate(&payload, json!({"cards": []})),
            Err(ValidationError::MissingField("cards".into()))
        );
        assert_eq!(
            kind.validate(&payload, json!({"cards": [{"front": "q"}]})),
            Err(ValidationError::MissingField("back".into()))
        );
    }
}
