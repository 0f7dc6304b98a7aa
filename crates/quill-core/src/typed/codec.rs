//! ResponseCodec - 生成 API の応答テキストを item の列に変換
//!
//! # デコードフロー
//! 1. 付随的な装飾を剥がす（```json フェンス、前後の説明文）
//! 2. JSON としてパース
//! 3. item 配列を取り出す（配列そのもの / items_field / 1 行だけならオブジェクト単体）
//! 4. 件数が入力行数と一致しなければ chunk 全体の失敗（部分的な対応付けはしない）

use serde_json::Value;

use crate::domain::ValidationError;

pub struct ResponseCodec;

impl ResponseCodec {
    /// Remove Markdown fences and surrounding prose around the JSON document.
    pub fn strip_wrappers(raw: &str) -> &str {
        let mut text = raw.trim();

        // 前置きの文章があってもフェンス内を優先する
        if let Some(open) = text.find("```") {
            let rest = &text[open + 3..];
            // 開きフェンスの行末までは言語タグ（```json）
            let body = match rest.find('\n') {
                Some(newline) => &rest[newline + 1..],
                None => rest,
            };
            text = match body.find("```") {
                Some(close) => &body[..close],
                None => body,
            }
            .trim();
        }

        let Some(start) = text.find(['[', '{']) else {
            return text;
        };
        let close = if text[start..].starts_with('[') { ']' } else { '}' };
        match text.rfind(close) {
            Some(end) if end > start => &text[start..=end],
            _ => &text[start..],
        }
    }

    pub fn parse(raw: &str) -> Result<Value, ValidationError> {
        serde_json::from_str(Self::strip_wrappers(raw))
            .map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    /// Items of a response to a chunk of `expected` rows.
    pub fn items(
        raw: &str,
        expected: usize,
        items_field: Option<&str>,
    ) -> Result<Vec<Value>, ValidationError> {
        let items = match Self::parse(raw)? {
            Value::Array(items) => items,
            Value::Object(mut object) => {
                match items_field.and_then(|field| object.remove(field)) {
                    Some(Value::Array(items)) => items,
                    Some(_) => {
                        return Err(ValidationError::Malformed(format!(
                            "`{}` is not an array",
                            items_field.unwrap_or_default()
                        )));
                    }
                    None if expected == 1 => vec![Value::Object(object)],
                    None => {
                        return Err(ValidationError::Malformed(
                            "expected an array of items".to_string(),
                        ));
                    }
                }
            }
            other => {
                return Err(ValidationError::Malformed(format!(
                    "unexpected top-level value: {other}"
                )));
            }
        };

        if items.len() != expected {
            return Err(ValidationError::CountMismatch {
                expected,
                got: items.len(),
            });
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("[1,2]", "[1,2]")]
    #[case("```json\n[1,2]\n```", "[1,2]")]
    #[case("```\n{\"a\":1}\n```", "{\"a\":1}")]
    #[case("Here you go:\n```json\n[1]\n```\nThanks!", "[1]")]
    #[case("Sure! {\"a\": [1]} hope that helps", "{\"a\": [1]}")]
    #[case("Here are the [2] results:\n```json\n[{\"a\":1},{\"a\":2}]\n```", "[{\"a\":1},{\"a\":2}]")]
    #[case("```json[1]```", "[1]")]
    #[case("no json here", "no json here")]
    fn strips_wrappers(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(ResponseCodec::strip_wrappers(raw), expected);
    }

    #[test]
    fn array_items_must_match_row_count() {
        let raw = "```json\n[{\"a\":1},{\"a\":2}]\n```";
        assert_eq!(ResponseCodec::items(raw, 2, None).unwrap().len(), 2);
        assert_eq!(
            ResponseCodec::items(raw, 3, None),
            Err(ValidationError::CountMismatch {
                expected: 3,
                got: 2
            })
        );
    }

    #[test]
    fn fenced_block_after_bracketed_prose_is_parsed() {
        let raw = "Here are the [2] results:\n```json\n[{\"a\":1},{\"a\":2}]\n```";
        let items = ResponseCodec::items(raw, 2, None).unwrap();
        assert_eq!(items, vec![json!({"a": 1}), json!({"a": 2})]);
    }

    #[test]
    fn wrapped_items_are_unwrapped() {
        let raw = r#"{"results": [{"a": 1}]}"#;
        let items = ResponseCodec::items(raw, 1, Some("results")).unwrap();
        assert_eq!(items, vec![json!({"a": 1})]);
    }

    #[test]
    fn single_object_is_one_item_only_for_single_row_chunks() {
        let raw = r#"{"front": "q", "back": "a"}"#;
        assert_eq!(ResponseCodec::items(raw, 1, None).unwrap().len(), 1);
        assert!(matches!(
            ResponseCodec::items(raw, 2, None),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            ResponseCodec::items("I cannot help with that.", 1, None),
            Err(ValidationError::Malformed(_))
        ));
        assert!(matches!(
            ResponseCodec::items("42", 1, None),
            Err(ValidationError::Malformed(_))
        ));
    }
}
