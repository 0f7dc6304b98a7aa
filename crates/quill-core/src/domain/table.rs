//! TaskTable - タスク種別ごとの「どの表のどの列を使うか」
//!
//! エンジンは列名を知らない。種別ごとに TaskTable を渡すことで、
//! 同じ claim/sweep/release の骨格を別々の表に適用する。
//!
//! 列名は SQL に埋め込まれるので、構築時に識別子として検証する。
//! `filter` だけは運用者が書く生の述語（信頼された設定値）として扱う。

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;

/// Row filter and lock columns for one task type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTable {
    /// Table name, optionally schema-qualified (`content.questions`).
    pub table: String,

    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// Columns assembled into the JSON payload object, keyed by column name.
    pub payload_columns: Vec<String>,

    /// Result column (JSONB). Null gates eligibility.
    pub result_column: String,

    #[serde(default = "default_owner_column")]
    pub owner_column: String,

    #[serde(default = "default_claimed_at_column")]
    pub claimed_at_column: String,

    /// Extra predicate ANDed into every read and update, e.g. `language = 'en'`.
    #[serde(default)]
    pub filter: Option<String>,
}

fn default_id_column() -> String {
    "id".to_string()
}

fn default_owner_column() -> String {
    "locked_by".to_string()
}

fn default_claimed_at_column() -> String {
    "locked_at".to_string()
}

impl TaskTable {
    /// Table with default id/lock column names.
    pub fn new(
        table: impl Into<String>,
        payload_columns: &[&str],
        result_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            id_column: default_id_column(),
            payload_columns: payload_columns.iter().map(|c| c.to_string()).collect(),
            result_column: result_column.into(),
            owner_column: default_owner_column(),
            claimed_at_column: default_claimed_at_column(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Check every identifier; the filter is only checked for emptiness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_qualified(&self.table)?;
        for column in [
            &self.id_column,
            &self.result_column,
            &self.owner_column,
            &self.claimed_at_column,
        ] {
            validate_identifier(column)?;
        }
        if self.payload_columns.is_empty() {
            return Err(ConfigError::InvalidTable(format!(
                "table {} has no payload columns",
                self.table
            )));
        }
        for column in &self.payload_columns {
            validate_identifier(column)?;
        }
        if let Some(filter) = &self.filter
            && filter.trim().is_empty()
        {
            return Err(ConfigError::InvalidTable(format!(
                "table {} has an empty filter",
                self.table
            )));
        }
        Ok(())
    }
}

fn validate_qualified(name: &str) -> Result<(), ConfigError> {
    let mut parts = name.split('.');
    let first = parts.next().unwrap_or_default();
    validate_identifier(first)?;
    match (parts.next(), parts.next()) {
        (None, _) => Ok(()),
        (Some(second), None) => validate_identifier(second),
        (Some(_), Some(_)) => Err(ConfigError::InvalidTable(format!(
            "too many name parts in {name:?}"
        ))),
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn validate_identifier(ident: &str) -> Result<(), ConfigError> {
    let mut chars = ident.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidTable(format!(
            "invalid identifier {ident:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("questions")]
    #[case("_tmp1")]
    #[case("Question_Bank")]
    fn accepts_plain_identifiers(#[case] ident: &str) {
        assert!(validate_identifier(ident).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("1abc")]
    #[case("drop table")]
    #[case("a;b")]
    #[case("name\"")]
    fn rejects_bad_identifiers(#[case] ident: &str) {
        assert!(validate_identifier(ident).is_err());
    }

    #[test]
    fn schema_qualified_table_is_valid() {
        let table = TaskTable::new("content.questions", &["question"], "subject");
        assert!(table.validate().is_ok());
    }

    #[test]
    fn three_part_table_name_is_rejected() {
        let table = TaskTable::new("db.content.questions", &["question"], "subject");
        assert!(table.validate().is_err());
    }

    #[test]
    fn table_without_payload_columns_is_rejected() {
        let table = TaskTable::new("questions", &[], "subject");
        assert!(matches!(table.validate(), Err(ConfigError::InvalidTable(_))));
    }

    #[test]
    fn blank_filter_is_rejected() {
        let table = TaskTable::new("questions", &["question"], "subject").with_filter("  ");
        assert!(table.validate().is_err());
    }

    #[test]
    fn deserializes_with_default_lock_columns() {
        let table: TaskTable = serde_json::from_value(serde_json::json!({
            "table": "questions",
            "payload_columns": ["question"],
            "result_column": "subject"
        }))
        .unwrap();
        assert_eq!(table.id_column, "id");
        assert_eq!(table.owner_column, "locked_by");
        assert_eq!(table.claimed_at_column, "locked_at");
    }
}
