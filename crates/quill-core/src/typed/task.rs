//! TaskKind trait - タスク種別ごとに違う部分だけを定義する
//!
//! claim / retry / release の骨格は共通。種別が持つのは：
//! - payload → プロンプト（`build_prompt`）
//! - 応答 1 件の検証（`validate`）
//! - 結果列の対応（`default_table` / 設定で上書き可）

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{TaskTable, ValidationError};

/// One content-generation task type.
///
/// # 使用例
/// ```ignore
/// #[derive(Clone)]
/// struct TopicTagging;
///
/// impl TaskKind for TopicTagging {
///     const NAME: &'static str = "topic_tagging";
///     type Payload = TopicInput;
///     type Output = TopicTags;
///     ...
/// }
/// ```
pub trait TaskKind: Send + Sync + 'static {
    /// Registry key and log field, e.g. `subject_classification`.
    const NAME: &'static str;

    /// Decoded from the row's payload object.
    type Payload: DeserializeOwned + Send + Sync;

    /// Serialized into the result column.
    type Output: Serialize + Send;

    /// Table and columns used when settings do not override them.
    fn default_table(&self) -> TaskTable;

    /// One prompt covering every payload of a chunk, in order.
    fn build_prompt(&self, payloads: &[Self::Payload]) -> String;

    /// Request JSON output from the service.
    fn structured(&self) -> bool {
        true
    }

    /// Key of the item array when the service wraps it in an object.
    fn items_field(&self) -> Option<&'static str> {
        None
    }

    /// Validate the item produced for `payload`.
    fn validate(
        &self,
        payload: &Self::Payload,
        item: serde_json::Value,
    ) -> Result<Self::Output, ValidationError>;
}
