//! ユースケース層の共通ヘルパー
//!
//! 入力の必須チェック、リポジトリ結果の変換、イベント発行など、
//! 複数のハンドラで繰り返されるパターンを共通化する。

use itertools::Itertools;
use postman_infra::{InfraError, bus::EventBus};

use crate::error::CoreError;

/// 空白のみを含む値を欠損として、欠けている項目をまとめて `CoreError::Validation` で返す
///
/// ```ignore
/// require_fields([("recipient", &command.recipient), ("from", &command.from)])?;
/// // => "recipient is required, from is required"
/// ```
pub(crate) fn require_fields<'a>(
    fields: impl IntoIterator<Item = (&'static str, &'a str)>,
) -> Result<(), CoreError> {
    let missing = fields
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| format!("{name} is required"))
        .join(", ");
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(missing))
    }
}

/// リポジトリの `Result<Option<T>, InfraError>` を `Result<T, CoreError>` に変換する
///
/// ```ignore
/// let template = self.repository.find_one(&TemplateLookup::ById(id)).await
///     .or_not_found("Template", &id)?;
/// ```
pub(crate) trait FindResultExt<T> {
    /// `None` の場合は `CoreError::NotFound`、`InfraError` の場合はその変換結果を返す
    fn or_not_found(self, entity: &str, id: &dyn std::fmt::Display) -> Result<T, CoreError>;
}

impl<T> FindResultExt<T> for Result<Option<T>, InfraError> {
    fn or_not_found(self, entity: &str, id: &dyn std::fmt::Display) -> Result<T, CoreError> {
        self?
            .ok_or_else(|| CoreError::NotFound(format!("{entity} が見つかりません: {id}")))
    }
}

/// ドメインイベントを発行する
///
/// 書き込みストアへの保存後に呼ぶ。発行に失敗しても保存済みの行は戻さない。
pub(crate) async fn publish(
    bus: &dyn EventBus,
    name: &str,
    payload: serde_json::Result<serde_json::Value>,
) -> Result<(), CoreError> {
    let payload = payload
        .map_err(|e| CoreError::Internal(format!("イベントのシリアライズに失敗: {e}")))?;
    bus.publish(name, &payload).await?;
    Ok(())
}
