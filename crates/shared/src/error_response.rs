//! # エラーレスポンス（RFC 9457 Problem Details）
//!
//! - `ErrorResponse` は純粋なデータ構造（`Serialize` / `Deserialize` のみ）
//! - axum の `IntoResponse` 変換はサービス側の責務（shared に axum 依存を入れない）

use serde::{Deserialize, Serialize};

/// error_type URI のベースパス
const ERROR_TYPE_BASE: &str = "https://postman.example.com/errors";

/// エラーレスポンス（RFC 9457 Problem Details）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub error_type: String,
    pub title:      String,
    pub status:     u16,
    pub detail:     String,
}

impl ErrorResponse {
    /// `error_type_suffix` はベース URI に付加される（例: `"already-complete"`）
    pub fn new(
        error_type_suffix: &str,
        title: impl Into<String>,
        status: u16,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            error_type: format!("{ERROR_TYPE_BASE}/{error_type_suffix}"),
            title: title.into(),
            status,
            detail: detail.into(),
        }
    }

    /// 400 Validation Error
    pub fn validation_error(detail: impl Into<String>) -> Self {
        Self::new("validation-error", "Validation Error", 400, detail)
    }

    /// 404 Not Found
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new("not-found", "Not Found", 404, detail)
    }

    /// 409 Conflict
    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::new("conflict", "Conflict", 409, detail)
    }

    /// 409 Already Complete（送信済みメールの再送）
    pub fn already_complete(detail: impl Into<String>) -> Self {
        Self::new("already-complete", "Already Complete", 409, detail)
    }

    /// 500 Internal Server Error
    ///
    /// detail は固定値（内部情報を漏らさないため）。
    pub fn internal_error() -> Self {
        Self::new(
            "internal-error",
            "Internal Server Error",
            500,
            "内部エラーが発生しました",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_complete_が409と専用のerror_typeを返す() {
        let error = ErrorResponse::already_complete("メールは既に送信完了しています");

        assert_eq!(
            error.error_type,
            "https://postman.example.com/errors/already-complete"
        );
        assert_eq!(error.status, 409);
    }

    #[test]
    fn test_internal_error_はdetailを固定値にする() {
        let error = ErrorResponse::internal_error();

        assert_eq!(error.status, 500);
        assert_eq!(error.detail, "内部エラーが発生しました");
    }

    #[test]
    fn test_jsonシリアライズでtypeフィールド名に変換される() {
        let json = serde_json::to_value(ErrorResponse::not_found("Template が見つかりません")).unwrap();

        assert_eq!(json["type"], "https://postman.example.com/errors/not-found");
        assert_eq!(json["title"], "Not Found");
        assert!(json.get("error_type").is_none());
    }

    #[test]
    fn test_便利コンストラクタのstatus() {
        assert_eq!(ErrorResponse::validation_error("").status, 400);
        assert_eq!(ErrorResponse::not_found("").status, 404);
        assert_eq!(ErrorResponse::conflict("").status, 409);
    }
}
