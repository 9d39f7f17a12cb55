//! # API レスポンスエンベロープ
//!
//! HTTP API の統一レスポンス形式 `{ "data": T }`。

use serde::{Deserialize, Serialize};

/// HTTP API の統一レスポンス型
///
/// テンプレート・メールの各エンドポイントは `{ "data": T }` 形式で返す。
/// ファセットクエリの結果も `{ "data": { "<facet>": [...] } }` としてこの型に包む。
///
/// ```
/// use postman_shared::ApiResponse;
///
/// let response = ApiResponse::new(vec!["welcome"]);
/// assert_eq!(response.data.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}
