//! # ドメイン層エラー定義
//!
//! 集約の生成・変更時に発生するビジネスルール違反を表現するエラー型。
//!
//! ## エラーの種類と HTTP ステータスの対応
//!
//! | エラー種別 | HTTP ステータス | 用途 |
//! |-----------|----------------|------|
//! | `Validation` | 400 Bad Request | 入力値・イベントペイロードの検証失敗 |
//! | `NotFound` | 404 Not Found | 参照先の集約が存在しない |
//! | `Conflict` | 409 Conflict | 件名の重複など一意性違反 |
//! | `AlreadyComplete` | 409 Conflict | 送信済みメールの再送要求 |
//!
//! ## 使用例
//!
//! ```rust
//! use postman_domain::DomainError;
//!
//! fn require_subject(subject: &str) -> Result<(), DomainError> {
//!     if subject.trim().is_empty() {
//!         return Err(DomainError::Validation("subject は必須です".to_string()));
//!     }
//!     Ok(())
//! }
//!
//! assert!(require_subject("").is_err());
//! ```

use thiserror::Error;

/// ドメイン層で発生するエラー
#[derive(Debug, Error)]
pub enum DomainError {
    /// バリデーションエラー
    ///
    /// 必須項目の欠落、不正な ID 形式、プレースホルダ不整合など。
    /// `Existing` による復元時のペイロード欠損もここに含まれる。
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// 集約が見つからない
    #[error("{entity_type} が見つかりません: {id}")]
    NotFound {
        /// 集約の種類（"Template", "Email"）
        entity_type: &'static str,
        /// 検索に使用した識別子
        id:          String,
    },

    /// 一意性違反
    #[error("競合が発生しました: {0}")]
    Conflict(String),

    /// 既に送信完了しているメールへの再送要求
    #[error("メールは既に送信完了しています: {id}")]
    AlreadyComplete {
        /// メール ID
        id: String,
    },
}
