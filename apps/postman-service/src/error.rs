//! # Postman Service エラー定義
//!
//! コマンド・クエリ・イベントハンドラが返すエラーと、HTTP レスポンスへの変換を定義する。
//!
//! | バリアント | HTTP | 由来 |
//! |-----------|------|------|
//! | `Validation` | 400 | 入力不備・プレースホルダ不整合・不正なイベントペイロード |
//! | `NotFound` | 404 | 参照先の集約が存在しない |
//! | `Conflict` | 409 | 件名の重複・楽観的ロック失敗 |
//! | `AlreadyComplete` | 409 | 送信済みメールの再送 |
//! | `Database` | 500 | 書き込みストア・読み取りストア・バスの障害 |
//! | `Internal` | 500 | レンダリング失敗など上記以外 |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use postman_domain::DomainError;
use postman_infra::{InfraError, error::InfraErrorKind};
use postman_shared::{ErrorResponse, event_log::error as log_error};
use thiserror::Error;

/// Postman Service で発生するエラー
#[derive(Debug, Error)]
pub enum CoreError {
    /// 不正な入力
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// リソースが見つからない
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 競合（一意性違反・楽観的ロック失敗）
    #[error("競合が発生しました: {0}")]
    Conflict(String),

    /// 送信完了済みのメールへの再送
    #[error("メールは既に送信完了しています: {0}")]
    AlreadyComplete(String),

    /// インフラ層（データベース・メッセージバス）のエラー
    #[error("データベースエラー: {0}")]
    Database(InfraError),

    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl CoreError {
    /// ログ用のエラーカテゴリ（`error.category`）
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::NotFound(_) | Self::Conflict(_) | Self::AlreadyComplete(_) => {
                log_error::category::BUSINESS
            }
            Self::Database(_) | Self::Internal(_) => log_error::category::INFRASTRUCTURE,
        }
    }

    /// ログ用のエラー種別（`error.kind`）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => log_error::kind::VALIDATION,
            Self::NotFound(_) => log_error::kind::NOT_FOUND,
            Self::Conflict(_) => log_error::kind::CONFLICT,
            Self::AlreadyComplete(_) => log_error::kind::ALREADY_COMPLETE,
            Self::Database(e) => match e.kind() {
                InfraErrorKind::Bus(_) => log_error::kind::BUS,
                _ => log_error::kind::DATABASE,
            },
            Self::Internal(_) => log_error::kind::INTERNAL,
        }
    }

    /// クライアント起因のエラーか
    pub fn is_client_error(&self) -> bool {
        self.category() == log_error::category::BUSINESS
    }
}

impl From<DomainError> for CoreError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Validation(msg) => Self::Validation(msg),
            e @ DomainError::NotFound { .. } => Self::NotFound(e.to_string()),
            DomainError::Conflict(msg) => Self::Conflict(msg),
            DomainError::AlreadyComplete { id } => Self::AlreadyComplete(id),
        }
    }
}

/// インフラ層のエラーのうち、意味が呼び出し元に帰着するものは対応する種別へ写す
impl From<InfraError> for CoreError {
    fn from(error: InfraError) -> Self {
        match error.kind() {
            InfraErrorKind::Conflict { .. } => Self::Conflict(error.to_string()),
            InfraErrorKind::NotFound { .. } => Self::NotFound(error.to_string()),
            InfraErrorKind::InvalidInput(msg) => Self::Validation(msg.clone()),
            _ => Self::Database(error),
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let body = match &self {
            Self::Validation(msg) => ErrorResponse::validation_error(msg.clone()),
            Self::NotFound(msg) => ErrorResponse::not_found(msg.clone()),
            Self::Conflict(msg) => ErrorResponse::conflict(msg.clone()),
            Self::AlreadyComplete(id) => {
                ErrorResponse::already_complete(format!("メールは既に送信完了しています: {id}"))
            }
            Self::Database(e) => {
                tracing::error!(
                    error.category = self.category(),
                    error.kind = self.kind(),
                    "データベースエラー: {}",
                    e
                );
                ErrorResponse::internal_error()
            }
            Self::Internal(msg) => {
                tracing::error!(
                    error.category = self.category(),
                    error.kind = self.kind(),
                    "内部エラー: {}",
                    msg
                );
                ErrorResponse::internal_error()
            }
        };

        let status =
            StatusCode::from_u16(body.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}
