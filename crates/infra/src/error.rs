//! # インフラ層エラー定義
//!
//! データベース・メッセージバスとの通信で発生するエラーを表現する。
//!
//! ## 構造
//!
//! `std::io::Error` と同じ struct + enum パターン:
//! - [`InfraError`]: エラー種別（[`InfraErrorKind`]）と [`SpanTrace`] を保持するラッパー
//! - [`InfraErrorKind`]: エラーの具体的な種別（Database, Bus, Conflict 等）
//!
//! `From` 実装と convenience constructor はエラー生成時のスパンを自動で記録する。

use std::fmt;

use derive_more::Display;
use thiserror::Error;
use tracing_error::SpanTrace;

/// インフラ層で発生するエラー
///
/// エラー種別に応じた処理には [`kind()`](InfraError::kind) を使用する:
///
/// ```ignore
/// match error.kind() {
///     InfraErrorKind::Conflict { entity, id } => { /* 競合処理 */ }
///     _ => { /* その他 */ }
/// }
/// ```
#[derive(Display)]
#[display("{kind}")]
pub struct InfraError {
    kind:       InfraErrorKind,
    span_trace: SpanTrace,
}

/// インフラ層エラーの種別
#[derive(Debug, Error)]
pub enum InfraErrorKind {
    /// データベースエラー
    ///
    /// SQL クエリの実行失敗、接続エラー、制約違反など。
    #[error("データベースエラー: {0}")]
    Database(#[source] sqlx::Error),

    /// シリアライズ/デシリアライズエラー
    ///
    /// イベントペイロードや JSONB ドキュメントの変換失敗。
    #[error("シリアライズエラー: {0}")]
    Serialization(#[source] serde_json::Error),

    /// メッセージバスエラー
    ///
    /// async-nats のエラー型は操作ごとに異なるため String にマップする。
    #[error("メッセージバスエラー: {0}")]
    Bus(String),

    /// 対象が存在しない
    ///
    /// 削除・更新対象の行が書き込みストアに無かった場合。
    #[error("{entity} が見つかりません: {id}")]
    NotFound {
        entity: String,
        id:     String,
    },

    /// 競合
    ///
    /// 楽観的ロックのバージョン不一致、または一意制約違反。
    #[error("競合が発生しました: {entity}(id={id})")]
    Conflict {
        /// エンティティ名（例: "Template"）
        entity: String,
        /// エンティティの ID（一意制約違反の場合は衝突したキー）
        id:     String,
    },

    /// クライアント入力エラー
    ///
    /// 不正なファセットクエリなど、原因がクライアント入力にあるもの。
    #[error("入力エラー: {0}")]
    InvalidInput(String),

    /// 予期しないエラー
    #[error("予期しないエラー: {0}")]
    Unexpected(String),
}

impl InfraError {
    /// エラー種別を取得する
    pub fn kind(&self) -> &InfraErrorKind {
        &self.kind
    }

    /// SpanTrace を取得する
    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }

    /// Conflict バリアントの場合、entity と id を返す
    pub fn as_conflict(&self) -> Option<(&str, &str)> {
        match &self.kind {
            InfraErrorKind::Conflict { entity, id } => Some((entity, id)),
            _ => None,
        }
    }

    pub fn into_parts(self) -> (InfraErrorKind, SpanTrace) {
        (self.kind, self.span_trace)
    }

    pub fn from_parts(kind: InfraErrorKind, span_trace: SpanTrace) -> Self {
        Self { kind, span_trace }
    }

    // ===== Convenience constructors =====

    /// 競合エラーを生成する
    pub fn conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::Conflict {
            entity: entity.into(),
            id:     id.into(),
        })
    }

    /// 対象不存在エラーを生成する
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::NotFound {
            entity: entity.into(),
            id:     id.into(),
        })
    }

    /// メッセージバスエラーを生成する
    pub fn bus(msg: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::Bus(msg.into()))
    }

    /// クライアント入力エラーを生成する
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::InvalidInput(msg.into()))
    }

    /// 予期しないエラーを生成する
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::Unexpected(msg.into()))
    }

    fn capture(kind: InfraErrorKind) -> Self {
        Self {
            kind,
            span_trace: SpanTrace::capture(),
        }
    }
}

// ===== トレイト実装 =====

impl fmt::Debug for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfraError")
            .field("kind", &self.kind)
            .field("span_trace", &self.span_trace)
            .finish()
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

// ===== From 実装（SpanTrace 自動キャプチャ） =====

impl From<sqlx::Error> for InfraError {
    fn from(source: sqlx::Error) -> Self {
        Self::capture(InfraErrorKind::Database(source))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(source: serde_json::Error) -> Self {
        Self::capture(InfraErrorKind::Serialization(source))
    }
}
