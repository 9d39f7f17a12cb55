//! # リポジトリ実装
//!
//! 書き込みストア（集約の型付き行）と読み取りストア（公開射影の JSONB ドキュメント）の
//! 2 系統を提供する。
//!
//! | 系統 | トレイト | テーブル |
//! |------|---------|---------|
//! | 書き込み | [`TemplateRepository`] / [`EmailRepository`] | `templates` / `emails` |
//! | 読み取り | [`TemplateViewRepository`] / [`EmailViewRepository`] | `template_views` / `email_views` |
//!
//! 読み取りストアはイベント投影でのみ更新される。コマンドハンドラから直接書き込むことはない。

pub mod email_repository;
pub mod email_view_repository;
pub mod facet_sql;
pub mod template_repository;
pub mod template_view_repository;
mod view_store;

pub use email_repository::{EmailLookup, EmailRepository, PostgresEmailRepository};
pub use email_view_repository::{EmailViewRepository, PostgresEmailViewRepository};
pub use template_repository::{PostgresTemplateRepository, TemplateLookup, TemplateRepository};
pub use template_view_repository::{PostgresTemplateViewRepository, TemplateViewRepository};
pub use view_store::FacetResult;

/// 一意制約違反かどうか
pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}
