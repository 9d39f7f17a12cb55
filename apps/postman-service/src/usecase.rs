//! # ユースケース層
//!
//! CQRS のコマンド・クエリ・イベント（投影）ハンドラを集約ごとに実装する。
//!
//! ## 設計方針
//!
//! - **依存性注入**: リポジトリ・バス・メール機能を `Arc<dyn Trait>` で外部から注入
//! - **閉じた列挙型**: コマンドとイベントは集約ごとの enum で表し、`match` で振り分ける
//! - **書き込みと読み取りの分離**: コマンドハンドラは書き込みストアのみ、
//!   投影ハンドラは読み取りストアのみを更新する
//!
//! ## 処理の流れ
//!
//! ```text
//! Command ─→ 書き込みストア ─→ Bus.publish ─→ Projector ─→ 読み取りストア
//! Query   ─→ 読み取りストア
//! ```
//!
//! ## モジュール構成
//!
//! - `template`: テンプレートの Create / Update / Delete と投影
//! - `email`: メールの Create / Resend / Delete と投影

pub(crate) mod helpers;

pub mod email;
pub mod template;

pub use email::{
    CreateEmail,
    DeleteEmail,
    EmailCommand,
    EmailCommandHandler,
    EmailProjector,
    EmailQueryHandler,
    ResendEmail,
};
pub use template::{
    CreateTemplate,
    DeleteTemplate,
    TemplateCommand,
    TemplateCommandHandler,
    TemplateProjector,
    TemplateQueryHandler,
    UpdateTemplate,
};
