//! # Postman ドメイン層
//!
//! メール送信サービスの中核となる 2 つの集約（Template / Email）と、
//! それらの生成・復元・イベント表現を定義する。
//!
//! ## 依存関係の方向
//!
//! ```text
//! postman-service → infra → domain
//! ```
//!
//! ドメイン層は永続化・バス・メール送信の実装に一切依存しない。
//!
//! ## モジュール構成
//!
//! - [`aggregate`] - 識別子・バージョン・タイムスタンプの値オブジェクト
//! - [`template`] / [`email`] - 集約本体と公開射影
//! - [`factory`] - `New` / `Existing` の 2 モードで集約を組み立てる
//! - [`event`] - ドメインイベントとイベント名
//! - [`mail`] - 送信メールと送信エラー
//! - [`query`] - 読み取りストアへのファセットクエリ
//! - [`clock`] - 時刻の注入
//! - [`error`] - ドメインエラー
//!
//! ## 使用例
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use postman_domain::{
//!     clock::SystemClock,
//!     factory::AggregateFactory,
//!     template::NewTemplate,
//! };
//!
//! let factory = AggregateFactory::new(Arc::new(SystemClock));
//! let template = factory
//!     .new_template(NewTemplate {
//!         subject:      "Welcome".to_string(),
//!         content:      "Hello {{name}}".to_string(),
//!         placeholders: vec!["name".to_string()],
//!     })
//!     .unwrap();
//!
//! assert_eq!(template.public().placeholders, vec!["name"]);
//! ```

#[macro_use]
mod macros;

pub mod aggregate;
pub mod clock;
pub mod email;
pub mod error;
pub mod event;
pub mod factory;
pub mod mail;
pub mod query;
pub mod template;

pub use error::DomainError;
