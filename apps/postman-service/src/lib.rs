//! # Postman Service ライブラリ
//!
//! テンプレートとメールのコマンド・クエリ・投影、バスのコンシューマ、
//! HTTP ハンドラを公開する。`main.rs` はこれらを組み立てて起動するだけ。

pub mod app;
pub mod config;
pub mod consumer;
pub mod error;
pub mod handler;
pub mod mail;
pub mod usecase;

// テストユーティリティ（内部実装、ドキュメントからは隠す）
#[cfg(feature = "test-utils")]
#[doc(hidden)]
pub mod test_utils;
