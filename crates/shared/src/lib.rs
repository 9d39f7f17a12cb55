//! # Postman 共有ユーティリティ
//!
//! サービス・インフラ層の双方から使われる、ビジネスロジックを含まない共通部品。
//!
//! - [`api_response`] - HTTP レスポンスエンベロープ `{ "data": T }`
//! - [`error_response`] - RFC 9457 Problem Details
//! - [`health`] - ヘルスチェック・Readiness のレスポンス型
//! - [`event_log`] - ビジネスイベントログのマクロとフィールド定数
//! - [`observability`] - トレーシング初期化（`observability` feature）

pub mod api_response;
pub mod error_response;
pub mod event_log;
pub mod health;
pub mod observability;

pub use api_response::ApiResponse;
pub use error_response::ErrorResponse;
pub use health::{CheckStatus, HealthResponse, ReadinessResponse, ReadinessStatus};
