//! # Postman インフラ層
//!
//! ドメイン層が必要とする外部システムとの接続を実装する。
//!
//! ## 責務
//!
//! - **データベース**: PostgreSQL 接続プールとマイグレーション（[`db`]）
//! - **リポジトリ**: 書き込みストアと読み取りストア（[`repository`]）
//! - **メッセージバス**: ドメインイベントの発行と購読（[`bus`]）
//! - **メール送信**: SMTP / SES / Noop（[`mail`]）
//!
//! ## 依存関係
//!
//! ```text
//! postman-service → infra → domain
//! ```
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use postman_infra::{
//!     bus::{NatsConfig, NatsEventBus},
//!     db,
//!     repository::PostgresTemplateRepository,
//! };
//!
//! async fn setup() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = db::create_pool("postgres://localhost/postman").await?;
//!     db::run_migrations(&pool).await?;
//!     let templates = PostgresTemplateRepository::new(pool.clone());
//!     let bus = NatsEventBus::connect(&NatsConfig::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod bus;
pub mod db;
pub mod error;
pub mod mail;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod repository;

pub use error::InfraError;
