//! # PostgreSQL データベース接続管理
//!
//! 書き込みストア（`templates` / `emails`）と読み取りストア
//! （`template_views` / `email_views`）は同じデータベースに置き、
//! 1 つの接続プールを共有する。
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use postman_infra::db;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = db::create_pool("postgres://localhost/postman").await?;
//!     db::run_migrations(&pool).await?;
//!     db::ping(&pool).await?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::error::InfraError;

/// マイグレーションを実行する
///
/// `sqlx::migrate!()` マクロで埋め込まれたリポジトリ直下の `migrations/` を
/// 未適用分だけ順に適用する。
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

/// PostgreSQL 接続プールを作成する
///
/// - 最大接続数: 10
/// - 接続取得タイムアウト: 5 秒
///
/// この関数はパニックしない。すべてのエラーは `Result` で返される。
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// 疎通確認（readiness チェック用）
#[tracing::instrument(skip_all, level = "debug")]
pub async fn ping(pool: &PgPool) -> Result<(), InfraError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
