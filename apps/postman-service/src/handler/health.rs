//! # ヘルスチェックハンドラ
//!
//! - `/health` — Liveness Check（常に `"healthy"` を返す）
//! - `/health/ready` — Readiness Check（データベースとメッセージバスの疎通を確認）
//!
//! レスポンス型は [`postman_shared::HealthResponse`] / [`postman_shared::ReadinessResponse`] を参照。

use std::{collections::BTreeMap, future::Future, sync::Arc, time::Duration};

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use postman_infra::{InfraError, bus::EventBus, db};
use postman_shared::{CheckStatus, HealthResponse, ReadinessResponse, ReadinessStatus};
use sqlx::PgPool;

/// 依存先チェックのタイムアウト
const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Liveness Check エンドポイント
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status:  "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness Check 用の State
pub struct ReadinessState {
    pub pool: PgPool,
    pub bus:  Arc<dyn EventBus>,
}

/// Readiness Check エンドポイント
///
/// データベースとメッセージバスを並行チェックする。
/// 全チェック OK → 200、1 つでも失敗 → 503。
#[tracing::instrument(skip_all)]
pub async fn readiness_check(State(state): State<Arc<ReadinessState>>) -> impl IntoResponse {
    let (database, bus) = tokio::join!(
        check("database", db::ping(&state.pool)),
        check("bus", state.bus.ping()),
    );

    let response = ReadinessResponse::from_checks(BTreeMap::from([
        ("database".to_string(), database),
        ("bus".to_string(), bus),
    ]));
    let http_status = match response.status {
        ReadinessStatus::Ready => StatusCode::OK,
        ReadinessStatus::NotReady => StatusCode::SERVICE_UNAVAILABLE,
    };

    (http_status, Json(response))
}

async fn check(name: &str, probe: impl Future<Output = Result<(), InfraError>>) -> CheckStatus {
    match tokio::time::timeout(CHECK_TIMEOUT, probe).await {
        Ok(Ok(())) => CheckStatus::Ok,
        Ok(Err(e)) => {
            tracing::warn!(check = name, error = %e, "readiness check failed");
            CheckStatus::Error
        }
        Err(_) => {
            tracing::warn!(check = name, "readiness check timed out");
            CheckStatus::Error
        }
    }
}
