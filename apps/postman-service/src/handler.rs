//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数とルーターを定義する。
//!
//! ## 設計方針
//!
//! - 各ハンドラはサブモジュールに配置し、ここで re-export する
//! - ハンドラは薄く保ち、処理はファサード（[`crate::app`]）に委譲する
//! - エラーは `CoreError` の `IntoResponse` で Problem Details に変換する

pub mod email;
pub mod health;
pub mod template;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
pub use email::{create_email, delete_email, get_email, query_emails, resend_email};
pub use health::{ReadinessState, health_check, readiness_check};
pub use template::{
    create_template,
    delete_template,
    get_template,
    query_templates,
    update_template,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::app::{EmailApp, TemplateApp};

/// API と Liveness Check のルーター
///
/// Readiness Check はデータベース接続を必要とするため [`router`] で追加する。
pub fn api_router(template_app: Arc<TemplateApp>, email_app: Arc<EmailApp>) -> Router {
    let templates = Router::new()
        .route("/api/v1/templates", post(create_template))
        .route("/api/v1/templates/query", post(query_templates))
        .route(
            "/api/v1/templates/{id}",
            get(get_template)
                .patch(update_template)
                .delete(delete_template),
        )
        .with_state(template_app);

    let emails = Router::new()
        .route("/api/v1/emails", post(create_email))
        .route("/api/v1/emails/query", post(query_emails))
        .route("/api/v1/emails/{id}", get(get_email).delete(delete_email))
        .route("/api/v1/emails/{id}/resend", post(resend_email))
        .with_state(email_app);

    with_layers(
        Router::new()
            .route("/health", get(health_check))
            .merge(templates)
            .merge(emails),
    )
}

/// サービス全体のルーター
pub fn router(
    template_app: Arc<TemplateApp>,
    email_app: Arc<EmailApp>,
    readiness: Arc<ReadinessState>,
) -> Router {
    let ready = Router::new()
        .route("/health/ready", get(readiness_check))
        .with_state(readiness);

    api_router(template_app, email_app).merge(with_layers(ready))
}

/// リクエスト ID の付与・伝播と HTTP トレースを設定する
fn with_layers(router: Router) -> Router {
    router
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
