//! # メールハンドラ
//!
//! ## エンドポイント
//!
//! - `POST /api/v1/emails` - メール作成（送信）
//! - `POST /api/v1/emails/{id}/resend` - 失敗したメールの再送
//! - `DELETE /api/v1/emails/{id}` - メール削除
//! - `GET /api/v1/emails/{id}` - 読み取りストアから 1 件取得
//! - `POST /api/v1/emails/query` - ファセットクエリ
//!
//! 送信に失敗しても作成・再送は成功として返す。結果はレスポンスの `status` を参照する。

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use postman_domain::query::FacetRequest;
use postman_shared::ApiResponse;

use crate::{
    app::EmailApp,
    error::CoreError,
    usecase::{CreateEmail, DeleteEmail, ResendEmail},
};

/// POST /api/v1/emails
pub async fn create_email(
    State(app): State<Arc<EmailApp>>,
    Json(command): Json<CreateEmail>,
) -> Result<impl IntoResponse, CoreError> {
    let email = app.create(command).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(email))))
}

/// POST /api/v1/emails/{id}/resend
pub async fn resend_email(
    State(app): State<Arc<EmailApp>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, CoreError> {
    let email = app.resend(ResendEmail { id }).await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(email))))
}

/// DELETE /api/v1/emails/{id}
pub async fn delete_email(
    State(app): State<Arc<EmailApp>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, CoreError> {
    app.delete(DeleteEmail { id }).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/emails/{id}
pub async fn get_email(
    State(app): State<Arc<EmailApp>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, CoreError> {
    let email = app.read_one(&id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(email))))
}

/// POST /api/v1/emails/query
pub async fn query_emails(
    State(app): State<Arc<EmailApp>>,
    Json(request): Json<FacetRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let result = app.read(&request).await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(result))))
}
