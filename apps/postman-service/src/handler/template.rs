//! # テンプレートハンドラ
//!
//! ## エンドポイント
//!
//! - `POST /api/v1/templates` - テンプレート作成
//! - `PATCH /api/v1/templates/{id}` - テンプレート更新（指定した項目のみ）
//! - `DELETE /api/v1/templates/{id}` - テンプレート削除
//! - `GET /api/v1/templates/{id}` - 読み取りストアから 1 件取得
//! - `POST /api/v1/templates/query` - ファセットクエリ

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
    app::TemplateApp,
    error::CoreError,
    usecase::{CreateTemplate, DeleteTemplate, UpdateTemplate},
};

/// POST /api/v1/templates
pub async fn create_template(
    State(app): State<Arc<TemplateApp>>,
    Json(command): Json<CreateTemplate>,
) -> Result<impl IntoResponse, CoreError> {
    let template = app.create(command).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(template))))
}

/// PATCH /api/v1/templates/{id}
///
/// ボディの `id` は無視し、パスの ID を使う。
pub async fn update_template(
    State(app): State<Arc<TemplateApp>>,
    Path(id): Path<String>,
    Json(command): Json<UpdateTemplate>,
) -> Result<impl IntoResponse, CoreError> {
    let template = app.update(UpdateTemplate { id, ..command }).await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(template))))
}

/// DELETE /api/v1/templates/{id}
pub async fn delete_template(
    State(app): State<Arc<TemplateApp>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, CoreError> {
    app.delete(DeleteTemplate { id }).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/templates/{id}
pub async fn get_template(
    State(app): State<Arc<TemplateApp>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, CoreError> {
    let template = app.read_one(&id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(template))))
}

/// POST /api/v1/templates/query
pub async fn query_templates(
    State(app): State<Arc<TemplateApp>>,
    Json(request): Json<FacetRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let result = app.read(&request).await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(result))))
}
