//! メールのクエリハンドラ
//!
//! 読み取りストアのファセットクエリに委譲する。書き込みストアは参照しない。

use std::sync::Arc;

use postman_domain::{
    email::{EmailId, EmailPublic},
    query::{Facet, FacetRequest, Filter},
};
use postman_infra::repository::{EmailViewRepository, FacetResult};

use crate::error::CoreError;

/// 単一取得に使うファセット名
const ONE: &str = "one";

/// メールのクエリハンドラ
pub struct EmailQueryHandler {
    views: Arc<dyn EmailViewRepository>,
}

impl EmailQueryHandler {
    pub fn new(views: Arc<dyn EmailViewRepository>) -> Self {
        Self { views }
    }

    /// ファセットクエリを実行する
    #[tracing::instrument(skip_all, fields(facets = request.facets.len()))]
    pub async fn read(&self, request: &FacetRequest) -> Result<FacetResult, CoreError> {
        request.validate()?;
        Ok(self.views.read_faceted(request).await?)
    }

    /// ID で 1 件取得する
    ///
    /// 読み取りストアへの反映は非同期なので、作成直後は NotFound になりうる。
    #[tracing::instrument(skip_all, fields(email_id = %id))]
    pub async fn read_one(&self, id: &str) -> Result<EmailPublic, CoreError> {
        let id = EmailId::parse(id)?;
        let request = FacetRequest::single(
            ONE,
            Facet::default()
                .filter(Filter::equals("id", id.to_string()))
                .with_limit(1),
        );

        let document = self
            .views
            .read_faceted(&request)
            .await?
            .remove(ONE)
            .and_then(|documents| documents.into_iter().next())
            .ok_or_else(|| CoreError::NotFound(format!("Email が見つかりません: {id}")))?;

        serde_json::from_value(document)
            .map_err(|e| CoreError::Internal(format!("メールのビューが不正です: {e}")))
    }
}
