//! テンプレートのクエリハンドラ
//!
//! 読み取りストアのファセットクエリに委譲する。書き込みストアは参照しない。

use std::sync::Arc;

use postman_domain::{
    query::{Facet, FacetRequest, Filter},
    template::{TemplateId, TemplatePublic},
};
use postman_infra::repository::{FacetResult, TemplateViewRepository};

use crate::error::CoreError;

/// 単一取得に使うファセット名
const ONE: &str = "one";

/// テンプレートのクエリハンドラ
pub struct TemplateQueryHandler {
    views: Arc<dyn TemplateViewRepository>,
}

impl TemplateQueryHandler {
    pub fn new(views: Arc<dyn TemplateViewRepository>) -> Self {
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
    #[tracing::instrument(skip_all, fields(template_id = %id))]
    pub async fn read_one(&self, id: &str) -> Result<TemplatePublic, CoreError> {
        let id = TemplateId::parse(id)?;
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
            .ok_or_else(|| CoreError::NotFound(format!("Template が見つかりません: {id}")))?;

        serde_json::from_value(document)
            .map_err(|e| CoreError::Internal(format!("テンプレートのビューが不正です: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use postman_domain::{
        aggregate::AggregateMeta,
        query::{FilterOp, SortDirection},
        template::Template,
    };
    use postman_infra::mock::MockTemplateViewRepository;
    use pretty_assertions::assert_eq;

    use super::*;

    fn template(subject: &str) -> Template {
        Template::from_parts(
            AggregateMeta::new(TemplateId::new(), Utc::now()),
            subject.to_string(),
            "Hello {{name}}".to_string(),
            vec!["name".to_string()],
        )
    }

    #[tokio::test]
    async fn test_read_one_投影済みの公開射影を返す() {
        // Arrange
        let views = MockTemplateViewRepository::new();
        let welcome = template("Welcome");
        views.create(&welcome).await.unwrap();
        views.create(&template("Reminder")).await.unwrap();
        let sut = TemplateQueryHandler::new(Arc::new(views));

        // Act
        let found = sut.read_one(&welcome.id().to_string()).await.unwrap();

        // Assert
        assert_eq!(found, welcome.public());
    }

    #[tokio::test]
    async fn test_read_one_未投影ならnot_found() {
        let sut = TemplateQueryHandler::new(Arc::new(MockTemplateViewRepository::new()));

        let result = sut.read_one(&TemplateId::new().to_string()).await;

        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_read_ファセットごとに結果を返す() {
        let views = MockTemplateViewRepository::new();
        views.create(&template("Welcome")).await.unwrap();
        views.create(&template("Reminder")).await.unwrap();
        let sut = TemplateQueryHandler::new(Arc::new(views));
        let mut request = FacetRequest::single(
            "welcome",
            Facet::default().filter(Filter::equals("subject", "Welcome")),
        );
        request.facets.insert(
            "all".to_string(),
            Facet::default().sort_by("subject", SortDirection::Asc),
        );

        let result = sut.read(&request).await.unwrap();

        assert_eq!(result["welcome"].len(), 1);
        assert_eq!(result["all"].len(), 2);
        assert_eq!(result["all"][0]["subject"], "Reminder");
    }

    #[tokio::test]
    async fn test_read_不正なリクエストはバリデーションエラー() {
        let sut = TemplateQueryHandler::new(Arc::new(MockTemplateViewRepository::new()));
        let request = FacetRequest::single(
            "bad",
            Facet::default().filter(Filter::new("subject", FilterOp::In, "Welcome")),
        );

        let result = sut.read(&request).await;

        assert!(matches!(result, Err(CoreError::Validation(_))));
    }
}
