//! # TemplateViewRepository
//!
//! テンプレートの読み取りストア。イベント投影で公開射影を upsert / 削除し、
//! ファセットクエリで読み出す。

use async_trait::async_trait;
use postman_domain::{query::FacetRequest, template::Template};
use sqlx::PgPool;

use super::{
    facet_sql::ViewTable,
    view_store::{FacetResult, PgViewStore},
};
use crate::error::InfraError;

/// テンプレート読み取りリポジトリトレイト
///
/// `create` と `update` はどちらも冪等な upsert。古いバージョンの投影と、削除済みの行への投影は無視される。
#[async_trait]
pub trait TemplateViewRepository: Send + Sync {
    async fn create(&self, template: &Template) -> Result<(), InfraError>;

    async fn update(&self, template: &Template) -> Result<(), InfraError>;

    /// 冪等な削除（墓標を残し、以降の create / update を無視させる）
    async fn delete(&self, template: &Template) -> Result<(), InfraError>;

    async fn read_faceted(&self, request: &FacetRequest) -> Result<FacetResult, InfraError>;
}

/// PostgreSQL（JSONB）実装の TemplateViewRepository
#[derive(Debug, Clone)]
pub struct PostgresTemplateViewRepository {
    store: PgViewStore,
}

impl PostgresTemplateViewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: PgViewStore::new(pool, ViewTable::Templates),
        }
    }

    async fn upsert(&self, template: &Template) -> Result<(), InfraError> {
        let document = serde_json::to_value(template.public())?;
        let applied = self
            .store
            .upsert(template.id().as_uuid(), template.meta().version(), document)
            .await?;
        if !applied {
            tracing::debug!(
                template_id = %template.id(),
                version = template.meta().version().as_u32(),
                "古いバージョンまたは削除済みのため投影をスキップ"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl TemplateViewRepository for PostgresTemplateViewRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(template_id = %template.id()))]
    async fn create(&self, template: &Template) -> Result<(), InfraError> {
        self.upsert(template).await
    }

    #[tracing::instrument(skip_all, level = "debug", fields(template_id = %template.id()))]
    async fn update(&self, template: &Template) -> Result<(), InfraError> {
        self.upsert(template).await
    }

    #[tracing::instrument(skip_all, level = "debug", fields(template_id = %template.id()))]
    async fn delete(&self, template: &Template) -> Result<(), InfraError> {
        let document = serde_json::to_value(template.public())?;
        self.store
            .mark_deleted(template.id().as_uuid(), template.meta().version(), document)
            .await
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn read_faceted(&self, request: &FacetRequest) -> Result<FacetResult, InfraError> {
        self.store.read_faceted(request).await
    }
}
