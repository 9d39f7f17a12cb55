//! # EmailViewRepository
//!
//! メールの読み取りストア。イベント投影で公開射影を upsert / 削除し、
//! ファセットクエリで読み出す。

use async_trait::async_trait;
use postman_domain::{email::Email, query::FacetRequest};
use sqlx::PgPool;

use super::{
    facet_sql::ViewTable,
    view_store::{FacetResult, PgViewStore},
};
use crate::error::InfraError;

/// メール読み取りリポジトリトレイト
///
/// `create` と `update` はどちらも冪等な upsert。古いバージョンの投影と、削除済みの行への投影は無視される。
#[async_trait]
pub trait EmailViewRepository: Send + Sync {
    async fn create(&self, email: &Email) -> Result<(), InfraError>;

    async fn update(&self, email: &Email) -> Result<(), InfraError>;

    /// 冪等な削除（墓標を残し、以降の create / update を無視させる）
    async fn delete(&self, email: &Email) -> Result<(), InfraError>;

    async fn read_faceted(&self, request: &FacetRequest) -> Result<FacetResult, InfraError>;
}

/// PostgreSQL（JSONB）実装の EmailViewRepository
#[derive(Debug, Clone)]
pub struct PostgresEmailViewRepository {
    store: PgViewStore,
}

impl PostgresEmailViewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: PgViewStore::new(pool, ViewTable::Emails),
        }
    }

    async fn upsert(&self, email: &Email) -> Result<(), InfraError> {
        let document = serde_json::to_value(email.public())?;
        let applied = self
            .store
            .upsert(email.id().as_uuid(), email.meta().version(), document)
            .await?;
        if !applied {
            tracing::debug!(
                email_id = %email.id(),
                version = email.meta().version().as_u32(),
                "古いバージョンまたは削除済みのため投影をスキップ"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl EmailViewRepository for PostgresEmailViewRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(email_id = %email.id()))]
    async fn create(&self, email: &Email) -> Result<(), InfraError> {
        self.upsert(email).await
    }

    #[tracing::instrument(skip_all, level = "debug", fields(email_id = %email.id()))]
    async fn update(&self, email: &Email) -> Result<(), InfraError> {
        self.upsert(email).await
    }

    #[tracing::instrument(skip_all, level = "debug", fields(email_id = %email.id()))]
    async fn delete(&self, email: &Email) -> Result<(), InfraError> {
        let document = serde_json::to_value(email.public())?;
        self.store
            .mark_deleted(email.id().as_uuid(), email.meta().version(), document)
            .await
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn read_faceted(&self, request: &FacetRequest) -> Result<FacetResult, InfraError> {
        self.store.read_faceted(request).await
    }
}
