//! # 読み取りストア共通処理
//!
//! `template_views` / `email_views` は同じ形（`id`, `version`, `document`, `projected_at`,
//! `deleted_at`）なので、投影の upsert・削除・ファセットクエリ実行をここにまとめる。
//!
//! 削除は行を消さずに `deleted_at` を立てた墓標にする。配送順が保証されないため、
//! 削除後に届いた Created / Updated で行が復活しないようにする。

use std::collections::BTreeMap;

use postman_domain::{aggregate::Version, query::FacetRequest};
use serde_json::Value;
use sqlx::{PgPool, types::Json};
use uuid::Uuid;

use super::facet_sql::{ViewTable, build_facet_query};
use crate::error::InfraError;

/// ファセット名ごとの結果
pub type FacetResult = BTreeMap<String, Vec<Value>>;

#[derive(Debug, Clone)]
pub(crate) struct PgViewStore {
    pool:  PgPool,
    table: ViewTable,
}

impl PgViewStore {
    pub(crate) fn new(pool: PgPool, table: ViewTable) -> Self {
        Self { pool, table }
    }

    /// ドキュメントを upsert する
    ///
    /// 保存済みのバージョンより古いドキュメントと、削除済みの行への投影は無視し、`false` を返す。
    pub(crate) async fn upsert(
        &self,
        id: &Uuid,
        version: Version,
        document: Value,
    ) -> Result<bool, InfraError> {
        let table = self.table.name();
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {table} (id, version, document, projected_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (id) DO UPDATE SET
                version = EXCLUDED.version,
                document = EXCLUDED.document,
                projected_at = EXCLUDED.projected_at
            WHERE {table}.deleted_at IS NULL
              AND {table}.version <= EXCLUDED.version
            "#
        ))
        .bind(id)
        .bind(version.as_i32())
        .bind(Json(document))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 行を墓標にする（存在しなくても墓標を作る。何度呼んでもよい）
    pub(crate) async fn mark_deleted(
        &self,
        id: &Uuid,
        version: Version,
        document: Value,
    ) -> Result<(), InfraError> {
        let table = self.table.name();
        sqlx::query(&format!(
            r#"
            INSERT INTO {table} (id, version, document, projected_at, deleted_at)
            VALUES ($1, $2, $3, now(), now())
            ON CONFLICT (id) DO UPDATE SET
                deleted_at = COALESCE({table}.deleted_at, EXCLUDED.deleted_at),
                projected_at = EXCLUDED.projected_at
            "#
        ))
        .bind(id)
        .bind(version.as_i32())
        .bind(Json(document))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// ファセットごとに 1 本ずつクエリを実行する
    pub(crate) async fn read_faceted(
        &self,
        request: &FacetRequest,
    ) -> Result<FacetResult, InfraError> {
        request
            .validate()
            .map_err(|e| InfraError::invalid_input(e.to_string()))?;

        let mut results = FacetResult::new();
        for (name, facet) in &request.facets {
            let mut builder = build_facet_query(self.table, facet);
            let documents = builder
                .build_query_scalar::<Value>()
                .fetch_all(&self.pool)
                .await?;
            results.insert(name.clone(), documents);
        }
        Ok(results)
    }
}
