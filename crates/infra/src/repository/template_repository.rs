//! # TemplateRepository
//!
//! テンプレート集約の書き込みストア。
//!
//! - 更新は楽観的ロック（`WHERE version = 期待バージョン`）で、不一致は `Conflict`
//! - 有効なテンプレートの subject は部分一意インデックスで守り、違反は `Conflict`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postman_domain::{
    aggregate::{AggregateMeta, Version},
    template::{Template, TemplateId},
};
use sqlx::PgPool;
use uuid::Uuid;

use super::is_unique_violation;
use crate::error::InfraError;

/// テンプレートの検索条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateLookup {
    ById(TemplateId),
    /// 有効な（削除されていない）テンプレートを subject で検索する
    BySubject(String),
}

/// テンプレートリポジトリトレイト
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// テンプレートを挿入する
    ///
    /// subject が既存の有効なテンプレートと重複する場合は `Conflict`。
    async fn insert(&self, template: &Template) -> Result<(), InfraError>;

    /// 条件に一致するテンプレートを 1 件取得する
    async fn find_one(&self, lookup: &TemplateLookup) -> Result<Option<Template>, InfraError>;

    /// バージョンチェック付きで更新する
    ///
    /// `expected_version` は変更適用前のバージョン。
    async fn update(&self, template: &Template, expected_version: Version)
    -> Result<(), InfraError>;

    /// テンプレートを削除する（存在しなければ `NotFound`）
    async fn delete(&self, template: &Template) -> Result<(), InfraError>;
}

#[derive(Debug, sqlx::FromRow)]
struct TemplateRow {
    id:           Uuid,
    subject:      String,
    content:      String,
    placeholders: Vec<String>,
    version:      i32,
    created_at:   DateTime<Utc>,
    updated_at:   DateTime<Utc>,
    deleted_at:   Option<DateTime<Utc>>,
}

impl TryFrom<TemplateRow> for Template {
    type Error = InfraError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        let version = Version::try_from(row.version)
            .map_err(|e| InfraError::unexpected(format!("templates.version が不正: {e}")))?;
        let meta = AggregateMeta::existing(
            TemplateId::from_uuid(row.id),
            version,
            row.created_at,
            row.updated_at,
            row.deleted_at,
        );
        Ok(Template::from_parts(
            meta,
            row.subject,
            row.content,
            row.placeholders,
        ))
    }
}

/// PostgreSQL 実装の TemplateRepository
#[derive(Debug, Clone)]
pub struct PostgresTemplateRepository {
    pool: PgPool,
}

impl PostgresTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_TEMPLATE: &str = r#"
    SELECT id, subject, content, placeholders, version, created_at, updated_at, deleted_at
    FROM templates
"#;

#[async_trait]
impl TemplateRepository for PostgresTemplateRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(template_id = %template.id()))]
    async fn insert(&self, template: &Template) -> Result<(), InfraError> {
        let meta = template.meta();
        sqlx::query(
            r#"
            INSERT INTO templates
                (id, subject, content, placeholders, version, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(template.id().as_uuid())
        .bind(template.subject())
        .bind(template.content())
        .bind(template.placeholders())
        .bind(meta.version().as_i32())
        .bind(meta.created_at())
        .bind(meta.updated_at())
        .bind(meta.deleted_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                InfraError::conflict("Template", template.subject())
            } else {
                e.into()
            }
        })?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(?lookup))]
    async fn find_one(&self, lookup: &TemplateLookup) -> Result<Option<Template>, InfraError> {
        let row = match lookup {
            TemplateLookup::ById(id) => {
                sqlx::query_as::<_, TemplateRow>(&format!("{SELECT_TEMPLATE} WHERE id = $1"))
                    .bind(id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await?
            }
            TemplateLookup::BySubject(subject) => {
                sqlx::query_as::<_, TemplateRow>(&format!(
                    "{SELECT_TEMPLATE} WHERE subject = $1 AND deleted_at IS NULL"
                ))
                .bind(subject)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.map(Template::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(template_id = %template.id()))]
    async fn update(
        &self,
        template: &Template,
        expected_version: Version,
    ) -> Result<(), InfraError> {
        let meta = template.meta();
        let result = sqlx::query(
            r#"
            UPDATE templates SET
                subject = $1,
                content = $2,
                placeholders = $3,
                version = $4,
                updated_at = $5,
                deleted_at = $6
            WHERE id = $7 AND version = $8
            "#,
        )
        .bind(template.subject())
        .bind(template.content())
        .bind(template.placeholders())
        .bind(meta.version().as_i32())
        .bind(meta.updated_at())
        .bind(meta.deleted_at())
        .bind(template.id().as_uuid())
        .bind(expected_version.as_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                InfraError::conflict("Template", template.subject())
            } else {
                e.into()
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(InfraError::conflict("Template", template.id().to_string()));
        }

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(template_id = %template.id()))]
    async fn delete(&self, template: &Template) -> Result<(), InfraError> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(template.id().as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(InfraError::not_found("Template", template.id().to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_リポジトリはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PostgresTemplateRepository>();
    }

    #[test]
    fn test_不正なversionの行はunexpectedになる() {
        let now = Utc::now();
        let row = TemplateRow {
            id:           Uuid::now_v7(),
            subject:      "Welcome".to_string(),
            content:      "Hello {{name}}".to_string(),
            placeholders: vec!["name".to_string()],
            version:      0,
            created_at:   now,
            updated_at:   now,
            deleted_at:   None,
        };

        let result = Template::try_from(row);

        assert!(matches!(
            result.map_err(|e| e.into_parts().0),
            Err(crate::error::InfraErrorKind::Unexpected(_))
        ));
    }

    #[test]
    fn test_行から集約を復元できる() {
        let now = Utc::now();
        let id = Uuid::now_v7();
        let row = TemplateRow {
            id,
            subject: "Welcome".to_string(),
            content: "Hello {{name}}".to_string(),
            placeholders: vec!["name".to_string()],
            version: 3,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let template = Template::try_from(row).unwrap();

        assert_eq!(template.id().as_uuid(), &id);
        assert_eq!(template.meta().version().as_u32(), 3);
        assert_eq!(template.placeholders(), ["name".to_string()]);
    }
}
