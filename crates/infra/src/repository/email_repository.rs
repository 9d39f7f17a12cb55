//! # EmailRepository
//!
//! メール集約の書き込みストア。`data` は JSONB、状態は `"Failed"` / `"Complete"` の TEXT で保持する。

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postman_domain::{
    aggregate::{AggregateMeta, Version},
    email::{Email, EmailData, EmailId, EmailState},
    template::TemplateId,
};
use sqlx::{PgPool, types::Json};
use uuid::Uuid;

use crate::error::InfraError;

/// メールの検索条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailLookup {
    ById(EmailId),
}

/// メールリポジトリトレイト
#[async_trait]
pub trait EmailRepository: Send + Sync {
    async fn insert(&self, email: &Email) -> Result<(), InfraError>;

    async fn find_one(&self, lookup: &EmailLookup) -> Result<Option<Email>, InfraError>;

    /// バージョンチェック付きで更新する（`expected_version` は変更適用前のバージョン）
    async fn update(&self, email: &Email, expected_version: Version) -> Result<(), InfraError>;

    async fn delete(&self, email: &Email) -> Result<(), InfraError>;
}

#[derive(Debug, sqlx::FromRow)]
struct EmailRow {
    id:           Uuid,
    recipient:    String,
    sender:       Option<String>,
    from_address: String,
    subject:      String,
    template_id:  Uuid,
    data:         Json<EmailData>,
    message:      String,
    state:        String,
    version:      i32,
    created_at:   DateTime<Utc>,
    updated_at:   DateTime<Utc>,
    deleted_at:   Option<DateTime<Utc>>,
}

impl TryFrom<EmailRow> for Email {
    type Error = InfraError;

    fn try_from(row: EmailRow) -> Result<Self, Self::Error> {
        let version = Version::try_from(row.version)
            .map_err(|e| InfraError::unexpected(format!("emails.version が不正: {e}")))?;
        let state = EmailState::from_str(&row.state)
            .map_err(|e| InfraError::unexpected(format!("emails.state が不正: {e}")))?;
        let meta = AggregateMeta::existing(
            EmailId::from_uuid(row.id),
            version,
            row.created_at,
            row.updated_at,
            row.deleted_at,
        );
        Ok(Email::from_parts(
            meta,
            row.recipient,
            row.sender,
            row.from_address,
            row.subject,
            TemplateId::from_uuid(row.template_id),
            row.data.0,
            row.message,
            state,
        ))
    }
}

/// PostgreSQL 実装の EmailRepository
#[derive(Debug, Clone)]
pub struct PostgresEmailRepository {
    pool: PgPool,
}

impl PostgresEmailRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmailRepository for PostgresEmailRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(email_id = %email.id()))]
    async fn insert(&self, email: &Email) -> Result<(), InfraError> {
        let meta = email.meta();
        sqlx::query(
            r#"
            INSERT INTO emails (
                id, recipient, sender, from_address, subject, template_id,
                data, message, state, version, created_at, updated_at, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(email.id().as_uuid())
        .bind(email.recipient())
        .bind(email.sender())
        .bind(email.from_address())
        .bind(email.subject())
        .bind(email.template().as_uuid())
        .bind(Json(email.data()))
        .bind(email.message())
        .bind(email.state().to_string())
        .bind(meta.version().as_i32())
        .bind(meta.created_at())
        .bind(meta.updated_at())
        .bind(meta.deleted_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(?lookup))]
    async fn find_one(&self, lookup: &EmailLookup) -> Result<Option<Email>, InfraError> {
        let EmailLookup::ById(id) = lookup;
        let row = sqlx::query_as::<_, EmailRow>(
            r#"
            SELECT
                id, recipient, sender, from_address, subject, template_id,
                data, message, state, version, created_at, updated_at, deleted_at
            FROM emails
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Email::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(email_id = %email.id()))]
    async fn update(&self, email: &Email, expected_version: Version) -> Result<(), InfraError> {
        let meta = email.meta();
        let result = sqlx::query(
            r#"
            UPDATE emails SET
                state = $1,
                message = $2,
                version = $3,
                updated_at = $4,
                deleted_at = $5
            WHERE id = $6 AND version = $7
            "#,
        )
        .bind(email.state().to_string())
        .bind(email.message())
        .bind(meta.version().as_i32())
        .bind(meta.updated_at())
        .bind(meta.deleted_at())
        .bind(email.id().as_uuid())
        .bind(expected_version.as_i32())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(InfraError::conflict("Email", email.id().to_string()));
        }

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(email_id = %email.id()))]
    async fn delete(&self, email: &Email) -> Result<(), InfraError> {
        let result = sqlx::query("DELETE FROM emails WHERE id = $1")
            .bind(email.id().as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(InfraError::not_found("Email", email.id().to_string()));
        }

        Ok(())
    }
}
