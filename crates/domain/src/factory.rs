//! # 集約ファクトリ
//!
//! Template / Email 集約を 2 つのモードで生成する。
//!
//! | モード | 用途 | 時刻 | 必須項目 |
//! |-------|------|------|---------|
//! | `New` | 初回生成（コマンドハンドラ） | [`Clock`] から取得 | 生成時の必須項目のみ |
//! | `Existing` | 復元（イベントペイロード・永続化表現） | 呼び出し元の値を信頼 | id・本体の必須項目・両タイムスタンプ |
//!
//! いずれも検証と組み立て以外の副作用を持たない。

use std::sync::Arc;

use crate::{
    DomainError,
    aggregate::{AggregateMeta, Version},
    clock::Clock,
    email::{Email, EmailId, EmailParams, NewEmail},
    template::{NewTemplate, Template, TemplateId, TemplateParams, normalize_placeholders},
};

/// 集約ファクトリ
#[derive(Clone)]
pub struct AggregateFactory {
    clock: Arc<dyn Clock>,
}

impl AggregateFactory {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// 現在時刻（ファクトリと同じ Clock を使う）
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    // ===== Template =====

    /// 新しいテンプレートを生成する
    ///
    /// # エラー
    ///
    /// subject または content が空の場合は `DomainError::Validation`
    pub fn new_template(&self, params: NewTemplate) -> Result<Template, DomainError> {
        let mut missing = Vec::new();
        let subject = required(Some(params.subject), "subject", &mut missing);
        let content = required(Some(params.content), "content", &mut missing);
        let (Some(subject), Some(content)) = (subject, content) else {
            return Err(missing_fields(&missing));
        };

        Ok(Template::from_parts(
            AggregateMeta::new(TemplateId::new(), self.clock.now()),
            subject,
            content,
            normalize_placeholders(params.placeholders),
        ))
    }

    /// 既存のテンプレートを復元する
    ///
    /// # エラー
    ///
    /// id / subject / content / createdAt / updatedAt のいずれかが欠損している場合、
    /// または id・version が不正な場合は `DomainError::Validation`
    pub fn existing_template(&self, params: TemplateParams) -> Result<Template, DomainError> {
        let mut missing = Vec::new();
        let id = required(params.id, "id", &mut missing);
        let subject = required(params.subject, "subject", &mut missing);
        let content = required(params.content, "content", &mut missing);
        let created_at = present(params.created_at, "createdAt", &mut missing);
        let updated_at = present(params.updated_at, "updatedAt", &mut missing);
        let (Some(id), Some(subject), Some(content), Some(created_at), Some(updated_at)) =
            (id, subject, content, created_at, updated_at)
        else {
            return Err(missing_fields(&missing));
        };

        let meta = AggregateMeta::existing(
            TemplateId::parse(&id)?,
            version_or_initial(params.version)?,
            created_at,
            updated_at,
            params.deleted_at,
        );

        Ok(Template::from_parts(
            meta,
            subject,
            content,
            normalize_placeholders(params.placeholders.unwrap_or_default()),
        ))
    }

    // ===== Email =====

    /// 新しいメールを生成する
    ///
    /// # エラー
    ///
    /// recipient / from / subject が空の場合は `DomainError::Validation`。
    /// message はレンダリング結果なので空でもよい。
    pub fn new_email(&self, params: NewEmail) -> Result<Email, DomainError> {
        let mut missing = Vec::new();
        let recipient = required(Some(params.recipient), "recipient", &mut missing);
        let from = required(Some(params.from), "from", &mut missing);
        let subject = required(Some(params.subject), "subject", &mut missing);
        let (Some(recipient), Some(from), Some(subject)) = (recipient, from, subject) else {
            return Err(missing_fields(&missing));
        };

        Ok(Email::from_parts(
            AggregateMeta::new(EmailId::new(), self.clock.now()),
            recipient,
            optional(params.sender),
            from,
            subject,
            params.template,
            params.data,
            params.message,
            params.state,
        ))
    }

    /// 既存のメールを復元する
    ///
    /// # エラー
    ///
    /// id / recipient / from / subject / template / status / createdAt / updatedAt の
    /// いずれかが欠損している場合は `DomainError::Validation`（message は空でもよい）
    pub fn existing_email(&self, params: EmailParams) -> Result<Email, DomainError> {
        let mut missing = Vec::new();
        let id = required(params.id, "id", &mut missing);
        let recipient = required(params.recipient, "recipient", &mut missing);
        let from = required(params.from, "from", &mut missing);
        let subject = required(params.subject, "subject", &mut missing);
        let template = required(params.template, "template", &mut missing);
        let state = present(params.state, "status", &mut missing);
        let created_at = present(params.created_at, "createdAt", &mut missing);
        let updated_at = present(params.updated_at, "updatedAt", &mut missing);
        let (
            Some(id),
            Some(recipient),
            Some(from),
            Some(subject),
            Some(template),
            Some(state),
            Some(created_at),
            Some(updated_at),
        ) = (
            id, recipient, from, subject, template, state, created_at, updated_at,
        )
        else {
            return Err(missing_fields(&missing));
        };

        let meta = AggregateMeta::existing(
            EmailId::parse(&id)?,
            version_or_initial(params.version)?,
            created_at,
            updated_at,
            params.deleted_at,
        );

        Ok(Email::from_parts(
            meta,
            recipient,
            optional(params.sender),
            from,
            subject,
            TemplateId::parse(&template)?,
            params.data.unwrap_or_default(),
            params.message.unwrap_or_default(),
            state,
        ))
    }
}

/// 空白のみの文字列も欠損として扱う（値自体は加工しない）
fn required(
    value: Option<String>,
    field: &'static str,
    missing: &mut Vec<&'static str>,
) -> Option<String> {
    let value = value.filter(|v| !v.trim().is_empty());
    if value.is_none() {
        missing.push(field);
    }
    value
}

fn present<T>(
    value: Option<T>,
    field: &'static str,
    missing: &mut Vec<&'static str>,
) -> Option<T> {
    if value.is_none() {
        missing.push(field);
    }
    value
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn version_or_initial(version: Option<u32>) -> Result<Version, DomainError> {
    version.map_or(Ok(Version::initial()), Version::new)
}

fn missing_fields(missing: &[&'static str]) -> DomainError {
    DomainError::Validation(
        missing
            .iter()
            .map(|field| format!("{field} is required"))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::{
        clock::FixedClock,
        email::{EmailData, EmailState},
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap()
    }

    fn factory() -> AggregateFactory {
        AggregateFactory::new(Arc::new(FixedClock::new(now())))
    }

    fn template_params() -> TemplateParams {
        TemplateParams {
            id: Some(TemplateId::new().to_string()),
            subject: Some("Welcome".to_string()),
            content: Some("Hello {{name}}".to_string()),
            placeholders: Some(vec!["name".to_string()]),
            version: Some(3),
            created_at: Some(now()),
            updated_at: Some(now()),
            deleted_at: None,
        }
    }

    fn new_email() -> NewEmail {
        NewEmail {
            recipient: "a@b.com".to_string(),
            sender:    Some("Postman".to_string()),
            from:      "x@y.com".to_string(),
            subject:   "Welcome".to_string(),
            template:  TemplateId::new(),
            data:      EmailData::from([("name".to_string(), serde_json::json!("Ada"))]),
            message:   "Hello Ada".to_string(),
            state:     EmailState::Complete,
        }
    }

    // ===== new_template =====

    #[test]
    fn test_new_template_プレースホルダ未指定なら空リストになる() {
        let template = factory()
            .new_template(NewTemplate {
                subject:      "Welcome".to_string(),
                content:      "Hello".to_string(),
                placeholders: vec![],
            })
            .unwrap();

        assert!(template.placeholders().is_empty());
        assert_eq!(template.meta().created_at(), now());
        assert_eq!(template.meta().updated_at(), now());
        assert_eq!(template.meta().version().as_u32(), 1);
    }

    #[test]
    fn test_new_template_呼び出しごとに異なるidを採番する() {
        let factory = factory();
        let input = NewTemplate {
            subject:      "Welcome".to_string(),
            content:      "Hello".to_string(),
            placeholders: vec![],
        };

        let first = factory.new_template(input.clone()).unwrap();
        let second = factory.new_template(input).unwrap();

        assert_ne!(first.id(), second.id());
    }

    #[rstest]
    #[case("", "Hello", "subject is required")]
    #[case("Welcome", "  ", "content is required")]
    #[case("", "", "subject is required, content is required")]
    fn test_new_template_必須項目が空ならバリデーションエラー(
        #[case] subject: &str,
        #[case] content: &str,
        #[case] expected: &str,
    ) {
        let result = factory().new_template(NewTemplate {
            subject:      subject.to_string(),
            content:      content.to_string(),
            placeholders: vec![],
        });

        match result {
            Err(DomainError::Validation(message)) => assert_eq!(message, expected),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    // ===== existing_template =====

    #[test]
    fn test_existing_template_呼び出し元のタイムスタンプとバージョンを保持する() {
        let created = Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap();
        let params = TemplateParams {
            created_at: Some(created),
            ..template_params()
        };

        let template = factory().existing_template(params.clone()).unwrap();

        assert_eq!(template.meta().created_at(), created);
        assert_eq!(template.meta().version().as_u32(), 3);
        assert_eq!(template.id().to_string(), params.id.unwrap());
    }

    #[rstest]
    #[case::id(TemplateParams { id: None, ..template_params() })]
    #[case::subject(TemplateParams { subject: None, ..template_params() })]
    #[case::content(TemplateParams { content: Some(String::new()), ..template_params() })]
    #[case::created_at(TemplateParams { created_at: None, ..template_params() })]
    #[case::updated_at(TemplateParams { updated_at: None, ..template_params() })]
    fn test_existing_template_必須項目の欠損はバリデーションエラー(#[case] params: TemplateParams) {
        let result = factory().existing_template(params);

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_existing_template_不正なidはバリデーションエラー() {
        let params = TemplateParams {
            id: Some("tmpl-1".to_string()),
            ..template_params()
        };

        assert!(matches!(
            factory().existing_template(params),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_existing_template_公開射影から復元すると同じ射影になる() {
        let original = factory()
            .new_template(NewTemplate {
                subject:      "Welcome".to_string(),
                content:      "Hello {{name}}".to_string(),
                placeholders: vec!["name".to_string()],
            })
            .unwrap();

        let restored = factory()
            .existing_template(original.public().into())
            .unwrap();

        assert_eq!(restored.public(), original.public());
    }

    // ===== new_email / existing_email =====

    #[test]
    fn test_new_email_空のsenderはnoneとして扱う() {
        let email = factory()
            .new_email(NewEmail {
                sender: Some(" ".to_string()),
                ..new_email()
            })
            .unwrap();

        assert!(email.sender().is_none());
        assert_eq!(email.state(), EmailState::Complete);
        assert_eq!(email.meta().created_at(), now());
    }

    #[rstest]
    #[case::recipient(NewEmail { recipient: String::new(), ..new_email() })]
    #[case::from(NewEmail { from: String::new(), ..new_email() })]
    #[case::subject(NewEmail { subject: " ".to_string(), ..new_email() })]
    fn test_new_email_必須項目が空ならバリデーションエラー(#[case] params: NewEmail) {
        assert!(matches!(
            factory().new_email(params),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_existing_email_公開射影から復元すると同じ射影になる() {
        let original = factory().new_email(new_email()).unwrap();

        let restored = factory().existing_email(original.public().into()).unwrap();

        assert_eq!(restored.public(), original.public());
    }

    #[test]
    fn test_new_email_空の本文でも生成でき復元しても同じ射影になる() {
        let original = factory()
            .new_email(NewEmail {
                message: String::new(),
                ..new_email()
            })
            .unwrap();

        let restored = factory().existing_email(original.public().into()).unwrap();

        assert_eq!(original.message(), "");
        assert_eq!(restored.public(), original.public());
    }

    #[test]
    fn test_existing_email_状態とタイムスタンプの欠損をまとめて報告する() {
        let original = factory().new_email(new_email()).unwrap();
        let params = EmailParams {
            state: None,
            updated_at: None,
            ..original.public().into()
        };

        match factory().existing_email(params) {
            Err(DomainError::Validation(message)) => {
                assert_eq!(message, "status is required, updatedAt is required");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
