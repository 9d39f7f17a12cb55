//! テンプレートのコマンドハンドラ
//!
//! | コマンド | 主な検証 | 発行イベント |
//! |---------|---------|-------------|
//! | Create | subject / content 必須、本文とプレースホルダの整合性 | `template.created.command` |
//! | Update | id 必須、存在、件名の一意性、変更後の整合性 | `template.updated.command` |
//! | Delete | id 必須、存在 | `template.deleted.command` |

use std::sync::Arc;

use postman_domain::{
    event::{TemplateEvent, names},
    factory::AggregateFactory,
    template::{NewTemplate, Template, TemplateChanges, TemplateId},
};
use postman_infra::{
    bus::EventBus,
    repository::{TemplateLookup, TemplateRepository},
};
use postman_shared::{event_log::event, log_business_event};
use serde::Deserialize;

use crate::{
    error::CoreError,
    mail::Mailer,
    usecase::helpers::{FindResultExt, publish, require_fields},
};

/// テンプレート作成コマンド
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateTemplate {
    pub subject:      String,
    pub content:      String,
    pub placeholders: Vec<String>,
}

/// テンプレート更新コマンド
///
/// subject / content が空の場合は既存値を維持する。
/// placeholders は指定された場合にリストを置き換える。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateTemplate {
    pub id:           String,
    pub subject:      Option<String>,
    pub content:      Option<String>,
    pub placeholders: Option<Vec<String>>,
}

/// テンプレート削除コマンド
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteTemplate {
    pub id: String,
}

impl CreateTemplate {
    pub fn validate(&self) -> Result<(), CoreError> {
        require_fields([("subject", self.subject.as_str()), ("content", self.content.as_str())])
    }
}

impl UpdateTemplate {
    pub fn validate(&self) -> Result<(), CoreError> {
        require_fields([("id", self.id.as_str())])
    }

    fn changes(self) -> TemplateChanges {
        TemplateChanges {
            subject:      self.subject,
            content:      self.content,
            placeholders: self.placeholders,
        }
    }
}

impl DeleteTemplate {
    pub fn validate(&self) -> Result<(), CoreError> {
        require_fields([("id", self.id.as_str())])
    }
}

/// テンプレートのコマンド
#[derive(Debug, Clone)]
pub enum TemplateCommand {
    Create(CreateTemplate),
    Update(UpdateTemplate),
    Delete(DeleteTemplate),
}

impl TemplateCommand {
    /// ログ用の操作名
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
        }
    }
}

/// テンプレートのコマンドハンドラ
pub struct TemplateCommandHandler {
    repository: Arc<dyn TemplateRepository>,
    bus:        Arc<dyn EventBus>,
    mailer:     Arc<Mailer>,
    factory:    AggregateFactory,
}

impl TemplateCommandHandler {
    pub fn new(
        repository: Arc<dyn TemplateRepository>,
        bus: Arc<dyn EventBus>,
        mailer: Arc<Mailer>,
        factory: AggregateFactory,
    ) -> Self {
        Self {
            repository,
            bus,
            mailer,
            factory,
        }
    }

    /// コマンドを実行し、結果の集約を返す（Delete は削除直前の集約）
    pub async fn handle(&self, command: TemplateCommand) -> Result<Template, CoreError> {
        match command {
            TemplateCommand::Create(command) => self.create(command).await,
            TemplateCommand::Update(command) => self.update(command).await,
            TemplateCommand::Delete(command) => self.delete(command).await,
        }
    }

    /// テンプレートを作成する
    ///
    /// 1. subject / content の必須チェック
    /// 2. 集約を生成（プレースホルダ名は正規化される）
    /// 3. 本文とプレースホルダの整合性を検証
    /// 4. 書き込みストアに挿入（件名重複は Conflict）
    /// 5. Created イベントを発行
    #[tracing::instrument(skip_all)]
    pub async fn create(&self, command: CreateTemplate) -> Result<Template, CoreError> {
        command.validate()?;

        let template = self.factory.new_template(NewTemplate {
            subject:      command.subject,
            content:      command.content,
            placeholders: command.placeholders,
        })?;
        self.mailer
            .validate_data(template.content(), template.placeholders())?;

        self.repository.insert(&template).await?;
        publish(
            self.bus.as_ref(),
            names::TEMPLATE_CREATED,
            TemplateEvent::Created(template.public().into()).payload(),
        )
        .await?;

        log_business_event!(
            event.category = event::category::TEMPLATE,
            event.action = event::action::TEMPLATE_CREATED,
            event.entity_type = event::entity_type::TEMPLATE,
            event.entity_id = %template.id(),
            event.result = event::result::SUCCESS,
            "テンプレートを作成しました"
        );

        Ok(template)
    }

    /// テンプレートを更新する
    ///
    /// 件名の一意性は読み取ってから書き込む事前チェックで、同時更新には弱い。
    /// 書き込みストアの一意制約で最終的に Conflict になる。
    #[tracing::instrument(skip_all, fields(template_id = %command.id))]
    pub async fn update(&self, command: UpdateTemplate) -> Result<Template, CoreError> {
        command.validate()?;
        let id = TemplateId::parse(&command.id)?;

        let mut template = self
            .repository
            .find_one(&TemplateLookup::ById(id.clone()))
            .await
            .or_not_found("Template", &id)?;

        let changes = command.changes();
        if let Some(subject) = changes.requested_subject() {
            let holder = self
                .repository
                .find_one(&TemplateLookup::BySubject(subject.to_string()))
                .await?;
            if holder.is_some_and(|other| other.id() != template.id()) {
                return Err(CoreError::Conflict(format!(
                    "件名 `{subject}` のテンプレートは既に存在します"
                )));
            }
        }

        let touches_body = changes.content.is_some() || changes.placeholders.is_some();
        let expected_version = template.meta().version();
        template.apply_changes(changes, self.factory.now());
        if touches_body {
            self.mailer
                .validate_data(template.content(), template.placeholders())?;
        }

        self.repository.update(&template, expected_version).await?;
        publish(
            self.bus.as_ref(),
            names::TEMPLATE_UPDATED,
            TemplateEvent::Updated(template.public().into()).payload(),
        )
        .await?;

        log_business_event!(
            event.category = event::category::TEMPLATE,
            event.action = event::action::TEMPLATE_UPDATED,
            event.entity_type = event::entity_type::TEMPLATE,
            event.entity_id = %template.id(),
            event.result = event::result::SUCCESS,
            version = template.meta().version().as_u32(),
            "テンプレートを更新しました"
        );

        Ok(template)
    }

    /// テンプレートを削除する
    ///
    /// Deleted イベントは削除直前の公開射影を運ぶ（読み取り側の削除に使う）。
    #[tracing::instrument(skip_all, fields(template_id = %command.id))]
    pub async fn delete(&self, command: DeleteTemplate) -> Result<Template, CoreError> {
        command.validate()?;
        let id = TemplateId::parse(&command.id)?;

        let template = self
            .repository
            .find_one(&TemplateLookup::ById(id.clone()))
            .await
            .or_not_found("Template", &id)?;

        self.repository.delete(&template).await?;
        publish(
            self.bus.as_ref(),
            names::TEMPLATE_DELETED,
            TemplateEvent::Deleted(template.public().into()).payload(),
        )
        .await?;

        log_business_event!(
            event.category = event::category::TEMPLATE,
            event.action = event::action::TEMPLATE_DELETED,
            event.entity_type = event::entity_type::TEMPLATE,
            event.entity_id = %template.id(),
            event.result = event::result::SUCCESS,
            "テンプレートを削除しました"
        );

        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use postman_domain::clock::FixedClock;
    use postman_infra::mock::{MockEventBus, MockMailSender, MockTemplateRepository};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap()
    }

    struct Setup {
        sut:        TemplateCommandHandler,
        repository: MockTemplateRepository,
        bus:        MockEventBus,
    }

    fn setup_at(at: DateTime<Utc>) -> Setup {
        let repository = MockTemplateRepository::new();
        let bus = MockEventBus::new();
        let mailer = Mailer::new(Arc::new(MockMailSender::new())).unwrap();
        let sut = TemplateCommandHandler::new(
            Arc::new(repository.clone()),
            Arc::new(bus.clone()),
            Arc::new(mailer),
            AggregateFactory::new(Arc::new(FixedClock::new(at))),
        );
        Setup {
            sut,
            repository,
            bus,
        }
    }

    fn setup() -> Setup {
        setup_at(now())
    }

    fn welcome(subject: &str) -> CreateTemplate {
        CreateTemplate {
            subject:      subject.to_string(),
            content:      "Hello {{name}}".to_string(),
            placeholders: vec!["name".to_string()],
        }
    }

    // ===== create =====

    #[tokio::test]
    async fn test_create_保存してcreatedイベントを発行する() {
        // Arrange
        let setup = setup();

        // Act
        let template = setup.sut.create(welcome("Welcome")).await.unwrap();

        // Assert
        assert_eq!(setup.repository.templates(), vec![template.clone()]);
        let published = setup.bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, names::TEMPLATE_CREATED);
        assert_eq!(
            published[0].1,
            serde_json::to_value(template.public()).unwrap()
        );
    }

    #[tokio::test]
    async fn test_create_ループを含む本文はループ対象だけを宣言すればよい() {
        let setup = setup();
        let command = CreateTemplate {
            subject:      "Digest".to_string(),
            content:      "{% for item in items %}{{ item }}{% endfor %}".to_string(),
            placeholders: vec!["items".to_string()],
        };

        let template = setup.sut.create(command).await.unwrap();

        assert_eq!(template.placeholders(), ["items"]);
        assert_eq!(setup.repository.insert_calls(), 1);
    }

    #[rstest]
    #[case::missing_subject(CreateTemplate { subject: String::new(), ..welcome("x") })]
    #[case::undeclared(CreateTemplate { placeholders: vec![], ..welcome("x") })]
    #[case::unused(CreateTemplate { content: "Hello".to_string(), ..welcome("x") })]
    #[tokio::test]
    async fn test_create_不正な入力は保存も発行もしない(#[case] command: CreateTemplate) {
        let setup = setup();

        let result = setup.sut.create(command).await;

        assert!(matches!(result, Err(CoreError::Validation(_))));
        assert_eq!(setup.repository.insert_calls(), 0);
        assert!(setup.bus.published().is_empty());
    }

    #[tokio::test]
    async fn test_create_件名の重複はconflict() {
        let setup = setup();
        setup.sut.create(welcome("Welcome")).await.unwrap();

        let result = setup.sut.create(welcome("Welcome")).await;

        assert!(matches!(result, Err(CoreError::Conflict(_))));
        assert_eq!(setup.bus.published().len(), 1);
    }

    #[tokio::test]
    async fn test_create_発行失敗でも保存済みの行は残る() {
        let setup = setup();
        setup.bus.fail_publish(true);

        let result = setup.sut.create(welcome("Welcome")).await;

        assert!(matches!(result, Err(CoreError::Database(_))));
        assert_eq!(setup.repository.templates().len(), 1);
    }

    // ===== update =====

    #[tokio::test]
    async fn test_update_他のテンプレートが使う件名はconflictで更新しない() {
        // Arrange
        let setup = setup();
        setup.sut.create(welcome("Welcome")).await.unwrap();
        let other = setup.sut.create(welcome("Reminder")).await.unwrap();

        // Act
        let result = setup
            .sut
            .update(UpdateTemplate {
                id: other.id().to_string(),
                subject: Some("Welcome".to_string()),
                ..Default::default()
            })
            .await;

        // Assert
        assert!(matches!(result, Err(CoreError::Conflict(_))));
        assert_eq!(setup.repository.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_update_自分自身の件名は重複とみなさない() {
        let setup = setup();
        let template = setup.sut.create(welcome("Welcome")).await.unwrap();

        let updated = setup
            .sut
            .update(UpdateTemplate {
                id: template.id().to_string(),
                subject: Some("Welcome".to_string()),
                content: Some("Hi {{name}}".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.content(), "Hi {{name}}");
        assert_eq!(updated.meta().version().as_u32(), 2);
    }

    #[tokio::test]
    async fn test_update_空の項目は既存値を維持し更新日時を進める() {
        // Arrange
        let created = setup();
        let template = created.sut.create(welcome("Welcome")).await.unwrap();
        let later = now() + Duration::hours(2);
        let setup = setup_at(later);
        setup.repository.add_template(template.clone());

        // Act
        let updated = setup
            .sut
            .update(UpdateTemplate {
                id: template.id().to_string(),
                subject: Some("  ".to_string()),
                content: Some(String::new()),
                placeholders: None,
            })
            .await
            .unwrap();

        // Assert
        assert_eq!(updated.subject(), "Welcome");
        assert_eq!(updated.content(), "Hello {{name}}");
        assert_eq!(updated.meta().updated_at(), later);
        assert_eq!(updated.meta().created_at(), now());
        assert_eq!(setup.bus.published_subjects(), vec![names::TEMPLATE_UPDATED]);
    }

    #[tokio::test]
    async fn test_update_変更後の本文がプレースホルダと合わなければ更新しない() {
        let setup = setup();
        let template = setup.sut.create(welcome("Welcome")).await.unwrap();

        let result = setup
            .sut
            .update(UpdateTemplate {
                id: template.id().to_string(),
                content: Some("Hello {{ first }}".to_string()),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(CoreError::Validation(_))));
        assert_eq!(setup.repository.update_calls(), 0);
        assert_eq!(setup.repository.templates()[0].content(), "Hello {{name}}");
    }

    #[tokio::test]
    async fn test_update_存在しないidはnot_found() {
        let setup = setup();

        let result = setup
            .sut
            .update(UpdateTemplate {
                id: TemplateId::new().to_string(),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_不正なid形式はバリデーションエラー() {
        let setup = setup();

        let result = setup
            .sut
            .update(UpdateTemplate {
                id: "tmpl-1".to_string(),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    // ===== delete =====

    #[tokio::test]
    async fn test_delete_削除して直前の射影をdeletedイベントで発行する() {
        let setup = setup();
        let template = setup.sut.create(welcome("Welcome")).await.unwrap();

        let deleted = setup
            .sut
            .handle(TemplateCommand::Delete(DeleteTemplate {
                id: template.id().to_string(),
            }))
            .await
            .unwrap();

        assert_eq!(deleted, template);
        assert!(setup.repository.templates().is_empty());
        let published = setup.bus.published();
        assert_eq!(published.last().unwrap().0, names::TEMPLATE_DELETED);
        assert_eq!(published.last().unwrap().1["id"], template.id().to_string());
    }

    #[tokio::test]
    async fn test_delete_id未指定はバリデーションエラー() {
        let setup = setup();

        let result = setup.sut.delete(DeleteTemplate { id: " ".to_string() }).await;

        assert!(matches!(result, Err(CoreError::Validation(msg)) if msg == "id is required"));
        assert_eq!(setup.repository.delete_calls(), 0);
    }
}
