//! メールのコマンドハンドラ
//!
//! ## 送信失敗の扱い
//!
//! Create / Resend でのメール送信失敗はコマンドの失敗にしない。
//! 結果は集約の状態（`Failed`）として記録し、必ず永続化する。
//! コマンドが失敗するのは入力不備・参照先不在・永続化やイベント発行の失敗のみ。

use std::sync::Arc;

use postman_domain::{
    email::{Email, EmailData, EmailId, EmailState, NewEmail},
    event::{EmailEvent, SendMailEvent, names},
    factory::AggregateFactory,
    mail::MailError,
    template::TemplateId,
};
use postman_infra::{
    bus::EventBus,
    repository::{EmailLookup, EmailRepository, TemplateLookup, TemplateRepository},
};
use postman_shared::{
    event_log::{error as log_error, event},
    log_business_event,
};
use serde::Deserialize;

use crate::{
    error::CoreError,
    mail::{MailBody, Mailer, SendParams},
    usecase::helpers::{FindResultExt, publish, require_fields},
};

/// メール作成（送信）コマンド
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateEmail {
    pub recipient: String,
    /// 差出人の表示名
    pub sender:    Option<String>,
    pub data:      EmailData,
    /// テンプレート ID
    pub template:  String,
    pub from:      String,
}

/// メール再送コマンド
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResendEmail {
    pub id: String,
}

/// メール削除コマンド
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteEmail {
    pub id: String,
}

impl CreateEmail {
    pub fn validate(&self) -> Result<(), CoreError> {
        require_fields([
            ("recipient", self.recipient.as_str()),
            ("template", self.template.as_str()),
            ("from", self.from.as_str()),
        ])
    }
}

impl From<SendMailEvent> for CreateEmail {
    fn from(event: SendMailEvent) -> Self {
        Self {
            recipient: event.recipient,
            sender:    event.sender,
            data:      event.data,
            template:  event.template,
            from:      event.from,
        }
    }
}

impl ResendEmail {
    pub fn validate(&self) -> Result<(), CoreError> {
        require_fields([("id", self.id.as_str())])
    }
}

impl DeleteEmail {
    pub fn validate(&self) -> Result<(), CoreError> {
        require_fields([("id", self.id.as_str())])
    }
}

/// メールのコマンド
#[derive(Debug, Clone)]
pub enum EmailCommand {
    Create(CreateEmail),
    Resend(ResendEmail),
    Delete(DeleteEmail),
}

impl EmailCommand {
    /// ログ用の操作名
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Resend(_) => "resend",
            Self::Delete(_) => "delete",
        }
    }
}

/// メールのコマンドハンドラ
pub struct EmailCommandHandler {
    emails:    Arc<dyn EmailRepository>,
    templates: Arc<dyn TemplateRepository>,
    bus:       Arc<dyn EventBus>,
    mailer:    Arc<Mailer>,
    factory:   AggregateFactory,
}

impl EmailCommandHandler {
    pub fn new(
        emails: Arc<dyn EmailRepository>,
        templates: Arc<dyn TemplateRepository>,
        bus: Arc<dyn EventBus>,
        mailer: Arc<Mailer>,
        factory: AggregateFactory,
    ) -> Self {
        Self {
            emails,
            templates,
            bus,
            mailer,
            factory,
        }
    }

    /// コマンドを実行し、結果の集約を返す（Delete は削除直前の集約）
    pub async fn handle(&self, command: EmailCommand) -> Result<Email, CoreError> {
        match command {
            EmailCommand::Create(command) => self.create(command).await,
            EmailCommand::Resend(command) => self.resend(command).await,
            EmailCommand::Delete(command) => self.delete(command).await,
        }
    }

    /// メールを作成する
    ///
    /// 1. recipient / template / from の必須チェック
    /// 2. テンプレートを書き込みストアから取得（無ければ NotFound）
    /// 3. data がテンプレートのプレースホルダをすべて満たすか検証
    /// 4. 送信を試み、結果を状態として決定（失敗してもコマンドは続行）
    /// 5. 本文をレンダリング（失敗は Internal）
    /// 6. 集約を生成して書き込みストアに挿入
    /// 7. Created イベントを発行
    #[tracing::instrument(skip_all, fields(template_id = %command.template))]
    pub async fn create(&self, command: CreateEmail) -> Result<Email, CoreError> {
        command.validate()?;
        let template_id = TemplateId::parse(&command.template)?;

        let template = self
            .templates
            .find_one(&TemplateLookup::ById(template_id.clone()))
            .await
            .or_not_found("Template", &template_id)?;

        self.mailer
            .validate_map_data(template.content(), template.placeholders(), &command.data)?;

        let outcome = self
            .mailer
            .send(SendParams {
                sender:    command.sender.clone(),
                recipient: command.recipient.clone(),
                subject:   template.subject().to_string(),
                from:      command.from.clone(),
                body:      MailBody::Template {
                    content: template.content().to_string(),
                    data:    command.data.clone(),
                },
            })
            .await;
        let state = self.delivery_state(outcome, &command.recipient);

        let message = self
            .mailer
            .render(template.content(), &command.data)
            .map_err(|e| CoreError::Internal(format!("本文のレンダリングに失敗: {e}")))?;

        let email = self.factory.new_email(NewEmail {
            recipient: command.recipient,
            sender: command.sender,
            from: command.from,
            subject: template.subject().to_string(),
            template: template.id().clone(),
            data: command.data,
            message,
            state,
        })?;

        self.emails.insert(&email).await?;
        publish(
            self.bus.as_ref(),
            names::EMAIL_CREATED,
            EmailEvent::Created(email.public().into()).payload(),
        )
        .await?;

        log_business_event!(
            event.category = event::category::EMAIL,
            event.action = event::action::EMAIL_CREATED,
            event.entity_type = event::entity_type::EMAIL,
            event.entity_id = %email.id(),
            event.result = result_of(state),
            email.state = %state,
            "メールを作成しました"
        );

        Ok(email)
    }

    /// 失敗したメールを再送する
    ///
    /// 保存済みの本文をそのまま送る（テンプレートは再解決しない）。
    /// 既に `Complete` のメールは送信せずに AlreadyComplete を返す。
    #[tracing::instrument(skip_all, fields(email_id = %command.id))]
    pub async fn resend(&self, command: ResendEmail) -> Result<Email, CoreError> {
        command.validate()?;
        let id = EmailId::parse(&command.id)?;

        let mut email = self
            .emails
            .find_one(&EmailLookup::ById(id.clone()))
            .await
            .or_not_found("Email", &id)?;
        email.ensure_resendable()?;

        let outcome = self
            .mailer
            .send(SendParams {
                sender:    email.sender().map(str::to_string),
                recipient: email.recipient().to_string(),
                subject:   email.subject().to_string(),
                from:      email.from_address().to_string(),
                body:      MailBody::Rendered(email.message().to_string()),
            })
            .await;
        let state = self.delivery_state(outcome, email.recipient());

        let expected_version = email.meta().version();
        email.record_delivery(state, self.factory.now());

        self.emails.update(&email, expected_version).await?;
        publish(
            self.bus.as_ref(),
            names::EMAIL_UPDATED,
            EmailEvent::Updated(email.public().into()).payload(),
        )
        .await?;

        log_business_event!(
            event.category = event::category::EMAIL,
            event.action = event::action::EMAIL_RESENT,
            event.entity_type = event::entity_type::EMAIL,
            event.entity_id = %email.id(),
            event.result = result_of(state),
            email.state = %state,
            "メールを再送しました"
        );

        Ok(email)
    }

    /// メールを削除する
    #[tracing::instrument(skip_all, fields(email_id = %command.id))]
    pub async fn delete(&self, command: DeleteEmail) -> Result<Email, CoreError> {
        command.validate()?;
        let id = EmailId::parse(&command.id)?;

        let email = self
            .emails
            .find_one(&EmailLookup::ById(id.clone()))
            .await
            .or_not_found("Email", &id)?;

        self.emails.delete(&email).await?;
        publish(
            self.bus.as_ref(),
            names::EMAIL_DELETED,
            EmailEvent::Deleted(email.public().into()).payload(),
        )
        .await?;

        log_business_event!(
            event.category = event::category::EMAIL,
            event.action = event::action::EMAIL_DELETED,
            event.entity_type = event::entity_type::EMAIL,
            event.entity_id = %email.id(),
            event.result = event::result::SUCCESS,
            "メールを削除しました"
        );

        Ok(email)
    }

    /// 送信結果を状態に変換する（失敗はログに残して `Failed`）
    fn delivery_state(&self, outcome: Result<(), MailError>, recipient: &str) -> EmailState {
        if let Err(e) = &outcome {
            log_business_event!(
                event.category = event::category::EMAIL,
                event.action = event::action::EMAIL_SEND_FAILED,
                event.entity_type = event::entity_type::EMAIL,
                event.result = event::result::FAILURE,
                error.category = log_error::category::EXTERNAL_SERVICE,
                error.kind = log_error::kind::MAIL_SEND,
                email.recipient = %recipient,
                error = %e,
                "メール送信に失敗しました"
            );
        }
        EmailState::from_delivery(outcome.is_ok())
    }
}

fn result_of(state: EmailState) -> &'static str {
    match state {
        EmailState::Complete => event::result::SUCCESS,
        EmailState::Failed => event::result::FAILURE,
    }
}
