//! # バスのコンシューマ
//!
//! バスから受け取ったメッセージをファサードの操作へ振り分ける。
//!
//! | subject | 処理 |
//! |---------|------|
//! | `template.{created,updated,deleted}.command` | `TemplateApp::project` |
//! | `email.{created,updated,deleted}.command` | `EmailApp::project` |
//! | `postman.email.send-mail.event` | `EmailApp::create` |
//!
//! 配送は at-least-once。投影はバージョン付きの upsert なので再配送に耐える。

use std::sync::Arc;

use async_trait::async_trait;
use postman_domain::event::{EmailEvent, SendMailEvent, TemplateEvent, names};
use postman_infra::{
    InfraError,
    bus::{EventBus, EventHandler},
};
use tokio::task::JoinHandle;

use crate::{
    app::{EmailApp, TemplateApp},
    error::CoreError,
    usecase::CreateEmail,
};

/// テンプレートのイベントを投影する
pub struct TemplateEventConsumer {
    app: Arc<TemplateApp>,
}

impl TemplateEventConsumer {
    pub fn new(app: Arc<TemplateApp>) -> Self {
        Self { app }
    }
}

#[async_trait]
impl EventHandler for TemplateEventConsumer {
    async fn handle(&self, subject: &str, payload: &[u8]) -> Result<(), InfraError> {
        let kind = TemplateEvent::kind_of(subject)
            .ok_or_else(|| InfraError::invalid_input(format!("未知のイベント名: {subject}")))?;
        let params = serde_json::from_slice(payload)?;
        self.app
            .project(TemplateEvent::new(kind, params))
            .await
            .map_err(into_infra_error)
    }
}

/// メールのイベントを投影する
pub struct EmailEventConsumer {
    app: Arc<EmailApp>,
}

impl EmailEventConsumer {
    pub fn new(app: Arc<EmailApp>) -> Self {
        Self { app }
    }
}

#[async_trait]
impl EventHandler for EmailEventConsumer {
    async fn handle(&self, subject: &str, payload: &[u8]) -> Result<(), InfraError> {
        let kind = EmailEvent::kind_of(subject)
            .ok_or_else(|| InfraError::invalid_input(format!("未知のイベント名: {subject}")))?;
        let params = serde_json::from_slice(payload)?;
        self.app
            .project(EmailEvent::new(kind, params))
            .await
            .map_err(into_infra_error)
    }
}

/// 他サービスからのメール送信要求を Create コマンドとして実行する
pub struct SendMailConsumer {
    app: Arc<EmailApp>,
}

impl SendMailConsumer {
    pub fn new(app: Arc<EmailApp>) -> Self {
        Self { app }
    }
}

#[async_trait]
impl EventHandler for SendMailConsumer {
    async fn handle(&self, _subject: &str, payload: &[u8]) -> Result<(), InfraError> {
        let event: SendMailEvent = serde_json::from_slice(payload)?;
        self.app
            .create(CreateEmail::from(event))
            .await
            .map(|_| ())
            .map_err(into_infra_error)
    }
}

/// インフラ由来のエラーはそのまま、それ以外はメッセージを保って `Unexpected` にする
fn into_infra_error(error: CoreError) -> InfraError {
    match error {
        CoreError::Database(e) => e,
        other => InfraError::unexpected(other.to_string()),
    }
}

/// すべてのコンシューマを購読させ、受信ループのタスクを返す
pub async fn start_consumers(
    bus: &dyn EventBus,
    group: &str,
    template_app: Arc<TemplateApp>,
    email_app: Arc<EmailApp>,
) -> Result<Vec<JoinHandle<()>>, InfraError> {
    let template_consumer: Arc<dyn EventHandler> =
        Arc::new(TemplateEventConsumer::new(template_app));
    let email_consumer: Arc<dyn EventHandler> =
        Arc::new(EmailEventConsumer::new(Arc::clone(&email_app)));
    let send_mail_consumer: Arc<dyn EventHandler> = Arc::new(SendMailConsumer::new(email_app));

    let subscriptions = [
        (names::TEMPLATE_CREATED, &template_consumer),
        (names::TEMPLATE_UPDATED, &template_consumer),
        (names::TEMPLATE_DELETED, &template_consumer),
        (names::EMAIL_CREATED, &email_consumer),
        (names::EMAIL_UPDATED, &email_consumer),
        (names::EMAIL_DELETED, &email_consumer),
        (names::SEND_MAIL, &send_mail_consumer),
    ];

    let mut handles = Vec::with_capacity(subscriptions.len());
    for (subject, handler) in subscriptions {
        handles.push(bus.subscribe(subject, group, Arc::clone(handler)).await?);
    }
    Ok(handles)
}

#[cfg(test)]
mod tests {
    use postman_infra::error::InfraErrorKind;

    use super::*;

    #[test]
    fn test_into_infra_error_インフラ由来のエラーは種別を保つ() {
        let error = into_infra_error(CoreError::Database(InfraError::bus("down")));

        assert!(matches!(error.kind(), InfraErrorKind::Bus(_)));
    }

    #[test]
    fn test_into_infra_error_それ以外はunexpectedになる() {
        let error = into_infra_error(CoreError::Validation("bad".to_string()));

        assert!(matches!(error.kind(), InfraErrorKind::Unexpected(_)));
    }
}
