//! # アプリケーションファサード
//!
//! HTTP ハンドラとバスのコンシューマから呼ばれる、集約ごとの入口。
//!
//! 各操作はコマンド・クエリ・投影ハンドラに委譲するだけで、ビジネスロジックを持たない。
//! 操作ごとに `trace_id` 付きのスパンを張り、失敗をログに残したうえで
//! エラーを種別を変えずに返す（HTTP ステータスへの変換は `CoreError` の責務）。

use std::{future::Future, sync::Arc};

use postman_domain::{
    email::EmailPublic,
    event::{EmailEvent, TemplateEvent},
    factory::AggregateFactory,
    query::FacetRequest,
    template::TemplatePublic,
};
use postman_infra::{
    bus::EventBus,
    repository::{
        EmailRepository,
        EmailViewRepository,
        FacetResult,
        TemplateRepository,
        TemplateViewRepository,
    },
};
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    error::CoreError,
    mail::Mailer,
    usecase::{
        CreateEmail,
        CreateTemplate,
        DeleteEmail,
        DeleteTemplate,
        EmailCommand,
        EmailCommandHandler,
        EmailProjector,
        EmailQueryHandler,
        ResendEmail,
        TemplateCommand,
        TemplateCommandHandler,
        TemplateProjector,
        TemplateQueryHandler,
        UpdateTemplate,
    },
};

/// テンプレートのファサード
pub struct TemplateApp {
    commands:  TemplateCommandHandler,
    queries:   TemplateQueryHandler,
    projector: TemplateProjector,
}

impl TemplateApp {
    pub fn new(
        repository: Arc<dyn TemplateRepository>,
        views: Arc<dyn TemplateViewRepository>,
        bus: Arc<dyn EventBus>,
        mailer: Arc<Mailer>,
        factory: AggregateFactory,
    ) -> Self {
        Self {
            commands:  TemplateCommandHandler::new(repository, bus, mailer, factory.clone()),
            queries:   TemplateQueryHandler::new(Arc::clone(&views)),
            projector: TemplateProjector::new(views, factory),
        }
    }

    pub async fn create(&self, command: CreateTemplate) -> Result<TemplatePublic, CoreError> {
        self.dispatch(TemplateCommand::Create(command)).await
    }

    pub async fn update(&self, command: UpdateTemplate) -> Result<TemplatePublic, CoreError> {
        self.dispatch(TemplateCommand::Update(command)).await
    }

    /// 削除したテンプレートの最終状態を返す
    pub async fn delete(&self, command: DeleteTemplate) -> Result<TemplatePublic, CoreError> {
        self.dispatch(TemplateCommand::Delete(command)).await
    }

    pub async fn dispatch(&self, command: TemplateCommand) -> Result<TemplatePublic, CoreError> {
        let operation = command.operation();
        traced(AGGREGATE_TEMPLATE, operation, async {
            self.commands.handle(command).await.map(|t| t.public())
        })
        .await
    }

    pub async fn read(&self, request: &FacetRequest) -> Result<FacetResult, CoreError> {
        traced(AGGREGATE_TEMPLATE, "read", self.queries.read(request)).await
    }

    pub async fn read_one(&self, id: &str) -> Result<TemplatePublic, CoreError> {
        traced(AGGREGATE_TEMPLATE, "read_one", self.queries.read_one(id)).await
    }

    /// ドメインイベントを読み取りストアへ投影する
    pub async fn project(&self, event: TemplateEvent) -> Result<(), CoreError> {
        let operation = event.name();
        traced(AGGREGATE_TEMPLATE, operation, self.projector.handle(event)).await
    }
}

/// メールのファサード
pub struct EmailApp {
    commands:  EmailCommandHandler,
    queries:   EmailQueryHandler,
    projector: EmailProjector,
}

impl EmailApp {
    pub fn new(
        emails: Arc<dyn EmailRepository>,
        templates: Arc<dyn TemplateRepository>,
        views: Arc<dyn EmailViewRepository>,
        bus: Arc<dyn EventBus>,
        mailer: Arc<Mailer>,
        factory: AggregateFactory,
    ) -> Self {
        Self {
            commands:  EmailCommandHandler::new(emails, templates, bus, mailer, factory.clone()),
            queries:   EmailQueryHandler::new(Arc::clone(&views)),
            projector: EmailProjector::new(views, factory),
        }
    }

    pub async fn create(&self, command: CreateEmail) -> Result<EmailPublic, CoreError> {
        self.dispatch(EmailCommand::Create(command)).await
    }

    pub async fn resend(&self, command: ResendEmail) -> Result<EmailPublic, CoreError> {
        self.dispatch(EmailCommand::Resend(command)).await
    }

    pub async fn delete(&self, command: DeleteEmail) -> Result<EmailPublic, CoreError> {
        self.dispatch(EmailCommand::Delete(command)).await
    }

    pub async fn dispatch(&self, command: EmailCommand) -> Result<EmailPublic, CoreError> {
        let operation = command.operation();
        traced(AGGREGATE_EMAIL, operation, async {
            self.commands.handle(command).await.map(|e| e.public())
        })
        .await
    }

    pub async fn read(&self, request: &FacetRequest) -> Result<FacetResult, CoreError> {
        traced(AGGREGATE_EMAIL, "read", self.queries.read(request)).await
    }

    pub async fn read_one(&self, id: &str) -> Result<EmailPublic, CoreError> {
        traced(AGGREGATE_EMAIL, "read_one", self.queries.read_one(id)).await
    }

    pub async fn project(&self, event: EmailEvent) -> Result<(), CoreError> {
        let operation = event.name();
        traced(AGGREGATE_EMAIL, operation, self.projector.handle(event)).await
    }
}

const AGGREGATE_TEMPLATE: &str = "template";
const AGGREGATE_EMAIL: &str = "email";

/// `trace_id` 付きのスパン内で操作を実行し、失敗をログに残す
///
/// クライアント起因のエラーは warn、それ以外は error で出力する。
async fn traced<T>(
    aggregate: &'static str,
    operation: &'static str,
    operation_future: impl Future<Output = Result<T, CoreError>>,
) -> Result<T, CoreError> {
    let trace_id = Uuid::now_v7();
    let span = tracing::info_span!("app", %trace_id, aggregate, operation);

    async move {
        let result = operation_future.await;
        if let Err(e) = &result {
            if e.is_client_error() {
                tracing::warn!(
                    %trace_id,
                    error.category = e.category(),
                    error.kind = e.kind(),
                    error = %e,
                    "操作が拒否されました"
                );
            } else {
                tracing::error!(
                    %trace_id,
                    error.category = e.category(),
                    error.kind = e.kind(),
                    error = %e,
                    "操作に失敗しました"
                );
            }
        }
        result
    }
    .instrument(span)
    .await
}
