//! テストコンテキスト
//!
//! モックのリポジトリ・バス・メール送信でファサードを組み立てる。
//! モックは `Clone` で状態を共有するので、ファサードに渡した後も中身を検証できる。

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use postman_domain::{clock::FixedClock, factory::AggregateFactory};
use postman_infra::mock::{
    MockEmailRepository,
    MockEmailViewRepository,
    MockEventBus,
    MockMailSender,
    MockTemplateRepository,
    MockTemplateViewRepository,
};

use crate::{
    app::{EmailApp, TemplateApp},
    consumer::start_consumers,
    handler::api_router,
    mail::Mailer,
};

/// テストで使う固定時刻
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap()
}

/// モック一式とファサード
///
/// # 使用例
///
/// ```ignore
/// let ctx = TestContext::new().await;
/// let template = ctx.template_app.create(command).await.unwrap();
///
/// // 発行済みイベントを投影してから読み取る
/// ctx.bus.deliver_published().await.unwrap();
/// let found = ctx.template_app.read_one(&template.id).await.unwrap();
/// ```
pub struct TestContext {
    pub template_app:   Arc<TemplateApp>,
    pub email_app:      Arc<EmailApp>,
    pub templates:      MockTemplateRepository,
    pub emails:         MockEmailRepository,
    pub template_views: MockTemplateViewRepository,
    pub email_views:    MockEmailViewRepository,
    pub bus:            MockEventBus,
    pub sender:         MockMailSender,
}

impl TestContext {
    /// ファサードを組み立て、コンシューマをモックバスに購読させる
    pub async fn new() -> Self {
        let templates = MockTemplateRepository::new();
        let emails = MockEmailRepository::new();
        let template_views = MockTemplateViewRepository::new();
        let email_views = MockEmailViewRepository::new();
        let bus = MockEventBus::new();
        let sender = MockMailSender::new();

        let factory = AggregateFactory::new(Arc::new(FixedClock::new(fixed_now())));
        let mailer = Arc::new(Mailer::new(Arc::new(sender.clone())).unwrap());

        let template_app = Arc::new(TemplateApp::new(
            Arc::new(templates.clone()),
            Arc::new(template_views.clone()),
            Arc::new(bus.clone()),
            Arc::clone(&mailer),
            factory.clone(),
        ));
        let email_app = Arc::new(EmailApp::new(
            Arc::new(emails.clone()),
            Arc::new(templates.clone()),
            Arc::new(email_views.clone()),
            Arc::new(bus.clone()),
            mailer,
            factory,
        ));

        start_consumers(
            &bus,
            "postman-test",
            Arc::clone(&template_app),
            Arc::clone(&email_app),
        )
        .await
        .unwrap();

        Self {
            template_app,
            email_app,
            templates,
            emails,
            template_views,
            email_views,
            bus,
            sender,
        }
    }

    /// HTTP ルーター（Readiness Check を除く）
    pub fn router(&self) -> Router {
        api_router(Arc::clone(&self.template_app), Arc::clone(&self.email_app))
    }
}
