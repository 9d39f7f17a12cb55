//! # Postman Service サーバー
//!
//! テンプレートからメールをレンダリングして送信し、送信結果を記録するサービス。
//!
//! ## 入口
//!
//! - **HTTP**: テンプレート・メールのコマンドとクエリ（`/api/v1/...`）
//! - **メッセージバス**: ドメインイベントの投影と、他サービスからの送信要求
//!   （`postman.email.send-mail.event`）
//!
//! ```text
//! HTTP / Bus ─→ App ─→ CommandHandler ─→ 書き込みストア ─→ Bus.publish
//!                                                            │
//!                          読み取りストア ←─ Projector ←──────┘
//! ```
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `POSTMAN_HOST` | No | バインドアドレス（デフォルト: `0.0.0.0`） |
//! | `POSTMAN_PORT` | No | ポート番号（デフォルト: `13010`） |
//! | `DATABASE_URL` | **Yes** | PostgreSQL 接続 URL |
//! | `NATS_URL` | No | NATS サーバー（カンマ区切り、デフォルト: `nats://localhost:4222`） |
//! | `NATS_CLIENT_NAME` | No | NATS 接続名（デフォルト: `postman-service`） |
//! | `POSTMAN_CONSUMER_GROUP` | No | キューグループ名（デフォルト: `postman`） |
//! | `MAIL_BACKEND` | No | `smtp` / `ses` / `noop`（デフォルト: `noop`） |
//! | `SMTP_HOST` / `SMTP_PORT` | No | SMTP の接続先（デフォルト: `localhost:1025`） |
//! | `LOG_FORMAT` | No | `json` / `pretty`（デフォルト: `pretty`） |
//!
//! ## 起動方法
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo run -p postman-service
//! ```

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use postman_domain::{clock::SystemClock, factory::AggregateFactory};
use postman_infra::{
    bus::{EventBus, NatsEventBus},
    db,
    mail::{MailSender, NoopMailSender, SesMailSender, SmtpMailSender},
    repository::{
        PostgresEmailRepository,
        PostgresEmailViewRepository,
        PostgresTemplateRepository,
        PostgresTemplateViewRepository,
    },
};
use postman_service::{
    app::{EmailApp, TemplateApp},
    config::{MailBackend, MailConfig, ServiceConfig},
    consumer::start_consumers,
    handler::{ReadinessState, router},
    mail::Mailer,
};
use postman_shared::observability::{TracingConfig, init_tracing};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    init_tracing(&TracingConfig::from_env("postman-service"));

    let config = ServiceConfig::from_env().context("設定の読み込みに失敗しました")?;
    tracing::info!(
        "Postman Service を起動します: {}:{}",
        config.host,
        config.port
    );

    let pool = db::create_pool(&config.database_url)
        .await
        .context("データベース接続に失敗しました")?;
    db::run_migrations(&pool)
        .await
        .context("マイグレーションに失敗しました")?;
    tracing::info!("データベースに接続しました");

    let bus: Arc<dyn EventBus> = Arc::new(
        NatsEventBus::connect(&config.nats)
            .await
            .context("NATS 接続に失敗しました")?,
    );

    let mailer = Arc::new(Mailer::new(mail_sender(&config.mail).await)?);
    let factory = AggregateFactory::new(Arc::new(SystemClock));
    let templates = Arc::new(PostgresTemplateRepository::new(pool.clone()));

    let template_app = Arc::new(TemplateApp::new(
        templates.clone(),
        Arc::new(PostgresTemplateViewRepository::new(pool.clone())),
        Arc::clone(&bus),
        Arc::clone(&mailer),
        factory.clone(),
    ));
    let email_app = Arc::new(EmailApp::new(
        Arc::new(PostgresEmailRepository::new(pool.clone())),
        templates,
        Arc::new(PostgresEmailViewRepository::new(pool.clone())),
        Arc::clone(&bus),
        mailer,
        factory,
    ));

    let consumers = start_consumers(
        bus.as_ref(),
        &config.consumer_group,
        Arc::clone(&template_app),
        Arc::clone(&email_app),
    )
    .await
    .context("イベントの購読に失敗しました")?;

    let readiness = Arc::new(ReadinessState {
        pool,
        bus: Arc::clone(&bus),
    });
    let app = router(template_app, email_app, readiness);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("アドレスのパースに失敗しました")?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Postman Service が起動しました: {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for consumer in consumers {
        consumer.abort();
    }
    tracing::info!("Postman Service を停止しました");

    Ok(())
}

/// 設定に応じたメール送信を構築する
async fn mail_sender(config: &MailConfig) -> Arc<dyn MailSender> {
    tracing::info!(backend = %config.backend, "メール送信バックエンドを選択しました");
    match config.backend {
        MailBackend::Smtp => Arc::new(SmtpMailSender::new(&config.smtp_host, config.smtp_port)),
        MailBackend::Ses => {
            let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            Arc::new(SesMailSender::new(aws_sdk_sesv2::Client::new(&aws_config)))
        }
        MailBackend::Noop => Arc::new(NoopMailSender),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "シグナルの待機に失敗しました");
    }
    tracing::info!("シャットダウンを開始します");
}
