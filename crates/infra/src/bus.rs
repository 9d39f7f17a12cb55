//! # メッセージバス
//!
//! ドメインイベントを書き込み側から読み取り側（と外部購読者）へ届ける。
//!
//! - [`EventBus`]: 発行と購読のポート
//! - [`EventHandler`]: 購読側が受け取ったメッセージの処理
//! - [`NatsEventBus`]: NATS 実装。購読はキューグループで行い、
//!   同じグループのレプリカ間で配送を分け合う
//!
//! 購読ループはメッセージごとにタスクを起動する。ハンドラの失敗はログに残し、
//! ループは止めない。

use std::{sync::Arc, time::Duration};

use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::error::InfraError;

/// 購読したメッセージの処理
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// `payload` はイベントの JSON バイト列
    async fn handle(&self, subject: &str, payload: &[u8]) -> Result<(), InfraError>;
}

/// イベントバスのポート
#[async_trait]
pub trait EventBus: Send + Sync {
    /// イベントを JSON として発行する
    async fn publish(&self, subject: &str, payload: &serde_json::Value) -> Result<(), InfraError>;

    /// キューグループで購読し、受信ループのタスクを返す
    ///
    /// 返したタスクを abort すると購読を終了する。
    async fn subscribe(
        &self,
        subject: &str,
        group: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<JoinHandle<()>, InfraError>;

    /// 疎通確認（readiness チェック用）
    async fn ping(&self) -> Result<(), InfraError>;
}

/// NATS 接続設定
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// サーバー URL（複数可）
    pub servers:         Vec<String>,
    /// 接続名
    pub name:            String,
    pub connect_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers:         vec!["nats://localhost:4222".to_string()],
            name:            "postman-service".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// NATS 実装の EventBus
#[derive(Clone)]
pub struct NatsEventBus {
    client: Client,
}

impl NatsEventBus {
    /// NATS に接続する
    pub async fn connect(config: &NatsConfig) -> Result<Self, InfraError> {
        let options = ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(config.connect_timeout);

        let client = async_nats::connect_with_options(config.servers.join(","), options)
            .await
            .map_err(|e| InfraError::bus(format!("NATS 接続失敗: {e}")))?;

        tracing::info!(servers = ?config.servers, "NATS に接続しました");
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventBus for NatsEventBus {
    #[tracing::instrument(skip_all, level = "debug", fields(%subject))]
    async fn publish(&self, subject: &str, payload: &serde_json::Value) -> Result<(), InfraError> {
        let bytes = serde_json::to_vec(payload)?;

        self.client
            .publish(subject.to_string(), bytes.into())
            .await
            .map_err(|e| InfraError::bus(format!("発行失敗 ({subject}): {e}")))?;

        tracing::debug!("イベントを発行しました");
        Ok(())
    }

    async fn subscribe(
        &self,
        subject: &str,
        group: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<JoinHandle<()>, InfraError> {
        let mut subscriber = self
            .client
            .queue_subscribe(subject.to_string(), group.to_string())
            .await
            .map_err(|e| InfraError::bus(format!("購読失敗 ({subject}): {e}")))?;

        tracing::info!(%subject, %group, "購読を開始しました");

        let handle = tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let subject = message.subject.to_string();
                    if let Err(e) = handler.handle(&subject, &message.payload).await {
                        tracing::error!(
                            %subject,
                            error = %e,
                            "イベント処理に失敗しました"
                        );
                    }
                });
            }
            tracing::info!("購読が終了しました");
        });

        Ok(handle)
    }

    async fn ping(&self) -> Result<(), InfraError> {
        self.client
            .flush()
            .await
            .map_err(|e| InfraError::bus(format!("NATS 疎通確認失敗: {e}")))
    }
}
