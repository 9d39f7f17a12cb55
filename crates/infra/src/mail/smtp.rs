//! SMTP 送信実装
//!
//! lettre の `AsyncSmtpTransport` を使用する。開発環境では Mailpit に接続する。

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport,
    AsyncTransport,
    Tokio1Executor,
    message::{Mailbox, Message, header::ContentType},
};
use postman_domain::mail::{MailError, OutgoingMail};

use super::MailSender;

/// SMTP 送信
pub struct SmtpMailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailSender {
    /// - `host`: SMTP サーバーのホスト名（例: "localhost"）
    /// - `port`: SMTP サーバーのポート番号（例: 1025 for Mailpit）
    pub fn new(host: &str, port: u16) -> Self {
        // builder_dangerous: TLS なしで接続（Mailpit 等のローカル SMTP 向け）
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .build();

        Self { transport }
    }
}

/// 送信元の Mailbox を組み立てる（表示名は任意）
fn from_mailbox(mail: &OutgoingMail) -> Result<Mailbox, MailError> {
    let address = mail
        .from
        .parse()
        .map_err(|e| MailError::SendFailed(format!("送信元アドレス不正: {e}")))?;
    let name = mail
        .sender_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    Ok(Mailbox::new(name, address))
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(from_mailbox(mail)?)
            .to(mail
                .to
                .parse()
                .map_err(|e| MailError::SendFailed(format!("宛先アドレス不正: {e}")))?)
            .subject(&mail.subject)
            .header(ContentType::TEXT_HTML)
            .body(mail.html_body.clone())
            .map_err(|e| MailError::SendFailed(format!("メッセージ構築失敗: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::SendFailed(format!("SMTP 送信失敗: {e}")))?;

        Ok(())
    }
}
