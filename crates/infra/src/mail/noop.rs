//! Noop 送信実装
//!
//! 実際には送信せず、ログ出力のみ行う。

use async_trait::async_trait;
use postman_domain::mail::{MailError, OutgoingMail};

use super::MailSender;

/// Noop 送信（ログ出力のみ、常に成功）
#[derive(Debug, Clone)]
pub struct NoopMailSender;

#[async_trait]
impl MailSender for NoopMailSender {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        tracing::info!(
            to = %mail.to,
            subject = %mail.subject,
            "Noop: メール送信をスキップ"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sendがエラーを返さない() {
        let sender = NoopMailSender;
        let mail = OutgoingMail {
            from:        "noreply@example.com".to_string(),
            sender_name: None,
            to:          "ada@example.com".to_string(),
            subject:     "テスト件名".to_string(),
            html_body:   "<p>テスト</p>".to_string(),
        };

        let result = sender.send(&mail).await;
        assert!(result.is_ok());
    }
}
