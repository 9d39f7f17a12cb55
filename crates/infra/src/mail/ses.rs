//! SES 送信実装
//!
//! AWS SES v2 API を使用する。本番環境向け。

use async_trait::async_trait;
use aws_sdk_sesv2::{
    Client,
    types::{Body, Content, Destination, EmailContent, Message},
};
use postman_domain::mail::{MailError, OutgoingMail};

use super::MailSender;

/// SES 送信
///
/// 送信元アドレスは SES で検証済みであること。
pub struct SesMailSender {
    client: Client,
}

impl SesMailSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn content(data: &str, what: &str) -> Result<Content, MailError> {
    Content::builder()
        .data(data)
        .build()
        .map_err(|e| MailError::SendFailed(format!("{what}構築失敗: {e}")))
}

#[async_trait]
impl MailSender for SesMailSender {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let destination = Destination::builder().to_addresses(&mail.to).build();

        let email_content = EmailContent::builder()
            .simple(
                Message::builder()
                    .subject(content(&mail.subject, "件名")?)
                    .body(
                        Body::builder()
                            .html(content(&mail.html_body, "HTML 本文")?)
                            .build(),
                    )
                    .build(),
            )
            .build();

        self.client
            .send_email()
            .from_email_address(mail.from_header())
            .destination(destination)
            .content(email_content)
            .send()
            .await
            .map_err(|e| MailError::SendFailed(format!("SES 送信失敗: {e}")))?;

        Ok(())
    }
}
