//! # メール送信
//!
//! [`MailSender`] トレイトでメール送信を抽象化し、3 つの実装を提供する。
//!
//! | 実装 | 用途 |
//! |------|------|
//! | [`SmtpMailSender`] | 開発（Mailpit）・SMTP リレー |
//! | [`SesMailSender`] | 本番（AWS SES v2） |
//! | [`NoopMailSender`] | 送信無効化（ログのみ） |
//!
//! どれを使うかは `MAIL_BACKEND` で起動時に選ぶ。

mod noop;
mod ses;
mod smtp;

use async_trait::async_trait;
pub use noop::NoopMailSender;
use postman_domain::mail::{MailError, OutgoingMail};
pub use ses::SesMailSender;
pub use smtp::SmtpMailSender;

/// メール送信トレイト
#[async_trait]
pub trait MailSender: Send + Sync {
    /// レンダリング済みのメールを送信する
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}
