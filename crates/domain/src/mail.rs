//! # 送信メール
//!
//! メール送信ポートが受け取る送信内容と、送信時のエラーを定義する。
//!
//! 送信の具体的な方法（SMTP / SES / Noop）はインフラ層が実装し、
//! 送信失敗は Email 集約の状態（`Failed`）として記録される。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// メール送信エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailError {
    /// メール送信に失敗
    #[error("メール送信に失敗: {0}")]
    SendFailed(String),

    /// テンプレートレンダリングに失敗
    #[error("テンプレートレンダリングに失敗: {0}")]
    TemplateFailed(String),
}

/// 送信するメール
///
/// `html_body` はレンダリング済みの本文。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMail {
    /// 送信元アドレス
    pub from:        String,
    /// 送信者の表示名
    pub sender_name: Option<String>,
    /// 宛先アドレス
    pub to:          String,
    pub subject:     String,
    pub html_body:   String,
}

impl OutgoingMail {
    /// `"表示名 <address>"` 形式の送信元。表示名がなければアドレスのみ。
    pub fn from_header(&self) -> String {
        match self.sender_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => format!("{name} <{}>", self.from),
            _ => self.from.clone(),
        }
    }
}
