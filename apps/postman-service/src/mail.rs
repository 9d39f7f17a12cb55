//! # メール機能
//!
//! コマンドハンドラから見たメール機能。テンプレートとデータの整合性検証、
//! レンダリング、送信をまとめて提供する。
//!
//! 送信そのものは [`MailSender`] に委譲する（SMTP / SES / Noop は起動時に選択）。

mod renderer;

use std::sync::Arc;

use itertools::Itertools;
use postman_domain::{
    email::EmailData,
    mail::{MailError, OutgoingMail},
};
use postman_infra::mail::MailSender;
pub use renderer::TemplateRenderer;

use crate::error::CoreError;

/// 送信する本文
#[derive(Debug, Clone, PartialEq)]
pub enum MailBody {
    /// テンプレート本文とデータ（送信前にレンダリングする）
    Template { content: String, data: EmailData },
    /// レンダリング済みの本文（再送時にそのまま使う）
    Rendered(String),
}

/// 送信パラメータ
#[derive(Debug, Clone, PartialEq)]
pub struct SendParams {
    /// 差出人の表示名
    pub sender:    Option<String>,
    pub recipient: String,
    pub subject:   String,
    pub from:      String,
    pub body:      MailBody,
}

/// メール機能
pub struct Mailer {
    renderer: TemplateRenderer,
    sender:   Arc<dyn MailSender>,
}

impl Mailer {
    pub fn new(sender: Arc<dyn MailSender>) -> Result<Self, MailError> {
        Ok(Self {
            renderer: TemplateRenderer::new()?,
            sender,
        })
    }

    /// テンプレート本文と宣言されたプレースホルダの整合性を検証する
    ///
    /// - 本文が tera の構文として正しい
    /// - プレースホルダが識別子であり、重複していない
    /// - 本文が参照する変数はすべて宣言されている
    /// - 宣言されたプレースホルダはすべて本文で使われている
    pub fn validate_data(&self, content: &str, placeholders: &[String]) -> Result<(), CoreError> {
        self.renderer
            .check_syntax(content)
            .map_err(|e| CoreError::Validation(format!("content の構文が不正です: {e}")))?;

        if let Some(invalid) = placeholders
            .iter()
            .find(|p| !self.renderer.is_identifier(p))
        {
            return Err(CoreError::Validation(format!(
                "placeholder `{invalid}` は識別子ではありません"
            )));
        }
        let duplicates = placeholders.iter().duplicates().join(", ");
        if !duplicates.is_empty() {
            return Err(CoreError::Validation(format!(
                "placeholders が重複しています: {duplicates}"
            )));
        }

        let used = self
            .renderer
            .variables(content)
            .map_err(|e| CoreError::Validation(format!("content の構文が不正です: {e}")))?;
        let undeclared = used
            .iter()
            .filter(|v| !placeholders.contains(v))
            .join(", ");
        if !undeclared.is_empty() {
            return Err(CoreError::Validation(format!(
                "content が未宣言の placeholder を参照しています: {undeclared}"
            )));
        }
        let unused = placeholders
            .iter()
            .filter(|p| !used.contains(p.as_str()))
            .join(", ");
        if !unused.is_empty() {
            return Err(CoreError::Validation(format!(
                "placeholder が content で使われていません: {unused}"
            )));
        }

        Ok(())
    }

    /// データがテンプレートの要求するすべてのプレースホルダを満たすか検証する
    pub fn validate_map_data(
        &self,
        content: &str,
        placeholders: &[String],
        data: &EmailData,
    ) -> Result<(), CoreError> {
        let required = self
            .renderer
            .variables(content)
            .map_err(|e| CoreError::Internal(format!("保存済みの content を解析できません: {e}")))?
            .into_iter()
            .chain(placeholders.iter().cloned())
            .unique();
        let missing = required.filter(|key| !data.contains_key(key)).join(", ");
        if !missing.is_empty() {
            return Err(CoreError::Validation(format!(
                "data に placeholder がありません: {missing}"
            )));
        }
        Ok(())
    }

    pub fn render(&self, content: &str, data: &EmailData) -> Result<String, MailError> {
        self.renderer.render(content, data)
    }

    /// メールを送信する
    ///
    /// 本文がテンプレートの場合はレンダリングしてから送信する。
    /// レンダリングの失敗も送信失敗として返す。
    #[tracing::instrument(skip_all, fields(recipient = %params.recipient))]
    pub async fn send(&self, params: SendParams) -> Result<(), MailError> {
        let html_body = match params.body {
            MailBody::Template { content, data } => self.renderer.render(&content, &data)?,
            MailBody::Rendered(body) => body,
        };

        let mail = OutgoingMail {
            from: params.from,
            sender_name: params.sender,
            to: params.recipient,
            subject: params.subject,
            html_body,
        };
        self.sender.send(&mail).await
    }
}
