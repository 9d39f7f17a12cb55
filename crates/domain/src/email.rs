//! # メール集約
//!
//! 1 回のメール送信試行とその結果を表す。
//!
//! ## 状態遷移
//!
//! 「送信待ち」状態は存在しない。永続化されたメールは必ず送信試行を終えている。
//!
//! ```text
//! Create ──送信成功──→ Complete
//!    └────送信失敗──→ Failed ──Resend 成功──→ Complete
//!                        └────Resend 失敗──→ Failed
//! ```
//!
//! `Complete` からの再送は [`DomainError::AlreadyComplete`] で拒否する
//! （[`Email::ensure_resendable`]）。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{DomainError, aggregate::AggregateMeta, template::TemplateId};

define_uuid_id! {
    /// メール ID
    pub struct EmailId;
}

/// プレースホルダを埋めるためのデータ（キー順を安定させるため BTreeMap）
pub type EmailData = BTreeMap<String, serde_json::Value>;

/// 送信状態
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum EmailState {
    /// 送信に失敗した（再送可能）
    Failed,
    /// 送信に成功した
    Complete,
}

impl EmailState {
    /// 送信結果から状態を決定する
    pub fn from_delivery(delivered: bool) -> Self {
        if delivered { Self::Complete } else { Self::Failed }
    }
}

/// メール集約
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    meta:      AggregateMeta<EmailId>,
    recipient: String,
    sender:    Option<String>,
    from:      String,
    subject:   String,
    template:  TemplateId,
    data:      EmailData,
    message:   String,
    state:     EmailState,
}

/// 新規メールの入力
///
/// subject はテンプレートから解決済み、message はレンダリング済み、
/// state は送信試行の結果であること。
#[derive(Debug, Clone)]
pub struct NewEmail {
    pub recipient: String,
    pub sender:    Option<String>,
    pub from:      String,
    pub subject:   String,
    pub template:  TemplateId,
    pub data:      EmailData,
    pub message:   String,
    pub state:     EmailState,
}

/// メールの復元用パラメータ
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailParams {
    pub id:         Option<String>,
    pub recipient:  Option<String>,
    pub sender:     Option<String>,
    pub from:       Option<String>,
    pub subject:    Option<String>,
    pub template:   Option<String>,
    pub data:       Option<EmailData>,
    pub message:    Option<String>,
    #[serde(rename = "status")]
    pub state:      Option<EmailState>,
    pub version:    Option<u32>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// メールの公開射影
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailPublic {
    pub id:         String,
    pub recipient:  String,
    pub sender:     Option<String>,
    pub from:       String,
    pub subject:    String,
    pub template:   String,
    pub data:       EmailData,
    pub message:    String,
    pub status:     EmailState,
    pub version:    u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Email {
    /// 検証済みの値から集約を組み立てる
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        meta: AggregateMeta<EmailId>,
        recipient: String,
        sender: Option<String>,
        from: String,
        subject: String,
        template: TemplateId,
        data: EmailData,
        message: String,
        state: EmailState,
    ) -> Self {
        Self {
            meta,
            recipient,
            sender,
            from,
            subject,
            template,
            data,
            message,
            state,
        }
    }

    /// 再送可能か検証する
    ///
    /// # エラー
    ///
    /// 既に `Complete` の場合は `DomainError::AlreadyComplete`
    pub fn ensure_resendable(&self) -> Result<(), DomainError> {
        if self.is_complete() {
            return Err(DomainError::AlreadyComplete {
                id: self.id().to_string(),
            });
        }
        Ok(())
    }

    /// 送信試行の結果を記録する
    pub fn record_delivery(&mut self, state: EmailState, now: DateTime<Utc>) {
        self.state = state;
        self.meta.touch(now);
    }

    pub fn is_complete(&self) -> bool {
        self.state == EmailState::Complete
    }

    pub fn public(&self) -> EmailPublic {
        EmailPublic {
            id:         self.meta.id().to_string(),
            recipient:  self.recipient.clone(),
            sender:     self.sender.clone(),
            from:       self.from.clone(),
            subject:    self.subject.clone(),
            template:   self.template.to_string(),
            data:       self.data.clone(),
            message:    self.message.clone(),
            status:     self.state,
            version:    self.meta.version().as_u32(),
            created_at: self.meta.created_at(),
            updated_at: self.meta.updated_at(),
            deleted_at: self.meta.deleted_at(),
        }
    }

    pub fn id(&self) -> &EmailId {
        self.meta.id()
    }

    pub fn meta(&self) -> &AggregateMeta<EmailId> {
        &self.meta
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    pub fn from_address(&self) -> &str {
        &self.from
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn template(&self) -> &TemplateId {
        &self.template
    }

    pub fn data(&self) -> &EmailData {
        &self.data
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn state(&self) -> EmailState {
        self.state
    }
}

impl From<EmailPublic> for EmailParams {
    fn from(public: EmailPublic) -> Self {
        Self {
            id:         Some(public.id),
            recipient:  Some(public.recipient),
            sender:     public.sender,
            from:       Some(public.from),
            subject:    Some(public.subject),
            template:   Some(public.template),
            data:       Some(public.data),
            message:    Some(public.message),
            state:      Some(public.status),
            version:    Some(public.version),
            created_at: Some(public.created_at),
            updated_at: Some(public.updated_at),
            deleted_at: public.deleted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
    }

    fn email_with(state: EmailState) -> Email {
        Email::from_parts(
            AggregateMeta::new(EmailId::new(), now()),
            "a@b.com".to_string(),
            None,
            "x@y.com".to_string(),
            "Welcome".to_string(),
            TemplateId::new(),
            EmailData::from([("name".to_string(), serde_json::json!("Ada"))]),
            "Hello Ada".to_string(),
            state,
        )
    }

    #[rstest]
    #[case(true, EmailState::Complete)]
    #[case(false, EmailState::Failed)]
    fn test_from_delivery_送信結果から状態を決定する(
        #[case] delivered: bool,
        #[case] expected: EmailState,
    ) {
        assert_eq!(EmailState::from_delivery(delivered), expected);
    }

    #[test]
    fn test_ensure_resendable_completeのメールは拒否される() {
        let email = email_with(EmailState::Complete);

        let result = email.ensure_resendable();

        assert!(matches!(result, Err(DomainError::AlreadyComplete { .. })));
    }

    #[test]
    fn test_ensure_resendable_failedのメールは許可される() {
        assert!(email_with(EmailState::Failed).ensure_resendable().is_ok());
    }

    #[test]
    fn test_record_delivery_状態を更新しバージョンを進める() {
        let mut email = email_with(EmailState::Failed);
        let later = now() + Duration::minutes(10);

        email.record_delivery(EmailState::Complete, later);

        assert!(email.is_complete());
        assert_eq!(email.meta().updated_at(), later);
        assert_eq!(email.meta().created_at(), now());
        assert_eq!(email.meta().version().as_u32(), 2);
    }

    #[test]
    fn test_publicのstatusフィールドは状態名で出力される() {
        let json = serde_json::to_value(email_with(EmailState::Failed).public()).unwrap();

        assert_eq!(json["status"], "Failed");
        assert_eq!(json["data"]["name"], "Ada");
        assert_eq!(json["recipient"], "a@b.com");
        assert!(json["sender"].is_null());
    }

    #[test]
    fn test_email_stateは文字列と相互変換できる() {
        assert_eq!(EmailState::Complete.as_ref(), "Complete");
        assert_eq!(EmailState::from_str("Failed").unwrap(), EmailState::Failed);
        assert!(EmailState::from_str("Pending").is_err());
    }
}
