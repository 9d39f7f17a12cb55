//! # ドメインイベント
//!
//! 書き込み側の変更を読み取り側へ伝える唯一の経路。同期的な二重書き込みは行わない。
//!
//! イベントは集約ごとの閉じた列挙型で表現し、購読側は `match` で振り分ける。
//! ペイロードは集約の公開射影と同じ JSON 形状を持つが、受信側では
//! [`TemplateParams`] / [`EmailParams`] にデシリアライズし、欠損は
//! ファクトリの `Existing` 検証で検出する。

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter};

use crate::{
    email::{EmailData, EmailParams},
    template::TemplateParams,
};

/// イベント名（バス上の安定した識別子）
pub mod names {
    pub const TEMPLATE_CREATED: &str = "template.created.command";
    pub const TEMPLATE_UPDATED: &str = "template.updated.command";
    pub const TEMPLATE_DELETED: &str = "template.deleted.command";

    pub const EMAIL_CREATED: &str = "email.created.command";
    pub const EMAIL_UPDATED: &str = "email.updated.command";
    pub const EMAIL_DELETED: &str = "email.deleted.command";

    /// 他サービスからの非同期メール送信要求
    pub const SEND_MAIL: &str = "postman.email.send-mail.event";
}

/// イベント種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

// =========================================================================
// TemplateEvent
// =========================================================================

/// テンプレートのドメインイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateEvent {
    Created(TemplateParams),
    Updated(TemplateParams),
    Deleted(TemplateParams),
}

impl TemplateEvent {
    pub fn new(kind: EventKind, params: TemplateParams) -> Self {
        match kind {
            EventKind::Created => Self::Created(params),
            EventKind::Updated => Self::Updated(params),
            EventKind::Deleted => Self::Deleted(params),
        }
    }

    /// イベント名から種別を解決する（テンプレートのイベント名でなければ `None`）
    pub fn kind_of(name: &str) -> Option<EventKind> {
        match name {
            names::TEMPLATE_CREATED => Some(EventKind::Created),
            names::TEMPLATE_UPDATED => Some(EventKind::Updated),
            names::TEMPLATE_DELETED => Some(EventKind::Deleted),
            _ => None,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Created(_) => EventKind::Created,
            Self::Updated(_) => EventKind::Updated,
            Self::Deleted(_) => EventKind::Deleted,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.kind() {
            EventKind::Created => names::TEMPLATE_CREATED,
            EventKind::Updated => names::TEMPLATE_UPDATED,
            EventKind::Deleted => names::TEMPLATE_DELETED,
        }
    }

    pub fn params(&self) -> &TemplateParams {
        match self {
            Self::Created(params) | Self::Updated(params) | Self::Deleted(params) => params,
        }
    }

    pub fn into_params(self) -> TemplateParams {
        match self {
            Self::Created(params) | Self::Updated(params) | Self::Deleted(params) => params,
        }
    }

    /// バスに載せる JSON ペイロード
    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self.params())
    }
}

// =========================================================================
// EmailEvent
// =========================================================================

/// メールのドメインイベント
#[derive(Debug, Clone, PartialEq)]
pub enum EmailEvent {
    Created(EmailParams),
    Updated(EmailParams),
    Deleted(EmailParams),
}

impl EmailEvent {
    pub fn new(kind: EventKind, params: EmailParams) -> Self {
        match kind {
            EventKind::Created => Self::Created(params),
            EventKind::Updated => Self::Updated(params),
            EventKind::Deleted => Self::Deleted(params),
        }
    }

    pub fn kind_of(name: &str) -> Option<EventKind> {
        match name {
            names::EMAIL_CREATED => Some(EventKind::Created),
            names::EMAIL_UPDATED => Some(EventKind::Updated),
            names::EMAIL_DELETED => Some(EventKind::Deleted),
            _ => None,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Created(_) => EventKind::Created,
            Self::Updated(_) => EventKind::Updated,
            Self::Deleted(_) => EventKind::Deleted,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.kind() {
            EventKind::Created => names::EMAIL_CREATED,
            EventKind::Updated => names::EMAIL_UPDATED,
            EventKind::Deleted => names::EMAIL_DELETED,
        }
    }

    pub fn params(&self) -> &EmailParams {
        match self {
            Self::Created(params) | Self::Updated(params) | Self::Deleted(params) => params,
        }
    }

    pub fn into_params(self) -> EmailParams {
        match self {
            Self::Created(params) | Self::Updated(params) | Self::Deleted(params) => params,
        }
    }

    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self.params())
    }
}

// =========================================================================
// SendMailEvent
// =========================================================================

/// 外部サービスから受け取るメール送信要求
///
/// Email の Create コマンドと同じ入力を持つ。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendMailEvent {
    pub recipient: String,
    pub sender:    Option<String>,
    pub data:      EmailData,
    pub template:  String,
    pub from:      String,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;

    #[rstest]
    #[case(names::TEMPLATE_CREATED, Some(EventKind::Created))]
    #[case(names::TEMPLATE_UPDATED, Some(EventKind::Updated))]
    #[case(names::TEMPLATE_DELETED, Some(EventKind::Deleted))]
    #[case(names::EMAIL_CREATED, None)]
    #[case(names::SEND_MAIL, None)]
    fn test_template_event_kind_of_イベント名から種別を解決する(
        #[case] name: &str,
        #[case] expected: Option<EventKind>,
    ) {
        assert_eq!(TemplateEvent::kind_of(name), expected);
    }

    #[test]
    fn test_nameとkind_ofは全種別で対応している() {
        for kind in EventKind::iter() {
            let template = TemplateEvent::new(kind, TemplateParams::default());
            let email = EmailEvent::new(kind, EmailParams::default());

            assert_eq!(TemplateEvent::kind_of(template.name()), Some(kind));
            assert_eq!(EmailEvent::kind_of(email.name()), Some(kind));
        }
    }

    #[test]
    fn test_イベント名は集約名とアクションで構成される() {
        assert_eq!(
            EmailEvent::Updated(EmailParams::default()).name(),
            "email.updated.command"
        );
        assert_eq!(
            TemplateEvent::Deleted(TemplateParams::default()).name(),
            "template.deleted.command"
        );
    }

    #[test]
    fn test_send_mail_eventは任意項目を省略してデシリアライズできる() {
        let event: SendMailEvent = serde_json::from_str(
            r#"{"recipient":"a@b.com","template":"t-1","from":"x@y.com","data":{"name":"Ada"}}"#,
        )
        .unwrap();

        assert_eq!(event.recipient, "a@b.com");
        assert!(event.sender.is_none());
        assert_eq!(event.data["name"], "Ada");
    }
}
