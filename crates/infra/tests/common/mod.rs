//! テスト共通フィクスチャ
//!
//! DB を使用する統合テストで共通利用する集約生成ヘルパー。

// 各テストファイルが独立したクレートとしてコンパイルされるため、
// 使用しない関数に dead_code 警告が出る。モジュール全体で抑制する。
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use postman_domain::{
    clock::FixedClock,
    email::{Email, EmailData, EmailState, NewEmail},
    factory::AggregateFactory,
    template::{NewTemplate, Template},
};

/// テスト用の固定時刻
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap()
}

pub fn factory() -> AggregateFactory {
    AggregateFactory::new(Arc::new(FixedClock::new(test_now())))
}

pub fn welcome_template(subject: &str) -> Template {
    factory()
        .new_template(NewTemplate {
            subject:      subject.to_string(),
            content:      "Hello {{name}}".to_string(),
            placeholders: vec!["name".to_string()],
        })
        .unwrap()
}

pub fn email_for(template: &Template, state: EmailState) -> Email {
    factory()
        .new_email(NewEmail {
            recipient: "ada@example.com".to_string(),
            sender:    Some("Postman".to_string()),
            from:      "noreply@example.com".to_string(),
            subject:   template.subject().to_string(),
            template:  template.id().clone(),
            data:      EmailData::from([("name".to_string(), serde_json::json!("Ada"))]),
            message:   "Hello Ada".to_string(),
            state,
        })
        .unwrap()
}
