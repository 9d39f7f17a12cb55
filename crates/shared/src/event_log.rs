//! # ビジネスイベントログとエラーコンテキストの構造化ヘルパー
//!
//! `jq` で調査しやすいよう、ログフィールドの命名規約とヘルパーマクロを提供する。
//!
//! ## ビジネスイベント
//!
//! [`log_business_event!`] マクロで出力する。`event.kind = "business_event"` マーカーが
//! 自動付与され、`jq 'select(.["event.kind"] == "business_event")'` でフィルタできる。
//!
//! ## エラーコンテキスト
//!
//! `tracing::error!` に `error.category` + `error.kind` フィールドを直接追加する。
//! 定数は [`error`] モジュールで提供。

/// ビジネスイベントを構造化ログとして出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: [`event::category`] の定数
/// - `event.action`: [`event::action`] の定数
/// - `event.result`: [`event::result`] の定数
///
/// ## 推奨フィールド
///
/// - `event.entity_type`: [`event::entity_type`] の定数
/// - `event.entity_id`: 集約 ID
/// - `trace_id`: App ファサードが採番したトレース ID
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    pub mod category {
        pub const TEMPLATE: &str = "template";
        pub const EMAIL: &str = "email";
        pub const PROJECTION: &str = "projection";
    }

    pub mod action {
        // テンプレート
        pub const TEMPLATE_CREATED: &str = "template.created";
        pub const TEMPLATE_UPDATED: &str = "template.updated";
        pub const TEMPLATE_DELETED: &str = "template.deleted";

        // メール
        pub const EMAIL_CREATED: &str = "email.created";
        pub const EMAIL_RESENT: &str = "email.resent";
        pub const EMAIL_DELETED: &str = "email.deleted";
        pub const EMAIL_SEND_FAILED: &str = "email.send_failed";

        // 投影
        pub const VIEW_UPSERTED: &str = "view.upserted";
        pub const VIEW_DELETED: &str = "view.deleted";
    }

    pub mod entity_type {
        pub const TEMPLATE: &str = "template";
        pub const EMAIL: &str = "email";
    }

    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
    }
}

/// エラーコンテキストフィールドの定数
pub mod error {
    pub mod category {
        /// 入力・ビジネスルール違反
        pub const BUSINESS: &str = "business";
        /// データベース・メッセージバス
        pub const INFRASTRUCTURE: &str = "infrastructure";
        /// メール送信（SMTP / SES）
        pub const EXTERNAL_SERVICE: &str = "external_service";
    }

    pub mod kind {
        pub const VALIDATION: &str = "validation";
        pub const NOT_FOUND: &str = "not_found";
        pub const CONFLICT: &str = "conflict";
        pub const ALREADY_COMPLETE: &str = "already_complete";
        pub const DATABASE: &str = "database";
        pub const BUS: &str = "bus";
        pub const MAIL_SEND: &str = "mail_send";
        pub const DECODE: &str = "decode";
        pub const INTERNAL: &str = "internal";
    }
}
