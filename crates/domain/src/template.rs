//! # テンプレート集約
//!
//! 件名と本文（名前付きプレースホルダを含む Tera 構文）を持つ、再利用可能なメッセージの雛形。
//!
//! ## ドメイン用語
//!
//! | 型 | 用途 |
//! |---|------|
//! | [`Template`] | 集約本体。フィールドは非公開で、変更は [`Template::apply_changes`] のみ |
//! | [`NewTemplate`] | `New` モード（初回生成）の入力 |
//! | [`TemplateParams`] | `Existing` モード（復元）の入力。全フィールドが任意で、欠損は検証で弾く |
//! | [`TemplatePublic`] | 公開射影。イベントペイロード・読み取りストアのドキュメント・API レスポンスで共通 |
//! | [`TemplateChanges`] | Update コマンドで適用する変更（空の項目は既存値を維持） |
//!
//! ## 不変条件
//!
//! - subject と content は空にならない
//! - subject は有効なテンプレート間で一意（Update コマンドの事前チェックと書き込みストアの一意制約で担保）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateMeta;

define_uuid_id! {
    /// テンプレート ID
    pub struct TemplateId;
}

/// テンプレート集約
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    meta:         AggregateMeta<TemplateId>,
    subject:      String,
    content:      String,
    placeholders: Vec<String>,
}

/// 新規テンプレートの入力
#[derive(Debug, Clone, Default)]
pub struct NewTemplate {
    pub subject:      String,
    pub content:      String,
    pub placeholders: Vec<String>,
}

/// テンプレートの復元用パラメータ
///
/// イベントペイロードのデシリアライズ先。必須項目の欠損はデシリアライズではなく
/// ファクトリの `Existing` 検証で `Validation` エラーになる。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateParams {
    pub id:           Option<String>,
    pub subject:      Option<String>,
    pub content:      Option<String>,
    pub placeholders: Option<Vec<String>>,
    pub version:      Option<u32>,
    pub created_at:   Option<DateTime<Utc>>,
    pub updated_at:   Option<DateTime<Utc>>,
    pub deleted_at:   Option<DateTime<Utc>>,
}

/// テンプレートの公開射影
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePublic {
    pub id:           String,
    pub subject:      String,
    pub content:      String,
    pub placeholders: Vec<String>,
    pub version:      u32,
    pub created_at:   DateTime<Utc>,
    pub updated_at:   DateTime<Utc>,
    pub deleted_at:   Option<DateTime<Utc>>,
}

/// Update コマンドで適用する変更
///
/// `None` または空白のみの subject / content は「変更しない」を意味する。
/// `placeholders` は `Some` の場合にリストを置き換える。
#[derive(Debug, Clone, Default)]
pub struct TemplateChanges {
    pub subject:      Option<String>,
    pub content:      Option<String>,
    pub placeholders: Option<Vec<String>>,
}

impl TemplateChanges {
    /// 変更適用後の content を返す（空の場合は既存値）
    pub fn effective_content<'a>(&'a self, current: &'a str) -> &'a str {
        non_blank(self.content.as_deref()).unwrap_or(current)
    }

    /// 変更適用後の placeholders を返す
    pub fn effective_placeholders<'a>(&'a self, current: &'a [String]) -> &'a [String] {
        self.placeholders.as_deref().unwrap_or(current)
    }

    /// 変更適用後の subject を返す（空の場合は `None`）
    pub fn requested_subject(&self) -> Option<&str> {
        non_blank(self.subject.as_deref())
    }
}

/// 空白のみの値は未指定として扱う（値自体は加工しない）
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl Template {
    /// 検証済みの値から集約を組み立てる
    ///
    /// 通常は [`AggregateFactory`](crate::factory::AggregateFactory) を経由する。
    /// 書き込みストアの行からの復元にも使う。
    pub fn from_parts(
        meta: AggregateMeta<TemplateId>,
        subject: String,
        content: String,
        placeholders: Vec<String>,
    ) -> Self {
        Self {
            meta,
            subject,
            content,
            placeholders,
        }
    }

    /// 空でない項目のみを適用し、`updated_at` を進める
    pub fn apply_changes(&mut self, changes: TemplateChanges, now: DateTime<Utc>) {
        if let Some(subject) = non_blank(changes.subject.as_deref()) {
            self.subject = subject.to_string();
        }
        if let Some(content) = non_blank(changes.content.as_deref()) {
            self.content = content.to_string();
        }
        if let Some(placeholders) = changes.placeholders {
            self.placeholders = normalize_placeholders(placeholders);
        }
        self.meta.touch(now);
    }

    pub fn public(&self) -> TemplatePublic {
        TemplatePublic {
            id:           self.meta.id().to_string(),
            subject:      self.subject.clone(),
            content:      self.content.clone(),
            placeholders: self.placeholders.clone(),
            version:      self.meta.version().as_u32(),
            created_at:   self.meta.created_at(),
            updated_at:   self.meta.updated_at(),
            deleted_at:   self.meta.deleted_at(),
        }
    }

    pub fn id(&self) -> &TemplateId {
        self.meta.id()
    }

    pub fn meta(&self) -> &AggregateMeta<TemplateId> {
        &self.meta
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }
}

impl From<TemplatePublic> for TemplateParams {
    fn from(public: TemplatePublic) -> Self {
        Self {
            id:           Some(public.id),
            subject:      Some(public.subject),
            content:      Some(public.content),
            placeholders: Some(public.placeholders),
            version:      Some(public.version),
            created_at:   Some(public.created_at),
            updated_at:   Some(public.updated_at),
            deleted_at:   public.deleted_at,
        }
    }
}

/// プレースホルダ名の前後空白を除去し、空の要素を捨てる
pub(crate) fn normalize_placeholders(placeholders: Vec<String>) -> Vec<String> {
    placeholders
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
    }

    fn welcome() -> Template {
        Template::from_parts(
            AggregateMeta::new(TemplateId::new(), now()),
            "Welcome".to_string(),
            "Hello {{name}}".to_string(),
            vec!["name".to_string()],
        )
    }

    #[test]
    fn test_apply_changes_空の項目は既存値を維持する() {
        let mut template = welcome();
        let later = now() + Duration::hours(1);

        template.apply_changes(
            TemplateChanges {
                subject:      Some("   ".to_string()),
                content:      None,
                placeholders: None,
            },
            later,
        );

        assert_eq!(template.subject(), "Welcome");
        assert_eq!(template.content(), "Hello {{name}}");
        assert_eq!(template.meta().updated_at(), later);
        assert_eq!(template.meta().version().as_u32(), 2);
    }

    #[test]
    fn test_apply_changes_指定された項目を置き換える() {
        let mut template = welcome();

        template.apply_changes(
            TemplateChanges {
                subject:      Some("Hi".to_string()),
                content:      Some("Hi {{ first }} {{ last }}".to_string()),
                placeholders: Some(vec![" first".to_string(), "last ".to_string()]),
            },
            now(),
        );

        assert_eq!(template.subject(), "Hi");
        assert_eq!(template.content(), "Hi {{ first }} {{ last }}");
        assert_eq!(template.placeholders(), ["first", "last"]);
    }

    #[test]
    fn test_apply_changes_本文の前後の空白を保つ() {
        let mut template = welcome();

        template.apply_changes(
            TemplateChanges {
                content: Some("\n  Hello {{name}}\n".to_string()),
                ..Default::default()
            },
            now(),
        );

        assert_eq!(template.content(), "\n  Hello {{name}}\n");
        assert_eq!(
            TemplateChanges {
                content: Some(" x ".to_string()),
                ..Default::default()
            }
            .effective_content("current"),
            " x "
        );
    }

    #[test]
    fn test_publicはcamel_caseでシリアライズされる() {
        let template = welcome();
        let json = serde_json::to_value(template.public()).unwrap();

        assert_eq!(json["subject"], "Welcome");
        assert_eq!(json["placeholders"], serde_json::json!(["name"]));
        assert_eq!(json["version"], 1);
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
        assert!(json["deletedAt"].is_null());
    }

    #[test]
    fn test_paramsは欠損フィールドを含むペイロードでもデシリアライズできる() {
        let params: TemplateParams =
            serde_json::from_str(r#"{"subject":"Welcome","content":"Hi"}"#).unwrap();

        assert_eq!(params.subject.as_deref(), Some("Welcome"));
        assert!(params.id.is_none());
        assert!(params.created_at.is_none());
    }

    #[test]
    fn test_effective_contentは空のcontentで既存値を返す() {
        let changes = TemplateChanges {
            content: Some(String::new()),
            ..Default::default()
        };

        assert_eq!(changes.effective_content("current"), "current");
        assert!(changes.requested_subject().is_none());
    }
}
