//! # ファセットクエリ
//!
//! 読み取りストアに対する問い合わせの形状。1 リクエストに名前付きの
//! ファセット（サブクエリ）を複数含められ、結果はファセット名ごとに返る。
//!
//! 各ファセットは次の順で評価される:
//!
//! ```text
//! filters → computed → group_by / aggregations → sort → skip → limit
//! ```
//!
//! フィールドは公開射影の JSON キーをドット区切りで指定する（例: `data.name`）。
//! コア層はこの構造を組み立てて読み取りリポジトリへ渡すだけで、解釈はしない。
//!
//! ```json
//! {
//!   "facets": {
//!     "failed": {
//!       "filters": [{ "field": "status", "op": "eq", "value": "Failed" }],
//!       "sort": [{ "field": "createdAt", "direction": "desc" }],
//!       "limit": 20
//!     },
//!     "byTemplate": {
//!       "groupBy": {
//!         "fields": ["template"],
//!         "aggregations": [{ "name": "total", "op": "count" }]
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::DomainError;

/// limit 未指定時の件数
pub const DEFAULT_LIMIT: u32 = 100;
/// limit の上限
pub const MAX_LIMIT: u32 = 1000;

/// ファセットクエリ要求
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetRequest {
    pub facets: BTreeMap<String, Facet>,
}

/// 1 つのファセット
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Facet {
    pub filters:  Vec<Filter>,
    pub group_by: Option<GroupBy>,
    pub computed: Vec<ComputedField>,
    pub sort:     Vec<SortField>,
    pub skip:     Option<u32>,
    pub limit:    Option<u32>,
}

/// フィールド条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op:    FilterOp,
    pub value: serde_json::Value,
}

/// 比較演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Ne,
    In,
    Nin,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// グループ化と集計
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupBy {
    pub fields:       Vec<String>,
    pub aggregations: Vec<Aggregation>,
}

/// 集計項目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// 結果に出力するキー
    pub name:  String,
    pub op:    AggregateOp,
    /// `count` 以外では必須
    #[serde(default)]
    pub field: Option<String>,
}

/// 集計関数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AggregateOp {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

/// 計算フィールド
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedField {
    /// 結果に追加するキー
    pub name:     String,
    pub op:       ComputedOp,
    pub operands: Vec<Operand>,
}

/// 計算フィールドの演算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComputedOp {
    // 算術
    Add,
    Subtract,
    Multiply,
    Divide,
    // 文字列
    Concat,
    Upper,
    Lower,
    // 日付
    Year,
    Month,
    Day,
}

/// 演算のオペランド数の制約
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl ComputedOp {
    pub fn arity(self) -> Arity {
        match self {
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide => Arity::Exactly(2),
            Self::Concat => Arity::AtLeast(1),
            Self::Upper | Self::Lower | Self::Year | Self::Month | Self::Day => Arity::Exactly(1),
        }
    }
}

/// オペランド: `{"field": "data.count"}` または `{"value": 3}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operand {
    Field(String),
    Value(serde_json::Value),
}

/// 並び順
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field:     String,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[strum(serialize = "ASC")]
    Asc,
    #[strum(serialize = "DESC")]
    Desc,
}

impl FacetRequest {
    /// 単一ファセットの要求を作る
    pub fn single(name: impl Into<String>, facet: Facet) -> Self {
        Self {
            facets: BTreeMap::from([(name.into(), facet)]),
        }
    }

    /// 要求全体を検証する
    ///
    /// # エラー
    ///
    /// 最初に見つかった違反を `DomainError::Validation` で返す。
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.facets.is_empty() {
            return Err(invalid("facets must not be empty"));
        }
        for (name, facet) in &self.facets {
            if !is_identifier(name) {
                return Err(invalid(format!("facet name `{name}` is not an identifier")));
            }
            facet
                .validate()
                .map_err(|e| prefix_facet_error(name, e))?;
        }
        Ok(())
    }
}

impl Facet {
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push(SortField {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// 実際に適用する limit
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.limit.is_some_and(|limit| limit > MAX_LIMIT) {
            return Err(invalid(format!("limit must be at most {MAX_LIMIT}")));
        }

        for filter in &self.filters {
            ensure_path(&filter.field)?;
            if matches!(filter.op, FilterOp::In | FilterOp::Nin) && !filter.value.is_array() {
                return Err(invalid(format!(
                    "`{}` requires an array value for field `{}`",
                    filter.op, filter.field
                )));
            }
        }

        for computed in &self.computed {
            if !is_identifier(&computed.name) {
                return Err(invalid(format!(
                    "computed field name `{}` is not an identifier",
                    computed.name
                )));
            }
            let count = computed.operands.len();
            let arity_ok = match computed.op.arity() {
                Arity::Exactly(n) => count == n,
                Arity::AtLeast(n) => count >= n,
            };
            if !arity_ok {
                return Err(invalid(format!(
                    "computed field `{}` has {count} operand(s), which `{}` does not accept",
                    computed.name, computed.op
                )));
            }
            for operand in &computed.operands {
                if let Operand::Field(path) = operand {
                    ensure_path(path)?;
                }
            }
        }

        if let Some(group_by) = &self.group_by {
            if group_by.fields.is_empty() && group_by.aggregations.is_empty() {
                return Err(invalid("groupBy requires fields or aggregations"));
            }
            for field in &group_by.fields {
                ensure_path(field)?;
            }
            for aggregation in &group_by.aggregations {
                if !is_identifier(&aggregation.name) || aggregation.name == "_id" {
                    return Err(invalid(format!(
                        "aggregation name `{}` is not allowed",
                        aggregation.name
                    )));
                }
                match (&aggregation.field, aggregation.op) {
                    (Some(field), _) => ensure_path(field)?,
                    (None, AggregateOp::Count) => {}
                    (None, op) => {
                        return Err(invalid(format!(
                            "aggregation `{}` with `{op}` requires a field",
                            aggregation.name
                        )));
                    }
                }
            }
        }

        for sort in &self.sort {
            ensure_path(&sort.field)?;
        }

        Ok(())
    }
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }
}

/// ドット区切りのパスを構成要素に分解する（検証済みであること）
pub fn path_segments(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

fn ensure_path(path: &str) -> Result<(), DomainError> {
    if !path.is_empty() && path.split('.').all(is_identifier) {
        Ok(())
    } else {
        Err(invalid(format!("field `{path}` is not a valid path")))
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn invalid(message: impl Into<String>) -> DomainError {
    DomainError::Validation(message.into())
}

fn prefix_facet_error(name: &str, error: DomainError) -> DomainError {
    match error {
        DomainError::Validation(message) => invalid(format!("facet `{name}`: {message}")),
        other => other,
    }
}
