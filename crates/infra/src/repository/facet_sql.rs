//! # ファセット → SQL コンパイラ
//!
//! [`Facet`] を読み取りストア（JSONB ドキュメント列）に対する 1 本の SELECT に変換する。
//! フィールドパスと値はすべてバインドパラメータで渡し、SQL 文字列に埋め込むのは
//! 呼び出し元が決めるテーブル名だけ。
//!
//! ## 生成する SQL の形
//!
//! ```text
//! SELECT r.doc FROM (
//!     -- グループ化なし
//!     SELECT v.document || jsonb_build_object(<computed>) AS doc
//!     FROM <table> v WHERE v.deleted_at IS NULL AND <filters>
//!
//!     -- グループ化あり（上の射影を d として包む）
//!     SELECT jsonb_build_object('_id', jsonb_build_object(<key>, g.g0, ...), <agg>...) AS doc
//!     FROM (SELECT d.doc, d.doc #> <path> AS g0, ... FROM (...) d) g
//!     GROUP BY g.g0, ...
//! ) r
//! ORDER BY r.doc #> <path> ASC|DESC
//! LIMIT <limit> OFFSET <skip>
//! ```
//!
//! グループキーを列として切り出すのは、SELECT と GROUP BY で同じ式を
//! 別パラメータとして書くと PostgreSQL が同一式と認識しないため。

use postman_domain::query::{
    AggregateOp,
    Aggregation,
    ComputedField,
    ComputedOp,
    Facet,
    Filter,
    FilterOp,
    GroupBy,
    Operand,
    SortField,
    path_segments,
};
use sqlx::{Postgres, QueryBuilder, types::Json};

/// 投影先のテーブル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewTable {
    Templates,
    Emails,
}

impl ViewTable {
    pub fn name(self) -> &'static str {
        match self {
            Self::Templates => "template_views",
            Self::Emails => "email_views",
        }
    }
}

/// ファセットを SQL に変換する
///
/// 結果の各行は 1 列（`doc`, JSONB）。
pub fn build_facet_query(table: ViewTable, facet: &Facet) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT r.doc FROM (");

    match &facet.group_by {
        Some(group_by) => push_grouped(&mut qb, table, facet, group_by),
        None => push_projected(&mut qb, table, facet),
    }

    qb.push(") r");
    push_sort(&mut qb, &facet.sort);
    qb.push(" LIMIT ");
    qb.push_bind(i64::from(facet.effective_limit()));
    qb.push(" OFFSET ");
    qb.push_bind(i64::from(facet.skip.unwrap_or(0)));
    qb
}

/// filters → computed
///
/// 計算フィールドのオペランド数は [`FacetRequest::validate`](postman_domain::query::FacetRequest::validate)
/// で検証済みであること。合わない場合は `NULL` を出力する。
fn push_projected(qb: &mut QueryBuilder<'static, Postgres>, table: ViewTable, facet: &Facet) {
    qb.push("SELECT v.document");
    if !facet.computed.is_empty() {
        qb.push(" || jsonb_build_object(");
        for (i, computed) in facet.computed.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push_bind(computed.name.clone());
            qb.push("::text, ");
            push_computed(qb, computed);
        }
        qb.push(")");
    }
    qb.push(" AS doc FROM ");
    qb.push(table.name());
    qb.push(" v WHERE v.deleted_at IS NULL");

    for filter in &facet.filters {
        qb.push(" AND ");
        push_filter(qb, filter);
    }
}

/// group_by / aggregations
fn push_grouped(
    qb: &mut QueryBuilder<'static, Postgres>,
    table: ViewTable,
    facet: &Facet,
    group_by: &GroupBy,
) {
    qb.push("SELECT jsonb_build_object('_id', jsonb_build_object(");
    for (i, field) in group_by.fields.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push_bind(field.clone());
        qb.push(format!("::text, g.g{i}"));
    }
    qb.push(")");
    for aggregation in &group_by.aggregations {
        qb.push(", ");
        qb.push_bind(aggregation.name.clone());
        qb.push("::text, ");
        push_aggregation(qb, aggregation);
    }
    qb.push(") AS doc FROM (SELECT d.doc");
    for (i, field) in group_by.fields.iter().enumerate() {
        qb.push(", d.doc #> ");
        qb.push_bind(path_segments(field));
        qb.push(format!("::text[] AS g{i}"));
    }
    qb.push(" FROM (");
    push_projected(qb, table, facet);
    qb.push(") d) g");

    if !group_by.fields.is_empty() {
        let columns = (0..group_by.fields.len())
            .map(|i| format!("g.g{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        qb.push(" GROUP BY ");
        qb.push(columns);
    }
}

fn push_filter(qb: &mut QueryBuilder<'static, Postgres>, filter: &Filter) {
    let path = path_segments(&filter.field);
    let value = Json(filter.value.clone());

    let symbol = match filter.op {
        FilterOp::Eq => "=",
        // 欠損フィールドも「等しくない」に含める
        FilterOp::Ne => "IS DISTINCT FROM",
        FilterOp::Gt => ">",
        FilterOp::Gte => ">=",
        FilterOp::Lt => "<",
        FilterOp::Lte => "<=",
        FilterOp::In | FilterOp::Nin => {
            if filter.op == FilterOp::Nin {
                qb.push("NOT ");
            }
            qb.push("(");
            qb.push_bind(value);
            qb.push("::jsonb @> jsonb_build_array(v.document #> ");
            qb.push_bind(path);
            qb.push("::text[]))");
            return;
        }
    };

    qb.push("(v.document #> ");
    qb.push_bind(path);
    qb.push("::text[]) ");
    qb.push(symbol);
    qb.push(" ");
    qb.push_bind(value);
    qb.push("::jsonb");
}

fn push_computed(qb: &mut QueryBuilder<'static, Postgres>, computed: &ComputedField) {
    let operands = computed.operands.as_slice();
    match computed.op {
        ComputedOp::Add | ComputedOp::Subtract | ComputedOp::Multiply | ComputedOp::Divide => {
            let symbol = match computed.op {
                ComputedOp::Add => "+",
                ComputedOp::Subtract => "-",
                ComputedOp::Multiply => "*",
                _ => "/",
            };
            let [left, right] = operands else {
                qb.push("NULL");
                return;
            };
            qb.push("to_jsonb(");
            push_numeric(qb, left);
            qb.push(format!(" {symbol} "));
            if computed.op == ComputedOp::Divide {
                // 0 除算は NULL
                qb.push("NULLIF(");
                push_numeric(qb, right);
                qb.push(", 0)");
            } else {
                push_numeric(qb, right);
            }
            qb.push(")");
        }
        ComputedOp::Concat => {
            qb.push("to_jsonb(concat(");
            for (i, operand) in operands.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_text(qb, operand);
            }
            qb.push("))");
        }
        ComputedOp::Upper | ComputedOp::Lower => {
            let [operand] = operands else {
                qb.push("NULL");
                return;
            };
            qb.push(if computed.op == ComputedOp::Upper {
                "to_jsonb(upper("
            } else {
                "to_jsonb(lower("
            });
            push_text(qb, operand);
            qb.push("))");
        }
        ComputedOp::Year | ComputedOp::Month | ComputedOp::Day => {
            let unit = match computed.op {
                ComputedOp::Year => "year",
                ComputedOp::Month => "month",
                _ => "day",
            };
            let [operand] = operands else {
                qb.push("NULL");
                return;
            };
            qb.push(format!("to_jsonb(extract({unit} from "));
            push_text(qb, operand);
            qb.push("::timestamptz)::int)");
        }
    }
}

/// オペランドを text として取り出す
fn push_text(qb: &mut QueryBuilder<'static, Postgres>, operand: &Operand) {
    match operand {
        Operand::Field(path) => {
            qb.push("(v.document #>> ");
            qb.push_bind(path_segments(path));
            qb.push("::text[])");
        }
        Operand::Value(value) => {
            qb.push("(");
            qb.push_bind(Json(value.clone()));
            qb.push("::jsonb #>> '{}')");
        }
    }
}

fn push_numeric(qb: &mut QueryBuilder<'static, Postgres>, operand: &Operand) {
    push_text(qb, operand);
    qb.push("::numeric");
}

fn push_aggregation(qb: &mut QueryBuilder<'static, Postgres>, aggregation: &Aggregation) {
    let function = match aggregation.op {
        AggregateOp::Sum => "SUM",
        AggregateOp::Avg => "AVG",
        AggregateOp::Count => "COUNT",
        AggregateOp::Min => "MIN",
        AggregateOp::Max => "MAX",
    };

    match (&aggregation.field, aggregation.op) {
        (None, _) => {
            qb.push("to_jsonb(COUNT(*))");
        }
        (Some(field), AggregateOp::Count) => {
            qb.push("to_jsonb(COUNT(g.doc #> ");
            qb.push_bind(path_segments(field));
            qb.push("::text[]))");
        }
        (Some(field), _) => {
            qb.push(format!("to_jsonb({function}((g.doc #>> "));
            qb.push_bind(path_segments(field));
            qb.push("::text[])::numeric))");
        }
    }
}

fn push_sort(qb: &mut QueryBuilder<'static, Postgres>, sort: &[SortField]) {
    for (i, field) in sort.iter().enumerate() {
        qb.push(if i == 0 { " ORDER BY " } else { ", " });
        qb.push("r.doc #> ");
        qb.push_bind(path_segments(&field.field));
        qb.push(format!("::text[] {}", field.direction));
    }
}
