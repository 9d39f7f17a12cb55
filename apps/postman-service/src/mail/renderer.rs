//! # テンプレートレンダラー
//!
//! tera でテンプレート本文をレンダリングし、本文が参照する変数名を抽出する。
//!
//! 変数名は tera がパースした AST から集める。`{% for %}` のループ変数・`loop`・
//! `{% set %}` で束縛した名前はコンテキストから来ないので除外し、
//! `{% if %}` の条件や `{% for %}` の対象、フィルタ引数に現れる変数も拾う。
//!
//! テンプレートはデータベースに保存された文字列なので、`include_str!` ではなく
//! `Tera::one_off` でその都度レンダリングする。自動エスケープは行わない
//! （本文の HTML はテンプレート作成者の責任）。

use std::collections::BTreeSet;

use postman_domain::{email::EmailData, mail::MailError};
use regex::Regex;
use tera::{
    Context,
    Template,
    Tera,
    ast::{Expr, ExprVal, FunctionCall, Node},
};

/// テンプレートレンダラー
pub struct TemplateRenderer {
    identifier: Regex,
}

impl TemplateRenderer {
    pub fn new() -> Result<Self, MailError> {
        let identifier = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .map_err(|e| MailError::TemplateFailed(e.to_string()))?;
        Ok(Self { identifier })
    }

    /// 本文がコンテキストから参照するトップレベルの変数名
    ///
    /// `{{ user.name }}` は `user` として数える。
    pub fn variables(&self, content: &str) -> Result<BTreeSet<String>, MailError> {
        let template = Template::new("content", None, content)
            .map_err(|e| MailError::TemplateFailed(describe(&e)))?;

        let mut collector = VariableCollector::default();
        collector.nodes(&template.ast);
        Ok(collector.found)
    }

    pub fn is_identifier(&self, name: &str) -> bool {
        self.identifier.is_match(name)
    }

    /// tera の構文として解釈できるか検査する
    pub fn check_syntax(&self, content: &str) -> Result<(), MailError> {
        Tera::default()
            .add_raw_template("content", content)
            .map_err(|e| MailError::TemplateFailed(describe(&e)))
    }

    /// 本文にデータを埋め込む
    pub fn render(&self, content: &str, data: &EmailData) -> Result<String, MailError> {
        let mut context = Context::new();
        for (key, value) in data {
            context.insert(key.as_str(), value);
        }

        Tera::one_off(content, &context, false).map_err(|e| MailError::TemplateFailed(describe(&e)))
    }
}

/// AST を辿り、束縛されていない識別子を集める
#[derive(Default)]
struct VariableCollector {
    found: BTreeSet<String>,
    /// 現在のスコープで束縛されている名前（ループ変数・set）
    bound: Vec<String>,
}

impl VariableCollector {
    fn nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.node(node);
        }
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::VariableBlock(_, expr) => self.expr(expr),
            Node::Set(_, set) => {
                self.expr(&set.value);
                self.bound.push(set.key.clone());
            }
            Node::FilterSection(_, section, _) => {
                self.call(&section.filter);
                self.nodes(&section.body);
            }
            Node::Block(_, block, _) => self.nodes(&block.body),
            Node::Forloop(_, forloop, _) => {
                self.expr(&forloop.container);

                let scope = self.bound.len();
                self.bound.push("loop".to_string());
                self.bound.push(forloop.value.clone());
                if let Some(key) = &forloop.key {
                    self.bound.push(key.clone());
                }
                self.nodes(&forloop.body);
                self.bound.truncate(scope);

                if let Some(empty_body) = &forloop.empty_body {
                    self.nodes(empty_body);
                }
            }
            Node::If(branches, _) => {
                for (_, condition, body) in &branches.conditions {
                    self.expr(condition);
                    self.nodes(body);
                }
                if let Some((_, body)) = &branches.otherwise {
                    self.nodes(body);
                }
            }
            // マクロの引数はマクロ内だけの名前なので辿らない
            _ => {}
        }
    }

    fn expr(&mut self, expr: &Expr) {
        self.value(&expr.val);
        for filter in &expr.filters {
            self.call(filter);
        }
    }

    fn call(&mut self, call: &FunctionCall) {
        for arg in call.args.values() {
            self.expr(arg);
        }
    }

    fn value(&mut self, value: &ExprVal) {
        match value {
            ExprVal::Ident(ident) => self.ident(ident),
            ExprVal::Math(math) => {
                self.expr(&math.lhs);
                self.expr(&math.rhs);
            }
            ExprVal::Logic(logic) => {
                self.expr(&logic.lhs);
                self.expr(&logic.rhs);
            }
            ExprVal::In(within) => {
                self.expr(&within.lhs);
                self.expr(&within.rhs);
            }
            ExprVal::Test(test) => {
                self.ident(&test.ident);
                for arg in &test.args {
                    self.expr(arg);
                }
            }
            ExprVal::FunctionCall(call) => self.call(call),
            ExprVal::MacroCall(call) => {
                for arg in call.args.values() {
                    self.expr(arg);
                }
            }
            ExprVal::Array(items) => {
                for item in items {
                    self.expr(item);
                }
            }
            ExprVal::StringConcat(concat) => {
                for value in &concat.values {
                    self.value(value);
                }
            }
            ExprVal::String(_) | ExprVal::Int(_) | ExprVal::Float(_) | ExprVal::Bool(_) => {}
        }
    }

    /// `user.name` / `items[0]` は先頭の `user` / `items` を変数名とする
    fn ident(&mut self, ident: &str) {
        let head = ident.split(['.', '[']).next().unwrap_or(ident);
        if head.is_empty() || head.starts_with("__tera") {
            return;
        }
        if !self.bound.iter().any(|name| name == head) {
            self.found.insert(head.to_string());
        }
    }
}

/// tera のエラーは原因がネストしているので、末端までの説明を連結する
fn describe(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn renderer() -> TemplateRenderer {
        TemplateRenderer::new().unwrap()
    }

    #[rstest]
    #[case("Hello {{name}}", &["name"])]
    #[case("Hi {{ first }} {{- last | upper }}", &["first", "last"])]
    #[case("{{ user.name }} / {{ user.email }}", &["user"])]
    #[case("no variables", &[])]
    #[case::literal("{{ true }} {{ 1 + 2 }} {{ \"x\" }}", &[])]
    #[case::for_loop("{% for item in items %}{{ item }}{{ loop.index }}{% endfor %}", &["items"])]
    #[case::for_key_value(
        "{% for key, value in headers %}{{ key }}={{ value }}{% endfor %}",
        &["headers"]
    )]
    #[case::loop_var_leaks_no_further(
        "{% for item in items %}{{ item }}{% endfor %}{{ item }}",
        &["item", "items"]
    )]
    #[case::if_condition("{% if vip %}Dear {{ name }}{% else %}Hi{% endif %}", &["name", "vip"])]
    #[case::set("{% set greeting = salutation ~ \" \" ~ name %}{{ greeting }}", &["name", "salutation"])]
    #[case::filter_argument("{{ amount | round(precision=digits) }}", &["amount", "digits"])]
    fn test_variables_本文から変数名を抽出する(#[case] content: &str, #[case] expected: &[&str]) {
        let variables = renderer().variables(content).unwrap();

        assert_eq!(
            variables.iter().map(String::as_str).collect::<Vec<_>>(),
            expected
        );
    }

    #[test]
    fn test_variables_構文エラーはエラーを返す() {
        assert!(matches!(
            renderer().variables("{% for item in items %}"),
            Err(MailError::TemplateFailed(_))
        ));
    }

    #[test]
    fn test_render_データを埋め込む() {
        let data = EmailData::from([("name".to_string(), serde_json::json!("Ada"))]);

        let rendered = renderer().render("Hello {{name}}", &data).unwrap();

        assert_eq!(rendered, "Hello Ada");
    }

    #[test]
    fn test_render_htmlはエスケープしない() {
        let data = EmailData::from([("link".to_string(), serde_json::json!("<a href=\"/x\">x</a>"))]);

        let rendered = renderer().render("<p>{{ link }}</p>", &data).unwrap();

        assert_eq!(rendered, "<p><a href=\"/x\">x</a></p>");
    }

    #[test]
    fn test_render_未定義の変数はエラー() {
        let result = renderer().render("Hello {{name}}", &EmailData::new());

        assert!(matches!(result, Err(MailError::TemplateFailed(_))));
    }

    #[test]
    fn test_check_syntax_閉じていないタグはエラー() {
        assert!(renderer().check_syntax("Hello {{ name").is_err());
        assert!(renderer().check_syntax("Hello {{ name }}").is_ok());
    }

    #[rstest]
    #[case("name", true)]
    #[case("_private1", true)]
    #[case("1st", false)]
    #[case("first name", false)]
    #[case("", false)]
    fn test_is_identifier(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(renderer().is_identifier(name), expected);
    }
}
