//! # テスト用モック
//!
//! ユースケーステストで使用するインメモリ実装。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! postman-infra = { workspace = true, features = ["test-utils"] }
//! ```
//!
//! 書き込み系の呼び出し回数を数えるので、「送信 0 回」「書き込み 0 回」のような
//! スパイ的な検証にも使える。

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering},
    },
};

use async_trait::async_trait;
use postman_domain::{
    aggregate::Version,
    email::Email,
    mail::{MailError, OutgoingMail},
    query::{FacetRequest, Filter, FilterOp, SortDirection, path_segments},
    template::Template,
};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::{
    bus::{EventBus, EventHandler},
    error::InfraError,
    mail::MailSender,
    repository::{
        EmailLookup,
        EmailRepository,
        EmailViewRepository,
        FacetResult,
        TemplateLookup,
        TemplateRepository,
        TemplateViewRepository,
    },
};

// ===== MockTemplateRepository =====

#[derive(Clone, Default)]
pub struct MockTemplateRepository {
    templates:    Arc<Mutex<Vec<Template>>>,
    insert_calls: Arc<AtomicUsize>,
    update_calls: Arc<AtomicUsize>,
    delete_calls: Arc<AtomicUsize>,
}

impl MockTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 事前データを投入する（呼び出し回数には数えない）
    pub fn add_template(&self, template: Template) {
        self.templates.lock().unwrap().push(template);
    }

    pub fn templates(&self) -> Vec<Template> {
        self.templates.lock().unwrap().clone()
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl TemplateRepository for MockTemplateRepository {
    async fn insert(&self, template: &Template) -> Result<(), InfraError> {
        self.insert_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let mut templates = self.templates.lock().unwrap();
        if templates
            .iter()
            .any(|t| t.subject() == template.subject() && t.meta().deleted_at().is_none())
        {
            return Err(InfraError::conflict("Template", template.subject()));
        }
        templates.push(template.clone());
        Ok(())
    }

    async fn find_one(&self, lookup: &TemplateLookup) -> Result<Option<Template>, InfraError> {
        let templates = self.templates.lock().unwrap();
        let found = match lookup {
            TemplateLookup::ById(id) => templates.iter().find(|t| t.id() == id),
            TemplateLookup::BySubject(subject) => templates
                .iter()
                .find(|t| t.subject() == subject && t.meta().deleted_at().is_none()),
        };
        Ok(found.cloned())
    }

    async fn update(
        &self,
        template: &Template,
        expected_version: Version,
    ) -> Result<(), InfraError> {
        self.update_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let mut templates = self.templates.lock().unwrap();
        match templates
            .iter_mut()
            .find(|t| t.id() == template.id() && t.meta().version() == expected_version)
        {
            Some(stored) => {
                *stored = template.clone();
                Ok(())
            }
            None => Err(InfraError::conflict("Template", template.id().to_string())),
        }
    }

    async fn delete(&self, template: &Template) -> Result<(), InfraError> {
        self.delete_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let mut templates = self.templates.lock().unwrap();
        let before = templates.len();
        templates.retain(|t| t.id() != template.id());
        if templates.len() == before {
            return Err(InfraError::not_found("Template", template.id().to_string()));
        }
        Ok(())
    }
}

// ===== MockEmailRepository =====

#[derive(Clone, Default)]
pub struct MockEmailRepository {
    emails:       Arc<Mutex<Vec<Email>>>,
    insert_calls: Arc<AtomicUsize>,
    update_calls: Arc<AtomicUsize>,
    delete_calls: Arc<AtomicUsize>,
}

impl MockEmailRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_email(&self, email: Email) {
        self.emails.lock().unwrap().push(email);
    }

    pub fn emails(&self) -> Vec<Email> {
        self.emails.lock().unwrap().clone()
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl EmailRepository for MockEmailRepository {
    async fn insert(&self, email: &Email) -> Result<(), InfraError> {
        self.insert_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.emails.lock().unwrap().push(email.clone());
        Ok(())
    }

    async fn find_one(&self, lookup: &EmailLookup) -> Result<Option<Email>, InfraError> {
        let EmailLookup::ById(id) = lookup;
        Ok(self
            .emails
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id() == id)
            .cloned())
    }

    async fn update(&self, email: &Email, expected_version: Version) -> Result<(), InfraError> {
        self.update_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let mut emails = self.emails.lock().unwrap();
        match emails
            .iter_mut()
            .find(|e| e.id() == email.id() && e.meta().version() == expected_version)
        {
            Some(stored) => {
                *stored = email.clone();
                Ok(())
            }
            None => Err(InfraError::conflict("Email", email.id().to_string())),
        }
    }

    async fn delete(&self, email: &Email) -> Result<(), InfraError> {
        self.delete_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let mut emails = self.emails.lock().unwrap();
        let before = emails.len();
        emails.retain(|e| e.id() != email.id());
        if emails.len() == before {
            return Err(InfraError::not_found("Email", email.id().to_string()));
        }
        Ok(())
    }
}

// ===== 読み取りストアのモック =====

/// id → ビュー行 のインメモリビュー
///
/// 削除された行は墓標として残し、以降の投影では復活させない。
/// ファセットは filters（全演算子）・sort・skip・limit のみ評価する。
/// computed と groupBy は未対応で、指定すると `InvalidInput` を返す。
#[derive(Clone, Default)]
struct InMemoryViews {
    rows: Arc<Mutex<BTreeMap<String, ViewRow>>>,
}

struct ViewRow {
    version:  u32,
    document: Value,
    deleted:  bool,
}

impl InMemoryViews {
    fn upsert(&self, id: String, version: u32, document: Value) {
        let mut rows = self.rows.lock().unwrap();
        match rows.get(&id) {
            Some(row) if row.deleted || row.version > version => {}
            _ => {
                rows.insert(
                    id,
                    ViewRow {
                        version,
                        document,
                        deleted: false,
                    },
                );
            }
        }
    }

    fn mark_deleted(&self, id: String, version: u32, document: Value) {
        self.rows
            .lock()
            .unwrap()
            .entry(id)
            .and_modify(|row| row.deleted = true)
            .or_insert(ViewRow {
                version,
                document,
                deleted: true,
            });
    }

    fn get(&self, id: &str) -> Option<Value> {
        self.rows
            .lock()
            .unwrap()
            .get(id)
            .filter(|row| !row.deleted)
            .map(|row| row.document.clone())
    }

    fn len(&self) -> usize {
        self.rows
            .lock()
            .unwrap()
            .values()
            .filter(|row| !row.deleted)
            .count()
    }

    fn read_faceted(&self, request: &FacetRequest) -> Result<FacetResult, InfraError> {
        request
            .validate()
            .map_err(|e| InfraError::invalid_input(e.to_string()))?;

        let rows = self.rows.lock().unwrap();
        let mut results = FacetResult::new();
        for (name, facet) in &request.facets {
            if facet.group_by.is_some() || !facet.computed.is_empty() {
                return Err(InfraError::invalid_input(
                    "モックは groupBy / computed に対応していません",
                ));
            }

            let mut matched: Vec<Value> = rows
                .values()
                .filter(|row| !row.deleted)
                .map(|row| &row.document)
                .filter(|document| facet.filters.iter().all(|f| matches_filter(document, f)))
                .cloned()
                .collect();

            for sort in facet.sort.iter().rev() {
                let path = path_segments(&sort.field);
                matched.sort_by(|a, b| {
                    let ordering = compare(lookup(a, &path), lookup(b, &path));
                    match sort.direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                });
            }

            let skip = facet.skip.unwrap_or(0) as usize;
            let limit = facet.effective_limit() as usize;
            results.insert(
                name.clone(),
                matched.into_iter().skip(skip).take(limit).collect(),
            );
        }
        Ok(results)
    }
}

fn lookup<'a>(document: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(document, |current, segment| current.get(segment))
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

fn matches_filter(document: &Value, filter: &Filter) -> bool {
    let actual = lookup(document, &path_segments(&filter.field));
    let contains = || {
        filter
            .value
            .as_array()
            .is_some_and(|values| actual.is_some_and(|a| values.contains(a)))
    };
    match filter.op {
        FilterOp::Eq => actual == Some(&filter.value),
        FilterOp::Ne => actual != Some(&filter.value),
        FilterOp::In => contains(),
        FilterOp::Nin => !contains(),
        FilterOp::Gt => actual.is_some() && compare(actual, Some(&filter.value)).is_gt(),
        FilterOp::Gte => actual.is_some() && compare(actual, Some(&filter.value)).is_ge(),
        FilterOp::Lt => actual.is_some() && compare(actual, Some(&filter.value)).is_lt(),
        FilterOp::Lte => actual.is_some() && compare(actual, Some(&filter.value)).is_le(),
    }
}

#[derive(Clone, Default)]
pub struct MockTemplateViewRepository {
    views: InMemoryViews,
}

impl MockTemplateViewRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 投影済みドキュメントを取得する
    pub fn document(&self, id: &str) -> Option<Value> {
        self.views.get(id)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TemplateViewRepository for MockTemplateViewRepository {
    async fn create(&self, template: &Template) -> Result<(), InfraError> {
        self.update(template).await
    }

    async fn update(&self, template: &Template) -> Result<(), InfraError> {
        self.views.upsert(
            template.id().to_string(),
            template.meta().version().as_u32(),
            serde_json::to_value(template.public())?,
        );
        Ok(())
    }

    async fn delete(&self, template: &Template) -> Result<(), InfraError> {
        self.views.mark_deleted(
            template.id().to_string(),
            template.meta().version().as_u32(),
            serde_json::to_value(template.public())?,
        );
        Ok(())
    }

    async fn read_faceted(&self, request: &FacetRequest) -> Result<FacetResult, InfraError> {
        self.views.read_faceted(request)
    }
}

#[derive(Clone, Default)]
pub struct MockEmailViewRepository {
    views: InMemoryViews,
}

impl MockEmailViewRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self, id: &str) -> Option<Value> {
        self.views.get(id)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EmailViewRepository for MockEmailViewRepository {
    async fn create(&self, email: &Email) -> Result<(), InfraError> {
        self.update(email).await
    }

    async fn update(&self, email: &Email) -> Result<(), InfraError> {
        self.views.upsert(
            email.id().to_string(),
            email.meta().version().as_u32(),
            serde_json::to_value(email.public())?,
        );
        Ok(())
    }

    async fn delete(&self, email: &Email) -> Result<(), InfraError> {
        self.views.mark_deleted(
            email.id().to_string(),
            email.meta().version().as_u32(),
            serde_json::to_value(email.public())?,
        );
        Ok(())
    }

    async fn read_faceted(&self, request: &FacetRequest) -> Result<FacetResult, InfraError> {
        self.views.read_faceted(request)
    }
}

// ===== MockEventBus =====

/// 発行を記録するイベントバス
///
/// [`deliver_published`](MockEventBus::deliver_published) で、記録済みのイベントを
/// 同じ subject の購読ハンドラへ順に配送できる。
#[derive(Clone, Default)]
pub struct MockEventBus {
    published: Arc<Mutex<Vec<(String, Value)>>>,
    handlers:  Arc<Mutex<Vec<(String, Arc<dyn EventHandler>)>>>,
    fail:      Arc<AtomicBool>,
}

impl MockEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以降の publish / ping を失敗させる
    pub fn fail_publish(&self, fail: bool) {
        self.fail.store(fail, AtomicOrdering::SeqCst);
    }

    /// 発行済みの (subject, payload)
    pub fn published(&self) -> Vec<(String, Value)> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_subjects(&self) -> Vec<String> {
        self.published()
            .into_iter()
            .map(|(subject, _)| subject)
            .collect()
    }

    /// 記録済みのイベントを購読ハンドラへ配送する
    ///
    /// 配送したイベントは記録から取り除く。最初のハンドラエラーで中断する。
    pub async fn deliver_published(&self) -> Result<usize, InfraError> {
        let events = std::mem::take(&mut *self.published.lock().unwrap());
        let mut delivered = 0;
        for (subject, payload) in events {
            let handlers: Vec<Arc<dyn EventHandler>> = self
                .handlers
                .lock()
                .unwrap()
                .iter()
                .filter(|(s, _)| *s == subject)
                .map(|(_, h)| Arc::clone(h))
                .collect();
            let bytes = serde_json::to_vec(&payload)?;
            for handler in handlers {
                handler.handle(&subject, &bytes).await?;
                delivered += 1;
            }
        }
        Ok(delivered)
    }
}

#[async_trait]
impl EventBus for MockEventBus {
    async fn publish(&self, subject: &str, payload: &Value) -> Result<(), InfraError> {
        if self.fail.load(AtomicOrdering::SeqCst) {
            return Err(InfraError::bus("mock: publish failed"));
        }
        self.published
            .lock()
            .unwrap()
            .push((subject.to_string(), payload.clone()));
        Ok(())
    }

    async fn subscribe(
        &self,
        subject: &str,
        _group: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<JoinHandle<()>, InfraError> {
        self.handlers
            .lock()
            .unwrap()
            .push((subject.to_string(), handler));
        Ok(tokio::spawn(async {}))
    }

    async fn ping(&self) -> Result<(), InfraError> {
        if self.fail.load(AtomicOrdering::SeqCst) {
            return Err(InfraError::bus("mock: unreachable"));
        }
        Ok(())
    }
}

// ===== MockMailSender =====

/// 送信内容を記録するメール送信
#[derive(Clone, Default)]
pub struct MockMailSender {
    sent:     Arc<Mutex<Vec<OutgoingMail>>>,
    fail:     Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl MockMailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以降の送信を失敗させる（`false` で元に戻す）
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, AtomicOrdering::SeqCst);
    }

    /// 成功した送信
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    /// 成否を問わない送信試行回数
    pub fn attempts(&self) -> usize {
        self.attempts.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl MailSender for MockMailSender {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        self.attempts.fetch_add(1, AtomicOrdering::SeqCst);
        if self.fail.load(AtomicOrdering::SeqCst) {
            return Err(MailError::SendFailed("mock: connection refused".to_string()));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}
