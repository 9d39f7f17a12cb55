//! テンプレートの投影ハンドラ
//!
//! イベントペイロードから `Existing` で集約を復元し、読み取りストアへ反映する。
//! 読み取りストアの upsert はバージョンで古いイベントを無視するので、
//! 再配送や順序の入れ替わりがあっても結果は変わらない。

use std::sync::Arc;

use postman_domain::{
    event::{EventKind, TemplateEvent},
    factory::AggregateFactory,
};
use postman_infra::repository::TemplateViewRepository;
use postman_shared::{event_log::event, log_business_event};

use crate::error::CoreError;

/// テンプレートの投影ハンドラ
pub struct TemplateProjector {
    views:   Arc<dyn TemplateViewRepository>,
    factory: AggregateFactory,
}

impl TemplateProjector {
    pub fn new(views: Arc<dyn TemplateViewRepository>, factory: AggregateFactory) -> Self {
        Self { views, factory }
    }

    /// イベントを読み取りストアへ反映する
    ///
    /// # エラー
    ///
    /// ペイロードが欠損している場合は `CoreError::Validation`（発行側の不具合を示す）
    #[tracing::instrument(skip_all, fields(event = event.name()))]
    pub async fn handle(&self, event: TemplateEvent) -> Result<(), CoreError> {
        let kind = event.kind();
        let template = self.factory.existing_template(event.into_params())?;

        let action = match kind {
            EventKind::Created => {
                self.views.create(&template).await?;
                event::action::VIEW_UPSERTED
            }
            EventKind::Updated => {
                self.views.update(&template).await?;
                event::action::VIEW_UPSERTED
            }
            EventKind::Deleted => {
                self.views.delete(&template).await?;
                event::action::VIEW_DELETED
            }
        };

        log_business_event!(
            event.category = event::category::PROJECTION,
            event.action = action,
            event.entity_type = event::entity_type::TEMPLATE,
            event.entity_id = %template.id(),
            event.result = event::result::SUCCESS,
            version = template.meta().version().as_u32(),
            "テンプレートのビューを更新しました"
        );

        Ok(())
    }
}
