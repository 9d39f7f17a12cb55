//! メールの投影ハンドラ

use std::sync::Arc;

use postman_domain::{
    event::{EmailEvent, EventKind},
    factory::AggregateFactory,
};
use postman_infra::repository::EmailViewRepository;
use postman_shared::{event_log::event, log_business_event};

use crate::error::CoreError;

/// メールの投影ハンドラ
pub struct EmailProjector {
    views:   Arc<dyn EmailViewRepository>,
    factory: AggregateFactory,
}

impl EmailProjector {
    pub fn new(views: Arc<dyn EmailViewRepository>, factory: AggregateFactory) -> Self {
        Self { views, factory }
    }

    /// イベントを読み取りストアへ反映する
    #[tracing::instrument(skip_all, fields(event = event.name()))]
    pub async fn handle(&self, event: EmailEvent) -> Result<(), CoreError> {
        let kind = event.kind();
        let email = self.factory.existing_email(event.into_params())?;

        let action = match kind {
            EventKind::Created => {
                self.views.create(&email).await?;
                event::action::VIEW_UPSERTED
            }
            EventKind::Updated => {
                self.views.update(&email).await?;
                event::action::VIEW_UPSERTED
            }
            EventKind::Deleted => {
                self.views.delete(&email).await?;
                event::action::VIEW_DELETED
            }
        };

        log_business_event!(
            event.category = event::category::PROJECTION,
            event.action = action,
            event.entity_type = event::entity_type::EMAIL,
            event.entity_id = %email.id(),
            event.result = event::result::SUCCESS,
            version = email.meta().version().as_u32(),
            email.state = %email.state(),
            "メールのビューを更新しました"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use postman_domain::{
        clock::FixedClock,
        email::{Email, EmailData, EmailState, NewEmail},
        query::{Facet, FacetRequest},
        template::TemplateId,
    };
    use postman_infra::mock::MockEmailViewRepository;
    use pretty_assertions::assert_eq;

    use super::*;

    fn factory() -> AggregateFactory {
        AggregateFactory::new(Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap(),
        )))
    }

    fn failed_email() -> Email {
        factory()
            .new_email(NewEmail {
                recipient: "ada@example.com".to_string(),
                sender:    Some("Postman".to_string()),
                from:      "noreply@example.com".to_string(),
                subject:   "Welcome".to_string(),
                template:  TemplateId::new(),
                data:      EmailData::from([("name".to_string(), serde_json::json!("Ada"))]),
                message:   "Hello Ada".to_string(),
                state:     EmailState::Failed,
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_updatedで状態がビューに反映される() {
        // Arrange
        let views = MockEmailViewRepository::new();
        let sut = EmailProjector::new(Arc::new(views.clone()), factory());
        let mut email = failed_email();
        sut.handle(EmailEvent::Created(email.public().into()))
            .await
            .unwrap();

        // Act
        email.record_delivery(EmailState::Complete, Utc::now());
        sut.handle(EmailEvent::Updated(email.public().into()))
            .await
            .unwrap();

        // Assert
        let document = views.document(&email.id().to_string()).unwrap();
        assert_eq!(document, serde_json::to_value(email.public()).unwrap());
        assert_eq!(document["status"], "Complete");
        assert_eq!(document["version"], 2);
    }

    #[tokio::test]
    async fn test_deletedでビューから消える() {
        let views = MockEmailViewRepository::new();
        let sut = EmailProjector::new(Arc::new(views.clone()), factory());
        let email = failed_email();
        sut.handle(EmailEvent::Created(email.public().into()))
            .await
            .unwrap();

        sut.handle(EmailEvent::Deleted(email.public().into()))
            .await
            .unwrap();

        assert!(views.is_empty());
    }

    #[tokio::test]
    async fn test_deletedの後に届いたcreatedは無視される() {
        // Arrange
        let views = MockEmailViewRepository::new();
        let sut = EmailProjector::new(Arc::new(views.clone()), factory());
        let email = failed_email();
        sut.handle(EmailEvent::Deleted(email.public().into()))
            .await
            .unwrap();

        // Act
        sut.handle(EmailEvent::Created(email.public().into()))
            .await
            .unwrap();

        // Assert
        assert!(views.is_empty());
        let found = views
            .read_faceted(&FacetRequest::single("all", Facet::default()))
            .await
            .unwrap();
        assert!(found["all"].is_empty());
    }
}
