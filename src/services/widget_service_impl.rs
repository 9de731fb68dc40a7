//! `SeaORM` implementation of the `WidgetService` trait.

use crate::constants::limits::MAX_WIDGET_PROMPT_LENGTH;
use crate::db::Store;
use crate::domain::{UserId, WidgetId};
use crate::models::widget::{Widget, WidgetUpdate};
use crate::services::widget_service::{WidgetError, WidgetService};
use async_trait::async_trait;
use tracing::info;

pub struct SeaOrmWidgetService {
    store: Store,
}

impl SeaOrmWidgetService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl WidgetService for SeaOrmWidgetService {
    async fn create_widget(&self, user_id: &UserId, prompt: &str) -> Result<Widget, WidgetError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(WidgetError::Validation("Prompt is required".to_string()));
        }
        if prompt.chars().count() > MAX_WIDGET_PROMPT_LENGTH {
            return Err(WidgetError::Validation(format!(
                "Prompt must be {MAX_WIDGET_PROMPT_LENGTH} characters or less"
            )));
        }

        let widget = self.store.create_widget(user_id, prompt).await?;
        info!(widget_id = %widget.id, user_id = %user_id, "Widget created");
        Ok(widget)
    }

    async fn list_widgets(&self, user_id: &UserId) -> Result<Vec<Widget>, WidgetError> {
        Ok(self.store.list_widgets(user_id).await?)
    }

    async fn get_widget(
        &self,
        id: WidgetId,
        user_id: &UserId,
    ) -> Result<Option<Widget>, WidgetError> {
        Ok(self.store.get_widget(id, user_id).await?)
    }

    async fn update_widget(
        &self,
        id: WidgetId,
        update: WidgetUpdate,
        user_id: &UserId,
    ) -> Result<Widget, WidgetError> {
        self.store
            .update_widget(id, user_id, update)
            .await?
            .ok_or(WidgetError::NotFound(id))
    }

    async fn delete_widget(&self, id: WidgetId, user_id: &UserId) -> Result<(), WidgetError> {
        if self.store.soft_delete_widget(id, user_id).await? {
            info!(widget_id = %id, user_id = %user_id, "Widget deleted");
            Ok(())
        } else {
            Err(WidgetError::NotFound(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::prelude::Widgets;
    use sea_orm::EntityTrait;

    async fn service() -> (SeaOrmWidgetService, Store) {
        let store = Store::new("sqlite::memory:").await.unwrap();
        (SeaOrmWidgetService::new(store.clone()), store)
    }

    fn user(id: &str) -> UserId {
        UserId::parse(id).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let (service, _) = service().await;
        let alice = user("alice");

        let widget = service
            .create_widget(&alice, "Monthly revenue for 2024")
            .await
            .unwrap();
        assert_eq!(widget.prompt, "Monthly revenue for 2024");
        assert!(widget.sql_query.is_none());
        assert!(widget.content.is_none());

        let widgets = service.list_widgets(&alice).await.unwrap();
        assert_eq!(widgets, vec![widget]);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_prompt() {
        let (service, _) = service().await;
        let err = service.create_widget(&user("alice"), "  ").await.unwrap_err();
        assert!(matches!(err, WidgetError::Validation(_)));
    }

    #[tokio::test]
    async fn test_ownership_isolation() {
        let (service, _) = service().await;
        let alice = user("alice");
        let bob = user("bob");

        let widget = service
            .create_widget(&alice, "Bookings per room type")
            .await
            .unwrap();

        assert!(service.get_widget(widget.id, &bob).await.unwrap().is_none());
        assert!(service.list_widgets(&bob).await.unwrap().is_empty());

        let err = service
            .update_widget(widget.id, WidgetUpdate::content("hijacked"), &bob)
            .await
            .unwrap_err();
        assert!(matches!(err, WidgetError::NotFound(id) if id == widget.id));

        let err = service.delete_widget(widget.id, &bob).await.unwrap_err();
        assert!(matches!(err, WidgetError::NotFound(_)));

        let stored = service.get_widget(widget.id, &alice).await.unwrap().unwrap();
        assert!(stored.content.is_none());
    }

    #[tokio::test]
    async fn test_partial_update_keeps_unset_fields() {
        let (service, _) = service().await;
        let alice = user("alice");
        let widget = service
            .create_widget(&alice, "Payments by method")
            .await
            .unwrap();

        let updated = service
            .update_widget(
                widget.id,
                WidgetUpdate::query("SELECT payment_method FROM payments"),
                &alice,
            )
            .await
            .unwrap();
        assert_eq!(
            updated.sql_query.as_deref(),
            Some("SELECT payment_method FROM payments")
        );

        let updated = service
            .update_widget(widget.id, WidgetUpdate::content("<chart/>"), &alice)
            .await
            .unwrap();
        assert_eq!(
            updated.sql_query.as_deref(),
            Some("SELECT payment_method FROM payments")
        );
        assert_eq!(updated.content.as_deref(), Some("<chart/>"));
    }

    #[tokio::test]
    async fn test_soft_delete_retains_row() {
        let (service, store) = service().await;
        let alice = user("alice");
        let widget = service
            .create_widget(&alice, "Average nightly price")
            .await
            .unwrap();

        service.delete_widget(widget.id, &alice).await.unwrap();

        assert!(service.get_widget(widget.id, &alice).await.unwrap().is_none());
        assert!(service.list_widgets(&alice).await.unwrap().is_empty());
        assert!(matches!(
            service.delete_widget(widget.id, &alice).await,
            Err(WidgetError::NotFound(_))
        ));

        let row = Widgets::find_by_id(widget.id.value())
            .one(&store.conn)
            .await
            .unwrap()
            .unwrap();
        assert!(row.is_deleted);
        assert_eq!(row.prompt, "Average nightly price");
    }
}
