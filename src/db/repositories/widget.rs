use crate::domain::{UserId, WidgetId};
use crate::entities::{prelude::*, widgets};
use crate::models::widget::{Widget, WidgetUpdate};
use anyhow::Result;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::debug;

/// Repository for widget rows. Every query is scoped by owner and skips
/// soft-deleted rows.
pub struct WidgetRepository {
    conn: DatabaseConnection,
}

impl WidgetRepository {
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(m: widgets::Model) -> Widget {
        Widget {
            id: WidgetId::new(m.id),
            user_id: m.user_id,
            prompt: m.prompt,
            sql_query: m.sql_query,
            content: m.content,
            created_at: m.created_at,
        }
    }

    fn owned(id: WidgetId, user_id: &UserId) -> sea_orm::Condition {
        sea_orm::Condition::all()
            .add(widgets::Column::Id.eq(id.value()))
            .add(widgets::Column::UserId.eq(user_id.as_str()))
            .add(widgets::Column::IsDeleted.eq(false))
    }

    pub async fn create(&self, user_id: &UserId, prompt: &str) -> Result<Widget> {
        let active_model = widgets::ActiveModel {
            user_id: Set(user_id.as_str().to_string()),
            prompt: Set(prompt.to_string()),
            sql_query: Set(None),
            content: Set(None),
            is_deleted: Set(false),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let model = Widgets::insert(active_model)
            .exec_with_returning(&self.conn)
            .await?;
        debug!(widget_id = model.id, user_id = %user_id, "Created widget");
        Ok(Self::map_model(model))
    }

    pub async fn list(&self, user_id: &UserId) -> Result<Vec<Widget>> {
        let rows = Widgets::find()
            .filter(widgets::Column::UserId.eq(user_id.as_str()))
            .filter(widgets::Column::IsDeleted.eq(false))
            .order_by_asc(widgets::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn get(&self, id: WidgetId, user_id: &UserId) -> Result<Option<Widget>> {
        let row = Widgets::find()
            .filter(Self::owned(id, user_id))
            .one(&self.conn)
            .await?;

        Ok(row.map(Self::map_model))
    }

    /// Applies the set fields in a single statement. Returns `None` when no
    /// live widget with this id belongs to the user.
    pub async fn update(
        &self,
        id: WidgetId,
        user_id: &UserId,
        update: WidgetUpdate,
    ) -> Result<Option<Widget>> {
        if update.is_empty() {
            return self.get(id, user_id).await;
        }

        let mut statement = Widgets::update_many().filter(Self::owned(id, user_id));

        if let Some(sql_query) = update.sql_query {
            statement = statement.col_expr(widgets::Column::SqlQuery, Expr::value(sql_query));
        }
        if let Some(content) = update.content {
            statement = statement.col_expr(widgets::Column::Content, Expr::value(content));
        }

        let result = statement.exec(&self.conn).await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }

        self.get(id, user_id).await
    }

    /// Flags the widget as deleted. The row itself is kept.
    pub async fn soft_delete(&self, id: WidgetId, user_id: &UserId) -> Result<bool> {
        let result = Widgets::update_many()
            .col_expr(widgets::Column::IsDeleted, Expr::value(true))
            .filter(Self::owned(id, user_id))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }
}
