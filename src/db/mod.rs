use crate::domain::{UserId, WidgetId};
use crate::models::widget::{Widget, WidgetUpdate};
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, JsonValue, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;
pub mod rows;

pub use repositories::schema::ColumnInfo;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if db_url.starts_with("sqlite:") && !db_url.contains(":memory:") {
            let path_str = db_url
                .trim_start_matches("sqlite:")
                .trim_start_matches("//")
                .split('?')
                .next()
                .unwrap_or_default();
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !path_str.is_empty() && !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn widget_repo(&self) -> repositories::widget::WidgetRepository {
        repositories::widget::WidgetRepository::new(self.conn.clone())
    }

    fn schema_repo(&self) -> repositories::schema::SchemaRepository {
        repositories::schema::SchemaRepository::new(self.conn.clone())
    }

    // ========================================================================
    // Widgets
    // ========================================================================

    pub async fn create_widget(&self, user_id: &UserId, prompt: &str) -> Result<Widget> {
        self.widget_repo().create(user_id, prompt).await
    }

    pub async fn list_widgets(&self, user_id: &UserId) -> Result<Vec<Widget>> {
        self.widget_repo().list(user_id).await
    }

    pub async fn get_widget(&self, id: WidgetId, user_id: &UserId) -> Result<Option<Widget>> {
        self.widget_repo().get(id, user_id).await
    }

    pub async fn update_widget(
        &self,
        id: WidgetId,
        user_id: &UserId,
        update: WidgetUpdate,
    ) -> Result<Option<Widget>> {
        self.widget_repo().update(id, user_id, update).await
    }

    pub async fn soft_delete_widget(&self, id: WidgetId, user_id: &UserId) -> Result<bool> {
        self.widget_repo().soft_delete(id, user_id).await
    }

    // ========================================================================
    // Schema introspection
    // ========================================================================

    pub async fn list_tables(&self) -> Result<Vec<String>> {
        self.schema_repo().list_tables().await
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        self.schema_repo().table_exists(table).await
    }

    pub async fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.schema_repo().columns(table).await
    }

    pub async fn count_table_rows(&self, table: &str) -> Result<u64> {
        self.schema_repo().count_rows(table).await
    }

    pub async fn table_page(&self, table: &str, limit: u64, offset: u64) -> Result<Vec<JsonValue>> {
        self.schema_repo().page(table, limit, offset).await
    }
}
