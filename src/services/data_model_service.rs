//! Browsing of the user-facing tables.
//!
//! Protected tables never appear in listings or in the schema handed to the
//! SQL model; direct access to them is refused.

use crate::db::Store;
use sea_orm::JsonValue;
use serde::Serialize;
use std::fmt::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataModelError {
    #[error("Access to this table is forbidden")]
    Forbidden(String),

    #[error("Table configuration not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for DataModelError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    pub accessor_key: String,
    pub header: String,
    pub sql_data_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePage {
    pub content: Vec<JsonValue>,
    pub total_elements: u64,
}

#[async_trait::async_trait]
pub trait DataModelService: Send + Sync {
    async fn list_tables(&self) -> Result<Vec<TableSummary>, DataModelError>;

    async fn table_config(&self, table: &str) -> Result<Vec<ColumnDefinition>, DataModelError>;

    /// Reads a 0-based page of rows together with the table's total row count.
    async fn table_data(&self, table: &str, page: u64) -> Result<TablePage, DataModelError>;

    /// Plain-text listing of every visible table and its columns.
    async fn schema_description(&self) -> Result<String, DataModelError>;

    fn is_protected(&self, table: &str) -> bool;
}

/// Turns `order_items` into `Order Items`.
#[must_use]
pub fn key_to_label(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct SeaOrmDataModelService {
    store: Store,
    protected_tables: Vec<String>,
    page_size: u64,
}

impl SeaOrmDataModelService {
    #[must_use]
    pub fn new(store: Store, protected_tables: Vec<String>, page_size: u64) -> Self {
        Self {
            store,
            protected_tables,
            page_size,
        }
    }

    async fn visible_tables(&self) -> Result<Vec<String>, DataModelError> {
        Ok(self
            .store
            .list_tables()
            .await?
            .into_iter()
            .filter(|t| !self.is_protected(t))
            .collect())
    }

    async fn ensure_readable(&self, table: &str) -> Result<(), DataModelError> {
        if self.is_protected(table) {
            return Err(DataModelError::Forbidden(table.to_string()));
        }
        if !self.store.table_exists(table).await? {
            return Err(DataModelError::NotFound(table.to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DataModelService for SeaOrmDataModelService {
    async fn list_tables(&self) -> Result<Vec<TableSummary>, DataModelError> {
        Ok(self
            .visible_tables()
            .await?
            .into_iter()
            .map(|name| TableSummary {
                label: key_to_label(&name),
                value: name,
            })
            .collect())
    }

    async fn table_config(&self, table: &str) -> Result<Vec<ColumnDefinition>, DataModelError> {
        self.ensure_readable(table).await?;

        let columns = self.store.table_columns(table).await?;
        if columns.is_empty() {
            return Err(DataModelError::NotFound(table.to_string()));
        }

        Ok(columns
            .into_iter()
            .map(|c| ColumnDefinition {
                header: key_to_label(&c.name),
                accessor_key: c.name,
                sql_data_type: c.data_type,
            })
            .collect())
    }

    async fn table_data(&self, table: &str, page: u64) -> Result<TablePage, DataModelError> {
        self.ensure_readable(table).await?;

        let offset = page.saturating_mul(self.page_size);
        let (total_elements, content) = tokio::try_join!(
            self.store.count_table_rows(table),
            self.store.table_page(table, self.page_size, offset),
        )?;

        Ok(TablePage {
            content,
            total_elements,
        })
    }

    async fn schema_description(&self) -> Result<String, DataModelError> {
        let mut description = String::new();
        for table in self.visible_tables().await? {
            let columns = self.store.table_columns(&table).await?;
            let columns = columns
                .iter()
                .map(|c| {
                    let nullability = if c.not_null { " NOT NULL" } else { "" };
                    format!("{} {}{nullability}", c.name, c.data_type)
                })
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(description, "- {table}({columns})");
        }
        Ok(description)
    }

    fn is_protected(&self, table: &str) -> bool {
        self.protected_tables
            .iter()
            .any(|p| p.eq_ignore_ascii_case(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::query_executor::{QueryExecutor, SeaOrmQueryExecutor};

    async fn service() -> SeaOrmDataModelService {
        let store = Store::new("sqlite::memory:").await.unwrap();
        SeaOrmQueryExecutor::new(&store)
            .execute(
                "CREATE TABLE order_items (id INTEGER PRIMARY KEY, product TEXT NOT NULL, amount NUMERIC);
                 INSERT INTO order_items (product, amount) VALUES
                    ('a', 1), ('b', 2.5), ('c', 3), ('d', 4), ('e', 5);",
            )
            .await
            .unwrap();
        SeaOrmDataModelService::new(
            store,
            vec![
                "users".to_string(),
                "widgets".to_string(),
                "seaql_migrations".to_string(),
            ],
            2,
        )
    }

    #[test]
    fn test_key_to_label() {
        assert_eq!(key_to_label("order_items"), "Order Items");
        assert_eq!(key_to_label("rooms"), "Rooms");
        assert_eq!(key_to_label("room__type"), "Room  Type");
    }

    #[tokio::test]
    async fn test_list_tables_hides_protected() {
        let service = service().await;
        let tables = service.list_tables().await.unwrap();
        assert_eq!(
            tables,
            vec![TableSummary {
                label: "Order Items".to_string(),
                value: "order_items".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_table_config() {
        let service = service().await;
        let columns = service.table_config("order_items").await.unwrap();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[1].accessor_key, "product");
        assert_eq!(columns[1].header, "Product");
        assert_eq!(columns[1].sql_data_type, "TEXT");

        assert!(matches!(
            service.table_config("widgets").await,
            Err(DataModelError::Forbidden(_))
        ));
        assert!(matches!(
            service.table_config("nope").await,
            Err(DataModelError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_table_data_pages() {
        let service = service().await;

        let first = service.table_data("order_items", 0).await.unwrap();
        assert_eq!(first.total_elements, 5);
        assert_eq!(first.content.len(), 2);
        assert_eq!(first.content[0]["product"], "a");
        assert_eq!(first.content[1]["amount"], 2.5);

        let last = service.table_data("order_items", 2).await.unwrap();
        assert_eq!(last.content.len(), 1);
        assert_eq!(last.content[0]["amount"], 5);

        let second = service.table_data("order_items", 1).await.unwrap();
        assert_eq!(second.content[0]["amount"], 3);
        assert_eq!(second.content[1]["product"], "d");

        assert!(matches!(
            service.table_data("USERS", 0).await,
            Err(DataModelError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_schema_description_lists_visible_tables() {
        let service = service().await;
        let description = service.schema_description().await.unwrap();
        assert_eq!(
            description,
            "- order_items(id INTEGER, product TEXT NOT NULL, amount NUMERIC)\n"
        );
    }
}
