use crate::db::rows::row_to_json;
use anyhow::{Result, bail};
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, FromQueryResult, JsonValue, Statement,
    sqlx,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
}

#[derive(Debug, FromQueryResult)]
struct NameRow {
    name: String,
}

#[derive(Debug, FromQueryResult)]
struct ColumnRow {
    name: String,
    data_type: String,
    not_null: i32,
}

#[derive(Debug, FromQueryResult)]
struct CountRow {
    total: i64,
}

/// Read-only introspection of user tables.
pub struct SchemaRepository {
    conn: DatabaseConnection,
}

/// Quotes an identifier for interpolation into SQL text.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl SchemaRepository {
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn backend(&self) -> Result<DatabaseBackend> {
        match self.conn.get_database_backend() {
            DatabaseBackend::Sqlite => Ok(DatabaseBackend::Sqlite),
            other => bail!("Schema introspection is not supported for {other:?}"),
        }
    }

    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let backend = self.backend()?;
        let rows = NameRow::find_by_statement(Statement::from_string(
            backend,
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        ))
        .all(&self.conn)
        .await?;

        Ok(rows.into_iter().map(|r| r.name).collect())
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.list_tables().await?.iter().any(|t| t == table))
    }

    pub async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let backend = self.backend()?;
        let rows = ColumnRow::find_by_statement(Statement::from_sql_and_values(
            backend,
            r#"SELECT name, type AS data_type, "notnull" AS not_null FROM pragma_table_info(?) ORDER BY cid"#,
            [table.into()],
        ))
        .all(&self.conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ColumnInfo {
                name: r.name,
                data_type: r.data_type,
                not_null: r.not_null != 0,
            })
            .collect())
    }

    /// Counts rows of a table the caller has already checked exists.
    pub async fn count_rows(&self, table: &str) -> Result<u64> {
        let backend = self.backend()?;
        let sql = format!("SELECT COUNT(*) AS total FROM {}", quote_identifier(table));
        let row = CountRow::find_by_statement(Statement::from_string(backend, sql))
            .one(&self.conn)
            .await?;

        Ok(row.map_or(0, |r| u64::try_from(r.total).unwrap_or(0)))
    }

    /// Reads one page of a table the caller has already checked exists.
    ///
    /// Rows are decoded by the storage class of each value, since user tables
    /// carry arbitrary column types.
    pub async fn page(&self, table: &str, limit: u64, offset: u64) -> Result<Vec<JsonValue>> {
        self.backend()?;
        let sql = format!(
            "SELECT * FROM {} LIMIT ? OFFSET ?",
            quote_identifier(table)
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.conn.get_sqlite_connection_pool())
            .await?;

        Ok(rows.iter().map(row_to_json).collect::<Result<Vec<_>, _>>()?)
    }
}
