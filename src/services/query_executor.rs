//! Execution of model-generated SQL.
//!
//! A query text may hold several statements. Each produces a [`ResultSet`];
//! the batch is normalized once into a single [`QueryOutput`] whose row
//! count is the sum and whose rows are concatenated in execution order.

use crate::db::{Store, rows::row_to_json};
use sea_orm::sqlx::{self, Sqlite, SqlitePool};
use sea_orm::{ConnectionTrait, DatabaseBackend, JsonValue};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Raised by the database itself. The message is passed back to the SQL
    /// model unchanged so it can correct the query.
    #[error("{0}")]
    Database(String),

    #[error("SQL query cannot be empty.")]
    Empty,

    #[error("Query execution failed: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for ExecutionError {
    fn from(err: sqlx::Error) -> Self {
        match err.as_database_error() {
            Some(db) => Self::Database(db.message().to_string()),
            None => Self::Internal(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub row_count: u64,
    pub rows: Vec<JsonValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchResult {
    One(ResultSet),
    Many(Vec<ResultSet>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutput {
    pub row_count: u64,
    pub rows: Vec<JsonValue>,
}

impl BatchResult {
    #[must_use]
    pub fn normalize(self) -> QueryOutput {
        match self {
            Self::One(set) => QueryOutput {
                row_count: set.row_count,
                rows: set.rows,
            },
            Self::Many(sets) => sets.into_iter().fold(QueryOutput::default(), |mut acc, set| {
                acc.row_count += set.row_count;
                acc.rows.extend(set.rows);
                acc
            }),
        }
    }
}

#[async_trait::async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<QueryOutput, ExecutionError>;
}

/// Runs SQL on the store's connection pool.
///
/// Generated SQL goes through the pool's driver directly so that rows of
/// arbitrary shape can be decoded without an entity model.
pub struct SeaOrmQueryExecutor {
    store: Store,
}

impl SeaOrmQueryExecutor {
    #[must_use]
    pub fn new(store: &Store) -> Self {
        Self {
            store: store.clone(),
        }
    }

    fn pool(&self) -> Result<&SqlitePool, ExecutionError> {
        match self.store.conn.get_database_backend() {
            DatabaseBackend::Sqlite => Ok(self.store.conn.get_sqlite_connection_pool()),
            other => Err(ExecutionError::Internal(format!(
                "Query execution is not supported for {other:?}"
            ))),
        }
    }

    pub async fn execute_batch(&self, sql: &str) -> Result<BatchResult, ExecutionError> {
        let pool = self.pool()?;
        let mut statements = split_statements(sql);
        match statements.len() {
            0 => Err(ExecutionError::Empty),
            1 => {
                let statement = statements.remove(0);
                Ok(BatchResult::One(run_statement(pool, &statement).await?))
            }
            _ => {
                // A failing statement rolls back the ones before it.
                let mut txn = pool.begin().await?;
                let mut sets = Vec::with_capacity(statements.len());
                for statement in &statements {
                    match run_statement(&mut *txn, statement).await {
                        Ok(set) => sets.push(set),
                        Err(err) => {
                            if let Err(e) = txn.rollback().await {
                                warn!(error = %e, "Failed to roll back query batch");
                            }
                            return Err(err);
                        }
                    }
                }
                txn.commit().await?;
                Ok(BatchResult::Many(sets))
            }
        }
    }
}

#[async_trait::async_trait]
impl QueryExecutor for SeaOrmQueryExecutor {
    async fn execute(&self, sql: &str) -> Result<QueryOutput, ExecutionError> {
        let output = self.execute_batch(sql).await?.normalize();
        debug!(row_count = output.row_count, "Query executed");
        Ok(output)
    }
}

async fn run_statement<'c, E>(executor: E, statement: &str) -> Result<ResultSet, ExecutionError>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let query = sqlx::query(statement).persistent(false);

    if returns_rows(statement) {
        let rows = query
            .fetch_all(executor)
            .await?
            .iter()
            .map(row_to_json)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ResultSet {
            row_count: rows.len() as u64,
            rows,
        })
    } else {
        let result = query.execute(executor).await?;
        Ok(ResultSet {
            row_count: result.rows_affected(),
            rows: Vec::new(),
        })
    }
}

/// Splits SQL text on top-level semicolons. Semicolons inside quotes and
/// comments are ignored; empty statements are dropped.
#[must_use]
pub fn split_statements(sql: &str) -> Vec<String> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mode {
        Normal,
        Quoted(char),
        LineComment,
        BlockComment,
    }

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut mode = Mode::Normal;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match mode {
            Mode::Normal => match c {
                ';' => {
                    push_statement(&mut statements, &current);
                    current.clear();
                    continue;
                }
                '\'' | '"' | '`' => mode = Mode::Quoted(c),
                '-' if chars.peek() == Some(&'-') => mode = Mode::LineComment,
                '/' if chars.peek() == Some(&'*') => {
                    current.push(c);
                    if let Some(star) = chars.next() {
                        current.push(star);
                    }
                    mode = Mode::BlockComment;
                    continue;
                }
                _ => {}
            },
            Mode::Quoted(quote) if c == quote => mode = Mode::Normal,
            Mode::LineComment if c == '\n' => mode = Mode::Normal,
            Mode::BlockComment if c == '*' && chars.peek() == Some(&'/') => {
                current.push(c);
                if let Some(slash) = chars.next() {
                    current.push(slash);
                }
                mode = Mode::Normal;
                continue;
            }
            _ => {}
        }
        current.push(c);
    }

    push_statement(&mut statements, &current);
    statements
}

fn push_statement(statements: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !strip_leading_comments(trimmed).is_empty() {
        statements.push(trimmed.to_string());
    }
}

fn strip_leading_comments(mut text: &str) -> &str {
    loop {
        text = text.trim_start();
        if let Some(rest) = text.strip_prefix("--") {
            text = rest.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(rest) = text.strip_prefix("/*") {
            text = rest.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return text;
        }
    }
}

fn returns_rows(statement: &str) -> bool {
    let body = strip_leading_comments(statement).trim_start_matches('(');
    let keyword: String = body
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect::<String>()
        .to_ascii_uppercase();

    matches!(
        keyword.as_str(),
        "SELECT" | "WITH" | "VALUES" | "PRAGMA" | "EXPLAIN" | "SHOW" | "TABLE"
    ) || statement
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .any(|word| word.eq_ignore_ascii_case("RETURNING"))
}
