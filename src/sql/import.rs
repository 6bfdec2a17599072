use serde::Serialize;
use sqlx::{Database, Executor, Pool};
use thiserror::Error;

use crate::sql::splitter::executable_statements;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub statements_executed: usize,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to {stage} import transaction: {source}")]
    Transaction {
        stage: &'static str,
        #[source]
        source: sqlx::Error,
    },
    /// `index` is 1-based over the statements actually sent to the database,
    /// so it is also the number of statements attempted.
    #[error("statement {index} failed: {source}")]
    StatementFailed {
        index: usize,
        statement: String,
        #[source]
        source: sqlx::Error,
    },
}

impl ImportError {
    pub fn statement_index(&self) -> Option<usize> {
        match self {
            ImportError::StatementFailed { index, .. } => Some(*index),
            ImportError::Transaction { .. } => None,
        }
    }

    pub fn database_error(&self) -> &sqlx::Error {
        match self {
            ImportError::Transaction { source, .. } => source,
            ImportError::StatementFailed { source, .. } => source,
        }
    }
}

/// Runs a whole SQL script inside a single transaction.
///
/// Either every executable statement is committed or none is.
pub struct ImportRunner<'a, DB: Database> {
    pool: &'a Pool<DB>,
}

impl<'a, DB> ImportRunner<'a, DB>
where
    DB: Database,
    for<'c> &'c mut DB::Connection: Executor<'c, Database = DB>,
{
    pub fn new(pool: &'a Pool<DB>) -> Self {
        Self { pool }
    }

    pub async fn run(&self, script: &str) -> Result<ImportSummary, ImportError> {
        let statements = executable_statements(script);
        tracing::info!(statements = statements.len(), "sql import started");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|source| ImportError::Transaction { stage: "begin", source })?;

        for (offset, statement) in statements.iter().enumerate() {
            let index = offset + 1;
            if let Err(source) = Executor::execute(&mut *tx, *statement).await {
                tracing::warn!(index, error = %source, "sql import statement failed, rolling back");
                if let Err(err) = tx.rollback().await {
                    tracing::warn!(error = %err, "sql import rollback failed");
                }
                return Err(ImportError::StatementFailed {
                    index,
                    statement: statement.trim().to_string(),
                    source,
                });
            }
        }

        tx.commit()
            .await
            .map_err(|source| ImportError::Transaction { stage: "commit", source })?;

        tracing::info!(statements = statements.len(), "sql import committed");
        Ok(ImportSummary {
            statements_executed: statements.len(),
        })
    }
}
