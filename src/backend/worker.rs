//! `KeyBackend` implementation over the database worker.

use std::sync::Arc;

use async_trait::async_trait;

use super::error::{QueryError, QueryResult};
use super::provider::{KeyBackend, SnapshotSession};
use crate::sql::{duplicate_count_sql, Dialect};
use crate::worker::protocol::{self, methods, ConnectionParams, Scoped};
use crate::worker::WorkerClient;

/// Backend that forwards every call to the worker process.
///
/// Metadata calls carry the connection parameters; probes run inside a
/// worker-side transaction opened by `begin_snapshot`.
///
/// # Example
///
/// ```ignore
/// use keyscout::worker::WorkerClient;
/// use keyscout::backend::WorkerBackend;
/// use keyscout::sql::Dialect;
///
/// let client = WorkerClient::spawn("./keyscout-worker").await?;
/// let backend = WorkerBackend::new(
///     Arc::new(client),
///     "postgres",
///     "postgres://localhost/air",
///     Dialect::Postgres,
/// );
/// ```
pub struct WorkerBackend {
    /// The worker client for RPC calls.
    client: Arc<WorkerClient>,
    /// Sent with every metadata call and `transaction.begin`.
    connection: ConnectionParams,
    /// Dialect used to render probe queries.
    dialect: Dialect,
}

impl WorkerBackend {
    /// Create a new WorkerBackend.
    pub fn new(
        client: Arc<WorkerClient>,
        driver: impl Into<String>,
        connection_string: impl Into<String>,
        dialect: Dialect,
    ) -> Self {
        Self {
            client,
            connection: ConnectionParams {
                driver: driver.into(),
                connection_string: connection_string.into(),
            },
            dialect,
        }
    }

    /// Get the driver name.
    pub fn driver(&self) -> &str {
        &self.connection.driver
    }
}

#[async_trait]
impl KeyBackend for WorkerBackend {
    async fn list_schemas(&self) -> QueryResult<Vec<String>> {
        let response: protocol::ListSchemasResponse = self
            .client
            .request(
                methods::LIST_SCHEMAS,
                Scoped::new(&self.connection, protocol::ListSchemas {}),
            )
            .await?;

        Ok(response.schemas.into_iter().map(|s| s.name).collect())
    }

    async fn list_tables(&self, schema: &str) -> QueryResult<Vec<String>> {
        let params = protocol::ListTables {
            schema: Some(schema).filter(|s| !s.is_empty()),
        };
        let response: protocol::ListTablesResponse = self
            .client
            .request(methods::LIST_TABLES, Scoped::new(&self.connection, params))
            .await?;

        Ok(response
            .tables
            .into_iter()
            .filter(|t| t.is_base_table())
            .map(|t| t.name)
            .collect())
    }

    async fn list_columns(&self, schema: &str, table: &str) -> QueryResult<Vec<String>> {
        let response: protocol::GetColumnsResponse = self
            .client
            .request(
                methods::GET_COLUMNS,
                Scoped::new(&self.connection, protocol::GetColumns { schema, table }),
            )
            .await?;

        let mut columns = response.columns;
        columns.sort_by_key(|c| c.position);
        Ok(columns.into_iter().map(|c| c.name).collect())
    }

    async fn begin_snapshot(&self) -> QueryResult<Box<dyn SnapshotSession>> {
        let response: protocol::BeginTransactionResponse = self
            .client
            .request(
                methods::BEGIN_TRANSACTION,
                Scoped::new(&self.connection, protocol::BeginTransaction { read_only: true }),
            )
            .await?;

        tracing::debug!(
            driver = self.driver(),
            transaction_id = %response.transaction_id,
            "began worker transaction"
        );

        Ok(Box::new(WorkerSession {
            client: self.client.clone(),
            dialect: self.dialect,
            transaction_id: Some(response.transaction_id),
        }))
    }
}

/// Worker-side transaction. Rolled back on release, or in the background on drop.
struct WorkerSession {
    client: Arc<WorkerClient>,
    dialect: Dialect,
    transaction_id: Option<String>,
}

impl WorkerSession {
    async fn rollback(client: &WorkerClient, transaction_id: &str) -> QueryResult<()> {
        let rolled_back: Result<serde_json::Value, _> = client
            .request(methods::ROLLBACK, protocol::Rollback { transaction_id })
            .await;
        match rolled_back {
            Ok(_) => Ok(()),
            // The worker's transactions end with it.
            Err(e) if e.is_worker_exited() => {
                tracing::debug!(%transaction_id, "worker gone, nothing to roll back");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SnapshotSession for WorkerSession {
    async fn count_duplicates(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[String],
    ) -> QueryResult<u64> {
        let transaction_id = self
            .transaction_id
            .as_deref()
            .ok_or(QueryError::SessionClosed)?;
        let sql = duplicate_count_sql(self.dialect, schema, table, columns)?;

        let response: protocol::QueryResponse = self
            .client
            .request(
                methods::TRANSACTION_QUERY,
                protocol::TransactionQuery {
                    transaction_id,
                    sql: &sql,
                },
            )
            .await?;

        parse_count(response.scalar())
    }

    async fn release(mut self: Box<Self>) -> QueryResult<()> {
        match self.transaction_id.take() {
            Some(transaction_id) => Self::rollback(&self.client, &transaction_id).await,
            None => Ok(()),
        }
    }
}

impl Drop for WorkerSession {
    fn drop(&mut self) {
        let Some(transaction_id) = self.transaction_id.take() else {
            return;
        };
        if !self.client.is_alive() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(%transaction_id, "no runtime to roll back dropped worker transaction");
            return;
        };

        let client = self.client.clone();
        handle.spawn(async move {
            if let Err(e) = Self::rollback(&client, &transaction_id).await {
                tracing::warn!(%transaction_id, error = %e, "failed to roll back dropped worker transaction");
            }
        });
    }
}

/// Read a duplicate count from a scalar query cell.
///
/// Drivers disagree on how `SUM` results are encoded (integer, float, or
/// numeric string), so all three are accepted.
fn parse_count(value: Option<&serde_json::Value>) -> QueryResult<u64> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(0),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
            .ok_or_else(|| QueryError::unexpected(format!("not a duplicate count: {}", n))),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| QueryError::unexpected(format!("not a duplicate count: {:?}", s))),
        Some(other) => Err(QueryError::unexpected(format!(
            "not a duplicate count: {}",
            other
        ))),
    }
}
