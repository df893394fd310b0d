//! In-process SQLite backend.
//!
//! A single connection is shared behind an async mutex. A snapshot session
//! takes the lock for its whole lifetime, so probes from one search run are
//! never interleaved with statements from another.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::error::{QueryError, QueryResult};
use super::provider::{KeyBackend, SnapshotSession};
use crate::sql::{duplicate_count_sql, Dialect};

/// `KeyBackend` over a SQLite database file or in-memory database.
#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open a SQLite database file.
    pub fn open<P: AsRef<Path>>(path: P) -> QueryResult<Self> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    /// Open an empty in-memory database (for testing).
    pub fn open_in_memory() -> QueryResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run a batch of statements, e.g. to load fixtures.
    pub async fn execute_batch(&self, sql: &str) -> QueryResult<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch(sql)?;
        Ok(())
    }
}

#[async_trait]
impl KeyBackend for SqliteBackend {
    async fn list_schemas(&self) -> QueryResult<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("PRAGMA database_list")?;
        let schemas = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(schemas)
    }

    async fn list_tables(&self, schema: &str) -> QueryResult<Vec<String>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT name FROM {}.sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            Dialect::Sqlite.quote_identifier(schema_or_main(schema))
        );
        let mut stmt = conn.prepare(&sql)?;
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tables)
    }

    async fn list_columns(&self, schema: &str, table: &str) -> QueryResult<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT name FROM pragma_table_info(?1, ?2) ORDER BY cid",
        )?;
        let columns = stmt
            .query_map(params![table, schema_or_main(schema)], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if columns.is_empty() {
            return Err(QueryError::TableNotFound {
                schema: schema.to_string(),
                table: table.to_string(),
            });
        }
        Ok(columns)
    }

    async fn begin_snapshot(&self) -> QueryResult<Box<dyn SnapshotSession>> {
        let conn = self.conn.clone().lock_owned().await;
        conn.execute_batch("BEGIN DEFERRED")?;
        Ok(Box::new(SqliteSession {
            snapshot: Some(Snapshot(conn)),
        }))
    }
}

/// Open `BEGIN DEFERRED` transaction on the locked connection. Rolled back on drop.
struct Snapshot(OwnedMutexGuard<Connection>);

impl Snapshot {
    fn rollback(&self) -> QueryResult<()> {
        if !self.0.is_autocommit() {
            self.0.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn count_duplicates(&self, sql: &str) -> QueryResult<u64> {
        let count: i64 = self.0.query_row(sql, [], |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| QueryError::unexpected(format!("negative duplicate count {}", count)))
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        if let Err(e) = self.rollback() {
            tracing::warn!(error = %e, "failed to roll back sqlite snapshot");
        }
    }
}

/// Session holding the connection lock until released or dropped.
///
/// Queries run on the blocking pool. The snapshot travels with the query,
/// so a cancelled or panicking query still rolls back and unlocks.
struct SqliteSession {
    snapshot: Option<Snapshot>,
}

#[async_trait]
impl SnapshotSession for SqliteSession {
    async fn count_duplicates(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[String],
    ) -> QueryResult<u64> {
        let sql = duplicate_count_sql(Dialect::Sqlite, schema_or_main(schema), table, columns)?;
        let snapshot = self.snapshot.take().ok_or(QueryError::SessionClosed)?;

        let (snapshot, count) = tokio::task::spawn_blocking(move || {
            let count = snapshot.count_duplicates(&sql);
            (snapshot, count)
        })
        .await
        .map_err(|e| QueryError::unexpected(format!("sqlite query task failed: {}", e)))?;

        self.snapshot = Some(snapshot);
        count
    }

    async fn release(mut self: Box<Self>) -> QueryResult<()> {
        match self.snapshot.take() {
            Some(snapshot) => snapshot.rollback(),
            None => Ok(()),
        }
    }
}

fn schema_or_main(schema: &str) -> &str {
    if schema.is_empty() {
        "main"
    } else {
        schema
    }
}
