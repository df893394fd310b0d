//! Backend capability traits.
//!
//! The search engine never talks to a database directly. It asks a
//! `KeyBackend` for column lists and opens one `SnapshotSession` per run,
//! through which every duplicate-count probe is issued.

use async_trait::async_trait;

use super::error::QueryResult;

/// Capabilities a storage backend must provide for key discovery.
///
/// # Example
///
/// ```ignore
/// use keyscout::backend::{KeyBackend, SqliteBackend};
///
/// let backend = SqliteBackend::open("./data.db")?;
/// let columns = backend.list_columns("main", "airport").await?;
///
/// let mut session = backend.begin_snapshot().await?;
/// let dupes = session.count_duplicates("main", "airport", &columns).await?;
/// session.release().await?;
/// ```
#[async_trait]
pub trait KeyBackend: Send + Sync {
    /// List all schemas visible through this backend.
    async fn list_schemas(&self) -> QueryResult<Vec<String>>;

    /// List all tables in a schema.
    async fn list_tables(&self, schema: &str) -> QueryResult<Vec<String>>;

    /// List the columns of a table in declaration order.
    async fn list_columns(&self, schema: &str, table: &str) -> QueryResult<Vec<String>>;

    /// Open a transaction that all probes of one search run share.
    async fn begin_snapshot(&self) -> QueryResult<Box<dyn SnapshotSession>>;
}

/// A transaction exclusively owned by one search run.
///
/// Every probe issued through the same session observes the same snapshot.
/// `release` ends the transaction explicitly; implementations must also roll
/// back on drop so that an early exit never leaks an open transaction.
#[async_trait]
pub trait SnapshotSession: Send {
    /// Count excess duplicate rows when grouping `schema.table` by `columns`.
    ///
    /// Returns 0 when the column set is unique for the current snapshot.
    async fn count_duplicates(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[String],
    ) -> QueryResult<u64>;

    /// End the transaction.
    async fn release(self: Box<Self>) -> QueryResult<()>;
}
