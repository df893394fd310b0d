//! Wire types for the worker's NDJSON protocol.
//!
//! Every line is one envelope. Metadata methods and `transaction.begin`
//! carry the connection parameters flattened next to their own fields;
//! the other transaction methods address an open transaction by the id
//! `transaction.begin` returned.
//!
//! ```text
//! → {"id":"…","method":"transaction.query","params":{"transaction_id":"tx-1","sql":"SELECT …"}}
//! ← {"id":"…","success":true,"result":{"rows":[[3]]}}
//! ```

use serde::{Deserialize, Serialize};

/// Request line sent to the worker.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    /// Correlation id, echoed back in the response.
    pub id: String,
    pub method: String,
    pub params: serde_json::Value,
}

/// Response line read from the worker.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    pub id: String,
    pub success: bool,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// Which database the worker should talk to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Driver name, e.g. "postgres" or "mssql".
    pub driver: String,
    pub connection_string: String,
}

/// Method parameters sent together with the connection they apply to.
#[derive(Debug, Serialize)]
pub struct Scoped<'a, P> {
    #[serde(flatten)]
    pub connection: &'a ConnectionParams,
    #[serde(flatten)]
    pub params: P,
}

impl<'a, P> Scoped<'a, P> {
    pub fn new(connection: &'a ConnectionParams, params: P) -> Self {
        Self { connection, params }
    }
}

/// `metadata.list_schemas` takes nothing besides the connection.
#[derive(Debug, Serialize)]
pub struct ListSchemas {}

#[derive(Debug, Serialize)]
pub struct ListTables<'a> {
    /// Omitted to let the worker pick the connection's default schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct GetColumns<'a> {
    pub schema: &'a str,
    pub table: &'a str,
}

#[derive(Debug, Serialize)]
pub struct BeginTransaction {
    pub read_only: bool,
}

#[derive(Debug, Serialize)]
pub struct TransactionQuery<'a> {
    pub transaction_id: &'a str,
    pub sql: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Rollback<'a> {
    pub transaction_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaInfo {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListSchemasResponse {
    pub schemas: Vec<SchemaInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableInfo {
    pub name: String,
    /// "TABLE", "BASE TABLE", "VIEW", ...
    #[serde(rename = "type")]
    pub table_type: String,
}

impl TableInfo {
    /// Views are listed by the worker but never searched.
    pub fn is_base_table(&self) -> bool {
        self.table_type.eq_ignore_ascii_case("TABLE")
            || self.table_type.eq_ignore_ascii_case("BASE TABLE")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListTablesResponse {
    pub tables: Vec<TableInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// 1-based ordinal position.
    pub position: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetColumnsResponse {
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BeginTransactionResponse {
    pub transaction_id: String,
}

/// Result of `transaction.query`; only the rows are read.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryResponse {
    /// The first cell of the first row, if any.
    pub fn scalar(&self) -> Option<&serde_json::Value> {
        self.rows.first().and_then(|row| row.first())
    }
}

/// Worker method names.
pub mod methods {
    pub const LIST_SCHEMAS: &str = "metadata.list_schemas";
    pub const LIST_TABLES: &str = "metadata.list_tables";
    pub const GET_COLUMNS: &str = "metadata.get_columns";
    pub const BEGIN_TRANSACTION: &str = "transaction.begin";
    pub const TRANSACTION_QUERY: &str = "transaction.query";
    pub const ROLLBACK: &str = "transaction.rollback";
}
