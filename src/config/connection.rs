//! Database connection configuration.
//!
//! Besides named connections in the settings file, a connection can be
//! given through environment variables:
//! - `KEYSCOUT_DB_DRIVER`: Database driver (sqlite, postgres, duckdb, mysql, mssql)
//! - `KEYSCOUT_DB_URL`: Driver-specific connection string (file path for sqlite)

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::sql::Dialect;

/// Error type for connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unsupported driver: {0}. Supported: sqlite, postgres, duckdb, mysql, mssql")]
    UnsupportedDriver(String),
}

/// Supported database drivers.
///
/// Deserializes from any accepted driver name, so an unknown driver in the
/// settings file is reported as a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Driver {
    /// SQLite, opened in-process
    Sqlite,
    /// PostgreSQL (via worker)
    Postgres,
    /// DuckDB (via worker)
    DuckDb,
    /// MySQL / MariaDB (via worker)
    MySql,
    /// Microsoft SQL Server (via worker)
    MsSql,
}

impl FromStr for Driver {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Driver::Postgres),
            "duckdb" | "duck" => Ok(Driver::DuckDb),
            "mysql" | "mariadb" => Ok(Driver::MySql),
            "mssql" | "sqlserver" | "sql_server" => Ok(Driver::MsSql),
            other => Err(ConnectionError::UnsupportedDriver(other.to_string())),
        }
    }
}

impl TryFrom<String> for Driver {
    type Error = ConnectionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Serialize for Driver {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Driver {
    /// Driver name as the worker expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Sqlite => "sqlite",
            Driver::Postgres => "postgres",
            Driver::DuckDb => "duckdb",
            Driver::MySql => "mysql",
            Driver::MsSql => "mssql",
        }
    }

    /// SQL dialect used to render probe queries.
    pub fn dialect(&self) -> Dialect {
        match self {
            Driver::Sqlite => Dialect::Sqlite,
            Driver::Postgres => Dialect::Postgres,
            Driver::DuckDb => Dialect::DuckDb,
            Driver::MySql => Dialect::MySql,
            Driver::MsSql => Dialect::TSql,
        }
    }

    /// Whether the driver is served in-process rather than by the worker.
    pub fn is_in_process(&self) -> bool {
        matches!(self, Driver::Sqlite)
    }

    /// Schema used when none is given.
    pub fn default_schema(&self) -> &'static str {
        match self {
            Driver::Sqlite | Driver::DuckDb => "main",
            Driver::Postgres => "public",
            Driver::MySql => "",
            Driver::MsSql => "dbo",
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Database driver.
    pub driver: Driver,
    /// Driver-specific connection string.
    pub connection_string: String,
}

impl ConnectionConfig {
    /// Create a config for a SQLite file.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            driver: Driver::Sqlite,
            connection_string: path.into(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConnectionError> {
        let driver_str = env::var("KEYSCOUT_DB_DRIVER")
            .map_err(|_| ConnectionError::MissingEnvVar("KEYSCOUT_DB_DRIVER".to_string()))?;
        let driver = driver_str.parse()?;

        let connection_string = env::var("KEYSCOUT_DB_URL")
            .map_err(|_| ConnectionError::MissingEnvVar("KEYSCOUT_DB_URL".to_string()))?;

        Ok(Self {
            driver,
            connection_string,
        })
    }
}
