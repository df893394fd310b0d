//! TOML-based configuration for keyscout.
//!
//! Supports a config file (keyscout.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [connections.air]
//! driver = "postgres"
//! connection_string = "${AIR_DB_URL}"
//! default_schema = "postgres_air"
//!
//! [connections.local]
//! driver = "sqlite"
//! connection_string = "./data/local.db"
//!
//! [worker]
//! path = "/usr/local/bin/keyscout-worker"
//! timeout_seconds = 300
//!
//! [worker.pool]
//! max_idle_conns = 5
//! max_open_conns = 10
//!
//! [search]
//! channel_capacity = 16
//! max_key_columns = 4
//! parallel_tables = 4
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::connection::{ConnectionConfig, Driver};

/// Name of the worker binary looked up when `worker.path` is unset.
const WORKER_BINARY: &str = "keyscout-worker";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Connection not found: {name} (configured: {available})")]
    ConnectionNotFound { name: String, available: String },
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Named database connections.
    pub connections: HashMap<String, ConnectionSettings>,

    pub worker: WorkerSettings,

    pub search: SearchSettings,
}

/// One `[connections.<name>]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionSettings {
    pub driver: Driver,

    /// Connection string (supports ${ENV_VAR} expansion).
    pub connection_string: String,

    /// Schema searched when none is given on the command line.
    #[serde(default)]
    pub default_schema: Option<String>,
}

impl ConnectionSettings {
    /// Expand the connection string into a ready-to-use config.
    pub fn resolve(&self) -> Result<ConnectionConfig, SettingsError> {
        Ok(ConnectionConfig {
            driver: self.driver,
            connection_string: expand_env_vars(&self.connection_string)?,
        })
    }

    /// The configured default schema, or the driver's.
    pub fn schema(&self) -> String {
        self.default_schema
            .clone()
            .unwrap_or_else(|| self.driver.default_schema().to_string())
    }
}

/// Worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Path to worker binary.
    pub path: Option<String>,

    /// Per-request timeout in seconds. Duplicate-count probes on large
    /// tables can be slow, so this is generous.
    pub timeout_seconds: u64,

    pub pool: PoolSettings,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            path: None,
            timeout_seconds: 300,
            pool: PoolSettings::default(),
        }
    }
}

/// Connection pool limits passed to the worker on its command line.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolSettings {
    pub max_idle_conns: u32,
    pub max_open_conns: u32,
    /// Go-style duration ("5m", "1h").
    pub conn_max_lifetime: String,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_idle_conns: 5,
            max_open_conns: 10,
            conn_max_lifetime: "5m".to_string(),
        }
    }
}

impl PoolSettings {
    pub fn to_worker_args(&self) -> Vec<String> {
        vec![
            "-pool".to_string(),
            format!("-pool-max-idle={}", self.max_idle_conns),
            format!("-pool-max-open={}", self.max_open_conns),
            format!("-pool-conn-lifetime={}", self.conn_max_lifetime),
        ]
    }
}

/// Search configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Capacity of the bounded queues between engine, compressor and caller.
    pub channel_capacity: usize,

    /// Largest column set to probe (unlimited if unset).
    pub max_key_columns: Option<usize>,

    /// Tables searched concurrently when scanning a schema.
    pub parallel_tables: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 16,
            max_key_columns: None,
            parallel_tables: 4,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => SettingsError::FileNotFound(path.to_path_buf()),
            _ => SettingsError::Read {
                path: path.to_path_buf(),
                source,
            },
        })?;

        toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The config file `load` would read, if any.
    ///
    /// `KEYSCOUT_CONFIG` wins even if the file is missing; otherwise the
    /// first existing of `./keyscout.toml` and `<config_dir>/keyscout/config.toml`.
    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = env::var_os("KEYSCOUT_CONFIG") {
            return Some(PathBuf::from(path));
        }

        let user_config = dirs::config_dir().map(|dir| dir.join("keyscout").join("config.toml"));
        std::iter::once(PathBuf::from("keyscout.toml"))
            .chain(user_config)
            .find(|path| path.exists())
    }

    /// Load settings from the default location, or the defaults if there is no file.
    pub fn load() -> Result<Self, SettingsError> {
        match Self::config_path() {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading settings");
                Self::from_file(path)
            }
            None => Ok(Settings::default()),
        }
    }

    /// Get a connection by name.
    pub fn get_connection(&self, name: &str) -> Result<&ConnectionSettings, SettingsError> {
        self.connections.get(name).ok_or_else(|| {
            let mut names: Vec<&str> = self.connections.keys().map(String::as_str).collect();
            names.sort_unstable();
            SettingsError::ConnectionNotFound {
                name: name.to_string(),
                available: names.join(", "),
            }
        })
    }

    /// The connection used when none is named: "default", or the only one.
    pub fn default_connection(&self) -> Option<(&str, &ConnectionSettings)> {
        if let Some(conn) = self.connections.get("default") {
            return Some(("default", conn));
        }
        match self.connections.len() {
            1 => self.connections.iter().next().map(|(k, v)| (k.as_str(), v)),
            _ => None,
        }
    }

    /// Locate the worker binary: `worker.path`, then the working directory, then PATH.
    pub fn worker_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.worker.path {
            return expand_env_vars(path).ok().map(PathBuf::from);
        }

        let local = Path::new(".").join(WORKER_BINARY);
        if local.is_file() {
            return Some(local);
        }

        env::var_os("PATH").and_then(|paths| {
            env::split_paths(&paths)
                .map(|dir| dir.join(WORKER_BINARY))
                .find(|path| path.is_file())
        })
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.next_if_eq(&'{').is_some() {
            while let Some(ch) = chars.next_if(|&ch| ch != '}') {
                var_name.push(ch);
            }
            chars.next(); // consume '}'
        } else {
            // $VAR ends at the first non-alphanumeric/underscore
            while let Some(ch) = chars.next_if(|&ch| ch.is_alphanumeric() || ch == '_') {
                var_name.push(ch);
            }
            if var_name.is_empty() {
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
