//! Configuration module for keyscout.
//!
//! Handles connection configuration, environment variables, and settings.

mod connection;
mod settings;

pub use connection::{ConnectionConfig, ConnectionError, Driver};
pub use settings::{
    expand_env_vars, ConnectionSettings, PoolSettings, SearchSettings, Settings, SettingsError,
    WorkerSettings,
};
