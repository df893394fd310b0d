//! # keyscout
//!
//! Empirical primary-key candidate discovery for tables that declare no keys.
//!
//! ## Architecture
//!
//! keyscout counts duplicate rows for growing column combinations and
//! reports the minimal combinations that make every row unique:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              KeyBackend (SQLite / worker)                │
//! │      list_columns · begin_snapshot · count_duplicates    │
//! └─────────────────────────────────────────────────────────┘
//!                          │ probes
//!                          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │       KeySearchEngine (best-first branch and bound)      │
//! └─────────────────────────────────────────────────────────┘
//!                          │ raw candidates (bounded mpsc)
//!                          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │     ResultCompressor (drops dominated candidates)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//!             KeySearch { results, errors, done }
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use keyscout::backend::SqliteBackend;
//! use keyscout::config::SearchSettings;
//!
//! let backend = Arc::new(SqliteBackend::open("./air.db")?);
//! let report = keyscout::pipeline::start(backend, "main", "airport", &SearchSettings::default())
//!     .collect()
//!     .await;
//!
//! for key in report.keys() {
//!     println!("{}", key);
//! }
//! ```

pub mod backend;
pub mod candidate;
pub mod compress;
pub mod config;
pub mod pipeline;
pub mod search;
pub mod sql;
pub mod worker;

pub use backend::{KeyBackend, QueryError, QueryResult, SnapshotSession};
pub use candidate::KeyCandidate;
pub use compress::ResultCompressor;
pub use pipeline::{scan_schema, start, KeySearch, SearchReport};
pub use search::{KeySearchEngine, SearchStats};
