//! Storage backends.
//!
//! The search and compression logic only depend on the `KeyBackend`
//! capability set, so retargeting keyscout to another database means
//! providing another implementation here.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          KeyBackend                             │
//! │  - list_schemas()          - list_columns()   (ColumnLister)    │
//! │  - list_tables()           - begin_snapshot() → SnapshotSession │
//! │                              └ count_duplicates() (Duplicate-   │
//! │                                                   Counter)      │
//! └─────────────────────────────────────────────────────────────────┘
//!            │                                   │
//!            ▼                                   ▼
//!   SqliteBackend (rusqlite)          WorkerBackend (NDJSON worker)
//! ```

mod error;
mod provider;
mod sqlite;
mod worker;

pub use error::{QueryError, QueryResult};
pub use provider::{KeyBackend, SnapshotSession};
pub use sqlite::SqliteBackend;
pub use worker::WorkerBackend;
