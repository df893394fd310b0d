//! Wiring of the search engine and the result compressor.
//!
//! ```text
//!   KeySearchEngine ──(bounded mpsc)──► ResultCompressor ──► results
//!         │                                   ▲
//!         ├──────────────► errors             │ stop
//!         └──────────────► done (watch) ──────┘
//! ```
//!
//! Both halves run as separate tokio tasks. The engine signals `done`
//! exactly once through a guard, whether it finishes, short-circuits on
//! duplicate rows, fails a probe, or panics. A panic is reported on
//! `errors` as `QueryError::SearchAborted`.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::backend::{KeyBackend, QueryError, QueryResult};
use crate::candidate::KeyCandidate;
use crate::compress::ResultCompressor;
use crate::config::SearchSettings;
use crate::search::{KeySearchEngine, SearchStats};

/// Handle to a running key search.
///
/// `results` yields compressed candidates as they are accepted and closes
/// once the compressor has stopped. `errors` yields at most one error.
/// `done` turns true when the engine has finished, successfully or not.
pub struct KeySearch {
    pub table: String,
    pub results: mpsc::Receiver<KeyCandidate>,
    pub errors: mpsc::Receiver<QueryError>,
    pub done: watch::Receiver<bool>,
    engine: JoinHandle<Option<SearchStats>>,
}

/// Everything a finished search produced.
#[derive(Debug)]
pub struct SearchReport {
    pub table: String,
    /// Compressed candidates in acceptance order.
    pub candidates: Vec<KeyCandidate>,
    /// Engine counters; absent when the search failed.
    pub stats: Option<SearchStats>,
    /// The error that aborted the search, if any.
    pub error: Option<QueryError>,
}

impl SearchReport {
    /// Whether the search ran to completion.
    ///
    /// An incomplete report's candidates are valid but may be neither
    /// complete nor minimal.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Candidates that are primary-key candidates (no duplicates).
    pub fn keys(&self) -> impl Iterator<Item = &KeyCandidate> {
        self.candidates.iter().filter(|c| c.is_key())
    }
}

/// Signals `done` when dropped, so every engine exit path completes once.
struct CompletionGuard(watch::Sender<bool>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "search task panicked".to_string())
}

/// Start searching `schema.table` for key candidates.
///
/// Must be called from within a tokio runtime.
pub fn start(
    backend: Arc<dyn KeyBackend>,
    schema: &str,
    table: &str,
    settings: &SearchSettings,
) -> KeySearch {
    let capacity = settings.channel_capacity.max(1);
    let (raw_tx, raw_rx) = mpsc::channel(capacity);
    let (out_tx, out_rx) = mpsc::channel(capacity);
    let (err_tx, err_rx) = mpsc::channel(1);
    let (done_tx, done_rx) = watch::channel(false);

    tracing::info!(schema, table, "starting key search");

    tokio::spawn(ResultCompressor::new().run(raw_rx, out_tx, done_rx.clone()));

    let engine = KeySearchEngine::new(backend).with_max_key_columns(settings.max_key_columns);
    let schema = schema.to_string();
    let table_name = table.to_string();
    let engine = tokio::spawn(async move {
        let _completion = CompletionGuard(done_tx);

        let outcome = AssertUnwindSafe(engine.search(&schema, &table_name, &raw_tx))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let message = panic_message(&*payload);
                tracing::error!(schema = %schema, table = %table_name, %message, "key search panicked");
                Err(QueryError::SearchAborted(message))
            });
        drop(raw_tx);

        match outcome {
            Ok(stats) => Some(stats),
            Err(e) => {
                let _ = err_tx.try_send(e);
                None
            }
        }
    });

    KeySearch {
        table: table.to_string(),
        results: out_rx,
        errors: err_rx,
        done: done_rx,
        engine,
    }
}

impl KeySearch {
    /// Whether the engine has signalled completion.
    pub fn is_done(&self) -> bool {
        *self.done.borrow()
    }

    /// Drain the search into a report.
    pub async fn collect(mut self) -> SearchReport {
        let mut candidates = Vec::new();
        while let Some(candidate) = self.results.recv().await {
            candidates.push(candidate);
        }

        let mut error = self.errors.recv().await;
        let stats = match self.engine.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!(table = %self.table, error = %e, "key search task failed");
                error.get_or_insert_with(|| QueryError::SearchAborted(e.to_string()));
                None
            }
        };

        SearchReport {
            table: self.table,
            candidates,
            stats,
            error,
        }
    }
}

/// Search every table of a schema, up to `parallel_tables` at a time.
///
/// Reports are returned sorted by table name. Failing to list the tables
/// is an error; a failing table only marks its own report incomplete.
pub async fn scan_schema(
    backend: Arc<dyn KeyBackend>,
    schema: &str,
    settings: &SearchSettings,
) -> QueryResult<Vec<SearchReport>> {
    let tables = backend.list_tables(schema).await?;
    tracing::info!(schema, tables = tables.len(), "scanning schema");

    let mut reports: Vec<SearchReport> = stream::iter(tables)
        .map(|table| start(backend.clone(), schema, &table, settings).collect())
        .buffer_unordered(settings.parallel_tables.max(1))
        .collect()
        .await;

    reports.sort_by(|a, b| a.table.cmp(&b.table));
    Ok(reports)
}
