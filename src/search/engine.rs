//! Best-first branch-and-bound search for primary-key candidates.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::state::{Frontier, SearchState};
use crate::backend::{KeyBackend, QueryResult, SnapshotSession};
use crate::candidate::KeyCandidate;

/// Counters describing one search run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Duplicate-count queries sent to the backend.
    pub probes: u64,
    /// Probes answered from the per-run memo instead of the backend.
    pub cached_probes: u64,
    /// States popped from the frontier and expanded.
    pub states_expanded: u64,
    /// Unique column sets emitted.
    pub keys_found: u64,
    /// Largest frontier size reached.
    pub frontier_high_water: usize,
}

/// Searches a table for minimal unique column sets.
///
/// The engine uses the backend's duplicate counter as an oracle: a probe
/// returning 0 proves a column set unique, and any count lower than the
/// parent's bound marks a branch worth extending.
pub struct KeySearchEngine {
    backend: Arc<dyn KeyBackend>,
    max_key_columns: Option<usize>,
}

impl KeySearchEngine {
    pub fn new(backend: Arc<dyn KeyBackend>) -> Self {
        Self {
            backend,
            max_key_columns: None,
        }
    }

    /// Stop extending states once they would exceed `limit` columns.
    pub fn with_max_key_columns(mut self, limit: Option<usize>) -> Self {
        self.max_key_columns = limit;
        self
    }

    /// Run the search, sending every proven candidate to `results`.
    ///
    /// Column listing happens before the snapshot is opened; every
    /// duplicate-count probe then runs in one session that is released on
    /// every exit path. Any probe failure aborts the run. Candidates already
    /// sent stay valid.
    ///
    /// If the receiving side of `results` is gone the search stops early
    /// and returns the stats gathered so far.
    pub async fn search(
        &self,
        schema: &str,
        table: &str,
        results: &mpsc::Sender<KeyCandidate>,
    ) -> QueryResult<SearchStats> {
        let columns = self.backend.list_columns(schema, table).await?;
        if columns.is_empty() {
            tracing::warn!(schema, table, "table has no columns; nothing to search");
            return Ok(SearchStats::default());
        }

        let mut session = self.backend.begin_snapshot().await?;
        let outcome = {
            let mut run = SearchRun {
                session: session.as_mut(),
                schema,
                table,
                results,
                max_key_columns: self.max_key_columns,
                memo: HashMap::new(),
                emitted: HashSet::new(),
                stats: SearchStats::default(),
            };
            let executed = run.execute(columns).await;
            executed.map(|()| run.stats)
        };

        if let Err(e) = session.release().await {
            tracing::warn!(schema, table, error = %e, "failed to release snapshot");
        }

        match &outcome {
            Ok(stats) => tracing::info!(
                schema,
                table,
                probes = stats.probes,
                cached_probes = stats.cached_probes,
                states = stats.states_expanded,
                keys = stats.keys_found,
                "key search finished"
            ),
            Err(e) => tracing::error!(schema, table, error = %e, "key search aborted"),
        }

        outcome
    }
}

/// Whether the run should keep going after an emission.
enum Flow {
    Continue,
    Stop,
}

/// Mutable state of a single search run.
struct SearchRun<'a> {
    session: &'a mut dyn SnapshotSession,
    schema: &'a str,
    table: &'a str,
    results: &'a mpsc::Sender<KeyCandidate>,
    max_key_columns: Option<usize>,
    /// Counts of every column set probed so far in this snapshot.
    memo: HashMap<BTreeSet<String>, u64>,
    /// Unique column sets already sent downstream.
    emitted: HashSet<BTreeSet<String>>,
    stats: SearchStats,
}

impl SearchRun<'_> {
    async fn execute(&mut self, columns: Vec<String>) -> QueryResult<()> {
        // A table with identical full rows can have no key at all.
        let full_row = self.probe(&columns).await?;
        if full_row > 0 {
            tracing::debug!(
                table = self.table,
                duplicates = full_row,
                "table has duplicate rows"
            );
            let candidate = KeyCandidate::new(self.table, columns, full_row);
            self.emit(candidate).await;
            return Ok(());
        }

        let mut frontier = Frontier::new();
        frontier.push(SearchState::root(columns));

        while let Some(state) = frontier.pop() {
            self.stats.states_expanded += 1;

            if self
                .max_key_columns
                .is_some_and(|limit| state.selected.len() >= limit)
            {
                continue;
            }

            let mut improvements = Vec::new();
            for index in 0..state.remaining.len() {
                let probe_columns = state.extended_columns(index);
                let count = self.probe(&probe_columns).await?;

                if count == 0 {
                    // Supersets of a unique set are never smaller; stop here.
                    let set: BTreeSet<String> = probe_columns.into_iter().collect();
                    if self.emitted.insert(set.clone()) {
                        self.stats.keys_found += 1;
                        let candidate = KeyCandidate {
                            table: self.table.to_string(),
                            columns: set,
                            duplicates: 0,
                        };
                        if let Flow::Stop = self.emit(candidate).await {
                            return Ok(());
                        }
                    }
                } else if count < state.bound {
                    improvements.push((index, count));
                }
            }

            for (index, count) in improvements {
                frontier.push(state.child(index, count));
            }
            self.stats.frontier_high_water = frontier.high_water();
        }

        Ok(())
    }

    /// Count duplicates for `columns`, reusing an earlier answer for the same set.
    async fn probe(&mut self, columns: &[String]) -> QueryResult<u64> {
        let set: BTreeSet<String> = columns.iter().cloned().collect();
        if let Some(&count) = self.memo.get(&set) {
            self.stats.cached_probes += 1;
            return Ok(count);
        }

        let count = self
            .session
            .count_duplicates(self.schema, self.table, columns)
            .await?;
        self.stats.probes += 1;
        tracing::debug!(table = self.table, ?columns, count, "probe");

        self.memo.insert(set, count);
        Ok(count)
    }

    async fn emit(&mut self, candidate: KeyCandidate) -> Flow {
        match self.results.send(candidate).await {
            Ok(()) => Flow::Continue,
            Err(_) => {
                tracing::debug!(table = self.table, "result receiver dropped; stopping search");
                Flow::Stop
            }
        }
    }
}
