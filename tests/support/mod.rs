//! Scripted backend shared by the integration tests.
#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use keyscout::backend::{KeyBackend, QueryError, QueryResult, SnapshotSession};

fn set(columns: &[&str]) -> BTreeSet<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

#[derive(Default)]
struct Journal {
    probes: Mutex<Vec<BTreeSet<String>>>,
    sessions_begun: AtomicUsize,
    sessions_closed: AtomicUsize,
}

/// Backend answering duplicate counts from a fixed table of responses.
///
/// Unscripted column sets fail the probe, so tests notice any query they
/// did not expect.
#[derive(Clone)]
pub struct ScriptedBackend {
    columns: Vec<String>,
    counts: HashMap<BTreeSet<String>, u64>,
    failures: HashSet<BTreeSet<String>>,
    panics: HashSet<BTreeSet<String>>,
    fail_list_columns: bool,
    journal: Arc<Journal>,
}

impl ScriptedBackend {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            counts: HashMap::new(),
            failures: HashSet::new(),
            panics: HashSet::new(),
            fail_list_columns: false,
            journal: Arc::new(Journal::default()),
        }
    }

    pub fn count(mut self, columns: &[&str], duplicates: u64) -> Self {
        self.counts.insert(set(columns), duplicates);
        self
    }

    pub fn fail_on(mut self, columns: &[&str]) -> Self {
        self.failures.insert(set(columns));
        self
    }

    /// Panic inside the probe for `columns`, like a broken driver would.
    pub fn panic_on(mut self, columns: &[&str]) -> Self {
        self.panics.insert(set(columns));
        self
    }

    pub fn fail_list_columns(mut self) -> Self {
        self.fail_list_columns = true;
        self
    }

    /// Scripted count for a column set, if any.
    pub fn expected(&self, columns: &BTreeSet<String>) -> Option<u64> {
        self.counts.get(columns).copied()
    }

    /// Every probe issued so far, in order.
    pub fn probes(&self) -> Vec<BTreeSet<String>> {
        self.journal.probes.lock().unwrap().clone()
    }

    pub fn sessions_begun(&self) -> usize {
        self.journal.sessions_begun.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.journal.sessions_closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyBackend for ScriptedBackend {
    async fn list_schemas(&self) -> QueryResult<Vec<String>> {
        Ok(vec!["main".to_string()])
    }

    async fn list_tables(&self, _schema: &str) -> QueryResult<Vec<String>> {
        Ok(vec!["t".to_string()])
    }

    async fn list_columns(&self, schema: &str, table: &str) -> QueryResult<Vec<String>> {
        if self.fail_list_columns {
            return Err(QueryError::TableNotFound {
                schema: schema.to_string(),
                table: table.to_string(),
            });
        }
        Ok(self.columns.clone())
    }

    async fn begin_snapshot(&self) -> QueryResult<Box<dyn SnapshotSession>> {
        self.journal.sessions_begun.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            backend: self.clone(),
            closed: false,
        }))
    }
}

struct ScriptedSession {
    backend: ScriptedBackend,
    closed: bool,
}

impl ScriptedSession {
    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.backend
                .journal
                .sessions_closed
                .fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl SnapshotSession for ScriptedSession {
    async fn count_duplicates(
        &mut self,
        _schema: &str,
        _table: &str,
        columns: &[String],
    ) -> QueryResult<u64> {
        let key: BTreeSet<String> = columns.iter().cloned().collect();
        self.backend.journal.probes.lock().unwrap().push(key.clone());

        if self.backend.panics.contains(&key) {
            panic!("driver crashed on {:?}", key);
        }
        if self.backend.failures.contains(&key) {
            return Err(QueryError::unexpected(format!("probe failed: {:?}", key)));
        }
        self.backend
            .counts
            .get(&key)
            .copied()
            .ok_or_else(|| QueryError::unexpected(format!("unscripted probe: {:?}", key)))
    }

    async fn release(mut self: Box<Self>) -> QueryResult<()> {
        self.close();
        Ok(())
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Three columns where every pair is a key (no single column is).
pub fn pairwise_backend() -> ScriptedBackend {
    ScriptedBackend::new(&["a", "b", "c"])
        .count(&["a", "b", "c"], 0)
        .count(&["a"], 5)
        .count(&["b"], 3)
        .count(&["c"], 9)
        .count(&["a", "b"], 0)
        .count(&["a", "c"], 0)
        .count(&["b", "c"], 0)
}

/// Five columns where every pair is a key, giving ten incomparable results.
pub fn wide_pairwise_backend() -> ScriptedBackend {
    let names = ["a", "b", "c", "d", "e"];
    let mut backend = ScriptedBackend::new(&names).count(&names, 0);
    for (i, x) in names.iter().enumerate() {
        backend = backend.count(&[*x], 3);
        for y in &names[i + 1..] {
            backend = backend.count(&[*x, *y], 0);
        }
    }
    backend
}

pub fn columns(names: &[&str]) -> BTreeSet<String> {
    set(names)
}
