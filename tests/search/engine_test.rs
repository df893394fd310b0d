//! Tests for KeySearchEngine against a scripted backend.

#[path = "../support/mod.rs"]
mod support;

use std::collections::BTreeSet;
use std::sync::Arc;

use keyscout::backend::QueryError;
use keyscout::{KeyCandidate, KeySearchEngine};
use support::{columns, pairwise_backend, ScriptedBackend};
use tokio::sync::mpsc;

/// Run a search to completion, returning the outcome and everything emitted.
async fn run(
    backend: &ScriptedBackend,
    max_key_columns: Option<usize>,
) -> (Result<keyscout::SearchStats, QueryError>, Vec<KeyCandidate>) {
    let (tx, mut rx) = mpsc::channel(64);
    let engine =
        KeySearchEngine::new(Arc::new(backend.clone())).with_max_key_columns(max_key_columns);
    let outcome = engine.search("main", "t", &tx).await;
    drop(tx);

    let mut emitted = Vec::new();
    while let Some(candidate) = rx.recv().await {
        emitted.push(candidate);
    }
    (outcome, emitted)
}

fn column_sets(candidates: &[KeyCandidate]) -> Vec<BTreeSet<String>> {
    candidates.iter().map(|c| c.columns.clone()).collect()
}

#[tokio::test]
async fn test_finds_every_pairwise_key() {
    let backend = pairwise_backend();
    let (outcome, emitted) = run(&backend, None).await;
    let stats = outcome.unwrap();

    assert_eq!(
        column_sets(&emitted),
        vec![
            columns(&["a", "b"]),
            columns(&["b", "c"]),
            columns(&["a", "c"]),
        ]
    );
    assert!(emitted.iter().all(|c| c.table == "t" && c.duplicates == 0));
    assert!(!emitted.iter().any(|c| c.columns == columns(&["a", "b", "c"])));

    assert_eq!(stats.probes, 7);
    assert_eq!(stats.cached_probes, 3);
    assert_eq!(stats.keys_found, 3);
    assert_eq!(stats.states_expanded, 4);
}

#[tokio::test]
async fn test_each_column_set_is_probed_once() {
    let backend = pairwise_backend();
    let _ = run(&backend, None).await;

    let probes = backend.probes();
    let unique: BTreeSet<_> = probes.iter().cloned().collect();
    assert_eq!(probes.len(), unique.len());
    assert_eq!(probes[0], columns(&["a", "b", "c"]));
}

#[tokio::test]
async fn test_duplicate_rows_short_circuit() {
    let backend = ScriptedBackend::new(&["a", "b", "c"]).count(&["a", "b", "c"], 4);
    let (outcome, emitted) = run(&backend, None).await;
    let stats = outcome.unwrap();

    assert_eq!(emitted, vec![KeyCandidate::new("t", ["a", "b", "c"], 4)]);
    assert_eq!(stats.probes, 1);
    assert_eq!(stats.keys_found, 0);
    assert_eq!(backend.probes().len(), 1);
}

#[tokio::test]
async fn test_key_needing_every_column() {
    let backend = ScriptedBackend::new(&["a", "b", "c"])
        .count(&["a", "b", "c"], 0)
        .count(&["a"], 2)
        .count(&["b"], 7)
        .count(&["c"], 7)
        .count(&["a", "b"], 2)
        .count(&["a", "c"], 1)
        .count(&["b", "c"], 7);
    let (outcome, emitted) = run(&backend, None).await;
    let stats = outcome.unwrap();

    assert_eq!(emitted, vec![KeyCandidate::new("t", ["a", "b", "c"], 0)]);
    assert_eq!(stats.probes, 7);
}

#[tokio::test]
async fn test_emitted_counts_match_the_backend() {
    let backends = [
        pairwise_backend(),
        ScriptedBackend::new(&["a", "b"])
            .count(&["a", "b"], 0)
            .count(&["a"], 1)
            .count(&["b"], 0),
        ScriptedBackend::new(&["a", "b"]).count(&["a", "b"], 2),
    ];

    for backend in &backends {
        let (_, emitted) = run(backend, None).await;
        assert!(!emitted.is_empty());
        for candidate in &emitted {
            assert_eq!(
                Some(candidate.duplicates),
                backend.expected(&candidate.columns),
                "{}",
                candidate
            );
        }
    }
}

#[tokio::test]
async fn test_max_key_columns_limits_depth() {
    let backend = pairwise_backend();
    let (outcome, emitted) = run(&backend, Some(1)).await;
    let stats = outcome.unwrap();

    assert!(emitted.is_empty());
    assert_eq!(stats.probes, 4);
    assert!(backend.probes().iter().all(|p| p.len() == 1 || p.len() == 3));
}

#[tokio::test]
async fn test_single_column_keys_with_limit() {
    let backend = ScriptedBackend::new(&["id", "name"])
        .count(&["id", "name"], 0)
        .count(&["id"], 0)
        .count(&["name"], 3);
    let (outcome, emitted) = run(&backend, Some(1)).await;

    assert!(outcome.is_ok());
    assert_eq!(emitted, vec![KeyCandidate::new("t", ["id"], 0)]);
}

#[tokio::test]
async fn test_runs_are_repeatable() {
    let backend = pairwise_backend();
    let (_, first) = run(&backend, None).await;
    let (_, second) = run(&backend, None).await;

    assert_eq!(first, second);
    assert_eq!(backend.sessions_begun(), 2);
}

#[tokio::test]
async fn test_probe_failure_aborts_and_keeps_earlier_results() {
    let backend = ScriptedBackend::new(&["a", "b", "c"])
        .count(&["a", "b", "c"], 0)
        .count(&["a"], 2)
        .count(&["b"], 4)
        .count(&["c"], 6)
        .count(&["a", "b"], 0)
        .fail_on(&["a", "c"]);
    let (outcome, emitted) = run(&backend, None).await;

    assert!(matches!(outcome, Err(QueryError::UnexpectedResult(_))));
    assert_eq!(emitted, vec![KeyCandidate::new("t", ["a", "b"], 0)]);
    assert_eq!(backend.sessions_closed(), 1);
}

#[tokio::test]
async fn test_session_is_released_on_every_exit() {
    let finished = pairwise_backend();
    let _ = run(&finished, None).await;

    let short_circuit = ScriptedBackend::new(&["a"]).count(&["a"], 1);
    let _ = run(&short_circuit, None).await;

    let failed = ScriptedBackend::new(&["a", "b"]).fail_on(&["a", "b"]);
    let _ = run(&failed, None).await;

    for backend in [&finished, &short_circuit, &failed] {
        assert_eq!(backend.sessions_begun(), 1);
        assert_eq!(backend.sessions_closed(), 1);
    }
}

#[tokio::test]
async fn test_listing_failure_opens_no_session() {
    let backend = ScriptedBackend::new(&["a"]).fail_list_columns();
    let (outcome, emitted) = run(&backend, None).await;

    assert!(matches!(outcome, Err(QueryError::TableNotFound { .. })));
    assert!(emitted.is_empty());
    assert_eq!(backend.sessions_begun(), 0);
}

#[tokio::test]
async fn test_table_without_columns_yields_nothing() {
    let backend = ScriptedBackend::new(&[]);
    let (outcome, emitted) = run(&backend, None).await;

    assert_eq!(outcome.unwrap(), keyscout::SearchStats::default());
    assert!(emitted.is_empty());
    assert!(backend.probes().is_empty());
}

#[tokio::test]
async fn test_dropped_receiver_stops_search() {
    let backend = pairwise_backend();
    let (tx, rx) = mpsc::channel(4);
    drop(rx);

    let engine = KeySearchEngine::new(Arc::new(backend.clone()));
    let stats = engine.search("main", "t", &tx).await.unwrap();

    // Stops at the first emission instead of probing the rest.
    assert_eq!(stats.keys_found, 1);
    assert!(backend.probes().len() < 7);
    assert_eq!(backend.sessions_closed(), 1);
}
