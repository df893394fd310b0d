//! Tests for ResultCompressor as a stream stage.

use keyscout::{KeyCandidate, ResultCompressor};
use tokio::sync::{mpsc, watch};

fn candidate(table: &str, columns: &[&str], duplicates: u64) -> KeyCandidate {
    KeyCandidate::new(table, columns.iter().copied(), duplicates)
}

/// Feed `input` through a compressor, closing the input afterwards.
async fn compress(input: Vec<KeyCandidate>) -> Vec<KeyCandidate> {
    let (in_tx, in_rx) = mpsc::channel(input.len().max(1));
    let (out_tx, mut out_rx) = mpsc::channel(input.len().max(1));
    let (_done_tx, done_rx) = watch::channel(false);

    for c in input {
        in_tx.send(c).await.unwrap();
    }
    drop(in_tx);

    ResultCompressor::new().run(in_rx, out_tx, done_rx).await;

    let mut out = Vec::new();
    while let Some(c) = out_rx.recv().await {
        out.push(c);
    }
    out
}

#[tokio::test]
async fn test_drops_supersets_that_add_nothing() {
    let out = compress(vec![
        candidate("t", &["a"], 0),
        candidate("t", &["a", "b"], 0),
        candidate("t", &["c"], 0),
    ])
    .await;

    assert_eq!(out, vec![candidate("t", &["a"], 0), candidate("t", &["c"], 0)]);
}

#[tokio::test]
async fn test_keeps_supersets_with_fewer_duplicates() {
    let out = compress(vec![
        candidate("t", &["a"], 24),
        candidate("t", &["b"], 10),
        candidate("t", &["a", "b"], 0),
        candidate("t", &["a", "c"], 24),
    ])
    .await;

    assert_eq!(
        out,
        vec![
            candidate("t", &["a"], 24),
            candidate("t", &["b"], 10),
            candidate("t", &["a", "b"], 0),
        ]
    );
}

#[tokio::test]
async fn test_tables_are_compressed_independently() {
    let out = compress(vec![
        candidate("flight", &["id"], 0),
        candidate("airport", &["id", "code"], 0),
        candidate("flight", &["id", "code"], 0),
    ])
    .await;

    assert_eq!(
        out,
        vec![
            candidate("flight", &["id"], 0),
            candidate("airport", &["id", "code"], 0),
        ]
    );
}

#[tokio::test]
async fn test_repeats_are_forwarded_once() {
    let out = compress(vec![candidate("t", &["a", "b"], 0); 3]).await;
    assert_eq!(out, vec![candidate("t", &["a", "b"], 0)]);
}

#[tokio::test]
async fn test_forwarded_keys_form_an_antichain() {
    // Every unique subset of four columns, narrowest first.
    let names = ["a", "b", "c", "d"];
    let mut input = Vec::new();
    for width in 1..=names.len() {
        for mask in 0u32..16 {
            if mask.count_ones() as usize != width {
                continue;
            }
            let columns: Vec<&str> = (0..names.len())
                .filter(|i| mask & (1 << i) != 0)
                .map(|i| names[i])
                .collect();
            // Any set containing "a", or both "b" and "c", is unique.
            let unique = columns.contains(&"a") || (columns.contains(&"b") && columns.contains(&"c"));
            if unique {
                input.push(candidate("t", &columns, 0));
            }
        }
    }

    let out = compress(input).await;

    assert_eq!(out, vec![candidate("t", &["a"], 0), candidate("t", &["b", "c"], 0)]);
    for x in &out {
        for y in &out {
            if x != y {
                assert!(!x.covers(y), "{} covers {}", x, y);
            }
        }
    }
}

#[tokio::test]
async fn test_stops_on_done_after_draining_buffered_input() {
    let (in_tx, in_rx) = mpsc::channel(8);
    let (out_tx, mut out_rx) = mpsc::channel(8);
    let (done_tx, done_rx) = watch::channel(false);

    in_tx.send(candidate("t", &["a"], 0)).await.unwrap();
    in_tx.send(candidate("t", &["b"], 0)).await.unwrap();
    done_tx.send_replace(true);

    // The input side stays open; only `done` can end the loop.
    let compressor = ResultCompressor::new().run(in_rx, out_tx, done_rx).await;

    assert_eq!(compressor.forwarded("t").len(), 2);
    assert_eq!(out_rx.recv().await, Some(candidate("t", &["a"], 0)));
    assert_eq!(out_rx.recv().await, Some(candidate("t", &["b"], 0)));
    assert_eq!(out_rx.recv().await, None);
    drop(in_tx);
}

#[tokio::test]
async fn test_stops_when_done_sender_is_dropped() {
    let (_in_tx, in_rx) = mpsc::channel::<KeyCandidate>(1);
    let (out_tx, mut out_rx) = mpsc::channel(1);
    let (done_tx, done_rx) = watch::channel(false);
    drop(done_tx);

    let compressor = ResultCompressor::new().run(in_rx, out_tx, done_rx).await;

    assert_eq!(compressor.dropped(), 0);
    assert_eq!(out_rx.recv().await, None);
}

#[tokio::test]
async fn test_stops_when_output_is_dropped() {
    let (in_tx, in_rx) = mpsc::channel(4);
    let (out_tx, out_rx) = mpsc::channel(4);
    let (_done_tx, done_rx) = watch::channel(false);
    drop(out_rx);

    in_tx.send(candidate("t", &["a"], 0)).await.unwrap();

    let compressor = ResultCompressor::new().run(in_rx, out_tx, done_rx).await;
    assert_eq!(compressor.forwarded("t").len(), 1);
    drop(in_tx);
}
