//! Streaming compression of key candidates.
//!
//! The search may report a column set and later a wider set that adds
//! nothing. The compressor remembers what it has forwarded per table and
//! drops every candidate that is covered by a forwarded one with an equal
//! or better duplicate count.
//!
//! Candidates for a table must arrive in non-decreasing width. Only
//! already-forwarded (hence no wider) entries are compared against, so a
//! narrow candidate arriving after a wide one does not retract it.

use std::collections::HashMap;

use tokio::sync::{mpsc, watch};

use crate::candidate::KeyCandidate;

/// Forwards only candidates not dominated by an earlier forwarded one.
#[derive(Debug, Default)]
pub struct ResultCompressor {
    /// Forwarded candidates per table.
    stored: HashMap<String, Vec<KeyCandidate>>,
    dropped: u64,
}

impl ResultCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `candidate` should be forwarded, remembering it if so.
    ///
    /// A candidate is forwarded when no stored candidate for the same table
    /// has a subset of its columns, or when it has strictly fewer
    /// duplicates than every such stored candidate. An exact repeat is
    /// always dropped.
    pub fn offer(&mut self, candidate: &KeyCandidate) -> bool {
        let stored = self.stored.entry(candidate.table.clone()).or_default();
        if stored.contains(candidate) {
            self.dropped += 1;
            return false;
        }

        let dominated = stored
            .iter()
            .any(|s| candidate.covers(s) && candidate.duplicates >= s.duplicates);
        if dominated {
            tracing::trace!(
                table = %candidate.table,
                width = candidate.width(),
                duplicates = candidate.duplicates,
                "dropping dominated candidate"
            );
            self.dropped += 1;
            return false;
        }

        stored.push(candidate.clone());
        true
    }

    /// Candidates forwarded so far for `table`, in acceptance order.
    pub fn forwarded(&self, table: &str) -> &[KeyCandidate] {
        self.stored.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of candidates dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Consume `input` until it closes or `done` changes to true, forwarding
    /// survivors to `output` in arrival order.
    ///
    /// When `done` is observed, candidates already buffered in `input` are
    /// still processed; anything the producer sends afterwards is not.
    pub async fn run(
        mut self,
        mut input: mpsc::Receiver<KeyCandidate>,
        output: mpsc::Sender<KeyCandidate>,
        mut done: watch::Receiver<bool>,
    ) -> Self {
        loop {
            tokio::select! {
                biased;
                item = input.recv() => match item {
                    Some(candidate) => {
                        if !self.forward(candidate, &output).await {
                            break;
                        }
                    }
                    None => break,
                },
                changed = done.changed() => {
                    let finished = changed.is_err() || *done.borrow_and_update();
                    if !finished {
                        continue;
                    }
                    while let Ok(candidate) = input.try_recv() {
                        if !self.forward(candidate, &output).await {
                            break;
                        }
                    }
                    break;
                }
            }
        }

        tracing::debug!(
            forwarded = self.stored.values().map(Vec::len).sum::<usize>(),
            dropped = self.dropped,
            "result compressor stopped"
        );
        self
    }

    /// Offer one candidate and send it on if accepted. Returns `false` once
    /// the output side is gone.
    async fn forward(
        &mut self,
        candidate: KeyCandidate,
        output: &mpsc::Sender<KeyCandidate>,
    ) -> bool {
        if !self.offer(&candidate) {
            return true;
        }
        output.send(candidate).await.is_ok()
    }
}
