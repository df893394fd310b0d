//! Key candidate results.
//!
//! A `KeyCandidate` is one probed column set together with the number of
//! excess duplicate rows observed when grouping the table by those columns.
//! A candidate with zero duplicates is a primary-key candidate.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A probed column set and its duplicate count.
///
/// Immutable once produced. Columns are kept in a `BTreeSet` so that two
/// candidates over the same columns compare equal regardless of the order
/// the search selected them in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCandidate {
    /// Table the candidate was probed on.
    pub table: String,
    /// Columns of the candidate (unique, unordered).
    pub columns: BTreeSet<String>,
    /// Excess rows beyond the first in each group.
    pub duplicates: u64,
}

impl KeyCandidate {
    /// Create a candidate from any column iterator.
    pub fn new<I, S>(table: impl Into<String>, columns: I, duplicates: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            duplicates,
        }
    }

    /// Whether the column set uniquely identifies every row.
    pub fn is_key(&self) -> bool {
        self.duplicates == 0
    }

    /// Number of columns in the candidate.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Whether this candidate's columns are a superset of (or equal to) `other`'s.
    pub fn covers(&self, other: &KeyCandidate) -> bool {
        self.columns.is_superset(&other.columns)
    }
}

impl fmt::Display for KeyCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.table)?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", column)?;
        }
        write!(f, ") duplicates={}", self.duplicates)
    }
}
