//! Key candidate search.
//!
//! The engine probes growing column subsets in best-first order:
//!
//! ```text
//!   full row ──► duplicates > 0 ──► emit {all columns, n}, stop
//!      │
//!      ▼ unique
//!   frontier ◄──────────────────────────────┐
//!      │ pop (fewest columns, lowest bound) │
//!      ▼                                    │
//!   probe selected ∪ {c} for each c         │
//!      ├─ 0            ──► emit key         │
//!      ├─ 0 < n < bound ──► push child ─────┘
//!      └─ otherwise     ──► prune
//! ```

mod engine;
mod state;

pub use engine::{KeySearchEngine, SearchStats};
pub use state::{Frontier, SearchState, UNBOUNDED};
