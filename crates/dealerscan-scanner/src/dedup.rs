//! Run-scoped duplicate detection.

use dealerscan_core::{IdentityKey, RawRecord};
use std::collections::HashSet;

/// Append-only set of identity keys seen during one run.
///
/// A fresh store is created for every run and dropped with it.
#[derive(Debug, Default)]
pub struct DedupStore {
    seen: HashSet<IdentityKey>,
}

impl DedupStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true and remembers the record's key if it was not seen before.
    pub fn accept(&mut self, record: &RawRecord) -> bool {
        self.seen.insert(record.identity_key())
    }

    /// Split `records` into those accepted now and the number rejected.
    pub fn partition(&mut self, records: Vec<RawRecord>) -> (Vec<RawRecord>, usize) {
        let total = records.len();
        let accepted: Vec<RawRecord> = records
            .into_iter()
            .filter(|record| self.accept(record))
            .collect();
        let duplicates = total - accepted.len();
        (accepted, duplicates)
    }

    /// Number of distinct dealers seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing has been accepted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
