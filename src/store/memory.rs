//! In-memory document store
//!
//! BTreeMap-based store with RwLock for concurrency. Also the
//! materialized view behind `DurableStore`.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::Result;
use super::{DocumentStore, Scan, WriteBatch};

/// Ordered in-memory store
///
/// ## Concurrency:
/// - `data`: RwLock (many concurrent readers, exclusive writer)
/// - `sequence`: atomic counter, bumped while the write lock is held
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Bytes>>,
    sequence: AtomicU64,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Get entry count
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Approximate payload size in bytes (keys + values)
    pub fn size(&self) -> usize {
        self.data
            .read()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    /// Next entry strictly after `after` (or from `low`) and below `high`
    fn next_in_range(&self, low: &[u8], after: Option<&[u8]>, high: &[u8]) -> Option<(Vec<u8>, Bytes)> {
        let start = match after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Included(low),
        };
        let data = self.data.read();
        data.range::<[u8], _>((start, Bound::Excluded(high)))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: Bytes) -> Result<()> {
        let mut data = self.data.write();
        data.insert(key.to_vec(), value);
        self.sequence.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn scan<'a>(&'a self, low: &[u8], high: &[u8]) -> Result<Scan<'a>> {
        Ok(Box::new(RangeCursor {
            store: self,
            low: low.to_vec(),
            high: high.to_vec(),
            last: None,
            done: low >= high,
        }))
    }

    fn apply(&self, batch: &WriteBatch) -> Result<u64> {
        let mut data = self.data.write();
        if batch.is_empty() {
            return Ok(self.sequence.load(Ordering::SeqCst));
        }
        for op in batch.ops() {
            data.insert(op.key.clone(), op.value.clone());
        }
        Ok(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

/// Lazy range iterator
///
/// Holds no lock between steps; each `next()` re-seeks past the last
/// key it returned, so a scan never blocks writers.
struct RangeCursor<'a> {
    store: &'a MemoryStore,
    low: Vec<u8>,
    high: Vec<u8>,
    last: Option<Vec<u8>>,
    done: bool,
}

impl Iterator for RangeCursor<'_> {
    type Item = Result<(Vec<u8>, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.store.next_in_range(&self.low, self.last.as_deref(), &self.high) {
            Some((key, value)) => {
                self.last = Some(key.clone());
                Some(Ok((key, value)))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}
