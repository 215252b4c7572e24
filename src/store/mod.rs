//! Document Store Module
//!
//! Thin adapter over an ordered key-value store.
//!
//! ## Responsibilities
//! - Point lookup and unconditional upsert by key
//! - Lazy, ascending range scans over `[low, high)`
//! - Apply an ordered write batch as one unit (the commit facility)
//!
//! No isolation is offered here: callers validate everything before
//! they write. The store only counts committed units in `sequence()`,
//! which lets a caller detect that state moved under a snapshot.

mod durable;
mod memory;

use bytes::Bytes;

use crate::error::Result;

pub use durable::DurableStore;
pub use memory::MemoryStore;

/// Lazy scan result, ascending by key
pub type Scan<'a> = Box<dyn Iterator<Item = Result<(Vec<u8>, Bytes)>> + 'a>;

/// Ordered key-value store used by the query and allocation layers
pub trait DocumentStore: Send + Sync {
    /// Point lookup; `Ok(None)` when the key is absent
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>>;

    /// Unconditional upsert, committed as a unit of its own
    fn put(&self, key: &[u8], value: Bytes) -> Result<()>;

    /// Entries with `low <= key < high`, in ascending byte order
    ///
    /// Each call starts a fresh scan; an empty or inverted range yields nothing.
    fn scan<'a>(&'a self, low: &[u8], high: &[u8]) -> Result<Scan<'a>>;

    /// Apply every write in `batch` atomically, returning the new sequence
    fn apply(&self, batch: &WriteBatch) -> Result<u64>;

    /// Number of committed units so far
    fn sequence(&self) -> u64;

    /// Check if a key exists
    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// One write in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOp {
    pub key: Vec<u8>,
    pub value: Bytes,
}

/// Ordered list of writes committed together
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Bytes>) {
        self.ops.push(WriteOp {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// True if any write in the batch targets `key`
    pub fn touches(&self, key: &[u8]) -> bool {
        self.ops.iter().any(|op| op.key == key)
    }
}
