//! Durable document store
//!
//! A `MemoryStore` fronted by the write-ahead log. Every committed unit
//! (a single put or a whole batch) is one WAL entry, written before it
//! becomes visible, so recovery replays whole batches or nothing.

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::Result;
use crate::wal::{Operation, RecoveryResult, WalRecovery, WalWriter};
use super::{DocumentStore, MemoryStore, Scan, WriteBatch};

/// WAL-backed store
///
/// ## Concurrency Model
/// - Writes hold the `wal` mutex from append until the in-memory apply
///   completes, so log order equals visibility order
/// - Reads go straight to the in-memory view
pub struct DurableStore {
    data_dir: PathBuf,
    wal: Mutex<WalWriter>,
    memory: MemoryStore,
    recovery: RecoveryResult,
}

impl DurableStore {
    const WAL_FILENAME: &'static str = "ledger.wal";

    /// Open or create a store under `config.data_dir`
    ///
    /// On startup:
    /// 1. Create data directory
    /// 2. Recover WAL (truncating any torn tail)
    /// 3. Replay entries into memory
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        let memory = MemoryStore::new();

        let recovery = if wal_path.exists() {
            let (entries, result) = WalRecovery::recover(&wal_path)?;
            for entry in entries {
                memory.apply(&Self::batch_of(entry.operation))?;
            }
            if result.entries_recovered > 0 || result.entries_corrupted > 0 {
                tracing::info!(
                    entries_recovered = result.entries_recovered,
                    entries_corrupted = result.entries_corrupted,
                    last_lsn = result.last_lsn,
                    "WAL recovery complete"
                );
            }
            result
        } else {
            RecoveryResult::default()
        };

        let wal = WalWriter::open_at(&wal_path, config.wal_sync_strategy, recovery.last_lsn)?;

        Ok(Self {
            data_dir: config.data_dir.clone(),
            wal: Mutex::new(wal),
            memory,
            recovery,
        })
    }

    /// Open with a path (convenience method)
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(&config)
    }

    /// Flush and fsync the WAL
    pub fn sync(&self) -> Result<()> {
        self.wal.lock().sync()
    }

    /// Stats from the recovery performed at open
    pub fn recovery(&self) -> &RecoveryResult {
        &self.recovery
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join(Self::WAL_FILENAME)
    }

    /// Number of documents held
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    fn batch_of(operation: Operation) -> WriteBatch {
        let mut batch = WriteBatch::new();
        match operation {
            Operation::Put { key, value } => batch.put(key, value),
            Operation::Batch { puts } => {
                for (key, value) in puts {
                    batch.put(key, value);
                }
            }
        }
        batch
    }
}

impl DocumentStore for DurableStore {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.memory.get(key)
    }

    fn put(&self, key: &[u8], value: Bytes) -> Result<()> {
        let mut wal = self.wal.lock();
        wal.append(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })?;
        self.memory.put(key, value)
    }

    fn scan<'a>(&'a self, low: &[u8], high: &[u8]) -> Result<Scan<'a>> {
        self.memory.scan(low, high)
    }

    fn apply(&self, batch: &WriteBatch) -> Result<u64> {
        if batch.is_empty() {
            return Ok(self.memory.sequence());
        }
        let mut wal = self.wal.lock();
        let puts = batch
            .ops()
            .iter()
            .map(|op| (op.key.clone(), op.value.to_vec()))
            .collect();
        let lsn = wal.append(Operation::Batch { puts })?;
        let sequence = self.memory.apply(batch)?;
        tracing::debug!(lsn, sequence, writes = batch.len(), "Committed batch");
        Ok(sequence)
    }

    fn sequence(&self) -> u64 {
        self.memory.sequence()
    }
}

impl Drop for DurableStore {
    fn drop(&mut self) {
        if let Err(e) = self.wal.get_mut().sync() {
            tracing::warn!("Failed to sync WAL on close: {}", e);
        }
    }
}
