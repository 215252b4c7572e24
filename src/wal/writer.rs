//! WAL Writer
//!
//! Handles appending entries to the WAL file.
//!
//! A failed append (write or fsync) is cut back out of the file so the
//! log never holds an entry the caller saw fail. If the cut itself
//! fails the writer refuses every later append.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{LedgerError, Result};
use super::{Operation, WalEntry, WalRecovery};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    file: File,
    current_lsn: u64,
    sync_strategy: WalSyncStrategy,

    /// Entries appended since the last fsync
    unsynced: usize,

    /// File length after the last successful append
    len: u64,

    /// Set when a failed append could not be rolled back
    poisoned: bool,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// An existing file is recovered first so new entries continue the
    /// LSN sequence after the last valid entry.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let last_lsn = if path.exists() {
            WalRecovery::recover(path)?.1.last_lsn
        } else {
            0
        };
        Self::open_at(path, sync_strategy, last_lsn)
    }

    /// Open for append, continuing after `last_lsn`
    ///
    /// The caller guarantees the file holds exactly `last_lsn` valid entries.
    pub fn open_at(path: &Path, sync_strategy: WalSyncStrategy, last_lsn: u64) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        let len = file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            current_lsn: last_lsn,
            sync_strategy,
            unsynced: 0,
            len,
            poisoned: false,
        })
    }

    /// Append an operation, returning its LSN
    ///
    /// On error the file and the LSN are as they were before the call.
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        if self.poisoned {
            return Err(LedgerError::Storage(format!(
                "WAL {} refuses writes after a failed rollback",
                self.path.display()
            )));
        }

        let entry = WalEntry::new(self.current_lsn + 1, operation);
        let frame = entry.serialize()?;
        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced + 1 >= count,
        };

        let start = self.len;
        if let Err(e) = self.write_frame(&frame, due) {
            self.rollback(start);
            return Err(e);
        }

        self.len = start + frame.len() as u64;
        self.current_lsn = entry.lsn;
        self.unsynced = if due { 0 } else { self.unsynced + 1 };
        Ok(entry.lsn)
    }

    fn write_frame(&mut self, frame: &[u8], sync: bool) -> Result<()> {
        self.file.write_all(frame)?;
        if sync {
            self.file.flush()?;
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Cut the file back to `len` after a failed append
    fn rollback(&mut self, len: u64) {
        let result = self
            .file
            .set_len(len)
            .and_then(|()| self.file.seek(SeekFrom::Start(len)));
        match result {
            Ok(_) => tracing::warn!(
                path = %self.path.display(),
                offset = len,
                "Rolled back failed WAL append"
            ),
            Err(e) => {
                self.poisoned = true;
                tracing::error!(
                    path = %self.path.display(),
                    offset = len,
                    "WAL rollback failed, refusing further writes: {}",
                    e
                );
            }
        }
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Get the current LSN
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }
}
