//! WAL Reader
//!
//! Reads framed entries from the WAL file in order.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{LedgerError, Result};
use super::entry::HEADER_SIZE;
use super::WalEntry;

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,

    /// Byte offset just past the last entry returned
    position: u64,

    /// LSN of the last entry returned (0 before the first)
    last_lsn: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            last_lsn: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns:
    /// - `Ok(Some(entry))`: a complete, checksummed entry
    /// - `Ok(None)`: clean end of file
    /// - `Err(WalCorruption)`: torn frame, bad CRC or out-of-order LSN
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let mut header = [0u8; HEADER_SIZE];
        let got = read_full(&mut self.reader, &mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got < HEADER_SIZE {
            return Err(LedgerError::WalCorruption(format!(
                "partial header at offset {} ({} of {} bytes)",
                self.position, got, HEADER_SIZE
            )));
        }

        let (lsn, crc, len) = WalEntry::parse_header(&header)?;
        let mut data = vec![0u8; len as usize];
        let got = read_full(&mut self.reader, &mut data)?;
        if got < data.len() {
            return Err(LedgerError::WalCorruption(format!(
                "partial entry at offset {}: lsn {} has {} of {} data bytes",
                self.position, lsn, got, len
            )));
        }

        let entry = WalEntry::decode_verified(lsn, crc, &data)?;
        if entry.lsn != self.last_lsn + 1 {
            return Err(LedgerError::WalCorruption(format!(
                "out-of-order lsn at offset {}: expected {}, found {}",
                self.position,
                self.last_lsn + 1,
                entry.lsn
            )));
        }

        self.position += (HEADER_SIZE + data.len()) as u64;
        self.last_lsn = entry.lsn;
        Ok(Some(entry))
    }

    /// Byte offset just past the last valid entry
    pub fn position(&self) -> u64 {
        self.position
    }

    /// LSN of the last valid entry
    pub fn last_lsn(&self) -> u64 {
        self.last_lsn
    }

    /// Iterate over entries; stops after the first error
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read until `buf` is full or EOF; returns bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
