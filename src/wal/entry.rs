//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their framing.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Frame header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Upper bound for a single entry payload (64 MB)
pub const MAX_ENTRY_SIZE: u32 = 64 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing, starts at 1
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a single key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Apply every put in order, as one unit
    Batch { puts: Vec<(Vec<u8>, Vec<u8>)> },
}

impl Operation {
    /// Number of key-value pairs carried by this operation
    pub fn put_count(&self) -> usize {
        match self {
            Operation::Put { .. } => 1,
            Operation::Batch { puts } => puts.len(),
        }
    }
}

impl WalEntry {
    pub fn new(lsn: u64, operation: Operation) -> Self {
        Self { lsn, operation }
    }

    /// Encode as a complete frame (header + data)
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = bincode::serialize(&self.operation)?;
        if data.len() > MAX_ENTRY_SIZE as usize {
            return Err(LedgerError::Storage(format!(
                "WAL entry too large: {} bytes (max {})",
                data.len(),
                MAX_ENTRY_SIZE
            )));
        }
        let len = data.len() as u32;
        let crc = Self::compute_crc(self.lsn, len, &data);

        let mut frame = Vec::with_capacity(HEADER_SIZE + data.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&data);
        Ok(frame)
    }

    /// Decode a complete frame, verifying its checksum
    pub fn deserialize(frame: &[u8]) -> Result<Self> {
        let (lsn, crc, len) = Self::parse_header(frame)?;
        let data = frame
            .get(HEADER_SIZE..HEADER_SIZE + len as usize)
            .ok_or_else(|| {
                LedgerError::WalCorruption(format!(
                    "truncated frame at lsn {}: expected {} data bytes, got {}",
                    lsn,
                    len,
                    frame.len().saturating_sub(HEADER_SIZE)
                ))
            })?;
        Self::decode_verified(lsn, crc, data)
    }

    /// Split a header into (lsn, crc, len)
    pub(crate) fn parse_header(header: &[u8]) -> Result<(u64, u32, u32)> {
        if header.len() < HEADER_SIZE {
            return Err(LedgerError::WalCorruption(format!(
                "incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                header.len()
            )));
        }
        let mut lsn = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        lsn.copy_from_slice(&header[0..8]);
        crc.copy_from_slice(&header[8..12]);
        len.copy_from_slice(&header[12..16]);

        let len = u32::from_le_bytes(len);
        if len > MAX_ENTRY_SIZE {
            return Err(LedgerError::WalCorruption(format!(
                "frame length {} exceeds maximum {}",
                len, MAX_ENTRY_SIZE
            )));
        }
        Ok((u64::from_le_bytes(lsn), u32::from_le_bytes(crc), len))
    }

    /// Check the CRC and decode the operation
    pub(crate) fn decode_verified(lsn: u64, crc: u32, data: &[u8]) -> Result<Self> {
        let actual = Self::compute_crc(lsn, data.len() as u32, data);
        if actual != crc {
            return Err(LedgerError::WalCorruption(format!(
                "CRC mismatch at lsn {}: stored {:#010x}, computed {:#010x}",
                lsn, crc, actual
            )));
        }
        let operation = bincode::deserialize(data)
            .map_err(|e| LedgerError::WalCorruption(format!("undecodable entry at lsn {}: {}", lsn, e)))?;
        Ok(Self { lsn, operation })
    }

    /// CRC32 over LSN, length and data
    pub fn compute_crc(lsn: u64, len: u32, data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(&len.to_le_bytes());
        hasher.update(data);
        hasher.finalize()
    }
}
