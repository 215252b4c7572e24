//! Error types for FundLedger
//!
//! Provides a unified error type for all operations, plus a coarse
//! classification that separates ordinary rejections from defects.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias using LedgerError
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Unified error type for FundLedger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Rejections (deterministic, caller-visible)
    // -------------------------------------------------------------------------
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("NGO not found: {0}")]
    NgoNotFound(String),

    #[error("Donation not found: {0}")]
    DonationNotFound(String),

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Commit conflict: snapshot at sequence {expected}, store at {actual}")]
    Conflict { expected: u64, actual: u64 },

    #[error("Allocation cancelled")]
    Cancelled,

    // -------------------------------------------------------------------------
    // Defects
    // -------------------------------------------------------------------------
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Coarse error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    InsufficientFunds,
    Cancelled,
    Invariant,
    Storage,
}

impl LedgerError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation(_) | LedgerError::InvalidAmount(_) => ErrorKind::Validation,
            LedgerError::NgoNotFound(_) | LedgerError::DonationNotFound(_) => ErrorKind::NotFound,
            LedgerError::DuplicateId(_) | LedgerError::Conflict { .. } => ErrorKind::Conflict,
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::Cancelled => ErrorKind::Cancelled,
            LedgerError::InvariantViolation(_) => ErrorKind::Invariant,
            LedgerError::Io(_)
            | LedgerError::WalCorruption(_)
            | LedgerError::Storage(_)
            | LedgerError::Serialization(_)
            | LedgerError::Config(_) => ErrorKind::Storage,
        }
    }

    /// Ordinary business rejection: report to the caller, do not retry
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation
                | ErrorKind::NotFound
                | ErrorKind::Conflict
                | ErrorKind::InsufficientFunds
        )
    }

    /// Internal defect: abort the transaction, never recover partially
    pub fn is_defect(&self) -> bool {
        self.kind() == ErrorKind::Invariant
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(e: bincode::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}
