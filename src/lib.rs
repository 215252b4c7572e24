//! # FundLedger
//!
//! A ledger-backed fund-allocation engine with:
//! - Deterministic equal-share allocation of spends across donations
//! - Conservation checks before any write (no partial commits)
//! - Ordered document store with lazy range scans
//! - Write-Ahead Logging (WAL) with atomic batch commits and crash recovery
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Ledger                               │
//! │          (prerequisites, commit, conflict check)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Allocation Engine                           │
//! │     (balance snapshot → equal-share rounds → CommitSet)      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Query Engine                              │
//! │         (type range scan + one equality predicate)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │ MemoryStore │
//!   │  (Append)   │          │  (RwLock)   │
//!   └─────────────┘          └─────────────┘
//!          └──── DurableStore ───────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod store;
pub mod model;
pub mod query;
pub mod allocation;
pub mod ledger;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorKind, LedgerError, Result};
pub use config::Config;
pub use allocation::{allocate_spend, AllocationContext, CommitSet, SpendOutcome};
pub use ledger::Ledger;
pub use model::{Donation, Ngo, Spend, SpendAllocation, SpendRequest};
pub use query::{query_by_type, Query, Record};
pub use store::{DocumentStore, DurableStore, MemoryStore};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of FundLedger
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
