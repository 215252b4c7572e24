//! Ledger Module
//!
//! Facade that owns a document store and runs spend transactions
//! against it.
//!
//! ## Responsibilities
//! - Create prerequisite NGO and donation documents
//! - Compute spend allocations and commit them as one unit
//! - Reject stale commit sets (optimistic snapshot check)
//! - Balance and allocation reports

use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::allocation::{
    allocate_spend, load_balances, AllocationContext, CommitSet, DonationBalance, SpendOutcome,
};
use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::model::{
    add_amount, validate_amount, validate_id, AmountRule, DocType, Document, Donation, Ngo, Spend,
    SpendAllocation, SpendRequest,
};
use crate::query::{collect_query, load_documents, Query, QueryHit};
use crate::store::{DocumentStore, DurableStore, MemoryStore};

/// Spend ledger over a document store
///
/// ## Concurrency Model
/// - Writes (prerequisites, spend commits) are serialized by `write_lock`
/// - Reads and `prepare_spend` take no ledger lock; a commit set computed
///   outside the lock is checked against the store sequence at commit
pub struct Ledger<S: DocumentStore = DurableStore> {
    config: Config,
    store: S,
    write_lock: Mutex<()>,
}

impl Ledger<DurableStore> {
    /// Open or create a WAL-backed ledger under `config.data_dir`
    pub fn open(config: Config) -> Result<Self> {
        let store = DurableStore::open(&config)?;
        Self::with_store(config, store)
    }
}

impl Ledger<MemoryStore> {
    /// Volatile ledger, mostly for tests
    pub fn in_memory(config: Config) -> Result<Self> {
        Self::with_store(config, MemoryStore::new())
    }
}

impl<S: DocumentStore> Ledger<S> {
    pub fn with_store(config: Config, store: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            write_lock: Mutex::new(()),
        })
    }

    // =========================================================================
    // Prerequisites
    // =========================================================================

    /// Create an NGO document
    pub fn register_ngo(&self, ngo: &Ngo) -> Result<()> {
        validate_id("registration number", &ngo.registration_number)?;

        let _write_guard = self.write_lock.lock();
        self.insert_new(ngo)?;
        tracing::info!(ngo = %ngo.registration_number, "Registered NGO");
        Ok(())
    }

    /// Create a donation document for an existing NGO
    pub fn record_donation(&self, donation: &Donation) -> Result<()> {
        validate_id("donation id", &donation.donation_id)?;
        validate_id("NGO registration number", &donation.ngo_registration_number)?;
        validate_amount(donation.donation_amount, AmountRule::NonNegative, self.config.amount_scale)?;

        let _write_guard = self.write_lock.lock();
        self.require_ngo(&donation.ngo_registration_number)?;
        // NGO totals must stay representable for every later spend
        let total = load_balances(&self.store, &donation.ngo_registration_number)?.total_donations()?;
        add_amount(total, donation.donation_amount)?;
        self.insert_new(donation)?;
        tracing::info!(
            donation_id = %donation.donation_id,
            ngo = %donation.ngo_registration_number,
            amount = %donation.donation_amount,
            "Recorded donation"
        );
        Ok(())
    }

    // =========================================================================
    // Spends
    // =========================================================================

    /// Allocate and commit a spend in one step
    pub fn submit_spend(&self, tx_id: &str, request: &SpendRequest) -> Result<CommitSet> {
        let ctx = AllocationContext::new(tx_id, self.config.amount_scale);
        self.submit_spend_with(&ctx, request)
    }

    /// Allocate and commit a spend with an explicit context
    pub fn submit_spend_with(&self, ctx: &AllocationContext, request: &SpendRequest) -> Result<CommitSet> {
        let _write_guard = self.write_lock.lock();
        let set = allocate_spend(&self.store, ctx, request).map_err(|e| {
            Self::log_failure(ctx, request, &e);
            e
        })?;
        self.commit_locked(&set)?;
        Ok(set)
    }

    /// `submit_spend`, sorted into a terminal outcome
    pub fn execute_spend(&self, tx_id: &str, request: &SpendRequest) -> Result<SpendOutcome> {
        SpendOutcome::classify(self.submit_spend(tx_id, request))
    }

    /// Compute a commit set without writing anything
    pub fn prepare_spend(&self, ctx: &AllocationContext, request: &SpendRequest) -> Result<CommitSet> {
        allocate_spend(&self.store, ctx, request)
    }

    /// Apply a prepared commit set
    ///
    /// Fails with `Conflict` if anything was committed since the set's
    /// snapshot was read.
    pub fn commit(&self, set: &CommitSet) -> Result<u64> {
        let _write_guard = self.write_lock.lock();
        self.commit_locked(set)
    }

    fn commit_locked(&self, set: &CommitSet) -> Result<u64> {
        let actual = self.store.sequence();
        if actual != set.snapshot_sequence {
            tracing::warn!(
                tx_id = %set.tx_id,
                expected = set.snapshot_sequence,
                actual,
                "Rejected stale commit set"
            );
            return Err(LedgerError::Conflict {
                expected: set.snapshot_sequence,
                actual,
            });
        }

        let sequence = self.store.apply(set.writes())?;
        tracing::info!(
            tx_id = %set.tx_id,
            spend_id = %set.spend.spend_id,
            ngo = %set.spend.ngo_registration_number,
            amount = %set.spend.spend_amount,
            allocations = set.allocations.len(),
            sequence,
            "Committed spend"
        );
        Ok(sequence)
    }

    fn log_failure(ctx: &AllocationContext, request: &SpendRequest, e: &LedgerError) {
        // Defects are already logged at error level by the engine
        if e.is_rejection() || matches!(e, LedgerError::Cancelled) {
            tracing::warn!(
                tx_id = %ctx.tx_id,
                spend_id = %request.id,
                kind = ?e.kind(),
                "Spend rejected: {}",
                e
            );
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Run a raw query
    pub fn query(&self, query: &Query) -> Result<Vec<QueryHit>> {
        collect_query(&self.store, query)
    }

    pub fn get_ngo(&self, registration_number: &str) -> Result<Option<Ngo>> {
        self.get_document(registration_number)
    }

    pub fn get_donation(&self, donation_id: &str) -> Result<Option<Donation>> {
        self.get_document(donation_id)
    }

    pub fn get_spend(&self, spend_id: &str) -> Result<Option<Spend>> {
        self.get_document(spend_id)
    }

    /// Per-donation totals for an NGO, ascending by donation id
    pub fn donation_balances(&self, ngo: &str) -> Result<Vec<DonationBalance>> {
        self.require_ngo(ngo)?;
        let sheet = load_balances(&self.store, ngo)?;
        Ok(sheet.balances().cloned().collect())
    }

    /// Unallocated funds of an NGO
    pub fn available_funds(&self, ngo: &str) -> Result<Decimal> {
        self.require_ngo(ngo)?;
        load_balances(&self.store, ngo)?.available()
    }

    /// Allocations recorded for one spend, ascending by allocation id
    pub fn allocations_for_spend(&self, spend_id: &str) -> Result<Vec<SpendAllocation>> {
        load_documents(
            &self.store,
            &Query::by_type(DocType::SpendAllocation.as_str()).where_eq("spendId", spend_id),
        )
    }

    /// Allocations drawn from one donation, ascending by allocation id
    pub fn allocations_for_donation(&self, donation_id: &str) -> Result<Vec<SpendAllocation>> {
        if !self.store.contains(&DocType::Donation.key(donation_id))? {
            return Err(LedgerError::DonationNotFound(donation_id.to_string()));
        }
        load_documents(
            &self.store,
            &Query::by_type(DocType::SpendAllocation.as_str()).where_eq("donationId", donation_id),
        )
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn get_document<T: Document>(&self, id: &str) -> Result<Option<T>> {
        match self.store.get(&T::DOC_TYPE.key(id))? {
            Some(bytes) => Ok(Some(T::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn require_ngo(&self, ngo: &str) -> Result<()> {
        if self.store.contains(&DocType::Ngo.key(ngo))? {
            Ok(())
        } else {
            Err(LedgerError::NgoNotFound(ngo.to_string()))
        }
    }

    /// Put a document whose key must not exist yet (write lock held)
    fn insert_new<T: Document>(&self, document: &T) -> Result<()> {
        let key = document.key();
        if self.store.contains(&key)? {
            return Err(LedgerError::DuplicateId(document.id().to_string()));
        }
        self.store.put(&key, document.encode()?)
    }
}
