//! Allocation Engine
//!
//! Validates one spend request against an NGO's donation history and
//! computes the write set that records it.
//!
//! ## Flow
//! ```text
//!  SpendRequest
//!      │
//!      ▼
//!  validate ids / amount ── NGO exists? ── spend id unused?
//!      │
//!      ▼
//!  query donations + prior allocations (Query Engine)
//!      │
//!      ▼
//!  BalanceSheet ── amount <= available?
//!      │
//!      ▼
//!  equal-share rounds ──► draws ──► Spend + SpendAllocation docs
//!      │
//!      ▼
//!  CommitSet (nothing written yet)
//! ```
//!
//! The engine never writes. Everything it needs is read from the store
//! and the caller-supplied `AllocationContext`, so independent
//! re-executions over the same snapshot produce byte-identical output.

mod rounds;
mod snapshot;

use rust_decimal::Decimal;

use crate::config::MAX_AMOUNT_SCALE;
use crate::error::{LedgerError, Result};
use crate::model::{
    sum_amounts, validate_amount, validate_id, AmountRule, DocType, Document, Donation, Spend,
    SpendAllocation, SpendRequest,
};
use crate::query::{load_documents, Query};
use crate::store::{DocumentStore, WriteBatch};

pub use rounds::{distribute, equal_share, unit, CancelFlag, Draw};
pub use snapshot::{BalanceSheet, DonationBalance};

/// Field linking donations and allocations to their NGO
const NGO_FIELD: &str = "ngoRegistrationNumber";

// =============================================================================
// Context and Output
// =============================================================================

/// Caller-supplied execution context
#[derive(Debug, Clone)]
pub struct AllocationContext {
    /// Identity of the enclosing transaction; seeds allocation ids
    pub tx_id: String,

    /// Fractional digits for amounts and shares
    pub amount_scale: u32,

    /// Checked between rounds
    pub cancel: Option<CancelFlag>,
}

impl AllocationContext {
    pub fn new(tx_id: impl Into<String>, amount_scale: u32) -> Self {
        Self {
            tx_id: tx_id.into(),
            amount_scale,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Deterministic id of the `seq`-th allocation in this transaction
    pub fn allocation_id(&self, seq: usize) -> String {
        format!("{}-{:04}", self.tx_id, seq)
    }
}

/// Everything one successful spend writes, in commit order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSet {
    pub tx_id: String,

    /// Store sequence the computation read from
    pub snapshot_sequence: u64,

    pub spend: Spend,

    /// In generation order: by round, then ascending donation id
    pub allocations: Vec<SpendAllocation>,

    writes: WriteBatch,
}

impl CommitSet {
    /// Spend first, then allocations
    pub fn writes(&self) -> &WriteBatch {
        &self.writes
    }

    pub fn total_allocated(&self) -> Result<Decimal> {
        sum_amounts(self.allocations.iter().map(|a| a.spend_allocation_amount))
    }
}

/// Terminal state of a spend submission
#[derive(Debug)]
pub enum SpendOutcome {
    /// All writes applied
    Committed(CommitSet),

    /// Nothing written; reason is caller-visible
    Rejected(LedgerError),

    /// Internal defect; the transaction was aborted
    FatalDefect(LedgerError),
}

impl SpendOutcome {
    /// Sort a submission result into a terminal state
    ///
    /// Storage failures are not outcomes of the allocation and are
    /// passed back as errors.
    pub fn classify(result: Result<CommitSet>) -> Result<Self> {
        match result {
            Ok(set) => Ok(SpendOutcome::Committed(set)),
            Err(e) if e.is_defect() => Ok(SpendOutcome::FatalDefect(e)),
            Err(e) if e.is_rejection() || matches!(e, LedgerError::Cancelled) => {
                Ok(SpendOutcome::Rejected(e))
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, SpendOutcome::Committed(_))
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Load the balance snapshot for one NGO
pub fn load_balances<S>(store: &S, ngo: &str) -> Result<BalanceSheet>
where
    S: DocumentStore + ?Sized,
{
    let donations: Vec<Donation> = load_documents(
        store,
        &Query::by_type(DocType::Donation.as_str()).where_eq(NGO_FIELD, ngo),
    )?;
    let allocations: Vec<SpendAllocation> = load_documents(
        store,
        &Query::by_type(DocType::SpendAllocation.as_str()).where_eq(NGO_FIELD, ngo),
    )?;
    BalanceSheet::build(&donations, &allocations)
}

/// Compute the commit set for one spend request
///
/// Returns a rejection (`Validation`, `InvalidAmount`, `NgoNotFound`,
/// `DuplicateId`, `InsufficientFunds`), `Cancelled`, or a fatal
/// `InvariantViolation`. In every error case nothing has been written.
pub fn allocate_spend<S>(store: &S, ctx: &AllocationContext, request: &SpendRequest) -> Result<CommitSet>
where
    S: DocumentStore + ?Sized,
{
    let result = compute(store, ctx, request);
    if let Err(e) = &result {
        if e.is_defect() {
            tracing::error!(
                tx_id = %ctx.tx_id,
                spend_id = %request.id,
                ngo = %request.beneficiary_id,
                "Allocation aborted on invariant violation: {}",
                e
            );
        }
    }
    result
}

fn compute<S>(store: &S, ctx: &AllocationContext, request: &SpendRequest) -> Result<CommitSet>
where
    S: DocumentStore + ?Sized,
{
    if ctx.amount_scale > MAX_AMOUNT_SCALE {
        return Err(LedgerError::Config(format!(
            "amount_scale {} exceeds maximum {}",
            ctx.amount_scale, MAX_AMOUNT_SCALE
        )));
    }

    // Step 1: Request shape, NGO, uniqueness
    validate_id("transaction id", &ctx.tx_id)?;
    validate_id("spend id", &request.id)?;
    validate_id("beneficiary id", &request.beneficiary_id)?;
    validate_amount(request.amount, AmountRule::Positive, ctx.amount_scale)?;

    let snapshot_sequence = store.sequence();

    if !store.contains(&DocType::Ngo.key(&request.beneficiary_id))? {
        return Err(LedgerError::NgoNotFound(request.beneficiary_id.clone()));
    }
    let spend = request.to_spend();
    if store.contains(&spend.key())? {
        return Err(LedgerError::DuplicateId(request.id.clone()));
    }

    // Steps 2-3: Balances from history
    let sheet = load_balances(store, &request.beneficiary_id)?;

    // Step 4: Funds check
    let available = sheet.available()?;
    if request.amount > available {
        return Err(LedgerError::InsufficientFunds {
            requested: request.amount,
            available,
        });
    }

    // Step 5: Rounds
    let draws = distribute(&sheet, request.amount, ctx.amount_scale, ctx.cancel.as_ref())?;

    let allocated = sum_amounts(draws.iter().map(|d| d.amount))?;
    if allocated != request.amount {
        return Err(LedgerError::InvariantViolation(format!(
            "allocated {} for a spend of {}",
            allocated, request.amount
        )));
    }
    // Re-applying every draw to the loaded snapshot re-checks every donation's ceiling
    sheet.with_draws(&draws)?;

    // Step 6: Write set
    let mut writes = WriteBatch::new();
    writes.put(spend.key(), spend.encode()?);

    let mut allocations = Vec::with_capacity(draws.len());
    for (i, draw) in draws.iter().enumerate() {
        let allocation = SpendAllocation {
            spend_allocation_id: ctx.allocation_id(i + 1),
            spend_allocation_amount: draw.amount.normalize(),
            spend_allocation_date: request.date.clone(),
            spend_allocation_description: request.description.clone(),
            donation_id: draw.donation_id.clone(),
            ngo_registration_number: request.beneficiary_id.clone(),
            spend_id: request.id.clone(),
        };
        let key = allocation.key();
        if store.contains(&key)? {
            return Err(LedgerError::DuplicateId(allocation.spend_allocation_id));
        }
        writes.put(key, allocation.encode()?);
        allocations.push(allocation);
    }

    tracing::debug!(
        tx_id = %ctx.tx_id,
        spend_id = %request.id,
        allocations = allocations.len(),
        donations = sheet.len(),
        "Computed spend allocation"
    );

    Ok(CommitSet {
        tx_id: ctx.tx_id.clone(),
        snapshot_sequence,
        spend,
        allocations,
        writes,
    })
}
