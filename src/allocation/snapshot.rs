//! Balance snapshot
//!
//! Immutable per-donation view of an NGO's history. Each allocation
//! round reads one snapshot and produces the next; nothing is mutated
//! in place.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{LedgerError, Result};
use crate::model::{add_amount, sum_amounts, Donation, SpendAllocation};
use super::rounds::Draw;

/// One donation's totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationBalance {
    pub donation_id: String,
    pub amount: Decimal,
    pub allocated: Decimal,
}

impl DonationBalance {
    pub fn remaining(&self) -> Decimal {
        self.amount - self.allocated
    }

    /// Strictly positive remaining balance
    pub fn is_eligible(&self) -> bool {
        self.remaining() > Decimal::ZERO
    }
}

/// Balances for every donation of one NGO, ascending by donation id
///
/// Donation ids order exactly like donation keys (same type prefix),
/// which is the tie-break order of the allocation rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceSheet {
    balances: BTreeMap<String, DonationBalance>,
}

impl BalanceSheet {
    /// Fold donation and allocation history into balances
    ///
    /// Fails with `InvariantViolation` if history holds a negative amount,
    /// references an unknown donation or already over-allocates one, and
    /// with `InvalidAmount` if a total is not representable.
    pub fn build(donations: &[Donation], allocations: &[SpendAllocation]) -> Result<Self> {
        let mut balances = BTreeMap::new();
        for donation in donations {
            if donation.donation_amount.is_sign_negative() && !donation.donation_amount.is_zero() {
                return Err(LedgerError::InvariantViolation(format!(
                    "donation {} has negative amount {}",
                    donation.donation_id, donation.donation_amount
                )));
            }
            balances.insert(
                donation.donation_id.clone(),
                DonationBalance {
                    donation_id: donation.donation_id.clone(),
                    amount: donation.donation_amount,
                    allocated: Decimal::ZERO,
                },
            );
        }

        for allocation in allocations {
            let balance = balances.get_mut(&allocation.donation_id).ok_or_else(|| {
                LedgerError::InvariantViolation(format!(
                    "allocation {} references donation {} unknown to NGO {}",
                    allocation.spend_allocation_id,
                    allocation.donation_id,
                    allocation.ngo_registration_number
                ))
            })?;
            if allocation.spend_allocation_amount.is_sign_negative()
                && !allocation.spend_allocation_amount.is_zero()
            {
                return Err(LedgerError::InvariantViolation(format!(
                    "allocation {} has negative amount {}",
                    allocation.spend_allocation_id, allocation.spend_allocation_amount
                )));
            }
            balance.allocated = add_amount(balance.allocated, allocation.spend_allocation_amount)?;
        }

        let sheet = Self { balances };
        sheet.check_not_over_allocated()?;
        sheet.total_donations()?;
        Ok(sheet)
    }

    /// New snapshot with `draws` applied
    pub fn with_draws(&self, draws: &[Draw]) -> Result<Self> {
        let mut balances = self.balances.clone();
        for draw in draws {
            let balance = balances.get_mut(&draw.donation_id).ok_or_else(|| {
                LedgerError::InvariantViolation(format!(
                    "draw against unknown donation {}",
                    draw.donation_id
                ))
            })?;
            balance.allocated = add_amount(balance.allocated, draw.amount)?;
        }
        let sheet = Self { balances };
        sheet.check_not_over_allocated()?;
        Ok(sheet)
    }

    fn check_not_over_allocated(&self) -> Result<()> {
        match self.balances.values().find(|b| b.allocated > b.amount) {
            Some(b) => Err(LedgerError::InvariantViolation(format!(
                "donation {} over-allocated: {} of {}",
                b.donation_id, b.allocated, b.amount
            ))),
            None => Ok(()),
        }
    }

    pub fn total_donations(&self) -> Result<Decimal> {
        sum_amounts(self.balances.values().map(|b| b.amount))
    }

    /// Never exceeds `total_donations` once the sheet is built
    pub fn total_allocated(&self) -> Result<Decimal> {
        sum_amounts(self.balances.values().map(|b| b.allocated))
    }

    /// `total_donations - total_allocated`
    pub fn available(&self) -> Result<Decimal> {
        Ok(self.total_donations()? - self.total_allocated()?)
    }

    /// Donations with positive remaining balance, ascending by id
    pub fn eligible(&self) -> impl Iterator<Item = &DonationBalance> {
        self.balances.values().filter(|b| b.is_eligible())
    }

    pub fn get(&self, donation_id: &str) -> Option<&DonationBalance> {
        self.balances.get(donation_id)
    }

    /// All balances, ascending by id
    pub fn balances(&self) -> impl Iterator<Item = &DonationBalance> {
        self.balances.values()
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}
