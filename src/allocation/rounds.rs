//! Equal-share allocation rounds
//!
//! Pure computation over a `BalanceSheet`: no store access, no clock,
//! no randomness. Identical inputs always yield identical draws.
//!
//! ## Algorithm
//! ```text
//! remaining = amount
//! while remaining > 0:
//!     eligible = donations with balance > 0      (ascending id)
//!     share    = floor(remaining / |eligible|)   (at amount_scale digits,
//!                                                 at least one unit)
//!     for d in eligible:
//!         take = min(share, d.balance, remaining - drawn_this_round)
//!     remaining -= drawn_this_round
//! ```
//! A round either draws a full share from every eligible donation or
//! exhausts at least one of them. Remainder units left by the rounding
//! land on the lowest donation ids first.
//!
//! Each round rescans every eligible donation, so the worst case is
//! O(n²) in the donation count.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{LedgerError, Result};
use crate::model::{add_amount, sum_amounts};
use super::snapshot::BalanceSheet;

/// Amount drawn from one donation in one round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draw {
    pub donation_id: String,
    pub amount: Decimal,
    /// 1-based round number
    pub round: usize,
}

/// Shared flag checked between allocation rounds
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Smallest representable amount at `scale`
pub fn unit(scale: u32) -> Decimal {
    Decimal::new(1, scale)
}

/// `floor(remaining / n)` at `scale` digits, but never below one unit
pub fn equal_share(remaining: Decimal, n: usize, scale: u32) -> Result<Decimal> {
    let share = remaining
        .checked_div(Decimal::from(n))
        .ok_or_else(|| {
            LedgerError::InvariantViolation(format!("cannot split {} across {} donations", remaining, n))
        })?
        .round_dp_with_strategy(scale, RoundingStrategy::ToZero);

    if share.is_zero() {
        Ok(unit(scale))
    } else {
        Ok(share)
    }
}

/// Split `amount` across the eligible donations of `sheet`
///
/// The caller must already have checked `amount <= sheet.available()`;
/// running out of eligible donations here is a defect.
pub fn distribute(
    sheet: &BalanceSheet,
    amount: Decimal,
    scale: u32,
    cancel: Option<&CancelFlag>,
) -> Result<Vec<Draw>> {
    let mut snapshot = sheet.clone();
    let mut remaining = amount;
    let mut draws = Vec::new();
    let mut round = 0;

    while remaining > Decimal::ZERO {
        if cancel.is_some_and(CancelFlag::is_cancelled) {
            return Err(LedgerError::Cancelled);
        }
        round += 1;

        let round_draws = plan_round(&snapshot, remaining, scale, round)?;
        let drawn = sum_amounts(round_draws.iter().map(|d| d.amount))?;
        if drawn.is_zero() {
            return Err(LedgerError::InvariantViolation(format!(
                "round {} made no progress with {} left to allocate",
                round, remaining
            )));
        }

        tracing::debug!(
            round,
            draws = round_draws.len(),
            %drawn,
            remaining = %(remaining - drawn),
            "Allocation round"
        );

        snapshot = snapshot.with_draws(&round_draws)?;
        remaining -= drawn;
        draws.extend(round_draws);
    }

    Ok(draws)
}

/// Draws for a single round against one snapshot
fn plan_round(snapshot: &BalanceSheet, remaining: Decimal, scale: u32, round: usize) -> Result<Vec<Draw>> {
    let eligible: Vec<_> = snapshot.eligible().collect();
    if eligible.is_empty() {
        return Err(LedgerError::InvariantViolation(format!(
            "no eligible donation in round {} with {} left to allocate",
            round, remaining
        )));
    }

    let share = equal_share(remaining, eligible.len(), scale)?;
    let mut drawn = Decimal::ZERO;
    let mut draws = Vec::with_capacity(eligible.len());

    for balance in eligible {
        let left = remaining - drawn;
        if left <= Decimal::ZERO {
            break;
        }
        let take = share.min(balance.remaining()).min(left);
        if take > Decimal::ZERO {
            drawn = add_amount(drawn, take)?;
            draws.push(Draw {
                donation_id: balance.donation_id.clone(),
                amount: take,
                round,
            });
        }
    }

    Ok(draws)
}
