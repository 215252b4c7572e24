//! Tests for the Allocation Engine
//!
//! These tests verify:
//! - Worked allocation scenarios (single donation, equal split, exhaustion)
//! - Rejections: missing NGO, bad amount, duplicate id, insufficient funds
//! - Rejections leave the store untouched
//! - Conservation and no over-allocation across many spends
//! - Determinism of the write set across independent executions
//! - Corrupt history surfaces as a defect, not a rejection

use std::str::FromStr;

use bytes::Bytes;
use fundledger::allocation::{allocate_spend, load_balances, AllocationContext, CancelFlag};
use fundledger::model::{DocType, Document, Donation, Ngo, SpendAllocation, SpendRequest};
use fundledger::store::{DocumentStore, MemoryStore};
use fundledger::{ErrorKind, LedgerError};
use rust_decimal::Decimal;

// =============================================================================
// Helper Functions
// =============================================================================

const SCALE: u32 = 2;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn insert<T: Document>(store: &MemoryStore, document: &T) {
    store.put(&document.key(), document.encode().unwrap()).unwrap();
}

/// Store with NGO `N1` and the given donations
fn store_with(donations: &[(&str, &str)]) -> MemoryStore {
    let store = MemoryStore::new();
    insert(
        &store,
        &Ngo {
            registration_number: "N1".to_string(),
            name: "Relief".to_string(),
        },
    );
    for (id, amount) in donations {
        insert(
            &store,
            &Donation {
                donation_id: id.to_string(),
                donation_amount: dec(amount),
                donor_user_name: "donor".to_string(),
                ngo_registration_number: "N1".to_string(),
                donation_date: "2024-01-01".to_string(),
            },
        );
    }
    store
}

fn request(id: &str, amount: &str) -> SpendRequest {
    SpendRequest {
        id: id.to_string(),
        amount: dec(amount),
        description: "supplies".to_string(),
        date: "2024-03-01".to_string(),
        beneficiary_id: "N1".to_string(),
    }
}

fn ctx(tx_id: &str) -> AllocationContext {
    AllocationContext::new(tx_id, SCALE)
}

fn allocated_to(allocations: &[SpendAllocation], donation_id: &str) -> Decimal {
    allocations
        .iter()
        .filter(|a| a.donation_id == donation_id)
        .map(|a| a.spend_allocation_amount)
        .sum()
}

fn snapshot(store: &MemoryStore) -> Vec<(Vec<u8>, Bytes)> {
    store
        .scan(b"", b"\xff")
        .unwrap()
        .map(|e| e.unwrap())
        .collect()
}

// =============================================================================
// Scenario Tests
// =============================================================================

#[test]
fn test_single_donation_single_allocation() {
    let store = store_with(&[("D1", "100")]);

    let set = allocate_spend(&store, &ctx("T1"), &request("S1", "40")).unwrap();

    assert_eq!(set.allocations.len(), 1);
    assert_eq!(set.allocations[0].donation_id, "D1");
    assert_eq!(set.allocations[0].spend_allocation_amount, dec("40"));
    assert_eq!(set.allocations[0].spend_id, "S1");
    assert_eq!(set.allocations[0].ngo_registration_number, "N1");
}

#[test]
fn test_equal_split_across_two_donations() {
    let store = store_with(&[("D1", "60"), ("D2", "40")]);

    let set = allocate_spend(&store, &ctx("T2"), &request("S2", "50")).unwrap();

    assert_eq!(set.allocations.len(), 2);
    assert_eq!(allocated_to(&set.allocations, "D1"), dec("25"));
    assert_eq!(allocated_to(&set.allocations, "D2"), dec("25"));
}

#[test]
fn test_exhausted_donation_and_second_round() {
    let store = store_with(&[("D1", "30"), ("D2", "70")]);

    let set = allocate_spend(&store, &ctx("T3"), &request("S3", "80")).unwrap();

    assert_eq!(allocated_to(&set.allocations, "D1"), dec("30"));
    assert_eq!(allocated_to(&set.allocations, "D2"), dec("50"));
    assert_eq!(set.total_allocated().unwrap(), dec("80"));
    // Round 1: D1 30 (exhausted), D2 40; round 2: D2 10
    let amounts: Vec<_> = set
        .allocations
        .iter()
        .map(|a| (a.donation_id.as_str(), a.spend_allocation_amount))
        .collect();
    assert_eq!(amounts, vec![("D1", dec("30")), ("D2", dec("40")), ("D2", dec("10"))]);
}

#[test]
fn test_insufficient_funds() {
    let store = store_with(&[("D1", "30"), ("D2", "20")]);

    let err = allocate_spend(&store, &ctx("T4"), &request("S4", "50.01")).unwrap_err();

    match err {
        LedgerError::InsufficientFunds { requested, available } => {
            assert_eq!(requested, dec("50.01"));
            assert_eq!(available, dec("50"));
        }
        other => panic!("expected InsufficientFunds, got {:?}", other),
    }
}

#[test]
fn test_exact_available_amount_is_allowed() {
    let store = store_with(&[("D1", "30"), ("D2", "20")]);

    let set = allocate_spend(&store, &ctx("T4"), &request("S4", "50")).unwrap();

    assert_eq!(allocated_to(&set.allocations, "D1"), dec("30"));
    assert_eq!(allocated_to(&set.allocations, "D2"), dec("20"));
}

#[test]
fn test_missing_ngo_is_not_found() {
    let store = store_with(&[("D1", "100")]);
    let mut req = request("S5", "10");
    req.beneficiary_id = "N404".to_string();

    let err = allocate_spend(&store, &ctx("T5"), &req).unwrap_err();

    assert!(matches!(err, LedgerError::NgoNotFound(ref n) if n == "N404"));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_ngo_without_donations_has_no_funds() {
    let store = store_with(&[]);

    let err = allocate_spend(&store, &ctx("T6"), &request("S6", "1")).unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_non_positive_amounts_are_invalid() {
    let store = store_with(&[("D1", "100")]);

    for amount in ["0", "-5"] {
        let err = allocate_spend(&store, &ctx("T7"), &request("S7", amount)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)), "amount {}", amount);
        assert!(err.is_rejection());
    }
}

#[test]
fn test_amount_finer_than_scale_is_invalid() {
    let store = store_with(&[("D1", "100")]);

    let err = allocate_spend(&store, &ctx("T8"), &request("S8", "1.001")).unwrap_err();

    assert!(matches!(err, LedgerError::InvalidAmount(_)));
}

#[test]
fn test_empty_ids_are_invalid() {
    let store = store_with(&[("D1", "100")]);

    let err = allocate_spend(&store, &ctx(""), &request("S9", "1")).unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = allocate_spend(&store, &ctx("T9"), &request("", "1")).unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[test]
fn test_duplicate_spend_id_rejected() {
    let store = store_with(&[("D1", "100")]);
    let set = allocate_spend(&store, &ctx("T10"), &request("S10", "10")).unwrap();
    store.apply(set.writes()).unwrap();

    for tx in ["T11", "T12"] {
        let err = allocate_spend(&store, &ctx(tx), &request("S10", "10")).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateId(ref id) if id == "S10"));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}

#[test]
fn test_reused_transaction_id_rejected() {
    let store = store_with(&[("D1", "100")]);
    let set = allocate_spend(&store, &ctx("T13"), &request("S13", "10")).unwrap();
    store.apply(set.writes()).unwrap();

    let err = allocate_spend(&store, &ctx("T13"), &request("S14", "10")).unwrap_err();

    assert!(matches!(err, LedgerError::DuplicateId(ref id) if id == "T13-0001"));
}

// =============================================================================
// Write Set Tests
// =============================================================================

#[test]
fn test_allocate_spend_never_writes() {
    let store = store_with(&[("D1", "100")]);
    let before = snapshot(&store);
    let sequence = store.sequence();

    allocate_spend(&store, &ctx("T15"), &request("S15", "40")).unwrap();
    let _ = allocate_spend(&store, &ctx("T16"), &request("S16", "1000"));

    assert_eq!(snapshot(&store), before);
    assert_eq!(store.sequence(), sequence);
}

#[test]
fn test_write_set_layout() {
    let store = store_with(&[("D1", "30"), ("D2", "70")]);

    let set = allocate_spend(&store, &ctx("T17"), &request("S17", "80")).unwrap();
    let ops = set.writes().ops();

    assert_eq!(ops.len(), 1 + set.allocations.len());
    assert_eq!(ops[0].key, DocType::Spend.key("S17"));
    assert_eq!(ops[1].key, DocType::SpendAllocation.key("T17-0001"));
    assert_eq!(ops[2].key, DocType::SpendAllocation.key("T17-0002"));
    assert_eq!(ops[3].key, DocType::SpendAllocation.key("T17-0003"));
    assert_eq!(set.spend.spend_amount, dec("80"));
    assert_eq!(set.snapshot_sequence, store.sequence());
}

#[test]
fn test_identical_inputs_give_identical_bytes() {
    let donations = [("D3", "12.34"), ("D1", "50"), ("D2", "7.5"), ("D4", "100")];
    let store_a = store_with(&donations);
    let store_b = store_with(&donations);

    let a = allocate_spend(&store_a, &ctx("TX"), &request("S18", "99.99")).unwrap();
    let b = allocate_spend(&store_b, &ctx("TX"), &request("S18", "99.99")).unwrap();

    assert_eq!(a.writes(), b.writes());
    assert_eq!(a, b);
}

// =============================================================================
// Invariant Tests
// =============================================================================

#[test]
fn test_conservation_over_many_spends() {
    let store = store_with(&[("D1", "10"), ("D2", "33.33"), ("D3", "0"), ("D4", "56.67")]);
    let spends = ["7.77", "20", "0.01", "33.33", "12.5", "26.39"];

    for (i, amount) in spends.iter().enumerate() {
        let set = allocate_spend(&store, &ctx(&format!("T{}", i)), &request(&format!("S{}", i), amount))
            .unwrap();
        assert_eq!(set.total_allocated().unwrap(), dec(amount));
        store.apply(set.writes()).unwrap();

        let sheet = load_balances(&store, "N1").unwrap();
        for balance in sheet.balances() {
            assert!(balance.allocated <= balance.amount, "{:?}", balance);
        }
    }

    let sheet = load_balances(&store, "N1").unwrap();
    assert_eq!(sheet.available().unwrap(), Decimal::ZERO);

    let err = allocate_spend(&store, &ctx("T-last"), &request("S-last", "0.01")).unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
}

#[test]
fn test_zero_donation_is_never_drawn() {
    let store = store_with(&[("D1", "0"), ("D2", "10")]);

    let set = allocate_spend(&store, &ctx("T19"), &request("S19", "4")).unwrap();

    assert_eq!(set.allocations.len(), 1);
    assert_eq!(set.allocations[0].donation_id, "D2");
}

#[test]
fn test_allocation_to_unknown_donation_is_defect() {
    let store = store_with(&[("D1", "100")]);
    insert(
        &store,
        &SpendAllocation {
            spend_allocation_id: "X-0001".to_string(),
            spend_allocation_amount: dec("5"),
            spend_allocation_date: "2024-01-02".to_string(),
            spend_allocation_description: "stray".to_string(),
            donation_id: "D-missing".to_string(),
            ngo_registration_number: "N1".to_string(),
            spend_id: "S0".to_string(),
        },
    );

    let err = allocate_spend(&store, &ctx("T20"), &request("S20", "1")).unwrap_err();

    assert!(err.is_defect());
    assert!(!err.is_rejection());
}

#[test]
fn test_over_allocated_history_is_defect() {
    let store = store_with(&[("D1", "10")]);
    insert(
        &store,
        &SpendAllocation {
            spend_allocation_id: "X-0001".to_string(),
            spend_allocation_amount: dec("11"),
            spend_allocation_date: "2024-01-02".to_string(),
            spend_allocation_description: "too much".to_string(),
            donation_id: "D1".to_string(),
            ngo_registration_number: "N1".to_string(),
            spend_id: "S0".to_string(),
        },
    );

    let err = allocate_spend(&store, &ctx("T21"), &request("S21", "1")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Invariant);
}

#[test]
fn test_cancelled_context_writes_nothing() {
    let store = store_with(&[("D1", "100")]);
    let flag = CancelFlag::new();
    flag.cancel();
    let context = ctx("T22").with_cancel(flag);

    let err = allocate_spend(&store, &context, &request("S22", "10")).unwrap_err();

    assert!(matches!(err, LedgerError::Cancelled));
    assert!(!store.contains(&DocType::Spend.key("S22")).unwrap());
}

#[test]
fn test_unrepresentable_total_is_rejected_without_panic() {
    let half = "50000000000000000000000000000";
    let store = store_with(&[("D1", half), ("D2", half)]);

    let err = allocate_spend(&store, &ctx("T23"), &request("S23", "40")).unwrap_err();

    assert!(matches!(err, LedgerError::InvalidAmount(_)));
    assert!(!store.contains(&DocType::Spend.key("S23")).unwrap());
}

#[test]
fn test_negative_history_amount_is_defect() {
    let store = store_with(&[("D1", "-10"), ("D2", "10")]);

    let err = allocate_spend(&store, &ctx("T24"), &request("S24", "1")).unwrap_err();

    assert!(err.is_defect());
}
