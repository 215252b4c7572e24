//! Benchmarks for FundLedger allocation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fundledger::allocation::{distribute, BalanceSheet};
use fundledger::{AllocationContext, Config, Donation, Ledger, Ngo, SpendRequest};
use rust_decimal::Decimal;

fn donations(count: usize) -> Vec<Donation> {
    // Staggered amounts so a large spend exhausts donations one round at a time
    (0..count)
        .map(|i| Donation {
            donation_id: format!("D{:06}", i),
            donation_amount: Decimal::from(10 + i as i64),
            donor_user_name: "bench".to_string(),
            ngo_registration_number: "N1".to_string(),
            donation_date: "2024-01-01".to_string(),
        })
        .collect()
}

fn round_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("distribute");
    for count in [10usize, 100, 1000] {
        let sheet = BalanceSheet::build(&donations(count), &[]).unwrap();
        let amount = sheet.available().unwrap() - Decimal::ONE;
        group.bench_with_input(BenchmarkId::from_parameter(count), &sheet, |b, sheet| {
            b.iter(|| distribute(black_box(sheet), amount, 2, None).unwrap())
        });
    }
    group.finish();
}

fn ledger_benchmarks(c: &mut Criterion) {
    let ledger = Ledger::in_memory(Config::default()).unwrap();
    ledger
        .register_ngo(&Ngo {
            registration_number: "N1".to_string(),
            name: "bench".to_string(),
        })
        .unwrap();
    for donation in donations(200) {
        ledger.record_donation(&donation).unwrap();
    }
    let request = SpendRequest {
        id: "S1".to_string(),
        amount: Decimal::from(1500),
        description: "bench".to_string(),
        date: "2024-02-01".to_string(),
        beneficiary_id: "N1".to_string(),
    };

    c.bench_function("prepare_spend_200_donations", |b| {
        let ctx = AllocationContext::new("T1", 2);
        b.iter(|| ledger.prepare_spend(&ctx, black_box(&request)).unwrap())
    });
}

criterion_group!(benches, round_benchmarks, ledger_benchmarks);
criterion_main!(benches);
