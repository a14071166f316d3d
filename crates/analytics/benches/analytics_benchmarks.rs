use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, TimeZone, Utc};
use stockledger_analytics::{AnalyticsReport, DateRange, alerts, period_stats, product_performance};
use stockledger_catalog::{AddMode, NewProduct, Product, ProductId};
use stockledger_core::TenantId;
use stockledger_ledger::{Transaction, TransactionId, TransactionKind};

fn catalog(tenant_id: TenantId, size: usize) -> Vec<Product> {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    (0..size)
        .map(|i| {
            NewProduct {
                name: format!("product-{i}"),
                mode: AddMode::ByUnit,
                quantity: 100,
                purchase_price: 50,
                selling_price_per_unit: 80,
                alert_threshold: Some(10),
                unit_label: None,
            }
            .prepare(tenant_id, ProductId::generate(), now)
            .expect("valid product")
        })
        .collect()
}

/// A year of ledger entries spread evenly across the catalog.
fn ledger(products: &[Product], entries: usize) -> Vec<Transaction> {
    let start = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
    let step = Duration::minutes(365 * 24 * 60 / entries.max(1) as i64);
    (0..entries)
        .map(|i| {
            let p = &products[i % products.len()];
            let kind = if i % 3 == 0 {
                TransactionKind::Purchase
            } else {
                TransactionKind::Sale
            };
            Transaction {
                id: TransactionId::generate(),
                tenant_id: p.tenant_id,
                product_id: p.id,
                kind,
                quantity: 2,
                unit_price: 80,
                total_amount: 160,
                created_at: start + step * i as i32,
            }
        })
        .collect()
}

fn bench_report(c: &mut Criterion) {
    let tenant_id = TenantId::new();
    let products = catalog(tenant_id, 200);
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let mut group = c.benchmark_group("analytics");
    for entries in [1_000usize, 10_000, 50_000] {
        let transactions = ledger(&products, entries);
        group.throughput(Throughput::Elements(entries as u64));

        group.bench_with_input(BenchmarkId::new("period_stats", entries), &transactions, |b, t| {
            let range = DateRange::month(now.date_naive(), "This month");
            b.iter(|| period_stats(black_box(t), &range))
        });

        group.bench_with_input(BenchmarkId::new("performance", entries), &transactions, |b, t| {
            b.iter(|| product_performance(black_box(&products), black_box(t)))
        });

        group.bench_with_input(BenchmarkId::new("alerts", entries), &transactions, |b, t| {
            b.iter(|| alerts(black_box(&products), black_box(t), now))
        });

        group.bench_with_input(BenchmarkId::new("full_report", entries), &transactions, |b, t| {
            b.iter(|| AnalyticsReport::build(black_box(&products), black_box(t), now))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_report);
criterion_main!(benches);
