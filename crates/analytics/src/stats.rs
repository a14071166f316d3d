use serde::{Deserialize, Serialize};

use stockledger_core::Amount;
use stockledger_ledger::Transaction;

use crate::period::DateRange;
use crate::round2;

/// Financial aggregate over one window of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PeriodStats {
    pub revenue: Amount,
    pub expenses: Amount,
    pub profit: Amount,
    /// Percent of revenue kept as profit, two decimals; 0 without revenue.
    pub gross_margin: f64,
    pub transactions: usize,
    pub quantity_sold: i64,
    pub quantity_purchased: i64,
}

/// Ledger entries created inside `range` (inclusive on both ends).
pub fn transactions_in<'a>(transactions: &'a [Transaction], range: &DateRange) -> Vec<&'a Transaction> {
    transactions
        .iter()
        .filter(|t| range.contains(t.created_at))
        .collect()
}

pub fn period_stats(transactions: &[Transaction], range: &DateRange) -> PeriodStats {
    let mut stats = PeriodStats::default();

    for t in transactions.iter().filter(|t| range.contains(t.created_at)) {
        stats.transactions += 1;
        if t.is_sale() {
            stats.revenue += t.total_amount;
            stats.quantity_sold += t.quantity;
        } else {
            stats.expenses += t.total_amount;
            stats.quantity_purchased += t.quantity;
        }
    }

    stats.profit = stats.revenue - stats.expenses;
    stats.gross_margin = gross_margin(stats.revenue, stats.profit);
    stats
}

fn gross_margin(revenue: Amount, profit: Amount) -> f64 {
    if revenue > 0 {
        round2(profit as f64 / revenue as f64 * 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, Utc};

    use stockledger_catalog::ProductId;
    use stockledger_core::{Amount, TenantId};
    use stockledger_ledger::{Transaction, TransactionId, TransactionKind};

    pub fn entry(
        tenant_id: TenantId,
        product_id: ProductId,
        kind: TransactionKind,
        quantity: i64,
        unit_price: Amount,
        created_at: DateTime<Utc>,
    ) -> Transaction {
        Transaction {
            id: TransactionId::generate(),
            tenant_id,
            product_id,
            kind,
            quantity,
            unit_price,
            total_amount: quantity * unit_price,
            created_at,
        }
    }

    pub fn sale(product_id: ProductId, total: Amount, at: DateTime<Utc>) -> Transaction {
        entry(TenantId::new(), product_id, TransactionKind::Sale, 1, total, at)
    }

    pub fn purchase(product_id: ProductId, total: Amount, at: DateTime<Utc>) -> Transaction {
        entry(TenantId::new(), product_id, TransactionKind::Purchase, 1, total, at)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{entry, purchase, sale};
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use stockledger_catalog::ProductId;
    use stockledger_core::TenantId;
    use stockledger_ledger::TransactionKind;

    fn march() -> DateRange {
        DateRange::month(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), "March")
    }

    #[test]
    fn margin_formula() {
        let p = ProductId::generate();
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let ledger = vec![sale(p, 100_000, at), purchase(p, 60_000, at)];

        let stats = period_stats(&ledger, &march());
        assert_eq!(stats.revenue, 100_000);
        assert_eq!(stats.expenses, 60_000);
        assert_eq!(stats.profit, 40_000);
        assert_eq!(stats.gross_margin, 40.0);
        assert_eq!(stats.transactions, 2);
    }

    #[test]
    fn zero_revenue_means_zero_margin() {
        let p = ProductId::generate();
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let stats = period_stats(&[purchase(p, 5_000, at)], &march());
        assert_eq!(stats.revenue, 0);
        assert_eq!(stats.profit, -5_000);
        assert_eq!(stats.gross_margin, 0.0);
    }

    #[test]
    fn margin_is_rounded_to_two_decimals() {
        let p = ProductId::generate();
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let ledger = vec![sale(p, 3, at), purchase(p, 2, at)];
        // 1/3 = 33.333..%
        assert_eq!(period_stats(&ledger, &march()).gross_margin, 33.33);
    }

    #[test]
    fn window_edges_are_inclusive() {
        let range = march();
        let p = ProductId::generate();
        let tenant = TenantId::new();
        let ledger = vec![
            entry(tenant, p, TransactionKind::Sale, 2, 10, range.start),
            entry(tenant, p, TransactionKind::Sale, 3, 10, range.end),
            entry(tenant, p, TransactionKind::Sale, 4, 10, range.start - Duration::seconds(1)),
            entry(tenant, p, TransactionKind::Purchase, 7, 5, range.end + Duration::nanoseconds(1)),
        ];

        let stats = period_stats(&ledger, &range);
        assert_eq!(stats.transactions, 2);
        assert_eq!(stats.quantity_sold, 5);
        assert_eq!(stats.quantity_purchased, 0);
        assert_eq!(stats.revenue, 50);
        assert_eq!(transactions_in(&ledger, &range).len(), 2);
    }

    mod properties {
        use super::*;
        use chrono::Months;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 128,
                ..ProptestConfig::default()
            })]

            /// Property: the twelve month windows of a year split its
            /// totals exactly, with no entry counted twice or dropped.
            #[test]
            fn months_partition_the_year(
                entries in prop::collection::vec(
                    (any::<bool>(), 1i64..20, 0i64..500, 0i64..(366 * 24 * 60)),
                    0..80,
                )
            ) {
                let year_start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
                let tenant = TenantId::new();
                let p = ProductId::generate();
                let ledger: Vec<_> = entries
                    .into_iter()
                    .map(|(is_sale, qty, price, minute)| {
                        let kind = if is_sale { TransactionKind::Sale } else { TransactionKind::Purchase };
                        entry(tenant, p, kind, qty, price, year_start + Duration::minutes(minute))
                    })
                    .collect();

                let year = period_stats(&ledger, &DateRange::year(year_start.date_naive(), "2024"));
                let mut revenue = 0;
                let mut expenses = 0;
                let mut count = 0;
                for m in 0..12 {
                    let first = year_start.date_naive() + Months::new(m);
                    let stats = period_stats(&ledger, &DateRange::month(first, "m"));
                    prop_assert_eq!(stats.profit, stats.revenue - stats.expenses);
                    revenue += stats.revenue;
                    expenses += stats.expenses;
                    count += stats.transactions;
                }

                prop_assert_eq!(revenue, year.revenue);
                prop_assert_eq!(expenses, year.expenses);
                prop_assert_eq!(count, year.transactions);
            }
        }
    }
}
