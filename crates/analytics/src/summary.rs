use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_catalog::Product;
use stockledger_core::Amount;
use stockledger_ledger::{Transaction, TransactionKind};

use crate::period::DateRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KindTotals {
    pub count: usize,
    pub amount: Amount,
}

/// Number and value of purchases vs. sales over the whole ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionMix {
    pub purchases: KindTotals,
    pub sales: KindTotals,
}

/// Headline figures for a dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_products: usize,
    pub total_stock: i64,
    pub low_stock_products: usize,
    pub total_revenue: Amount,
    pub monthly_revenue: Amount,
    pub mix: TransactionMix,
}

pub fn summary(products: &[Product], transactions: &[Transaction], now: DateTime<Utc>) -> DashboardSummary {
    let this_month = DateRange::month(now.date_naive(), "This month");

    let mut mix = TransactionMix::default();
    let mut monthly_revenue = 0;
    for t in transactions {
        let bucket = match t.kind {
            TransactionKind::Purchase => &mut mix.purchases,
            TransactionKind::Sale => &mut mix.sales,
        };
        bucket.count += 1;
        bucket.amount += t.total_amount;

        if t.is_sale() && this_month.contains(t.created_at) {
            monthly_revenue += t.total_amount;
        }
    }

    DashboardSummary {
        total_products: products.len(),
        total_stock: products.iter().map(|p| p.stock_quantity).sum(),
        low_stock_products: products.iter().filter(|p| p.is_low_stock()).count(),
        total_revenue: mix.sales.amount,
        monthly_revenue,
        mix,
    }
}
