use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use stockledger_catalog::{Product, ProductId, round_div};
use stockledger_core::Amount;
use stockledger_ledger::Transaction;

use crate::round2;

/// All-time sales view of one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPerformance {
    pub product_id: ProductId,
    pub product_name: String,
    pub total_sold: i64,
    pub total_revenue: Amount,
    pub average_selling_price: Amount,
    /// Units sold per unit currently in stock; 0 when out of stock.
    pub stock_rotation: f64,
    pub current_stock: i64,
    pub alert_threshold: i64,
    pub is_low_stock: bool,
}

#[derive(Default)]
struct SaleTotals {
    sold: i64,
    revenue: Amount,
}

/// Per-product performance, highest revenue first.
///
/// Entries for products no longer in the catalog are ignored.
pub fn product_performance(products: &[Product], transactions: &[Transaction]) -> Vec<ProductPerformance> {
    let mut totals: HashMap<ProductId, SaleTotals> = HashMap::new();
    for t in transactions.iter().filter(|t| t.is_sale()) {
        let entry = totals.entry(t.product_id).or_default();
        entry.sold += t.quantity;
        entry.revenue += t.total_amount;
    }

    let mut rows: Vec<ProductPerformance> = products
        .iter()
        .map(|p| {
            let SaleTotals { sold, revenue } = totals.remove(&p.id).unwrap_or_default();
            let average_selling_price = if sold > 0 {
                round_div(revenue, sold)
            } else {
                0
            };
            let stock_rotation = if p.stock_quantity > 0 {
                round2(sold as f64 / p.stock_quantity as f64)
            } else {
                0.0
            };

            ProductPerformance {
                product_id: p.id,
                product_name: p.name.clone(),
                total_sold: sold,
                total_revenue: revenue,
                average_selling_price,
                stock_rotation,
                current_stock: p.stock_quantity,
                alert_threshold: p.alert_threshold,
                is_low_stock: p.is_low_stock(),
            }
        })
        .collect();

    rows.sort_by(|a, b| b.total_revenue.cmp(&a.total_revenue));
    rows
}
