//! Reconciliation of the stored stock counter against the ledger.

use serde::{Deserialize, Serialize};

use stockledger_catalog::{Product, ProductId};

use crate::transaction::Transaction;

/// Net stock movement (purchases minus sales) recorded for a product.
pub fn net_quantity<'a, I>(transactions: I, product_id: ProductId) -> i64
where
    I: IntoIterator<Item = &'a Transaction>,
{
    transactions
        .into_iter()
        .filter(|t| t.product_id == product_id)
        .map(Transaction::stock_delta)
        .sum()
}

/// Comparison between a product's stored stock and its ledger history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub product_id: ProductId,
    pub stored: i64,
    pub from_ledger: i64,
}

impl Reconciliation {
    /// Stored minus ledger-derived stock; zero when consistent.
    pub fn drift(&self) -> i64 {
        self.stored - self.from_ledger
    }

    pub fn is_consistent(&self) -> bool {
        self.drift() == 0 && self.stored >= 0
    }
}

pub fn reconcile<'a, I>(product: &Product, transactions: I) -> Reconciliation
where
    I: IntoIterator<Item = &'a Transaction>,
{
    Reconciliation {
        product_id: product.id,
        stored: product.stock_quantity,
        from_ledger: net_quantity(transactions, product.id),
    }
}
