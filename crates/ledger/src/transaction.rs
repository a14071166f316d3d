use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_catalog::{Product, ProductId};
use stockledger_core::{AggregateId, Amount, DomainError, DomainResult, Entity, TenantId};

/// Ledger entry identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub AggregateId);

impl TransactionId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Purchase,
    Sale,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Purchase => "purchase",
            TransactionKind::Sale => "sale",
        }
    }

    /// Direction of the stock movement: +1 for purchases, -1 for sales.
    pub fn sign(&self) -> i64 {
        match self {
            TransactionKind::Purchase => 1,
            TransactionKind::Sale => -1,
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(TransactionKind::Purchase),
            "sale" => Ok(TransactionKind::Sale),
            other => Err(DomainError::validation(format!(
                "unknown transaction kind: {other}"
            ))),
        }
    }
}

/// Immutable ledger entry.
///
/// `unit_price` is the price actually used for this event, independent of
/// whatever the catalog price is today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub kind: TransactionKind,
    pub quantity: i64,
    pub unit_price: Amount,
    pub total_amount: Amount,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_sale(&self) -> bool {
        self.kind == TransactionKind::Sale
    }

    pub fn is_purchase(&self) -> bool {
        self.kind == TransactionKind::Purchase
    }

    /// Quantity with the sign of its stock effect.
    pub fn stock_delta(&self) -> i64 {
        self.kind.sign() * self.quantity
    }
}

impl Entity for Transaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Purchase entry backing a freshly created product's initial stock.
///
/// The product row already carries this stock, so the entry is built directly
/// instead of going through [`crate::StockPosition`] (which would count it twice).
pub fn opening_entry(
    product: &Product,
    id: TransactionId,
    created_at: DateTime<Utc>,
) -> DomainResult<Transaction> {
    let total_amount = product
        .stock_quantity
        .checked_mul(product.purchase_cost_per_unit)
        .ok_or_else(|| DomainError::validation("opening total overflows"))?;

    Ok(Transaction {
        id,
        tenant_id: product.tenant_id,
        product_id: product.id,
        kind: TransactionKind::Purchase,
        quantity: product.stock_quantity,
        unit_price: product.purchase_cost_per_unit,
        total_amount,
        created_at,
    })
}
