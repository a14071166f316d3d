use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_catalog::{Product, ProductId};
use stockledger_core::{Aggregate, AggregateRoot, Amount, DomainError, TenantId};

use crate::transaction::{Transaction, TransactionId, TransactionKind};

/// Aggregate root: the stock position of one product.
///
/// Built from the product's current row; decides whether a purchase or sale may
/// be recorded and what the stock becomes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockPosition {
    product_id: ProductId,
    tenant_id: TenantId,
    unit_label: String,
    selling_price_per_unit: Amount,
    stock: i64,
    version: u64,
}

impl StockPosition {
    pub fn of(product: &Product) -> Self {
        Self {
            product_id: product.id,
            tenant_id: product.tenant_id,
            unit_label: product.unit_label.clone(),
            selling_price_per_unit: product.selling_price_per_unit,
            stock: product.stock_quantity,
            version: 0,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }
}

impl AggregateRoot for StockPosition {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.product_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordTransaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTransaction {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub transaction_id: TransactionId,
    pub kind: TransactionKind,
    pub quantity: i64,
    /// Falls back to the catalog selling price for sales; required for purchases.
    pub unit_price: Option<Amount>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    Record(RecordTransaction),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    Recorded(Transaction),
}

impl LedgerEvent {
    pub fn transaction(&self) -> &Transaction {
        match self {
            LedgerEvent::Recorded(t) => t,
        }
    }

    pub fn into_transaction(self) -> Transaction {
        match self {
            LedgerEvent::Recorded(t) => t,
        }
    }
}

impl Aggregate for StockPosition {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::Recorded(t) => {
                self.stock += t.stock_delta();
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LedgerCommand::Record(cmd) => self.handle_record(cmd),
        }
    }
}

impl StockPosition {
    fn ensure_scope(&self, tenant_id: TenantId, product_id: ProductId) -> Result<(), DomainError> {
        if self.tenant_id != tenant_id {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.product_id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn resolve_price(&self, cmd: &RecordTransaction) -> Result<Amount, DomainError> {
        let price = match (cmd.kind, cmd.unit_price) {
            (_, Some(price)) => price,
            (TransactionKind::Sale, None) => self.selling_price_per_unit,
            (TransactionKind::Purchase, None) => {
                return Err(DomainError::validation("purchase requires a unit price"));
            }
        };
        if price < 0 {
            return Err(DomainError::validation("unit price cannot be negative"));
        }
        Ok(price)
    }

    fn handle_record(&self, cmd: &RecordTransaction) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_scope(cmd.tenant_id, cmd.product_id)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }

        let unit_price = self.resolve_price(cmd)?;

        if cmd.kind == TransactionKind::Sale && self.stock < cmd.quantity {
            return Err(DomainError::insufficient_stock(
                self.stock,
                cmd.quantity,
                self.unit_label.clone(),
            ));
        }

        if cmd.kind == TransactionKind::Purchase && self.stock.checked_add(cmd.quantity).is_none() {
            return Err(DomainError::validation("stock quantity overflows"));
        }

        let total_amount = cmd
            .quantity
            .checked_mul(unit_price)
            .ok_or_else(|| DomainError::validation("total amount overflows"))?;

        Ok(vec![LedgerEvent::Recorded(Transaction {
            id: cmd.transaction_id,
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            kind: cmd.kind,
            quantity: cmd.quantity,
            unit_price,
            total_amount,
            created_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use stockledger_catalog::{AddMode, NewProduct};

    fn product_with_stock(stock: i64) -> Product {
        let mut product = NewProduct {
            name: "Juice".to_string(),
            mode: AddMode::ByUnit,
            quantity: 1,
            purchase_price: 80,
            selling_price_per_unit: 120,
            alert_threshold: Some(3),
            unit_label: Some("bottle".to_string()),
        }
        .prepare(TenantId::new(), ProductId::generate(), Utc::now())
        .unwrap();
        product.stock_quantity = stock;
        product
    }

    fn record(
        position: &StockPosition,
        kind: TransactionKind,
        quantity: i64,
        unit_price: Option<Amount>,
    ) -> RecordTransaction {
        RecordTransaction {
            tenant_id: position.tenant_id(),
            product_id: position.product_id(),
            transaction_id: TransactionId::generate(),
            kind,
            quantity,
            unit_price,
            occurred_at: Utc::now(),
        }
    }

    fn decide(position: &StockPosition, cmd: RecordTransaction) -> Result<Transaction, DomainError> {
        let mut events = position.handle(&LedgerCommand::Record(cmd))?;
        assert_eq!(events.len(), 1);
        Ok(events.remove(0).into_transaction())
    }

    #[test]
    fn sale_defaults_to_catalog_selling_price() {
        let position = StockPosition::of(&product_with_stock(10));
        let t = decide(&position, record(&position, TransactionKind::Sale, 4, None)).unwrap();
        assert_eq!(t.unit_price, 120);
        assert_eq!(t.total_amount, 480);
    }

    #[test]
    fn explicit_price_wins_over_catalog_price() {
        let position = StockPosition::of(&product_with_stock(10));
        let t = decide(&position, record(&position, TransactionKind::Sale, 2, Some(99))).unwrap();
        assert_eq!(t.unit_price, 99);
        assert_eq!(t.total_amount, 198);
    }

    #[test]
    fn purchase_without_price_is_rejected() {
        let position = StockPosition::of(&product_with_stock(0));
        let err = decide(&position, record(&position, TransactionKind::Purchase, 5, None))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn oversell_is_rejected_with_shortfall() {
        let position = StockPosition::of(&product_with_stock(3));
        let err = decide(&position, record(&position, TransactionKind::Sale, 5, None)).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                available: 3,
                requested: 5,
                unit_label: "bottle".to_string(),
            }
        );
        assert_eq!(err.shortfall(), Some(2));
    }

    #[test]
    fn selling_the_whole_stock_is_allowed() {
        let mut position = StockPosition::of(&product_with_stock(3));
        let events = position
            .handle(&LedgerCommand::Record(record(&position, TransactionKind::Sale, 3, None)))
            .unwrap();
        for e in &events {
            position.apply(e);
        }
        assert_eq!(position.stock(), 0);
        assert_eq!(position.version(), 1);
    }

    #[test]
    fn execute_applies_accepted_entries_only() {
        let mut position = StockPosition::of(&product_with_stock(5));
        let cmd = LedgerCommand::Record(record(&position, TransactionKind::Sale, 6, None));
        assert!(position.execute(&cmd).is_err());
        assert_eq!((position.stock(), position.version()), (5, 0));

        let cmd = LedgerCommand::Record(record(&position, TransactionKind::Purchase, 7, Some(50)));
        let events = position.execute(&cmd).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!((position.stock(), position.version()), (12, 1));
    }

    #[test]
    fn rejects_non_positive_quantity_and_negative_price() {
        let position = StockPosition::of(&product_with_stock(10));
        for quantity in [0, -1] {
            let err = decide(&position, record(&position, TransactionKind::Sale, quantity, None))
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
        let err = decide(&position, record(&position, TransactionKind::Purchase, 1, Some(-5)))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn zero_price_is_allowed() {
        let position = StockPosition::of(&product_with_stock(0));
        let t = decide(&position, record(&position, TransactionKind::Purchase, 2, Some(0))).unwrap();
        assert_eq!(t.total_amount, 0);
    }

    #[test]
    fn purchase_that_would_overflow_stock_is_rejected() {
        let mut position = StockPosition::of(&product_with_stock(1));
        let err = decide(&position, record(&position, TransactionKind::Purchase, i64::MAX, Some(0)))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(position.stock(), 1);

        let events = position
            .handle(&LedgerCommand::Record(record(
                &position,
                TransactionKind::Purchase,
                i64::MAX - 1,
                Some(0),
            )))
            .unwrap();
        for e in &events {
            position.apply(e);
        }
        assert_eq!(position.stock(), i64::MAX);
    }

    #[test]
    fn rejects_foreign_tenant() {
        let position = StockPosition::of(&product_with_stock(10));
        let mut cmd = record(&position, TransactionKind::Sale, 1, None);
        cmd.tenant_id = TenantId::new();
        let err = decide(&position, cmd).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: for any sequence of purchase/sale requests, the stock equals
        /// accepted purchases minus accepted sales and never goes negative.
        #[test]
        fn stock_tracks_accepted_entries(
            ops in prop::collection::vec((any::<bool>(), 1i64..50), 1..60)
        ) {
            let mut position = StockPosition::of(&product_with_stock(0));
            let mut accepted: Vec<Transaction> = Vec::new();

            for (is_sale, quantity) in ops {
                let kind = if is_sale { TransactionKind::Sale } else { TransactionKind::Purchase };
                let before = position.stock();
                match position.handle(&LedgerCommand::Record(record(&position, kind, quantity, Some(10)))) {
                    Ok(events) => {
                        for e in &events {
                            position.apply(e);
                            accepted.push(e.transaction().clone());
                        }
                    }
                    Err(DomainError::InsufficientStock { .. }) => {
                        prop_assert!(is_sale);
                        prop_assert!(quantity > before);
                        prop_assert_eq!(position.stock(), before);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {:?}", other),
                }
                prop_assert!(position.stock() >= 0);
            }

            let purchased: i64 = accepted.iter().filter(|t| t.is_purchase()).map(|t| t.quantity).sum();
            let sold: i64 = accepted.iter().filter(|t| t.is_sale()).map(|t| t.quantity).sum();
            prop_assert_eq!(position.stock(), purchased - sold);
            prop_assert_eq!(position.version(), accepted.len() as u64);
        }
    }
}
