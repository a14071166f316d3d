//! Ledger service: records purchases and sales against the stock counter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use stockledger_catalog::ProductId;
use stockledger_core::{Aggregate, Amount, Clock};
use stockledger_ledger::{
    LedgerCommand, RecordTransaction, StockPosition, Transaction, TransactionId, TransactionKind,
};

use crate::guard::{MinLatency, SingleFlight};
use crate::outcome::{Outcome, ServiceError, Warning};
use crate::services::TenantContext;
use crate::services::idempotency::{IdempotencyCache, IdempotencyKey, Replay};
use crate::store::{LedgerStore, MovementCommit, StockMovement};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRequest {
    pub product_id: ProductId,
    pub kind: TransactionKind,
    pub quantity: i64,
    /// Sales default to the catalog selling price; purchases must set it.
    pub unit_price: Option<Amount>,
    pub idempotency_key: Option<IdempotencyKey>,
}

impl RecordRequest {
    pub fn sale(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            kind: TransactionKind::Sale,
            quantity,
            unit_price: None,
            idempotency_key: None,
        }
    }

    pub fn purchase(product_id: ProductId, quantity: i64, unit_price: Amount) -> Self {
        Self {
            product_id,
            kind: TransactionKind::Purchase,
            quantity,
            unit_price: Some(unit_price),
            idempotency_key: None,
        }
    }

    pub fn with_key(mut self, key: IdempotencyKey) -> Self {
        self.idempotency_key = Some(key);
        self
    }
}

/// A ledger entry with the name of its product, if the product still exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLine {
    pub transaction: Transaction,
    pub product_name: Option<String>,
}

pub struct LedgerService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    flight: Arc<SingleFlight>,
    min_latency: Duration,
    replays: IdempotencyCache,
}

impl<S> LedgerService<S>
where
    S: LedgerStore,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, min_latency: Duration) -> Self {
        Self {
            store,
            clock,
            flight: SingleFlight::new(),
            min_latency,
            replays: IdempotencyCache::default(),
        }
    }

    pub fn with_replay_cache(mut self, replays: IdempotencyCache) -> Self {
        self.replays = replays;
        self
    }

    /// Record a purchase or sale and move the product's stock.
    ///
    /// A sale larger than the current stock is refused whole. Replaying an
    /// idempotency key already used by this tenant returns the entry recorded
    /// the first time and writes nothing; reusing it for a different request
    /// is refused.
    pub async fn record(
        &self,
        ctx: &TenantContext,
        request: RecordRequest,
    ) -> Result<Outcome<Transaction>, ServiceError> {
        let _permit = self
            .flight
            .try_acquire(ctx.session_id)
            .ok_or(ServiceError::Busy)?;
        let latency = MinLatency::start(self.min_latency);
        let tenant_id = ctx.tenant_id();

        match self.replays.lookup(tenant_id, &request, self.clock.now()) {
            Replay::Fresh => {}
            Replay::Repeat(previous) => {
                info!(tenant_id = %tenant_id, transaction_id = %previous.id, "idempotent replay");
                return Ok(Outcome::ok(previous));
            }
            Replay::Mismatch => {
                let key = request
                    .idempotency_key
                    .as_ref()
                    .map(|k| k.as_str().to_string())
                    .unwrap_or_default();
                warn!(tenant_id = %tenant_id, key = %key, "idempotency key reused for a different request");
                return Err(ServiceError::KeyReused(key));
            }
        }

        let product = self
            .store
            .find_product(tenant_id, request.product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", request.product_id)))?;

        let mut position = StockPosition::of(&product);
        let command = LedgerCommand::Record(RecordTransaction {
            tenant_id,
            product_id: product.id,
            transaction_id: TransactionId::generate(),
            kind: request.kind,
            quantity: request.quantity,
            unit_price: request.unit_price,
            occurred_at: self.clock.now(),
        });

        let transaction = position
            .execute(&command)?
            .into_iter()
            .next()
            .map(|e| e.into_transaction())
            .ok_or_else(|| ServiceError::Invariant("ledger decision produced no entry".into()))?;

        let movement = StockMovement {
            transaction: transaction.clone(),
            previous_stock: product.stock_quantity,
            new_stock: position.stock(),
        };

        let warning = match self.store.commit_movement(&movement).await? {
            MovementCommit::Committed => None,
            MovementCommit::Diverged { cause } => {
                warn!(
                    tenant_id = %tenant_id,
                    product_id = %product.id,
                    transaction_id = %transaction.id,
                    cause = %cause,
                    "stock moved without ledger entry"
                );
                Some(Warning::StockNotReconciled {
                    product_id: product.id,
                    transaction_id: transaction.id,
                    cause,
                })
            }
        };

        if warning.is_none() {
            self.replays.remember(tenant_id, &request, &transaction, self.clock.now());
        }

        info!(
            tenant_id = %tenant_id,
            user_id = %ctx.user_id,
            product_id = %product.id,
            kind = %transaction.kind,
            quantity = transaction.quantity,
            stock = movement.new_stock,
            "transaction recorded"
        );

        latency.wait().await;
        Ok(Outcome {
            value: transaction,
            warning,
        })
    }

    /// Ledger entries of the tenant, newest first.
    pub async fn history(&self, ctx: &TenantContext) -> Result<Vec<LedgerLine>, ServiceError> {
        let tenant_id = ctx.tenant_id();
        let names: HashMap<ProductId, String> = self
            .store
            .list_products(tenant_id)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        let mut transactions = self.store.list_transactions(tenant_id).await?;
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(transactions
            .into_iter()
            .map(|t| LedgerLine {
                product_name: names.get(&t.product_id).cloned(),
                transaction: t,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::time::Instant;

    use stockledger_catalog::{AddMode, NewProduct, Product};
    use stockledger_core::{SystemClock, TenantId, UserId};
    use stockledger_ledger::reconcile;
    use stockledger_tenancy::{Organization, PlanTier};

    use crate::store::{InMemoryStore, ProductStore, StoreError, StoreOp, TransactionStore};

    const LATENCY: Duration = Duration::from_millis(800);

    fn context() -> TenantContext {
        let now = Utc::now();
        TenantContext::new(
            Organization {
                id: TenantId::new(),
                name: "Bakery".to_string(),
                slug: "bakery".to_string(),
                plan: PlanTier::Premium,
                max_products: 100,
                max_transactions_per_month: 1000,
                created_at: now,
                updated_at: now,
            },
            Vec::new(),
            UserId::new(),
        )
    }

    async fn stocked(store: &InMemoryStore, ctx: &TenantContext, stock: i64) -> Product {
        let product = NewProduct {
            name: "Flour".to_string(),
            mode: AddMode::ByUnit,
            quantity: stock,
            purchase_price: 300,
            selling_price_per_unit: 450,
            alert_threshold: Some(2),
            unit_label: Some("kg".to_string()),
        }
        .prepare(ctx.tenant_id(), ProductId::generate(), Utc::now())
        .unwrap();
        store.insert_product(&product).await.unwrap();
        store
            .insert_transaction(&stockledger_ledger::opening_entry(
                &product,
                TransactionId::generate(),
                product.created_at,
            ).unwrap())
            .await
            .unwrap();
        product
    }

    fn service(store: &Arc<InMemoryStore>) -> LedgerService<InMemoryStore> {
        LedgerService::new(Arc::clone(store), Arc::new(SystemClock), LATENCY)
    }

    async fn stock_of(store: &InMemoryStore, product: &Product) -> i64 {
        store
            .find_product(product.tenant_id, product.id)
            .await
            .unwrap()
            .unwrap()
            .stock_quantity
    }

    #[tokio::test(start_paused = true)]
    async fn sale_moves_stock_and_appends_entry() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = context();
        let product = stocked(&store, &ctx, 10).await;
        let started = Instant::now();

        let outcome = service(&store)
            .record(&ctx, RecordRequest::sale(product.id, 4))
            .await
            .unwrap();
        assert!(outcome.is_clean());
        assert!(started.elapsed() >= LATENCY);
        assert_eq!(outcome.value.unit_price, 450);
        assert_eq!(outcome.value.total_amount, 1800);
        assert_eq!(stock_of(&store, &product).await, 6);

        let ledger = store.list_transactions(ctx.tenant_id()).await.unwrap();
        let current = store.find_product(ctx.tenant_id(), product.id).await.unwrap().unwrap();
        assert!(reconcile(&current, &ledger).is_consistent());
    }

    #[tokio::test(start_paused = true)]
    async fn oversell_is_rejected_without_side_effects() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = context();
        let product = stocked(&store, &ctx, 3).await;

        let err = service(&store)
            .record(&ctx, RecordRequest::sale(product.id, 5))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::InsufficientStock {
                available: 3,
                requested: 5,
                unit_label: "kg".to_string(),
            }
        );
        assert_eq!(stock_of(&store, &product).await, 3);
        assert_eq!(store.list_transactions(ctx.tenant_id()).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn purchase_requires_price_and_unknown_product_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = context();
        let product = stocked(&store, &ctx, 1).await;
        let service = service(&store);

        let no_price = RecordRequest {
            unit_price: None,
            ..RecordRequest::purchase(product.id, 5, 0)
        };
        assert!(matches!(
            service.record(&ctx, no_price).await,
            Err(ServiceError::Validation(_))
        ));

        assert!(matches!(
            service.record(&ctx, RecordRequest::sale(ProductId::generate(), 1)).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_append_is_compensated_and_surfaced() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = context();
        let product = stocked(&store, &ctx, 10).await;
        store.fail_next(StoreOp::InsertTransaction, 1, StoreError::Failed("disk full".into()));

        let err = service(&store)
            .record(&ctx, RecordRequest::purchase(product.id, 5, 280))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::Failed(_))));
        assert_eq!(stock_of(&store, &product).await, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_compensation_is_reported_as_warning() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = context();
        let product = stocked(&store, &ctx, 10).await;
        store.fail_next(StoreOp::InsertTransaction, 1, StoreError::Failed("disk full".into()));
        store.fail_nth(StoreOp::SetStock, 2, StoreError::Unavailable("gone".into()));

        let outcome = service(&store)
            .record(&ctx, RecordRequest::sale(product.id, 2))
            .await
            .unwrap();
        assert!(matches!(outcome.warning, Some(Warning::StockNotReconciled { .. })));
        assert_eq!(stock_of(&store, &product).await, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn idempotency_key_replays_first_result() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = context();
        let product = stocked(&store, &ctx, 10).await;
        let service = service(&store);
        let key = IdempotencyKey::new("checkout-42");

        let first = service
            .record(&ctx, RecordRequest::sale(product.id, 2).with_key(key.clone()))
            .await
            .unwrap()
            .value;
        let second = service
            .record(&ctx, RecordRequest::sale(product.id, 2).with_key(key))
            .await
            .unwrap()
            .value;

        assert_eq!(first, second);
        assert_eq!(stock_of(&store, &product).await, 8);
        assert_eq!(store.list_transactions(ctx.tenant_id()).await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reused_key_with_different_request_is_refused() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = context();
        let product = stocked(&store, &ctx, 10).await;
        let service = service(&store);
        let key = IdempotencyKey::new("checkout-7");

        service
            .record(&ctx, RecordRequest::sale(product.id, 2).with_key(key.clone()))
            .await
            .unwrap();
        let err = service
            .record(&ctx, RecordRequest::sale(product.id, 5).with_key(key))
            .await
            .unwrap_err();

        assert_eq!(err, ServiceError::KeyReused("checkout-7".to_string()));
        assert_eq!(stock_of(&store, &product).await, 8);
        assert_eq!(store.list_transactions(ctx.tenant_id()).await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn evicted_key_records_again() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = context();
        let product = stocked(&store, &ctx, 10).await;
        let service = service(&store)
            .with_replay_cache(IdempotencyCache::new(chrono::Duration::hours(1), 1));
        let first = RecordRequest::sale(product.id, 1).with_key(IdempotencyKey::new("a"));
        let second = RecordRequest::sale(product.id, 1).with_key(IdempotencyKey::new("b"));

        service.record(&ctx, first.clone()).await.unwrap();
        service.record(&ctx, second.clone()).await.unwrap();
        // "a" was pushed out by "b", so it is recorded anew.
        service.record(&ctx, first).await.unwrap();
        service.record(&ctx, second).await.unwrap();

        assert_eq!(stock_of(&store, &product).await, 6);
        assert_eq!(store.list_transactions(ctx.tenant_id()).await.unwrap().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_record_from_same_session_is_busy() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = context();
        let product = stocked(&store, &ctx, 10).await;
        let service = service(&store);

        let (first, second) = tokio::join!(
            service.record(&ctx, RecordRequest::sale(product.id, 1)),
            service.record(&ctx, RecordRequest::sale(product.id, 1)),
        );
        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), ServiceError::Busy);
        assert_eq!(stock_of(&store, &product).await, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn history_is_newest_first_and_survives_product_deletion() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = context();
        let product = stocked(&store, &ctx, 10).await;
        let service = service(&store);

        let sale = service
            .record(&ctx, RecordRequest::sale(product.id, 1))
            .await
            .unwrap()
            .value;

        let lines = service.history(&ctx).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].transaction.id, sale.id);
        assert_eq!(lines[0].product_name.as_deref(), Some("Flour"));

        store.delete_product(ctx.tenant_id(), product.id).await.unwrap();
        let lines = service.history(&ctx).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.product_name.is_none()));
    }
}
