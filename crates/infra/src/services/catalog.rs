//! Catalog Manager: product creation and removal for the resolved tenant.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use stockledger_analytics::DateRange;
use stockledger_catalog::{NewProduct, Product, ProductId};
use stockledger_core::Clock;
use stockledger_ledger::{TransactionId, opening_entry};
use stockledger_tenancy::QuotaStatus;

use crate::guard::{MinLatency, SingleFlight};
use crate::outcome::{Outcome, ServiceError, Warning};
use crate::services::TenantContext;
use crate::store::{ProductStore, TransactionStore};

pub struct CatalogManager<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    flight: Arc<SingleFlight>,
    min_latency: Duration,
}

impl<S> CatalogManager<S>
where
    S: ProductStore + TransactionStore,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, min_latency: Duration) -> Self {
        Self {
            store,
            clock,
            flight: SingleFlight::new(),
            min_latency,
        }
    }

    /// Create a product and its opening purchase entry.
    ///
    /// The product row is the primary write. If the opening entry cannot be
    /// stored the product is kept and the outcome carries
    /// [`Warning::LedgerEntryMissing`].
    pub async fn add_product(
        &self,
        ctx: &TenantContext,
        input: NewProduct,
    ) -> Result<Outcome<Product>, ServiceError> {
        let _permit = self
            .flight
            .try_acquire(ctx.session_id)
            .ok_or(ServiceError::Busy)?;
        let latency = MinLatency::start(self.min_latency);

        let now = self.clock.now();
        let product = input.prepare(ctx.tenant_id(), ProductId::generate(), now)?;
        let entry = opening_entry(&product, TransactionId::generate(), now)?;

        self.store.insert_product(&product).await?;

        let warning = match self.store.insert_transaction(&entry).await {
            Ok(()) => None,
            Err(e) => {
                warn!(
                    tenant_id = %product.tenant_id,
                    product_id = %product.id,
                    error = %e,
                    "opening ledger entry not recorded"
                );
                Some(Warning::LedgerEntryMissing {
                    product_id: product.id,
                    cause: e.to_string(),
                })
            }
        };

        info!(
            tenant_id = %product.tenant_id,
            user_id = %ctx.user_id,
            product_id = %product.id,
            stock = product.stock_quantity,
            "product added"
        );

        latency.wait().await;
        Ok(Outcome {
            value: product,
            warning,
        })
    }

    /// Remove a product row. Its ledger entries stay.
    pub async fn delete_product(
        &self,
        ctx: &TenantContext,
        product_id: ProductId,
    ) -> Result<(), ServiceError> {
        let _permit = self
            .flight
            .try_acquire(ctx.session_id)
            .ok_or(ServiceError::Busy)?;

        if !self.store.delete_product(ctx.tenant_id(), product_id).await? {
            return Err(ServiceError::NotFound(format!("product {product_id}")));
        }

        info!(tenant_id = %ctx.tenant_id(), user_id = %ctx.user_id, product_id = %product_id, "product deleted");
        Ok(())
    }

    /// Tenant's products, newest first.
    pub async fn list_products(&self, ctx: &TenantContext) -> Result<Vec<Product>, ServiceError> {
        let mut products = self.store.list_products(ctx.tenant_id()).await?;
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    pub async fn get_product(
        &self,
        ctx: &TenantContext,
        product_id: ProductId,
    ) -> Result<Product, ServiceError> {
        self.store
            .find_product(ctx.tenant_id(), product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {product_id}")))
    }

    /// Usage against the organization's plan for the current calendar month.
    pub async fn check_limits(&self, ctx: &TenantContext) -> Result<QuotaStatus, ServiceError> {
        let tenant_id = ctx.tenant_id();
        let products = self.store.list_products(tenant_id).await?;
        let transactions = self.store.list_transactions(tenant_id).await?;

        let month = DateRange::month(self.clock.now().date_naive(), "This month");
        let this_month = transactions
            .iter()
            .filter(|t| month.contains(t.created_at))
            .count();

        Ok(ctx.limits().check(products.len(), this_month))
    }
}
