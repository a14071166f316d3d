//! Fetches a tenant snapshot and hands it to the analytics engine.

use std::sync::Arc;

use tracing::debug;

use stockledger_analytics::{AnalyticsReport, AnalyticsSnapshot};
use stockledger_core::Clock;

use crate::outcome::ServiceError;
use crate::services::TenantContext;
use crate::store::{ProductStore, TransactionStore};

pub struct AnalyticsService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> AnalyticsService<S>
where
    S: ProductStore + TransactionStore,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn snapshot(&self, ctx: &TenantContext) -> Result<AnalyticsSnapshot, ServiceError> {
        let tenant_id = ctx.tenant_id();
        let products = self.store.list_products(tenant_id).await?;
        let transactions = self.store.list_transactions(tenant_id).await?;

        debug!(
            tenant_id = %tenant_id,
            products = products.len(),
            transactions = transactions.len(),
            "analytics snapshot loaded"
        );
        Ok(AnalyticsSnapshot::new(tenant_id, products, transactions))
    }

    /// Full report as of the service clock's "now".
    pub async fn report(&self, ctx: &TenantContext) -> Result<AnalyticsReport, ServiceError> {
        let snapshot = self.snapshot(ctx).await?;
        Ok(snapshot.report(self.clock.now()))
    }
}
