use std::sync::Arc;

use stockledger_core::Clock;

use crate::config::EngineConfig;
use crate::services::idempotency::DEFAULT_IDEMPOTENCY_TTL_SECS;
use crate::services::{
    AnalyticsService, CatalogManager, IdempotencyCache, LedgerService, TenantResolver,
};
use crate::store::Store;

/// All services wired to one store and one clock.
pub struct Engine<S> {
    pub resolver: TenantResolver<S>,
    pub catalog: CatalogManager<S>,
    pub ledger: LedgerService<S>,
    pub analytics: AnalyticsService<S>,
}

impl<S: Store> Engine<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: &EngineConfig) -> Self {
        let replay_ttl = chrono::Duration::from_std(config.idempotency_ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_IDEMPOTENCY_TTL_SECS));

        Self {
            resolver: TenantResolver::new(Arc::clone(&store), config.resolve_policy.clone()),
            catalog: CatalogManager::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                config.product_min_latency,
            ),
            ledger: LedgerService::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                config.ledger_min_latency,
            )
            .with_replay_cache(IdempotencyCache::new(replay_ttl, config.idempotency_capacity)),
            analytics: AnalyticsService::new(store, clock),
        }
    }
}
