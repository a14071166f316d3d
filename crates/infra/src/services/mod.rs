//! Application services: the operations callers invoke with a resolved tenant.

pub mod analytics;
pub mod catalog;
pub mod idempotency;
pub mod ledger;
pub mod tenant_resolver;

pub use analytics::AnalyticsService;
pub use catalog::CatalogManager;
pub use idempotency::{IdempotencyCache, IdempotencyKey, Replay};
pub use ledger::{LedgerLine, LedgerService, RecordRequest};
pub use tenant_resolver::{Resolution, ResolveError, TenantContext, TenantResolver};
