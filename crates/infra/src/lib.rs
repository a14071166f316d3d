//! Infrastructure layer: stores, services, configuration.
//!
//! Domain crates decide; this crate fetches their inputs, persists their
//! decisions and enforces the per-session submission rules around them.

pub mod config;
pub mod engine;
pub mod guard;
pub mod outcome;
pub mod retry;
pub mod services;
pub mod store;


pub use config::EngineConfig;
pub use engine::Engine;
pub use guard::SessionId;
pub use outcome::{Outcome, ServiceError, Warning};
pub use retry::RetryPolicy;
pub use services::{
    AnalyticsService, CatalogManager, IdempotencyCache, IdempotencyKey, LedgerLine, LedgerService, RecordRequest,
    Resolution, ResolveError, TenantContext, TenantResolver,
};
pub use store::{InMemoryStore, PostgresStore, StoreError};
