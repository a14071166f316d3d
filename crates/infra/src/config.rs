//! Engine configuration from the environment.

use std::str::FromStr;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::services::idempotency::{DEFAULT_IDEMPOTENCY_CAPACITY, DEFAULT_IDEMPOTENCY_TTL_SECS};

pub const DEFAULT_RESOLVE_ATTEMPTS: u32 = 3;
pub const DEFAULT_RESOLVE_BACKOFF_MS: u64 = 500;
pub const DEFAULT_PRODUCT_MIN_LATENCY_MS: u64 = 1000;
pub const DEFAULT_LEDGER_MIN_LATENCY_MS: u64 = 800;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Postgres connection string; `None` means run on the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub resolve_policy: RetryPolicy,
    pub product_min_latency: Duration,
    pub ledger_min_latency: Duration,
    /// How long a ledger idempotency key is honoured.
    pub idempotency_ttl: Duration,
    /// Upper bound on remembered idempotency keys across all tenants.
    pub idempotency_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            resolve_policy: RetryPolicy::linear(
                DEFAULT_RESOLVE_ATTEMPTS,
                Duration::from_millis(DEFAULT_RESOLVE_BACKOFF_MS),
            ),
            product_min_latency: Duration::from_millis(DEFAULT_PRODUCT_MIN_LATENCY_MS),
            ledger_min_latency: Duration::from_millis(DEFAULT_LEDGER_MIN_LATENCY_MS),
            idempotency_ttl: Duration::from_secs(DEFAULT_IDEMPOTENCY_TTL_SECS as u64),
            idempotency_capacity: DEFAULT_IDEMPOTENCY_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Read `DATABASE_URL` and the `STOCKLEDGER_*` variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        if database_url.is_none() {
            tracing::warn!("DATABASE_URL not set; only the in-memory store is available");
        }

        let attempts = parse_or(&lookup, "STOCKLEDGER_RESOLVE_ATTEMPTS", DEFAULT_RESOLVE_ATTEMPTS);
        let backoff_ms =
            parse_or(&lookup, "STOCKLEDGER_RESOLVE_BACKOFF_MS", DEFAULT_RESOLVE_BACKOFF_MS);

        Self {
            database_url,
            db_max_connections: parse_or(
                &lookup,
                "STOCKLEDGER_DB_MAX_CONNECTIONS",
                DEFAULT_DB_MAX_CONNECTIONS,
            ),
            resolve_policy: RetryPolicy::linear(attempts.max(1), Duration::from_millis(backoff_ms)),
            product_min_latency: Duration::from_millis(parse_or(
                &lookup,
                "STOCKLEDGER_PRODUCT_MIN_LATENCY_MS",
                DEFAULT_PRODUCT_MIN_LATENCY_MS,
            )),
            ledger_min_latency: Duration::from_millis(parse_or(
                &lookup,
                "STOCKLEDGER_LEDGER_MIN_LATENCY_MS",
                DEFAULT_LEDGER_MIN_LATENCY_MS,
            )),
            idempotency_ttl: Duration::from_secs(parse_or(
                &lookup,
                "STOCKLEDGER_IDEMPOTENCY_TTL_SECS",
                DEFAULT_IDEMPOTENCY_TTL_SECS as u64,
            )),
            idempotency_capacity: parse_or(
                &lookup,
                "STOCKLEDGER_IDEMPOTENCY_CAPACITY",
                DEFAULT_IDEMPOTENCY_CAPACITY,
            ),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, %default, "invalid value; using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(EngineConfig::from_lookup(lookup(&[])), EngineConfig::default());
    }

    #[test]
    fn overrides_and_invalid_values() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/stock"),
            ("STOCKLEDGER_RESOLVE_ATTEMPTS", "5"),
            ("STOCKLEDGER_RESOLVE_BACKOFF_MS", "soon"),
            ("STOCKLEDGER_LEDGER_MIN_LATENCY_MS", "0"),
            ("STOCKLEDGER_IDEMPOTENCY_CAPACITY", "250"),
        ]));

        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/stock"));
        assert_eq!(config.resolve_policy.max_attempts, 5);
        assert_eq!(config.resolve_policy.base_delay, Duration::from_millis(500));
        assert_eq!(config.ledger_min_latency, Duration::ZERO);
        assert_eq!(config.product_min_latency, Duration::from_millis(1000));
        assert_eq!(config.idempotency_capacity, 250);
        assert_eq!(config.idempotency_ttl, Duration::from_secs(86_400));
    }
}
