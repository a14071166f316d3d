//! Replay protection for ledger writes.
//!
//! Remembers, per tenant, which transaction a key produced. Entries expire
//! after a fixed time measured on the engine clock, and the cache never holds
//! more than its capacity; when full, the entry closest to expiry goes first.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use stockledger_catalog::ProductId;
use stockledger_core::{Amount, TenantId};
use stockledger_ledger::{Transaction, TransactionKind};

use crate::services::RecordRequest;

pub const DEFAULT_IDEMPOTENCY_TTL_SECS: i64 = 24 * 60 * 60;
pub const DEFAULT_IDEMPOTENCY_CAPACITY: usize = 10_000;

/// Caller-chosen token for one logical user action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The parts of a request a replay must repeat exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    product_id: ProductId,
    kind: TransactionKind,
    quantity: i64,
    unit_price: Option<Amount>,
}

impl Fingerprint {
    fn of(request: &RecordRequest) -> Self {
        Self {
            product_id: request.product_id,
            kind: request.kind,
            quantity: request.quantity,
            unit_price: request.unit_price,
        }
    }
}

#[derive(Debug, Clone)]
struct Remembered {
    fingerprint: Fingerprint,
    transaction: Transaction,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replay {
    /// Key unknown or expired; record normally.
    Fresh,
    /// Same key, same request: hand back the first result.
    Repeat(Transaction),
    /// Same key, different request.
    Mismatch,
}

#[derive(Debug)]
pub struct IdempotencyCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<(TenantId, IdempotencyKey), Remembered>>,
}

impl Default for IdempotencyCache {
    fn default() -> Self {
        Self::new(
            Duration::seconds(DEFAULT_IDEMPOTENCY_TTL_SECS),
            DEFAULT_IDEMPOTENCY_CAPACITY,
        )
    }
}

impl IdempotencyCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn lookup(&self, tenant_id: TenantId, request: &RecordRequest, now: DateTime<Utc>) -> Replay {
        let Some(key) = request.idempotency_key.as_ref() else {
            return Replay::Fresh;
        };
        let Ok(entries) = self.entries.lock() else {
            return Replay::Fresh;
        };

        match entries.get(&(tenant_id, key.clone())) {
            Some(seen) if seen.expires_at <= now => Replay::Fresh,
            Some(seen) if seen.fingerprint == Fingerprint::of(request) => {
                Replay::Repeat(seen.transaction.clone())
            }
            Some(_) => Replay::Mismatch,
            None => Replay::Fresh,
        }
    }

    pub fn remember(
        &self,
        tenant_id: TenantId,
        request: &RecordRequest,
        transaction: &Transaction,
        now: DateTime<Utc>,
    ) {
        let Some(key) = request.idempotency_key.clone() else {
            return;
        };
        if self.capacity == 0 {
            return;
        }
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };

        entries.retain(|_, seen| seen.expires_at > now);
        let slot = (tenant_id, key);
        while entries.len() >= self.capacity && !entries.contains_key(&slot) {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, seen)| seen.expires_at)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            debug!(tenant_id = %oldest.0, key = oldest.1.as_str(), "idempotency key evicted");
            entries.remove(&oldest);
        }

        entries.insert(
            slot,
            Remembered {
                fingerprint: Fingerprint::of(request),
                transaction: transaction.clone(),
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
