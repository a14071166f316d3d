//! Service-level results.

use serde::{Deserialize, Serialize};

use stockledger_catalog::ProductId;
use stockledger_core::DomainError;
use stockledger_ledger::TransactionId;

use crate::store::StoreError;

/// A write that finished, possibly with a follow-up step left undone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome<T> {
    pub value: T,
    pub warning: Option<Warning>,
}

impl<T> Outcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    pub fn with_warning(value: T, warning: Warning) -> Self {
        Self {
            value,
            warning: Some(warning),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warning.is_none()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Partial completion: the primary write happened, a companion write did not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Warning {
    /// Product saved without its opening purchase entry.
    #[error("product {product_id} was saved but its opening ledger entry was not: {cause}")]
    LedgerEntryMissing { product_id: ProductId, cause: String },

    /// Stock counter moved without a matching ledger entry.
    #[error("stock of product {product_id} no longer matches the ledger: {cause}")]
    StockNotReconciled {
        product_id: ProductId,
        transaction_id: TransactionId,
        cause: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("insufficient stock: {available} {unit_label} available, {requested} requested")]
    InsufficientStock {
        available: i64,
        requested: i64,
        unit_label: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    /// A previous submission from the same session is still running.
    #[error("another submission is already in progress")]
    Busy,

    /// The idempotency key already belongs to a different request.
    #[error("idempotency key {0} was already used for a different request")]
    KeyReused(String),

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Store(e) if e.is_transient())
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InsufficientStock {
                available,
                requested,
                unit_label,
            } => ServiceError::InsufficientStock {
                available,
                requested,
                unit_label,
            },
            DomainError::NotFound => ServiceError::NotFound("resource".to_string()),
            DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            DomainError::InvariantViolation(msg) => ServiceError::Invariant(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_keep_their_class() {
        let err: ServiceError = DomainError::insufficient_stock(3, 5, "kg").into();
        assert_eq!(
            err.to_string(),
            "insufficient stock: 3 kg available, 5 requested"
        );

        let err: ServiceError = DomainError::validation("bad").into();
        assert_eq!(err, ServiceError::Validation("bad".to_string()));
    }

    #[test]
    fn only_unavailable_store_errors_are_transient() {
        assert!(ServiceError::from(StoreError::Unavailable("x".into())).is_transient());
        assert!(!ServiceError::from(StoreError::Failed("x".into())).is_transient());
        assert!(!ServiceError::Busy.is_transient());
    }
}
