//! Persistence ports.
//!
//! Each trait covers one table family. Lookups return `Option`/`Vec` so that
//! "no rows" is never confused with a failed call; failures carry a
//! [`StoreError`] that says whether retrying could help.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockledger_catalog::{Product, ProductId};
use stockledger_core::{TenantId, UserId};
use stockledger_ledger::Transaction;
use stockledger_tenancy::{Membership, Organization};

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryStore, StoreOp};
pub use postgres::PostgresStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Connectivity or availability problem; the same call may succeed later.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A write collided with existing data (unique key, concurrent update).
    #[error("store conflict: {0}")]
    Conflict(String),

    /// A row the operation depends on does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other failure. Not worth retrying.
    #[error("store operation failed: {0}")]
    Failed(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// The membership of a user, if any. A user belongs to at most one
    /// organization.
    async fn find_membership(&self, user_id: UserId) -> Result<Option<Membership>, StoreError>;

    async fn list_memberships(
        &self,
        organization_id: TenantId,
    ) -> Result<Vec<Membership>, StoreError>;
}

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    async fn find_organization(
        &self,
        organization_id: TenantId,
    ) -> Result<Option<Organization>, StoreError>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<Product>, StoreError>;

    async fn list_products(&self, tenant_id: TenantId) -> Result<Vec<Product>, StoreError>;

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    /// Overwrite the stock counter. Returns `false` when no such product exists.
    async fn set_stock(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        stock_quantity: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Returns `false` when no such product exists.
    async fn delete_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), StoreError>;

    /// All ledger entries of a tenant, oldest first.
    async fn list_transactions(&self, tenant_id: TenantId) -> Result<Vec<Transaction>, StoreError>;
}

/// A decided ledger entry together with the stock change it causes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockMovement {
    pub transaction: Transaction,
    pub previous_stock: i64,
    pub new_stock: i64,
}

/// Result of persisting a [`StockMovement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovementCommit {
    /// Ledger row and stock counter are both written.
    Committed,
    /// The stock counter moved but the ledger row is missing and the counter
    /// could not be put back.
    Diverged { cause: String },
}

#[async_trait]
pub trait LedgerStore: ProductStore + TransactionStore {
    /// Persist a ledger entry and its stock change.
    ///
    /// The default body writes the stock counter, then appends the entry,
    /// reverting the counter when the append fails. Stores with transactions
    /// override it with a single atomic write.
    async fn commit_movement(&self, movement: &StockMovement) -> Result<MovementCommit, StoreError> {
        let t = &movement.transaction;

        if !self
            .set_stock(t.tenant_id, t.product_id, movement.new_stock, t.created_at)
            .await?
        {
            return Err(StoreError::NotFound(format!("product {}", t.product_id)));
        }

        let append_error = match self.insert_transaction(t).await {
            Ok(()) => return Ok(MovementCommit::Committed),
            Err(e) => e,
        };

        match self
            .set_stock(t.tenant_id, t.product_id, movement.previous_stock, t.created_at)
            .await
        {
            Ok(true) => Err(append_error),
            Ok(false) => Ok(MovementCommit::Diverged {
                cause: format!("{append_error}; product vanished before stock was restored"),
            }),
            Err(revert_error) => Ok(MovementCommit::Diverged {
                cause: format!("{append_error}; restoring stock failed: {revert_error}"),
            }),
        }
    }
}

/// Everything the services need from a single backing store.
pub trait Store: MembershipStore + OrganizationStore + LedgerStore {}

impl<T> Store for T where T: MembershipStore + OrganizationStore + LedgerStore {}
