use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockledger_catalog::{Product, ProductId};
use stockledger_core::{TenantId, UserId};
use stockledger_ledger::Transaction;
use stockledger_tenancy::{Membership, Organization};

use super::{
    LedgerStore, MembershipStore, OrganizationStore, ProductStore, StoreError, TransactionStore,
};

/// Store operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    FindMembership,
    ListMemberships,
    FindOrganization,
    FindProduct,
    ListProducts,
    InsertProduct,
    SetStock,
    DeleteProduct,
    InsertTransaction,
    ListTransactions,
}

/// Process-local store for tests and development.
///
/// Every call is counted per [`StoreOp`], and queued faults are returned
/// instead of touching data, which lets callers exercise retry and
/// partial-write paths deterministically.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    organizations: RwLock<HashMap<TenantId, Organization>>,
    memberships: RwLock<Vec<Membership>>,
    products: RwLock<HashMap<(TenantId, ProductId), Product>>,
    transactions: RwLock<Vec<Transaction>>,
    faults: Mutex<HashMap<StoreOp, VecDeque<Option<StoreError>>>>,
    calls: Mutex<HashMap<StoreOp, usize>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an organization (onboarding happens outside this system).
    pub fn add_organization(&self, organization: Organization) {
        if let Ok(mut map) = self.organizations.write() {
            map.insert(organization.id, organization);
        }
    }

    pub fn add_membership(&self, membership: Membership) {
        if let Ok(mut list) = self.memberships.write() {
            list.push(membership);
        }
    }

    /// Make the next `times` calls of `op` fail with `error`.
    pub fn fail_next(&self, op: StoreOp, times: usize, error: StoreError) {
        if let Ok(mut faults) = self.faults.lock() {
            let queue = faults.entry(op).or_default();
            queue.extend(std::iter::repeat_n(Some(error), times));
        }
    }

    /// Let `n - 1` calls of `op` through, then fail the `n`th with `error`.
    /// Counts from after any faults already queued for `op`.
    pub fn fail_nth(&self, op: StoreOp, n: usize, error: StoreError) {
        if n == 0 {
            return;
        }
        if let Ok(mut faults) = self.faults.lock() {
            let queue = faults.entry(op).or_default();
            queue.extend(std::iter::repeat_n(None, n - 1));
            queue.push_back(Some(error));
        }
    }

    /// Number of times `op` has been called, failed calls included.
    pub fn calls(&self, op: StoreOp) -> usize {
        self.calls
            .lock()
            .map(|c| c.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn enter(&self, op: StoreOp) -> Result<(), StoreError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(op).or_default() += 1;
        }

        let mut faults = self.faults.lock().map_err(|_| poisoned())?;
        match faults.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(Some(error)) => Err(error),
            _ => Ok(()),
        }
    }
}

fn poisoned() -> StoreError {
    StoreError::Failed("lock poisoned".to_string())
}

#[async_trait]
impl MembershipStore for InMemoryStore {
    async fn find_membership(&self, user_id: UserId) -> Result<Option<Membership>, StoreError> {
        self.enter(StoreOp::FindMembership)?;
        let list = self.memberships.read().map_err(|_| poisoned())?;
        Ok(list.iter().find(|m| m.user_id == user_id).cloned())
    }

    async fn list_memberships(
        &self,
        organization_id: TenantId,
    ) -> Result<Vec<Membership>, StoreError> {
        self.enter(StoreOp::ListMemberships)?;
        let list = self.memberships.read().map_err(|_| poisoned())?;
        Ok(list
            .iter()
            .filter(|m| m.organization_id == organization_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrganizationStore for InMemoryStore {
    async fn find_organization(
        &self,
        organization_id: TenantId,
    ) -> Result<Option<Organization>, StoreError> {
        self.enter(StoreOp::FindOrganization)?;
        let map = self.organizations.read().map_err(|_| poisoned())?;
        Ok(map.get(&organization_id).cloned())
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn find_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        self.enter(StoreOp::FindProduct)?;
        let map = self.products.read().map_err(|_| poisoned())?;
        Ok(map.get(&(tenant_id, product_id)).cloned())
    }

    async fn list_products(&self, tenant_id: TenantId) -> Result<Vec<Product>, StoreError> {
        self.enter(StoreOp::ListProducts)?;
        let map = self.products.read().map_err(|_| poisoned())?;
        Ok(map
            .iter()
            .filter_map(|((t, _id), p)| if *t == tenant_id { Some(p.clone()) } else { None })
            .collect())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        self.enter(StoreOp::InsertProduct)?;
        let mut map = self.products.write().map_err(|_| poisoned())?;
        let key = (product.tenant_id, product.id);
        if map.contains_key(&key) {
            return Err(StoreError::Conflict(format!("product {} already exists", product.id)));
        }
        map.insert(key, product.clone());
        Ok(())
    }

    async fn set_stock(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        stock_quantity: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.enter(StoreOp::SetStock)?;
        let mut map = self.products.write().map_err(|_| poisoned())?;
        match map.get_mut(&(tenant_id, product_id)) {
            Some(product) => {
                product.stock_quantity = stock_quantity;
                product.updated_at = updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<bool, StoreError> {
        self.enter(StoreOp::DeleteProduct)?;
        let mut map = self.products.write().map_err(|_| poisoned())?;
        Ok(map.remove(&(tenant_id, product_id)).is_some())
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), StoreError> {
        self.enter(StoreOp::InsertTransaction)?;
        let mut list = self.transactions.write().map_err(|_| poisoned())?;
        if list.iter().any(|t| t.id == transaction.id) {
            return Err(StoreError::Conflict(format!(
                "transaction {} already exists",
                transaction.id
            )));
        }
        list.push(transaction.clone());
        Ok(())
    }

    async fn list_transactions(&self, tenant_id: TenantId) -> Result<Vec<Transaction>, StoreError> {
        self.enter(StoreOp::ListTransactions)?;
        let list = self.transactions.read().map_err(|_| poisoned())?;
        Ok(list.iter().filter(|t| t.tenant_id == tenant_id).cloned().collect())
    }
}

impl LedgerStore for InMemoryStore {}
