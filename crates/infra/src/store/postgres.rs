//! Postgres-backed store.
//!
//! Schema lives in `migrations/0001_init.sql`. Every query filters on the
//! tenant column, so a row belonging to another tenant reads as absent.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | StoreError |
//! |------------|---------------|------------|
//! | Io, Tls, PoolTimedOut, PoolClosed | n/a | `Unavailable` |
//! | Database | class `08`, `40001`, `40P01`, `57P03` | `Unavailable` |
//! | Database | `23505` | `Conflict` |
//! | RowNotFound | n/a | `NotFound` |
//! | anything else | any | `Failed` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use stockledger_catalog::{Product, ProductId};
use stockledger_core::{AggregateId, TenantId, UserId};
use stockledger_ledger::{Transaction, TransactionId};
use stockledger_tenancy::{Membership, MembershipId, Organization};

use super::{
    LedgerStore, MembershipStore, MovementCommit, OrganizationStore, ProductStore, StockMovement,
    StoreError, TransactionStore,
};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create missing tables and indexes. Idempotent.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for PostgresStore {
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn find_membership(&self, user_id: UserId) -> Result<Option<Membership>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, organization_id, user_id, role, joined_at
            FROM organization_members
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_membership", e))?;

        row.as_ref().map(membership_from_row).transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %organization_id), err)]
    async fn list_memberships(
        &self,
        organization_id: TenantId,
    ) -> Result<Vec<Membership>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, organization_id, user_id, role, joined_at
            FROM organization_members
            WHERE organization_id = $1
            ORDER BY joined_at ASC
            "#,
        )
        .bind(organization_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_memberships", e))?;

        rows.iter().map(membership_from_row).collect()
    }
}

#[async_trait]
impl OrganizationStore for PostgresStore {
    #[instrument(skip(self), fields(tenant_id = %organization_id), err)]
    async fn find_organization(
        &self,
        organization_id: TenantId,
    ) -> Result<Option<Organization>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, slug, plan, max_products, max_transactions_per_month,
                   created_at, updated_at
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(organization_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_organization", e))?;

        row.as_ref().map(organization_from_row).transpose()
    }
}

#[async_trait]
impl ProductStore for PostgresStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    async fn find_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, name, unit_label, package_size, purchase_cost_per_unit,
                   selling_price_per_unit, alert_threshold, stock_quantity, created_at, updated_at
            FROM products
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(product_id.0.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_products(&self, tenant_id: TenantId) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, name, unit_label, package_size, purchase_cost_per_unit,
                   selling_price_per_unit, alert_threshold, stock_quantity, created_at, updated_at
            FROM products
            WHERE tenant_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(
        skip(self, product),
        fields(tenant_id = %product.tenant_id, product_id = %product.id),
        err
    )]
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, tenant_id, name, unit_label, package_size, purchase_cost_per_unit,
                selling_price_per_unit, alert_threshold, stock_quantity, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(product.id.0.as_uuid())
        .bind(product.tenant_id.as_uuid())
        .bind(&product.name)
        .bind(&product.unit_label)
        .bind(product.package_size)
        .bind(product.purchase_cost_per_unit)
        .bind(product.selling_price_per_unit)
        .bind(product.alert_threshold)
        .bind(product.stock_quantity)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    async fn set_stock(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        stock_quantity: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = $1, updated_at = $2
            WHERE tenant_id = $3 AND id = $4
            "#,
        )
        .bind(stock_quantity)
        .bind(updated_at)
        .bind(tenant_id.as_uuid())
        .bind(product_id.0.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_stock", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    async fn delete_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(product_id.0.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TransactionStore for PostgresStore {
    #[instrument(
        skip(self, transaction),
        fields(tenant_id = %transaction.tenant_id, product_id = %transaction.product_id),
        err
    )]
    async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), StoreError> {
        insert_transaction_query(transaction)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_transactions(&self, tenant_id: TenantId) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, product_id, kind, quantity, unit_price, total_amount, created_at
            FROM transactions
            WHERE tenant_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transactions", e))?;

        rows.iter().map(transaction_from_row).collect()
    }
}

#[async_trait]
impl LedgerStore for PostgresStore {
    /// Stock update and ledger append in one database transaction.
    ///
    /// The update only matches while the counter still holds
    /// `previous_stock`, so a concurrent writer turns into a `Conflict`
    /// instead of a silently lost update.
    #[instrument(
        skip(self, movement),
        fields(
            tenant_id = %movement.transaction.tenant_id,
            product_id = %movement.transaction.product_id,
            new_stock = movement.new_stock
        ),
        err
    )]
    async fn commit_movement(&self, movement: &StockMovement) -> Result<MovementCommit, StoreError> {
        let t = &movement.transaction;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let updated = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = $1, updated_at = $2
            WHERE tenant_id = $3 AND id = $4 AND stock_quantity = $5
            "#,
        )
        .bind(movement.new_stock)
        .bind(t.created_at)
        .bind(t.tenant_id.as_uuid())
        .bind(t.product_id.0.as_uuid())
        .bind(movement.previous_stock)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("commit_movement", e))?;

        if updated.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM products WHERE tenant_id = $1 AND id = $2")
                .bind(t.tenant_id.as_uuid())
                .bind(t.product_id.0.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("commit_movement", e))?;

            return Err(match exists {
                Some(_) => StoreError::Conflict(format!(
                    "stock of product {} changed concurrently",
                    t.product_id
                )),
                None => StoreError::NotFound(format!("product {}", t.product_id)),
            });
        }

        insert_transaction_query(t)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("commit_movement", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        debug!(transaction_id = %t.id, "stock movement committed");
        Ok(MovementCommit::Committed)
    }
}

fn insert_transaction_query(
    t: &Transaction,
) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, tenant_id, product_id, kind, quantity, unit_price, total_amount, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(t.id.0.as_uuid())
    .bind(t.tenant_id.as_uuid())
    .bind(t.product_id.0.as_uuid())
    .bind(t.kind.as_str())
    .bind(t.quantity)
    .bind(t.unit_price)
    .bind(t.total_amount)
    .bind(t.created_at)
}

/// Map SQLx errors to `StoreError`, separating retryable outages from
/// permanent failures.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some(code) if code.starts_with("08") => StoreError::Unavailable(msg),
                Some("40001" | "40P01" | "57P03") => StoreError::Unavailable(msg),
                _ => StoreError::Failed(msg),
            }
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {}: {}", operation, e)),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {}: {}", operation, e)),
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool timed out in {}", operation))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::RowNotFound => {
            StoreError::NotFound(format!("unexpected row not found in {}", operation))
        }
        _ => StoreError::Failed(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn decode_error(what: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Failed(format!("failed to decode {} row: {}", what, err))
}

fn membership_from_row(row: &PgRow) -> Result<Membership, StoreError> {
    let decode = |e: sqlx::Error| decode_error("membership", e);
    let role: String = row.try_get("role").map_err(decode)?;

    Ok(Membership {
        id: MembershipId::new(AggregateId::from_uuid(row.try_get("id").map_err(decode)?)),
        organization_id: TenantId::from_uuid(row.try_get("organization_id").map_err(decode)?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(decode)?),
        role: role.parse().map_err(|e| decode_error("membership", e))?,
        joined_at: row.try_get("joined_at").map_err(decode)?,
    })
}

fn organization_from_row(row: &PgRow) -> Result<Organization, StoreError> {
    let decode = |e: sqlx::Error| decode_error("organization", e);
    let plan: String = row.try_get("plan").map_err(decode)?;
    let max_products: i32 = row.try_get("max_products").map_err(decode)?;
    let max_transactions: i32 = row.try_get("max_transactions_per_month").map_err(decode)?;

    Ok(Organization {
        id: TenantId::from_uuid(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        slug: row.try_get("slug").map_err(decode)?,
        plan: plan.parse().map_err(|e| decode_error("organization", e))?,
        max_products: u32::try_from(max_products).map_err(|e| decode_error("organization", e))?,
        max_transactions_per_month: u32::try_from(max_transactions)
            .map_err(|e| decode_error("organization", e))?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let decode = |e: sqlx::Error| decode_error("product", e);

    Ok(Product {
        id: ProductId::new(AggregateId::from_uuid(row.try_get("id").map_err(decode)?)),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        unit_label: row.try_get("unit_label").map_err(decode)?,
        package_size: row.try_get("package_size").map_err(decode)?,
        purchase_cost_per_unit: row.try_get("purchase_cost_per_unit").map_err(decode)?,
        selling_price_per_unit: row.try_get("selling_price_per_unit").map_err(decode)?,
        alert_threshold: row.try_get("alert_threshold").map_err(decode)?,
        stock_quantity: row.try_get("stock_quantity").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<Transaction, StoreError> {
    let decode = |e: sqlx::Error| decode_error("transaction", e);
    let kind: String = row.try_get("kind").map_err(decode)?;

    Ok(Transaction {
        id: TransactionId::new(AggregateId::from_uuid(row.try_get("id").map_err(decode)?)),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id").map_err(decode)?),
        product_id: ProductId::new(AggregateId::from_uuid(
            row.try_get("product_id").map_err(decode)?,
        )),
        kind: kind.parse().map_err(|e| decode_error("transaction", e))?,
        quantity: row.try_get("quantity").map_err(decode)?,
        unit_price: row.try_get("unit_price").map_err(decode)?,
        total_amount: row.try_get("total_amount").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_failures_are_transient() {
        assert!(map_sqlx_error("x", sqlx::Error::PoolTimedOut).is_transient());
        assert!(map_sqlx_error("x", sqlx::Error::PoolClosed).is_transient());
        assert!(!map_sqlx_error("x", sqlx::Error::RowNotFound).is_transient());
        assert!(matches!(
            map_sqlx_error("x", sqlx::Error::ColumnNotFound("id".into())),
            StoreError::Failed(_)
        ));
    }

    #[test]
    fn schema_creates_every_table() {
        for table in ["organizations", "organization_members", "products", "transactions"] {
            assert!(SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")));
        }
    }
}
