use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{AggregateId, Amount, DomainError, DomainResult, Entity, TenantId};

/// Unit label stored when the caller leaves it blank.
pub const DEFAULT_UNIT_LABEL: &str = "unit";

/// Alert threshold stored when the caller does not supply one.
pub const DEFAULT_ALERT_THRESHOLD: i64 = 10;

/// Product identifier (tenant-scoped via the `tenant_id` field).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A stock-keeping unit.
///
/// `stock_quantity` is a running total kept in step with the ledger: it must
/// equal the product's purchases minus its sales, and never drop below zero.
/// Only the ledger moves it after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub name: String,
    pub unit_label: String,
    /// Units per package; `None` when the product is only handled in base units.
    pub package_size: Option<i64>,
    pub purchase_cost_per_unit: Amount,
    pub selling_price_per_unit: Amount,
    pub alert_threshold: i64,
    pub stock_quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.alert_threshold
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.stock_quantity == 0
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// How the initial quantity of a new product is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum AddMode {
    /// Quantity counts base units; the price is the price of one unit.
    ByUnit,
    /// Quantity counts packages; the price is the price of one whole package.
    /// A missing package size means one unit per package.
    ByPackage { package_size: Option<i64> },
}

impl AddMode {
    fn units_per_package(&self) -> DomainResult<i64> {
        match *self {
            AddMode::ByUnit => Ok(1),
            AddMode::ByPackage { package_size: None } => Ok(1),
            AddMode::ByPackage {
                package_size: Some(size),
            } if size > 0 => Ok(size),
            AddMode::ByPackage { .. } => Err(DomainError::validation(
                "package size must be greater than zero",
            )),
        }
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub mode: AddMode,
    /// Number of units or packages, depending on `mode`.
    pub quantity: i64,
    /// Price of one unit or of one package, depending on `mode`.
    pub purchase_price: Amount,
    pub selling_price_per_unit: Amount,
    pub alert_threshold: Option<i64>,
    pub unit_label: Option<String>,
}

impl NewProduct {
    /// Validate the input and derive the product row.
    ///
    /// The returned product already carries its initial stock; the caller is
    /// expected to back it with a matching purchase entry in the ledger.
    pub fn prepare(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> DomainResult<Product> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.quantity <= 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        if self.purchase_price <= 0 {
            return Err(DomainError::validation(
                "purchase price must be greater than zero",
            ));
        }
        if self.selling_price_per_unit <= 0 {
            return Err(DomainError::validation(
                "selling price must be greater than zero",
            ));
        }
        let alert_threshold = self.alert_threshold.unwrap_or(DEFAULT_ALERT_THRESHOLD);
        if alert_threshold < 0 {
            return Err(DomainError::validation("alert threshold cannot be negative"));
        }

        let units_per_package = self.mode.units_per_package()?;
        let stock_quantity = self
            .quantity
            .checked_mul(units_per_package)
            .ok_or_else(|| DomainError::validation("quantity is too large"))?;
        let purchase_cost_per_unit = round_div(self.purchase_price, units_per_package);
        if stock_quantity.checked_mul(purchase_cost_per_unit).is_none() {
            return Err(DomainError::validation("opening stock value is too large"));
        }

        let unit_label = self
            .unit_label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_UNIT_LABEL)
            .to_string();

        let package_size = match self.mode {
            AddMode::ByUnit => None,
            AddMode::ByPackage { .. } => Some(units_per_package),
        };

        Ok(Product {
            id: product_id,
            tenant_id,
            name: name.to_string(),
            unit_label,
            package_size,
            purchase_cost_per_unit,
            selling_price_per_unit: self.selling_price_per_unit,
            alert_threshold,
            stock_quantity,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Division of a non-negative amount rounded half up to the nearest whole unit.
pub fn round_div(numerator: Amount, denominator: i64) -> Amount {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder >= denominator - remainder {
        quotient + 1
    } else {
        quotient
    }
}
