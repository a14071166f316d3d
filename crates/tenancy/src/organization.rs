use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, Entity, TenantId};

/// Subscription tier of an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Premium,
    Enterprise,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Premium => "premium",
            PlanTier::Enterprise => "enterprise",
        }
    }
}

impl core::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(PlanTier::Free),
            "premium" => Ok(PlanTier::Premium),
            "enterprise" => Ok(PlanTier::Enterprise),
            other => Err(DomainError::validation(format!("unknown plan tier: {other}"))),
        }
    }
}

/// A tenant. Created by onboarding, read-mostly here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: TenantId,
    pub name: String,
    pub slug: String,
    pub plan: PlanTier,
    pub max_products: u32,
    pub max_transactions_per_month: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn limits(&self) -> PlanLimits {
        PlanLimits {
            plan: self.plan,
            max_products: self.max_products,
            max_transactions_per_month: self.max_transactions_per_month,
        }
    }
}

impl Entity for Organization {
    type Id = TenantId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.id
    }
}

/// Quota attached to a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub plan: PlanTier,
    pub max_products: u32,
    pub max_transactions_per_month: u32,
}

impl PlanLimits {
    /// Compare current usage against the quota.
    pub fn check(&self, products_used: usize, transactions_this_month: usize) -> QuotaStatus {
        QuotaStatus {
            can_add_products: products_used < self.max_products as usize,
            can_add_transactions: transactions_this_month < self.max_transactions_per_month as usize,
            products_used,
            transactions_this_month,
            limits: *self,
        }
    }
}

/// Usage report for a tenant. Informational; writes are not blocked on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub can_add_products: bool,
    pub can_add_transactions: bool,
    pub products_used: usize,
    pub transactions_this_month: usize,
    pub limits: PlanLimits,
}
