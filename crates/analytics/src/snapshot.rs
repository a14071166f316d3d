//! Owned catalog + ledger snapshot of one tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_catalog::Product;
use stockledger_core::{Entity, TenantId};
use stockledger_ledger::Transaction;

use crate::alerts::{Alert, alerts};
use crate::performance::{ProductPerformance, product_performance};
use crate::period::DateRange;
use crate::report::AnalyticsReport;
use crate::series::{SeriesPoint, daily_series, monthly_series};
use crate::stats::{PeriodStats, period_stats, transactions_in};
use crate::summary::{DashboardSummary, summary};

/// Everything the engine needs for one tenant, fetched ahead of time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub tenant_id: TenantId,
    pub products: Vec<Product>,
    pub transactions: Vec<Transaction>,
}

impl AnalyticsSnapshot {
    /// Build a snapshot, dropping any rows that belong to another tenant.
    pub fn new(tenant_id: TenantId, products: Vec<Product>, transactions: Vec<Transaction>) -> Self {
        Self {
            tenant_id,
            products: products.into_iter().filter(|p| p.belongs_to(tenant_id)).collect(),
            transactions: transactions
                .into_iter()
                .filter(|t| t.belongs_to(tenant_id))
                .collect(),
        }
    }

    pub fn period_stats(&self, range: &DateRange) -> PeriodStats {
        period_stats(&self.transactions, range)
    }

    pub fn transactions_in(&self, range: &DateRange) -> Vec<&Transaction> {
        transactions_in(&self.transactions, range)
    }

    pub fn product_performance(&self) -> Vec<ProductPerformance> {
        product_performance(&self.products, &self.transactions)
    }

    pub fn alerts(&self, now: DateTime<Utc>) -> Vec<Alert> {
        alerts(&self.products, &self.transactions, now)
    }

    pub fn monthly_series(&self, now: DateTime<Utc>) -> Vec<SeriesPoint> {
        monthly_series(&self.transactions, now)
    }

    pub fn daily_series(&self, now: DateTime<Utc>) -> Vec<SeriesPoint> {
        daily_series(&self.transactions, now)
    }

    pub fn summary(&self, now: DateTime<Utc>) -> DashboardSummary {
        summary(&self.products, &self.transactions, now)
    }

    pub fn report(&self, now: DateTime<Utc>) -> AnalyticsReport {
        AnalyticsReport::build(&self.products, &self.transactions, now)
    }
}
