use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use stockledger_catalog::{Product, ProductId};
use stockledger_core::Amount;
use stockledger_ledger::Transaction;

use crate::period::DateRange;
use crate::stats::period_stats;

/// Current month revenue below this share of the previous month is a drop.
const REVENUE_DROP_RATIO: f64 = 0.8;

/// Current month expenses above this multiple of the average are anomalous.
const EXPENSE_ANOMALY_RATIO: f64 = 1.5;

/// Transactions per pseudo-month used by the expense baseline.
const TRANSACTIONS_PER_MONTH_PROXY: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowStock,
    RevenueDrop,
    ExpenseAnomaly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Derived alert. Re-evaluated on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub product_id: Option<ProductId>,
    pub product_name: Option<String>,
    pub data: Option<JsonValue>,
}

/// Evaluate every alert rule family and return all matches.
///
/// Order: low-stock alerts (catalog order), then revenue drop, then expense
/// anomaly. Month boundaries are taken from `now`.
pub fn alerts(products: &[Product], transactions: &[Transaction], now: DateTime<Utc>) -> Vec<Alert> {
    let mut out: Vec<Alert> = products.iter().filter_map(low_stock_alert).collect();

    let current = period_stats(transactions, &DateRange::month_before(now, 0, "This month"));
    let previous = period_stats(transactions, &DateRange::month_before(now, 1, "Last month"));

    if let Some(a) = revenue_drop_alert(current.revenue, previous.revenue) {
        out.push(a);
    }

    let average = average_monthly_expenses(transactions);
    if let Some(a) = expense_anomaly_alert(current.expenses, average) {
        out.push(a);
    }

    out
}

fn low_stock_alert(product: &Product) -> Option<Alert> {
    if !product.is_low_stock() {
        return None;
    }

    let (severity, message) = if product.is_out_of_stock() {
        (Severity::High, format!("Out of stock: {}", product.name))
    } else {
        (
            Severity::Medium,
            format!(
                "Low stock: {} ({} {} left)",
                product.name, product.stock_quantity, product.unit_label
            ),
        )
    };

    Some(Alert {
        id: format!("low_stock_{}", product.id),
        kind: AlertKind::LowStock,
        severity,
        message,
        product_id: Some(product.id),
        product_name: Some(product.name.clone()),
        data: Some(json!({
            "current_stock": product.stock_quantity,
            "threshold": product.alert_threshold,
        })),
    })
}

fn revenue_drop_alert(current: Amount, previous: Amount) -> Option<Alert> {
    if previous <= 0 || (current as f64) >= previous as f64 * REVENUE_DROP_RATIO {
        return None;
    }

    let drop_percent = ((previous - current) as f64 / previous as f64 * 100.0).round() as i64;
    Some(Alert {
        id: "revenue_drop".to_string(),
        kind: AlertKind::RevenueDrop,
        severity: Severity::High,
        message: format!("Revenue down {drop_percent}% this month"),
        product_id: None,
        product_name: None,
        data: Some(json!({
            "current": current,
            "previous": previous,
            "drop_percent": drop_percent,
        })),
    })
}

/// All-time purchase spend divided by a rough month count
/// (one "month" per 30 transactions of any kind, at least one).
fn average_monthly_expenses(transactions: &[Transaction]) -> f64 {
    let spent: Amount = transactions
        .iter()
        .filter(|t| t.is_purchase())
        .map(|t| t.total_amount)
        .sum();
    let months = transactions.len().div_ceil(TRANSACTIONS_PER_MONTH_PROXY).max(1);
    spent as f64 / months as f64
}

fn expense_anomaly_alert(current: Amount, average: f64) -> Option<Alert> {
    if (current as f64) <= average * EXPENSE_ANOMALY_RATIO || average <= 0.0 {
        return None;
    }

    let excess_percent = ((current as f64 - average) / average * 100.0).round() as i64;
    Some(Alert {
        id: "expense_anomaly".to_string(),
        kind: AlertKind::ExpenseAnomaly,
        severity: Severity::Medium,
        message: format!("Expenses {excess_percent}% above average this month"),
        product_id: None,
        product_name: None,
        data: Some(json!({
            "current": current,
            "average": average,
            "excess_percent": excess_percent,
        })),
    })
}
