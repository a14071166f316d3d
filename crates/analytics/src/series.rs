use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::Amount;
use stockledger_ledger::Transaction;

use crate::period::DateRange;
use crate::stats::period_stats;

const MONTHS: u32 = 12;
const DAYS: i64 = 30;

/// One bucket of a revenue/expense time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub label: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub revenue: Amount,
    pub expenses: Amount,
    pub profit: Amount,
}

fn point(transactions: &[Transaction], range: DateRange) -> SeriesPoint {
    let stats = period_stats(transactions, &range);
    SeriesPoint {
        label: range.label,
        start: range.start,
        end: range.end,
        revenue: stats.revenue,
        expenses: stats.expenses,
        profit: stats.profit,
    }
}

/// Trailing 12 calendar months including the current one, oldest first.
pub fn monthly_series(transactions: &[Transaction], now: DateTime<Utc>) -> Vec<SeriesPoint> {
    (0..MONTHS)
        .rev()
        .map(|back| {
            let range = DateRange::month_before(now, back, "");
            let label = range.start.format("%Y-%m").to_string();
            point(transactions, DateRange { label, ..range })
        })
        .collect()
}

/// Trailing 30 calendar days including today, oldest first.
pub fn daily_series(transactions: &[Transaction], now: DateTime<Utc>) -> Vec<SeriesPoint> {
    let today = now.date_naive();
    (0..DAYS)
        .rev()
        .map(|back| {
            let day = today - Duration::days(back);
            point(transactions, DateRange::day(day, day.format("%Y-%m-%d").to_string()))
        })
        .collect()
}
