//! Analytics engine.
//!
//! Pure, synchronous aggregation over already-fetched catalog and ledger
//! snapshots: period statistics, product performance, alerts, time series and
//! dashboard summaries. Nothing here performs IO or mutates its inputs; "now"
//! is always passed in by the caller.

pub mod alerts;
pub mod performance;
pub mod period;
pub mod report;
pub mod series;
pub mod snapshot;
pub mod stats;
pub mod summary;

pub use alerts::{Alert, AlertKind, Severity, alerts};
pub use performance::{ProductPerformance, product_performance};
pub use period::{DateRange, named_ranges};
pub use report::{AnalyticsReport, RangeStats};
pub use series::{SeriesPoint, daily_series, monthly_series};
pub use snapshot::AnalyticsSnapshot;
pub use stats::{PeriodStats, period_stats, transactions_in};
pub use summary::{DashboardSummary, KindTotals, TransactionMix, summary};

/// Round to two decimals (ratios and percentages).
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
