use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_catalog::Product;
use stockledger_ledger::Transaction;

use crate::alerts::{Alert, alerts};
use crate::performance::{ProductPerformance, product_performance};
use crate::period::{DateRange, named_ranges};
use crate::series::{SeriesPoint, daily_series, monthly_series};
use crate::stats::{PeriodStats, period_stats};
use crate::summary::{DashboardSummary, summary};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeStats {
    pub range: DateRange,
    pub stats: PeriodStats,
}

/// Every analytics output for one tenant at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub periods: Vec<RangeStats>,
    pub performance: Vec<ProductPerformance>,
    pub alerts: Vec<Alert>,
    pub monthly: Vec<SeriesPoint>,
    pub daily: Vec<SeriesPoint>,
    pub summary: DashboardSummary,
}

impl AnalyticsReport {
    pub fn build(products: &[Product], transactions: &[Transaction], now: DateTime<Utc>) -> Self {
        let periods = named_ranges(now)
            .into_iter()
            .map(|range| RangeStats {
                stats: period_stats(transactions, &range),
                range,
            })
            .collect();

        Self {
            generated_at: now,
            periods,
            performance: product_performance(products, transactions),
            alerts: alerts(products, transactions, now),
            monthly: monthly_series(transactions, now),
            daily: daily_series(transactions, now),
            summary: summary(products, transactions, now),
        }
    }

    pub fn period(&self, label: &str) -> Option<&PeriodStats> {
        self.periods
            .iter()
            .find(|p| p.range.label == label)
            .map(|p| &p.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use stockledger_catalog::ProductId;

    use crate::stats::fixtures::{purchase, sale};

    #[test]
    fn report_is_reproducible_from_the_same_log() {
        let now = Utc.with_ymd_and_hms(2024, 7, 3, 10, 0, 0).unwrap();
        let p = ProductId::generate();
        let ledger = vec![
            sale(p, 700, now),
            purchase(p, 400, Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()),
            sale(p, 90, Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()),
        ];

        let report = AnalyticsReport::build(&[], &ledger, now);
        assert_eq!(report, AnalyticsReport::build(&[], &ledger, now));

        assert_eq!(report.periods.len(), 7);
        assert_eq!(report.period("Today").unwrap().revenue, 700);
        let month = report.period("This month").unwrap();
        assert_eq!(month.revenue, 700);
        assert_eq!(month.expenses, 400);
        assert_eq!(report.period("Last month").unwrap().revenue, 90);
        assert_eq!(report.period("This year").unwrap().transactions, 3);
        assert!(report.period("Next decade").is_none());

        assert_eq!(report.monthly.len(), 12);
        assert_eq!(report.daily.len(), 30);
        assert_eq!(report.summary.total_revenue, 790);
    }
}
