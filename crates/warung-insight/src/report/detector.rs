//! Critical-period detection over the daily sales series.
//!
//! The baseline is the window median, not the mean: the whole point is to
//! find extreme days, and the mean would be dragged toward them. The
//! threshold is computed once per query window.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use warung_common::DailySeries;

use crate::config::DetectorConfig;
use crate::error::InsightError;

/// One flagged day with the context the report needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalDay {
    pub date: NaiveDate,
    pub realized: Decimal,
    pub baseline: Decimal,
    /// `max(baseline - realized, 0)`.
    pub shortfall: Decimal,
    /// `realized / baseline`; zero when the baseline is zero.
    pub drop_ratio: Decimal,
}

/// Detection result for one window.
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    /// The window median used as baseline.
    pub baseline: Decimal,
    /// Threshold the flagged days fell at or below.
    pub threshold: Decimal,
    /// Flagged days, most severe (lowest realized) first.
    pub critical: Vec<CriticalDay>,
}

/// Scan a daily series and flag days at or below
/// `threshold_ratio × median`.
pub fn detect(
    series: &DailySeries,
    config: &DetectorConfig,
) -> Result<DetectionOutcome, InsightError> {
    let days = series.len();
    if days < config.min_window_days {
        return Err(InsightError::InsufficientData {
            days,
            min_days: config.min_window_days,
        });
    }

    // min_window_days >= 2, so the median exists
    let baseline = series.median().unwrap_or(Decimal::ZERO);
    let threshold = baseline * config.threshold_ratio;

    let mut critical: Vec<CriticalDay> = series
        .points()
        .iter()
        .filter(|p| p.sales <= threshold)
        .map(|p| CriticalDay {
            date: p.date,
            realized: p.sales,
            baseline,
            shortfall: (baseline - p.sales).max(Decimal::ZERO),
            drop_ratio: if baseline.is_zero() {
                Decimal::ZERO
            } else {
                (p.sales / baseline).round_dp(4)
            },
        })
        .collect();
    critical.sort_by(|a, b| a.realized.cmp(&b.realized).then(a.date.cmp(&b.date)));

    Ok(DetectionOutcome {
        baseline,
        threshold,
        critical,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use warung_common::DailyPoint;

    fn series(sales: &[i64]) -> DailySeries {
        DailySeries::from_points(
            sales
                .iter()
                .enumerate()
                .map(|(i, s)| DailyPoint {
                    date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
                        + chrono::Days::new(i as u64),
                    sales: Decimal::from(*s),
                })
                .collect(),
        )
    }

    #[test]
    fn test_flags_days_at_or_below_threshold() {
        // median 13M, threshold 9.1M
        let s = series(&[
            13_000_000, 13_000_000, 13_000_000, 12_000_000, 14_000_000, 9_100_000, 6_000_000,
        ]);
        let outcome = detect(&s, &DetectorConfig::default()).unwrap();
        assert_eq!(outcome.baseline, dec!(13_000_000));
        assert_eq!(outcome.threshold, dec!(9_100_000));
        // boundary day included, most severe first
        assert_eq!(outcome.critical.len(), 2);
        assert_eq!(outcome.critical[0].realized, dec!(6_000_000));
        assert_eq!(outcome.critical[1].realized, dec!(9_100_000));
        assert_eq!(outcome.critical[0].shortfall, dec!(7_000_000));
    }

    #[test]
    fn test_insufficient_window_is_reported() {
        let s = series(&[1, 2, 3]);
        let err = detect(&s, &DetectorConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            InsightError::InsufficientData { days: 3, min_days: 7 }
        ));
    }

    #[test]
    fn test_stable_window_flags_nothing() {
        let s = series(&[10, 11, 9, 10, 10, 12, 10]);
        let outcome = detect(&s, &DetectorConfig::default()).unwrap();
        assert!(outcome.critical.is_empty());
    }

    #[test]
    fn test_median_baseline_resists_one_outlier() {
        // a stable 30-day series plus one crash day
        let mut sales: Vec<i64> = vec![13_000_000; 30];
        let stable = series(&sales);
        let median_before = stable.median().unwrap();
        let mean_before = stable.mean().unwrap();

        sales.push(1_000_000);
        let spiked = series(&sales);
        let median_shift = (spiked.median().unwrap() - median_before).abs();
        let mean_shift = (spiked.mean().unwrap() - mean_before).abs();

        assert!(
            median_shift < mean_shift,
            "median moved {median_shift}, mean moved {mean_shift}"
        );
        assert_eq!(median_shift, Decimal::ZERO);
    }

    #[test]
    fn test_drop_ratio_matches_scenario() {
        let mut sales: Vec<i64> = vec![13_000_000; 89];
        sales.push(6_000_000);
        let outcome = detect(&series(&sales), &DetectorConfig::default()).unwrap();
        assert_eq!(outcome.critical.len(), 1);
        // 6.0 / 13.0 = 0.4615 < 0.70
        assert_eq!(outcome.critical[0].drop_ratio, dec!(0.4615));
    }
}
