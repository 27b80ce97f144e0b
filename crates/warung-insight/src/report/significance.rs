//! Significance filtering and canonicalization of per-feature
//! contributions.
//!
//! Canonicalization runs BEFORE the top-N cut. Platform variants and
//! lag/rolling transforms of one underlying signal must merge first, or
//! the same root cause shows up several times and crowds genuinely
//! distinct causes out of the capped list.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use warung_common::{decimal_from_f64, schema, Platform};

use crate::config::SignificanceConfig;

/// Data-driven canonicalization rules: derived-transform markers are
/// stripped first, then synonym variants collapse to one label.
///
/// Canonical labels are fixed points: they contain no marker and never
/// appear as a synonym key, so canonicalizing twice changes nothing.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    /// Infix markers of engineered transforms; the name is truncated at
    /// the first occurrence ("total_sales_lag_7" → "total_sales").
    markers: Vec<String>,
    /// variant name → canonical label.
    synonyms: BTreeMap<String, String>,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        let markers = ["_lag_", "_roll_mean_", "_roll_sum_", "_roll_std_"]
            .into_iter()
            .map(str::to_string)
            .collect();
        // per-platform variants of one underlying metric
        let mut synonyms = BTreeMap::new();
        for platform in [Platform::Grab, Platform::Gojek] {
            let prefix = platform.column_prefix();
            for canonical in [
                schema::ADS_SPEND,
                schema::ADS_SALES,
                schema::CANCELLED_ORDERS,
                schema::RATING,
                schema::PREPARATION_TIME,
                schema::DELIVERY_TIME,
            ] {
                synonyms.insert(format!("{prefix}_{canonical}"), canonical.to_string());
            }
        }
        Self { markers, synonyms }
    }
}

impl Canonicalizer {
    pub fn new(markers: Vec<String>, synonyms: BTreeMap<String, String>) -> Self {
        Self { markers, synonyms }
    }

    /// Canonical label for a feature name.
    pub fn canonicalize(&self, feature: &str) -> String {
        let mut base = feature;
        let mut cut = base.len();
        for marker in &self.markers {
            if let Some(pos) = base.find(marker.as_str()) {
                cut = cut.min(pos);
            }
        }
        base = &base[..cut];
        match self.synonyms.get(base) {
            Some(canonical) => canonical.clone(),
            None => base.to_string(),
        }
    }
}

/// One surviving factor after canonical merge and filtering.
#[derive(Debug, Clone)]
pub struct SignificantFactor {
    /// Canonical label.
    pub label: String,
    /// The original feature names merged under this label.
    pub variants: Vec<String>,
    /// Signed summed contribution (model domain).
    pub contribution: f64,
    /// Share of the day's total absolute contribution, percent.
    pub share_pct: f64,
    /// Estimated monetary impact; zero for mitigating factors.
    pub monetary: Decimal,
}

/// Filter outcome: ordered negative contributors and mitigating factors.
#[derive(Debug, Clone, Default)]
pub struct SignificanceOutcome {
    pub negative: Vec<SignificantFactor>,
    pub positive: Vec<SignificantFactor>,
}

/// Canonicalize, rank, and filter contributions for one day.
///
/// Negative contributors receive a monetary estimate by allocating the
/// day's shortfall proportionally to their share of all negative mass. A
/// factor survives when its share or its monetary estimate clears the
/// configured floor, whichever is looser; the caps apply last.
pub fn select(
    contributions: &[(String, f64)],
    shortfall: Decimal,
    config: &SignificanceConfig,
    canonicalizer: &Canonicalizer,
) -> SignificanceOutcome {
    // canonical merge first, never after the cut
    let mut merged: BTreeMap<String, (f64, Vec<String>)> = BTreeMap::new();
    for (feature, contribution) in contributions {
        let label = canonicalizer.canonicalize(feature);
        let entry = merged.entry(label).or_insert_with(|| (0.0, Vec::new()));
        entry.0 += contribution;
        entry.1.push(feature.clone());
    }

    let total_abs: f64 = merged.values().map(|(c, _)| c.abs()).sum();
    let negative_abs: f64 = merged
        .values()
        .filter(|(c, _)| *c < 0.0)
        .map(|(c, _)| c.abs())
        .sum();
    if total_abs == 0.0 {
        return SignificanceOutcome::default();
    }

    let mut negative = Vec::new();
    let mut positive = Vec::new();
    for (label, (contribution, variants)) in merged {
        if contribution == 0.0 {
            continue;
        }
        let share_pct = contribution.abs() / total_abs * 100.0;
        let monetary = if contribution < 0.0 && negative_abs > 0.0 {
            (shortfall * decimal_from_f64(contribution.abs() / negative_abs)).round_dp(0)
        } else {
            Decimal::ZERO
        };
        let factor = SignificantFactor {
            label,
            variants,
            contribution,
            share_pct,
            monetary,
        };
        if contribution < 0.0 {
            if share_pct >= config.min_share_pct || monetary >= config.min_monetary_idr {
                negative.push(factor);
            }
        } else if share_pct >= config.min_share_pct {
            positive.push(factor);
        }
    }

    sort_by_magnitude(&mut negative);
    sort_by_magnitude(&mut positive);
    negative.truncate(config.max_negative_factors);
    positive.truncate(config.max_positive_factors);

    SignificanceOutcome { negative, positive }
}

/// Largest |contribution| first; ties break on the label so the order is
/// reproducible.
fn sort_by_magnitude(factors: &mut [SignificantFactor]) {
    factors.sort_by(|a, b| {
        b.contribution
            .abs()
            .total_cmp(&a.contribution.abs())
            .then_with(|| a.label.cmp(&b.label))
    });
}
