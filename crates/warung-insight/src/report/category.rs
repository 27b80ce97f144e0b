//! Business-category classification of canonical features.
//!
//! A data-driven ordered lookup table of lowercase substring patterns
//! (first match wins), so the mapping is independently testable and new
//! feature families need a table entry, not a code branch.

use std::collections::BTreeMap;

use crate::report::significance::SignificantFactor;

/// Business categories the narrative groups causes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Marketing,
    Operations,
    External,
    ServiceQuality,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Marketing => "Marketing",
            Category::Operations => "Operations",
            Category::External => "External factors",
            Category::ServiceQuality => "Service quality",
            Category::Other => "Other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered (pattern → category) lookup table.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    rules: Vec<(String, Category)>,
}

impl Default for CategoryTable {
    fn default() -> Self {
        let rules = [
            ("ads", Category::Marketing),
            ("roas", Category::Marketing),
            ("spend", Category::Marketing),
            ("impression", Category::Marketing),
            ("promo", Category::Marketing),
            ("rating", Category::ServiceQuality),
            ("review", Category::ServiceQuality),
            ("star", Category::ServiceQuality),
            ("rain", Category::External),
            ("temp", Category::External),
            ("holiday", Category::External),
            ("weekend", Category::External),
            ("tourist", Category::External),
            ("day_of_week", Category::External),
            ("prep", Category::Operations),
            ("delivery", Category::Operations),
            ("accept", Category::Operations),
            ("driver", Category::Operations),
            ("cancel", Category::Operations),
            ("offline", Category::Operations),
            ("close", Category::Operations),
            ("orders", Category::Operations),
        ]
        .into_iter()
        .map(|(p, c)| (p.to_string(), c))
        .collect();
        Self { rules }
    }
}

impl CategoryTable {
    pub fn new(rules: Vec<(String, Category)>) -> Self {
        Self { rules }
    }

    /// Classify a feature name; unmatched names land in `Other`.
    pub fn classify(&self, feature: &str) -> Category {
        let lowered = feature.to_lowercase();
        for (pattern, category) in &self.rules {
            if lowered.contains(pattern.as_str()) {
                return *category;
            }
        }
        Category::Other
    }

    /// Aggregate per-category share percentages over the surviving
    /// factors (negative and positive alike), largest share first.
    pub fn shares(&self, factors: &[&SignificantFactor]) -> Vec<(Category, f64)> {
        let mut by_category: BTreeMap<Category, f64> = BTreeMap::new();
        for factor in factors {
            *by_category.entry(self.classify(&factor.label)).or_insert(0.0) +=
                factor.share_pct;
        }
        let mut shares: Vec<(Category, f64)> = by_category.into_iter().collect();
        shares.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        shares
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_classification_by_pattern() {
        let table = CategoryTable::default();
        assert_eq!(table.classify("ads_spend"), Category::Marketing);
        assert_eq!(table.classify("preparation_time"), Category::Operations);
        assert_eq!(table.classify("cancelled_orders"), Category::Operations);
        assert_eq!(table.classify("rain_mm"), Category::External);
        assert_eq!(table.classify("is_holiday"), Category::External);
        assert_eq!(table.classify("rating"), Category::ServiceQuality);
        assert_eq!(table.classify("total_sales"), Category::Other);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let table = CategoryTable::default();
        // "ads_sales" hits the marketing "ads" pattern before anything else
        assert_eq!(table.classify("ads_sales"), Category::Marketing);
    }

    #[test]
    fn test_shares_aggregate_and_order() {
        let table = CategoryTable::default();
        let factor = |label: &str, share: f64| SignificantFactor {
            label: label.to_string(),
            variants: vec![label.to_string()],
            contribution: -1.0,
            share_pct: share,
            monetary: Decimal::ZERO,
        };
        let ads = factor("ads_spend", 40.0);
        let prep = factor("preparation_time", 25.0);
        let delivery = factor("delivery_time", 10.0);
        let rain = factor("rain_mm", 5.0);
        let shares = table.shares(&[&ads, &prep, &delivery, &rain]);
        assert_eq!(shares[0], (Category::Marketing, 40.0));
        assert_eq!(shares[1].0, Category::Operations);
        assert!((shares[1].1 - 35.0).abs() < 1e-9);
        assert_eq!(shares[2].0, Category::External);
    }
}
