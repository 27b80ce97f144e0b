//! Deterministic rendering of the per-day causal narrative.
//!
//! Everything here is a pure function of its inputs: keyed aggregation
//! uses ordered maps, ordering ties break on stable keys, and no clock or
//! randomness is consulted. Identical inputs and thresholds must render
//! byte-identical text.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use warung_common::{decimal_from_f64, format_idr, format_signed_pct, Observation};

use crate::report::category::Category;
use crate::report::counterfactual::Recommendation;
use crate::report::detector::CriticalDay;
use crate::report::significance::SignificantFactor;

/// Key figures: the day against the period's own baselines.
#[derive(Debug, Clone)]
pub struct KeyFigures {
    pub realized: Decimal,
    pub baseline: Decimal,
    pub drop_pct: f64,
    pub shortfall: Decimal,
    pub orders: Option<f64>,
    pub orders_norm: Option<f64>,
    pub avg_check: Option<Decimal>,
    pub check_norm: Option<Decimal>,
}

impl KeyFigures {
    pub fn build(
        critical: &CriticalDay,
        observation: Option<&Observation>,
        orders_norm: Option<f64>,
        check_norm: Option<f64>,
    ) -> Self {
        let drop_pct = if critical.baseline.is_zero() {
            0.0
        } else {
            let ratio = critical.realized / critical.baseline;
            (warung_common::f64_from_decimal(ratio) - 1.0) * 100.0
        };
        let orders = observation.map(Observation::orders).filter(|&o| o > 0.0);
        let avg_check = match (observation, orders) {
            (Some(obs), Some(o)) => Some((obs.sales() / decimal_from_f64(o)).round_dp(0)),
            _ => None,
        };
        Self {
            realized: critical.realized,
            baseline: critical.baseline,
            drop_pct,
            shortfall: critical.shortfall,
            orders,
            orders_norm,
            avg_check,
            check_norm: check_norm.map(|c| decimal_from_f64(c).round_dp(0)),
        }
    }

    fn render_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!(
            "Sales: {} (median {}) -> {}",
            format_idr(self.realized),
            format_idr(self.baseline),
            format_signed_pct(self.drop_pct)
        ));
        lines.push(format!("Lost vs baseline: {}", format_idr(self.shortfall)));
        if let (Some(orders), Some(norm)) = (self.orders, self.orders_norm) {
            if norm > 0.0 {
                lines.push(format!(
                    "Orders: {:.0} (norm {:.0}) -> {}",
                    orders,
                    norm,
                    format_signed_pct((orders - norm) / norm * 100.0)
                ));
            }
        }
        if let (Some(check), Some(norm)) = (self.avg_check, self.check_norm) {
            if !norm.is_zero() {
                let delta = warung_common::f64_from_decimal(
                    (check - norm) * Decimal::ONE_HUNDRED / norm,
                );
                lines.push(format!(
                    "Average check: {} (norm {}) -> {}",
                    format_idr(check),
                    format_idr(norm),
                    format_signed_pct(delta)
                ));
            }
        }
        lines
    }
}

/// One rendered factor row.
#[derive(Debug, Clone)]
pub struct FactorLine {
    pub label: String,
    pub share_pct: f64,
    pub monetary: Decimal,
    pub commentary: String,
}

/// Same-unit comparison of a factor's day value against the period mean
/// over the factor's variant columns.
pub fn factor_commentary(
    factor: &SignificantFactor,
    observation: Option<&Observation>,
    period_means: &BTreeMap<String, f64>,
) -> String {
    let day_value: Option<f64> = observation.and_then(|obs| {
        let values: Vec<f64> = factor
            .variants
            .iter()
            .filter_map(|v| obs.numeric(v))
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum())
        }
    });
    let mean: Option<f64> = {
        let values: Vec<f64> = factor
            .variants
            .iter()
            .filter_map(|v| period_means.get(v).copied())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum())
        }
    };
    match (day_value, mean) {
        (Some(day), Some(mean)) if mean != 0.0 => {
            format!(
                "{} vs {} period average ({})",
                format_metric(day),
                format_metric(mean),
                format_signed_pct((day - mean) / mean * 100.0)
            )
        }
        (Some(day), _) => format!("{} on the day, no period baseline", format_metric(day)),
        _ => "no same-day value recorded".to_string(),
    }
}

/// Money-sized metrics render as IDR, small ones as plain numbers.
fn format_metric(value: f64) -> String {
    if value.abs() >= 1_000.0 {
        format_idr(decimal_from_f64(value).round_dp(0))
    } else {
        format!("{value:.1}")
    }
}

/// The 1-2 sentence cause statement naming the top categories.
pub fn cause_sentence(category_shares: &[(Category, f64)]) -> Option<String> {
    let mut top = category_shares
        .iter()
        .filter(|(category, _)| *category != Category::Other);
    match (top.next(), top.next()) {
        (Some((first, first_share)), Some((second, second_share))) => Some(format!(
            "The drop is driven primarily by {} ({:.0}% of attributed impact) and {} ({:.0}%).",
            first.as_str().to_lowercase(),
            first_share,
            second.as_str().to_lowercase(),
            second_share
        )),
        (Some((first, first_share)), None) => Some(format!(
            "The drop is driven primarily by {} ({:.0}% of attributed impact).",
            first.as_str().to_lowercase(),
            first_share
        )),
        _ => None,
    }
}

/// Fully assembled narrative for one flagged day.
#[derive(Debug, Clone)]
pub struct DayNarrative {
    pub date: NaiveDate,
    pub key_figures: KeyFigures,
    /// Set when attribution could not run; explains what is missing.
    pub attribution_note: Option<String>,
    pub cause_sentence: Option<String>,
    pub negative: Vec<FactorLine>,
    pub positive: Vec<FactorLine>,
    pub category_shares: Vec<(Category, f64)>,
    pub holiday_line: String,
    pub weather_line: String,
    pub recommendations: Vec<Recommendation>,
    pub recovery_total: Decimal,
    pub recovery_pct: f64,
}

impl DayNarrative {
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!("CRITICAL DAY {}", self.date.format("%Y-%m-%d")));
        lines.push(String::new());

        lines.push("Key figures".to_string());
        lines.extend(self.key_figures.render_lines().into_iter().map(indent));
        lines.push(String::new());

        if let Some(note) = &self.attribution_note {
            lines.push(format!("Root causes: {note}"));
        } else {
            lines.push("Root causes".to_string());
            if let Some(sentence) = &self.cause_sentence {
                lines.push(indent(sentence.clone()));
            }
            for (rank, factor) in self.negative.iter().enumerate() {
                lines.push(indent(format!(
                    "{}. {} — {:.1}% of impact, est. {} ({})",
                    rank + 1,
                    factor.label,
                    factor.share_pct,
                    format_idr(factor.monetary),
                    factor.commentary
                )));
            }
            if self.negative.is_empty() {
                lines.push(indent("no significant negative factors".to_string()));
            }
        }
        lines.push(String::new());

        lines.push("External factors".to_string());
        lines.push(indent(format!("Holidays: {}", self.holiday_line)));
        lines.push(indent(format!("Weather: {}", self.weather_line)));
        lines.push(String::new());

        if !self.positive.is_empty() {
            lines.push("What held the day up".to_string());
            for factor in &self.positive {
                lines.push(indent(format!(
                    "{} — {:.1}% of impact ({})",
                    factor.label, factor.share_pct, factor.commentary
                )));
            }
            lines.push(String::new());
        }

        if !self.category_shares.is_empty() {
            lines.push("Impact by category".to_string());
            for (category, share) in &self.category_shares {
                lines.push(indent(format!("{}: {:.1}%", category.as_str(), share)));
            }
            lines.push(String::new());
        }

        if !self.recommendations.is_empty() {
            lines.push("Recommendations".to_string());
            for (rank, recommendation) in self.recommendations.iter().enumerate() {
                lines.push(indent(format!("{}. {}", rank + 1, recommendation.describe())));
            }
            lines.push(format!(
                "Recovery potential: {} ({:.0}% of the loss)",
                format_idr(self.recovery_total),
                self.recovery_pct
            ));
        }

        lines
    }
}

fn indent(line: String) -> String {
    format!("  {line}")
}
