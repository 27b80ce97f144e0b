//! Counterfactual simulation: what-if re-predictions for concrete
//! intervention levers.
//!
//! Each lever perturbs an isolated copy of the flagged day's row and
//! re-runs the trained pipeline; the predicted delta against the
//! unperturbed baseline is the lever's recovery potential. The shared
//! input row is never touched. Perturbation magnitudes come from
//! configuration and never from the realized target, so two rows with
//! identical features always produce identical deltas regardless of what
//! actually happened that day.

use rust_decimal::Decimal;

use warung_common::{decimal_from_f64, format_idr, Observation};

use crate::config::SimulationConfig;
use crate::error::InsightError;
use crate::report::category::Category;
use crate::service::ModelService;

/// Intervention levers the simulator knows how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lever {
    /// Reduce fulfillment timing metrics by the configured percentage.
    FulfillmentTime,
    /// Increase marketing spend by the configured percentage.
    MarketingSpend,
    /// Zero out platform offline/closure time.
    OutageRecovery,
    /// All of the above at once.
    Combined,
}

impl Lever {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lever::FulfillmentTime => "fulfillment_time",
            Lever::MarketingSpend => "marketing_spend",
            Lever::OutageRecovery => "outage_recovery",
            Lever::Combined => "combined",
        }
    }

    /// Which business category the lever addresses.
    pub fn category(&self) -> Category {
        match self {
            Lever::FulfillmentTime | Lever::OutageRecovery => Category::Operations,
            Lever::MarketingSpend => Category::Marketing,
            Lever::Combined => Category::Other,
        }
    }

    /// Human action text for the recommendation list.
    pub fn action(&self, config: &SimulationConfig) -> String {
        match self {
            Lever::FulfillmentTime => format!(
                "Cut kitchen and delivery times by {:.0}% (extra staff at peak hours)",
                config.sla_reduction_pct
            ),
            Lever::MarketingSpend => format!(
                "Raise advertising budget {:.0}% toward the period norm",
                config.budget_increase_pct
            ),
            Lever::OutageRecovery => {
                "Eliminate platform downtime (availability monitoring and alerts)".to_string()
            }
            Lever::Combined => "Apply all levers together".to_string(),
        }
    }
}

impl std::fmt::Display for Lever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one simulated lever.
#[derive(Debug, Clone)]
pub struct LeverOutcome {
    pub lever: Lever,
    /// Unperturbed pipeline prediction.
    pub baseline: f64,
    /// Prediction on the perturbed copy.
    pub predicted: f64,
    /// `max(predicted - baseline, 0)` as an IDR amount.
    pub recovery: Decimal,
}

/// Priority tier for a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

/// One actionable recommendation with its estimated recovery.
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub lever: Lever,
    pub action: String,
    pub recovery: Decimal,
    pub priority: Priority,
}

impl Recommendation {
    pub fn describe(&self) -> String {
        format!(
            "[{}] {} — estimated recovery {}",
            self.priority.as_str(),
            self.action,
            format_idr(self.recovery)
        )
    }
}

/// Run every lever against one flagged day's row.
pub fn simulate(
    service: &ModelService,
    observation: &Observation,
    config: &SimulationConfig,
) -> Result<Vec<LeverOutcome>, InsightError> {
    let baseline = service.predict(observation.fields())?;
    let levers = [
        Lever::FulfillmentTime,
        Lever::MarketingSpend,
        Lever::OutageRecovery,
        Lever::Combined,
    ];
    let mut outcomes = Vec::with_capacity(levers.len());
    for lever in levers {
        let perturbed = perturb(observation, lever, config);
        let predicted = service.predict(perturbed.fields())?;
        outcomes.push(LeverOutcome {
            lever,
            baseline,
            predicted,
            recovery: decimal_from_f64((predicted - baseline).max(0.0)).round_dp(0),
        });
    }
    Ok(outcomes)
}

/// Apply one lever to an isolated copy of the row.
fn perturb(observation: &Observation, lever: Lever, config: &SimulationConfig) -> Observation {
    let mut copy = observation.clone();
    if matches!(lever, Lever::FulfillmentTime | Lever::Combined) {
        let factor = 1.0 - config.sla_reduction_pct / 100.0;
        for feature in &config.timing_features {
            if let Some(value) = copy.numeric(feature) {
                copy.set_numeric(feature, value * factor);
            }
        }
    }
    if matches!(lever, Lever::MarketingSpend | Lever::Combined) {
        let factor = 1.0 + config.budget_increase_pct / 100.0;
        for feature in &config.spend_features {
            if let Some(value) = copy.numeric(feature) {
                copy.set_numeric(feature, value * factor);
            }
        }
    }
    if matches!(lever, Lever::OutageRecovery | Lever::Combined) {
        for feature in &config.outage_features {
            if copy.numeric(feature).is_some() {
                copy.set_numeric(feature, 0.0);
            }
        }
    }
    copy
}

/// Build the recommendation list from single-lever outcomes.
///
/// Recoveries are scaled proportionally so their total never exceeds the
/// day's shortfall; priority comes from the lever category's aggregate
/// attribution share.
pub fn build_recommendations(
    outcomes: &[LeverOutcome],
    category_shares: &[(Category, f64)],
    shortfall: Decimal,
    config: &SimulationConfig,
) -> Vec<Recommendation> {
    let singles: Vec<&LeverOutcome> = outcomes
        .iter()
        .filter(|o| o.lever != Lever::Combined && o.recovery > Decimal::ZERO)
        .collect();
    let total: Decimal = singles.iter().map(|o| o.recovery).sum();
    let scale = if total > shortfall && total > Decimal::ZERO {
        shortfall / total
    } else {
        Decimal::ONE
    };

    let mut recommendations: Vec<Recommendation> = singles
        .into_iter()
        .map(|outcome| {
            let share = category_shares
                .iter()
                .find(|(category, _)| *category == outcome.lever.category())
                .map(|(_, share)| *share)
                .unwrap_or(0.0);
            let priority = if share >= config.high_priority_share_pct {
                Priority::High
            } else if share >= config.medium_priority_share_pct {
                Priority::Medium
            } else {
                Priority::Low
            };
            Recommendation {
                lever: outcome.lever,
                action: outcome.lever.action(config),
                recovery: (outcome.recovery * scale).round_dp(0),
                priority,
            }
        })
        .collect();
    recommendations.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.recovery.cmp(&a.recovery))
            .then_with(|| a.lever.as_str().cmp(b.lever.as_str()))
    });
    recommendations
}
