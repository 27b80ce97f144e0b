//! Configuration for the insight engine.
//!
//! Supports loading from a TOML file with environment variable and CLI
//! overrides. The significance thresholds and perturbation magnitudes are
//! empirically chosen defaults, not derived constants; they are exposed
//! here so product owners can tune them without code changes.

use std::path::Path;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use warung_common::schema;

/// Top-level configuration for the engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Logging level.
    pub log_level: LogLevel,

    /// Critical-day detection parameters.
    pub detector: DetectorConfig,

    /// Significance filtering parameters.
    pub significance: SignificanceConfig,

    /// Counterfactual simulation parameters.
    pub simulation: SimulationConfig,

    /// Period diagnostics parameters.
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct LogLevel(pub String);

impl Default for LogLevel {
    fn default() -> Self {
        Self("info".to_string())
    }
}

/// Parameters for the critical-period detector.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// A day is critical when realized sales fall to or below
    /// `threshold_ratio × median` (default 0.70 = a 30% drop).
    pub threshold_ratio: Decimal,

    /// Minimum distinct days required before a baseline is computed.
    pub min_window_days: usize,

    /// Maximum critical days analyzed per report.
    pub max_critical_days: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold_ratio: dec!(0.70),
            min_window_days: 7,
            max_critical_days: 5,
        }
    }
}

/// Parameters for the significance filter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignificanceConfig {
    /// Minimum share of the day's total absolute contribution (percent).
    pub min_share_pct: f64,

    /// Minimum estimated monetary impact (IDR) for negative factors.
    pub min_monetary_idr: Decimal,

    /// Cap on reported negative contributors.
    pub max_negative_factors: usize,

    /// Cap on reported mitigating (positive) contributors.
    pub max_positive_factors: usize,
}

impl Default for SignificanceConfig {
    fn default() -> Self {
        Self {
            min_share_pct: 4.0,
            min_monetary_idr: dec!(100_000),
            max_negative_factors: 5,
            max_positive_factors: 3,
        }
    }
}

/// Parameters for the counterfactual simulator.
///
/// Perturbation magnitudes are fixed configuration constants. They are
/// never derived from the realized target value, so the explanation
/// cannot leak ground truth.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fulfillment-timing reduction, percent (default 10 = −10% SLA).
    pub sla_reduction_pct: f64,

    /// Marketing budget increase, percent (default 10 = +10% budget).
    pub budget_increase_pct: f64,

    /// Feature columns perturbed by the fulfillment-timing lever.
    pub timing_features: Vec<String>,

    /// Feature columns perturbed by the marketing-spend lever.
    pub spend_features: Vec<String>,

    /// Feature columns zeroed by the outage-recovery lever.
    pub outage_features: Vec<String>,

    /// Category share (percent) at or above which a recommendation is
    /// high priority.
    pub high_priority_share_pct: f64,

    /// Category share (percent) at or above which a recommendation is
    /// medium priority.
    pub medium_priority_share_pct: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sla_reduction_pct: 10.0,
            budget_increase_pct: 10.0,
            timing_features: vec![
                schema::PREPARATION_TIME.to_string(),
                schema::DELIVERY_TIME.to_string(),
                schema::ACCEPTING_TIME.to_string(),
                schema::DRIVER_WAITING.to_string(),
            ],
            spend_features: vec![
                schema::ADS_SPEND.to_string(),
                schema::GRAB_ADS_SPEND.to_string(),
                schema::GOJEK_ADS_SPEND.to_string(),
            ],
            outage_features: vec![
                schema::OFFLINE_MINUTES.to_string(),
                schema::CLOSE_MINUTES.to_string(),
            ],
            high_priority_share_pct: 25.0,
            medium_priority_share_pct: 10.0,
        }
    }
}

/// Parameters for period-level external-factor diagnostics.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Rain at or above this many millimetres counts as a heavy-rain day.
    pub heavy_rain_mm: f64,

    /// Minimum |group-mean effect| (percent) for rain to be significant.
    pub rain_effect_pct: f64,

    /// Minimum |group-mean effect| (percent) for holidays to be
    /// significant.
    pub holiday_effect_pct: f64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            heavy_rain_mm: schema::HEAVY_RAIN_MM,
            rain_effect_pct: 10.0,
            holiday_effect_pct: 15.0,
        }
    }
}

impl InsightConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: InsightConfig =
            toml::from_str(content).context("Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("WARUNG_LOG_LEVEL") {
            self.log_level = LogLevel(level);
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_cli_overrides(&mut self, log_level: Option<String>) {
        if let Some(level) = log_level {
            self.log_level = LogLevel(level);
        }
    }

    /// Validate configuration and return errors for invalid values.
    pub fn validate(&self) -> Result<()> {
        let d = &self.detector;
        if d.threshold_ratio <= Decimal::ZERO || d.threshold_ratio >= Decimal::ONE {
            bail!("detector.threshold_ratio must be strictly between 0 and 1");
        }
        if d.min_window_days < 2 {
            bail!("detector.min_window_days must be at least 2");
        }
        if d.max_critical_days == 0 {
            bail!("detector.max_critical_days must be at least 1");
        }

        let s = &self.significance;
        if !(0.0..=100.0).contains(&s.min_share_pct) {
            bail!("significance.min_share_pct must be between 0 and 100");
        }
        if s.min_monetary_idr < Decimal::ZERO {
            bail!("significance.min_monetary_idr must not be negative");
        }
        if s.max_negative_factors == 0 || s.max_positive_factors == 0 {
            bail!("significance factor caps must be at least 1");
        }

        let sim = &self.simulation;
        if !(0.0..100.0).contains(&sim.sla_reduction_pct) {
            bail!("simulation.sla_reduction_pct must be in [0, 100)");
        }
        if sim.budget_increase_pct < 0.0 {
            bail!("simulation.budget_increase_pct must not be negative");
        }
        if sim.timing_features.is_empty()
            || sim.spend_features.is_empty()
            || sim.outage_features.is_empty()
        {
            bail!("simulation lever feature lists must not be empty");
        }
        if sim.medium_priority_share_pct >= sim.high_priority_share_pct {
            bail!("simulation.medium_priority_share_pct must be below high_priority_share_pct");
        }

        if self.diagnostics.heavy_rain_mm <= 0.0 {
            bail!("diagnostics.heavy_rain_mm must be positive");
        }

        Ok(())
    }
}
