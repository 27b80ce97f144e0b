//! Report generation: detection, per-day attribution, and rendering.
//!
//! One report request is a single-threaded batch computation. Per-day
//! failures are isolated: a day whose attribution fails is reported as
//! "ML analysis unavailable", and the remaining days still render. When
//! the model artifact is missing entirely the whole report degrades to
//! baseline-only analysis with an explicit label.

pub mod attribution;
pub mod category;
pub mod counterfactual;
pub mod detector;
pub mod diagnostics;
pub mod narrative;
pub mod significance;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{info, warn};

use warung_common::{f64_from_decimal, format_idr, schema, Observation, ObservationTable};

use crate::config::InsightConfig;
use crate::error::InsightError;
use crate::service::ModelService;

use category::CategoryTable;
use counterfactual::Recommendation;
use detector::CriticalDay;
use diagnostics::{HolidayCalendar, PeriodDiagnostics, PeriodSummary};
use narrative::{DayNarrative, FactorLine, KeyFigures};
use significance::{Canonicalizer, SignificanceOutcome};

/// One report request: a restaurant and a date window.
#[derive(Debug, Clone, Copy)]
pub struct ReportRequest {
    pub restaurant_id: i64,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// The assembled period report handed to the presentation layer.
#[derive(Debug, Clone)]
pub struct PeriodReport {
    pub request: ReportRequest,
    /// Window median used as the baseline.
    pub baseline: Decimal,
    /// Sales level at or below which a day was flagged.
    pub threshold: Decimal,
    /// Set when the report ran without a model.
    pub model_note: Option<String>,
    /// Per-day narratives, most severe day first.
    pub days: Vec<DayNarrative>,
    /// Period-level diagnostics; rendered when nothing was flagged.
    pub diagnostics: PeriodDiagnostics,
    /// Cross-day summary when more than one day was flagged.
    pub summary: Option<PeriodSummary>,
}

/// Generate the full report for one request.
pub fn generate_report(
    service: Option<&ModelService>,
    config: &InsightConfig,
    table: &ObservationTable,
    request: &ReportRequest,
) -> Result<PeriodReport, InsightError> {
    let series = table.daily_series(request.restaurant_id, request.start, request.end);
    let outcome = detector::detect(&series, &config.detector)?;
    info!(
        restaurant = request.restaurant_id,
        days = series.len(),
        critical = outcome.critical.len(),
        baseline = %outcome.baseline,
        "detection complete"
    );

    let rows = table.window(request.restaurant_id, request.start, request.end);
    let model_note = if service.is_none() {
        Some("attribution unavailable, using baseline-only analysis".to_string())
    } else {
        None
    };

    let flagged: Vec<&CriticalDay> = outcome
        .critical
        .iter()
        .take(config.detector.max_critical_days)
        .collect();

    let calendar = HolidayCalendar::default();
    let canonicalizer = Canonicalizer::default();
    let categories = CategoryTable::default();

    let days: Vec<DayNarrative> = flagged
        .iter()
        .map(|&critical| {
            analyze_day(
                service,
                config,
                table,
                request,
                critical,
                &calendar,
                &canonicalizer,
                &categories,
            )
        })
        .collect();

    let summary = if flagged.len() > 1 {
        let flagged_owned: Vec<CriticalDay> = flagged.iter().map(|c| (*c).clone()).collect();
        Some(diagnostics::summarize_period(
            &flagged_owned,
            &rows,
            &config.diagnostics,
        ))
    } else {
        None
    };

    Ok(PeriodReport {
        request: *request,
        baseline: outcome.baseline,
        threshold: outcome.threshold,
        model_note,
        days,
        diagnostics: diagnostics::period_diagnostics(&rows, &config.diagnostics),
        summary,
    })
}

/// Analyze one flagged day. Never fails: attribution errors degrade to a
/// labeled baseline-only narrative for this day only.
#[allow(clippy::too_many_arguments)]
fn analyze_day(
    service: Option<&ModelService>,
    config: &InsightConfig,
    table: &ObservationTable,
    request: &ReportRequest,
    critical: &CriticalDay,
    calendar: &HolidayCalendar,
    canonicalizer: &Canonicalizer,
    categories: &CategoryTable,
) -> DayNarrative {
    let row = table.row(request.restaurant_id, critical.date);
    let orders_norm = table.period_mean(
        request.restaurant_id,
        request.start,
        request.end,
        schema::ORDERS_COUNT,
        Some(critical.date),
    );
    let check_norm = average_check_norm(table, request, critical.date);

    let mut narrative = DayNarrative {
        date: critical.date,
        key_figures: KeyFigures::build(critical, row, orders_norm, check_norm),
        attribution_note: None,
        cause_sentence: None,
        negative: Vec::new(),
        positive: Vec::new(),
        category_shares: Vec::new(),
        holiday_line: diagnostics::holiday_commentary(critical.date, row, calendar),
        weather_line: diagnostics::weather_commentary(row),
        recommendations: Vec::new(),
        recovery_total: Decimal::ZERO,
        recovery_pct: 0.0,
    };

    let Some(service) = service else {
        narrative.attribution_note =
            Some("attribution unavailable, using baseline-only analysis".to_string());
        return narrative;
    };
    let Some(row) = row else {
        warn!(date = %critical.date, "flagged day has no observation row");
        narrative.attribution_note =
            Some("ML analysis unavailable for this day (no observation row)".to_string());
        return narrative;
    };

    let selected = match attribution::attribute_day(service, row) {
        Ok(attribution) => {
            let contributions: Vec<(String, f64)> = attribution
                .contributions
                .iter()
                .map(|c| (c.feature.clone(), c.contribution))
                .collect();
            significance::select(
                &contributions,
                critical.shortfall,
                &config.significance,
                canonicalizer,
            )
        }
        Err(err) => {
            warn!(date = %critical.date, error = %err, "per-day attribution failed");
            narrative.attribution_note =
                Some("ML analysis unavailable for this day".to_string());
            return narrative;
        }
    };

    let period_means = collect_period_means(table, request, critical.date, &selected);
    narrative.negative = factor_lines(&selected.negative, Some(row), &period_means);
    narrative.positive = factor_lines(&selected.positive, Some(row), &period_means);

    let survivors: Vec<&significance::SignificantFactor> = selected
        .negative
        .iter()
        .chain(selected.positive.iter())
        .collect();
    narrative.category_shares = categories.shares(&survivors);
    narrative.cause_sentence = narrative::cause_sentence(&narrative.category_shares);

    let recommendations =
        build_day_recommendations(service, config, row, critical, &narrative.category_shares);
    narrative.recommendations = recommendations;
    narrative.recovery_total = narrative.recommendations.iter().map(|r| r.recovery).sum();
    narrative.recovery_pct = if critical.shortfall.is_zero() {
        0.0
    } else {
        f64_from_decimal(narrative.recovery_total) / f64_from_decimal(critical.shortfall) * 100.0
    };

    narrative
}

/// Counterfactual recommendations for one day; simulator failures only
/// cost the recommendation list, never the narrative.
fn build_day_recommendations(
    service: &ModelService,
    config: &InsightConfig,
    row: &Observation,
    critical: &CriticalDay,
    category_shares: &[(category::Category, f64)],
) -> Vec<Recommendation> {
    match counterfactual::simulate(service, row, &config.simulation) {
        Ok(outcomes) => counterfactual::build_recommendations(
            &outcomes,
            category_shares,
            critical.shortfall,
            &config.simulation,
        ),
        Err(err) => {
            warn!(date = %critical.date, error = %err, "counterfactual simulation failed");
            Vec::new()
        }
    }
}

fn factor_lines(
    factors: &[significance::SignificantFactor],
    row: Option<&Observation>,
    period_means: &BTreeMap<String, f64>,
) -> Vec<FactorLine> {
    factors
        .iter()
        .map(|factor| FactorLine {
            label: factor.label.clone(),
            share_pct: factor.share_pct,
            monetary: factor.monetary,
            commentary: narrative::factor_commentary(factor, row, period_means),
        })
        .collect()
}

/// Period mean for every variant column the surviving factors touch.
fn collect_period_means(
    table: &ObservationTable,
    request: &ReportRequest,
    exclude: NaiveDate,
    selected: &SignificanceOutcome,
) -> BTreeMap<String, f64> {
    let mut means = BTreeMap::new();
    for factor in selected.negative.iter().chain(selected.positive.iter()) {
        for variant in &factor.variants {
            if !means.contains_key(variant) {
                if let Some(mean) = table.period_mean(
                    request.restaurant_id,
                    request.start,
                    request.end,
                    variant,
                    Some(exclude),
                ) {
                    means.insert(variant.clone(), mean);
                }
            }
        }
    }
    means
}

/// Mean of the per-day average check over the window, excluding one date.
fn average_check_norm(
    table: &ObservationTable,
    request: &ReportRequest,
    exclude: NaiveDate,
) -> Option<f64> {
    let mut sum = 0.0;
    let mut n = 0usize;
    for row in table.window(request.restaurant_id, request.start, request.end) {
        if row.date() == exclude {
            continue;
        }
        let orders = row.orders();
        if orders > 0.0 {
            sum += f64_from_decimal(row.sales()) / orders;
            n += 1;
        }
    }
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

impl PeriodReport {
    /// Render the whole report as deterministic plain text.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "SALES DROP ANALYSIS — restaurant {}",
            self.request.restaurant_id
        ));
        lines.push(format!(
            "Period: {} .. {}",
            self.request.start.format("%Y-%m-%d"),
            self.request.end.format("%Y-%m-%d")
        ));
        lines.push("=".repeat(64));
        lines.push(format!(
            "Baseline (median daily sales): {}",
            format_idr(self.baseline)
        ));
        lines.push(format!("Critical threshold: {}", format_idr(self.threshold)));
        if let Some(note) = &self.model_note {
            lines.push(format!("Note: {note}"));
        }
        lines.push(String::new());

        if self.days.is_empty() {
            lines.push("No critical sales drops in this period.".to_string());
            if !self.diagnostics.is_empty() {
                lines.push(String::new());
                lines.push("Period diagnostics".to_string());
                for effect in [
                    &self.diagnostics.rain_effect,
                    &self.diagnostics.holiday_effect,
                    &self.diagnostics.weekend_effect,
                ]
                .into_iter()
                .flatten()
                {
                    lines.push(format!("  {effect}"));
                }
            }
        } else {
            for (index, day) in self.days.iter().enumerate() {
                if index > 0 {
                    lines.push(String::new());
                    lines.push("-".repeat(64));
                    lines.push(String::new());
                }
                lines.extend(day.render_lines());
            }
        }

        if let Some(summary) = &self.summary {
            lines.push(String::new());
            lines.push("PERIOD SUMMARY".to_string());
            for line in summary.render_lines() {
                lines.push(format!("  {line}"));
            }
        }

        lines.push(String::new());
        lines.join("\n")
    }
}
