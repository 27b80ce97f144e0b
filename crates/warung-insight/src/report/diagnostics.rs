//! External-factor diagnostics: holidays, weather, and period-level
//! group-mean comparisons.
//!
//! These run even when the model artifact is unavailable (they are the
//! baseline-only layer of the report) and they feed the per-day
//! "external factors" commentary.

use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;

use warung_common::{f64_from_decimal, format_idr, schema, Observation};

use crate::config::DiagnosticsConfig;
use crate::report::detector::CriticalDay;

/// One known calendar entry: (month, day) → name and expected effect.
#[derive(Debug, Clone)]
pub struct HolidayEntry {
    pub month: u32,
    pub day: u32,
    pub name: &'static str,
    pub effect: &'static str,
}

/// Data-driven calendar of holidays the business operates around.
#[derive(Debug, Clone)]
pub struct HolidayCalendar {
    entries: Vec<HolidayEntry>,
}

impl Default for HolidayCalendar {
    fn default() -> Self {
        let entries = vec![
            HolidayEntry { month: 1, day: 1, name: "New Year", effect: "order volume usually rises 15-25%" },
            HolidayEntry { month: 3, day: 31, name: "Nyepi (Day of Silence)", effect: "the island shuts down; couriers do not work" },
            HolidayEntry { month: 4, day: 1, name: "Eid al-Fitr", effect: "largest Muslim holiday; couriers rest, families eat at home" },
            HolidayEntry { month: 5, day: 29, name: "Galungan", effect: "Balinese holiday; activity drops 20-30%" },
            HolidayEntry { month: 6, day: 7, name: "Eid al-Adha", effect: "Muslim holiday of sacrifice; reduced courier supply" },
            HolidayEntry { month: 6, day: 8, name: "Kuningan", effect: "Balinese holiday; reduced activity" },
            HolidayEntry { month: 8, day: 17, name: "Indonesian Independence Day", effect: "national holiday; shifted consumption patterns" },
            HolidayEntry { month: 12, day: 25, name: "Christmas", effect: "mixed effect on delivery demand" },
        ];
        Self { entries }
    }
}

impl HolidayCalendar {
    pub fn lookup(&self, date: NaiveDate) -> Option<&HolidayEntry> {
        self.entries
            .iter()
            .find(|e| e.month == date.month() && e.day == date.day())
    }
}

/// Holiday commentary for one day.
pub fn holiday_commentary(
    date: NaiveDate,
    observation: Option<&Observation>,
    calendar: &HolidayCalendar,
) -> String {
    let flagged = observation.map(Observation::is_holiday).unwrap_or(false);
    if flagged {
        match calendar.lookup(date) {
            Some(entry) => format!("{} — {}", entry.name, entry.effect),
            None => "public holiday — shifted consumption patterns".to_string(),
        }
    } else {
        format!("ordinary {}, not a holiday", weekday_name(date.weekday()))
    }
}

/// Weather commentary for one day: rain bands, then temperature bands.
pub fn weather_commentary(observation: Option<&Observation>) -> String {
    let Some(observation) = observation else {
        return "weather data unavailable".to_string();
    };
    let mut parts = Vec::new();

    let rain = observation.rain_mm();
    if rain >= 25.0 {
        parts.push(format!(
            "heavy rain {rain:.1}mm (couriers off the road, about -25% orders)"
        ));
    } else if rain >= 10.0 {
        parts.push(format!("moderate rain {rain:.1}mm (about -15% orders)"));
    } else if rain > 0.0 {
        parts.push(format!("light rain {rain:.1}mm (minimal impact)"));
    } else {
        parts.push("no rain".to_string());
    }

    if let Some(temp) = observation.numeric(schema::TEMP_C) {
        if temp > 35.0 {
            parts.push(format!("very hot {temp:.1}C (reduced activity)"));
        } else if temp < 20.0 {
            parts.push(format!("cool {temp:.1}C (more hot-food orders)"));
        } else {
            parts.push(format!("comfortable {temp:.1}C"));
        }
    }

    parts.join(", ")
}

/// Period-level external-factor summary via simple group-mean
/// comparisons. This is what the report falls back to when no day in the
/// window is critical.
#[derive(Debug, Clone, Default)]
pub struct PeriodDiagnostics {
    pub rain_effect: Option<String>,
    pub holiday_effect: Option<String>,
    pub weekend_effect: Option<String>,
}

impl PeriodDiagnostics {
    pub fn is_empty(&self) -> bool {
        self.rain_effect.is_none()
            && self.holiday_effect.is_none()
            && self.weekend_effect.is_none()
    }
}

/// Compare mean sales between complementary day groups.
fn group_effect_pct<F>(rows: &[&Observation], predicate: F) -> Option<f64>
where
    F: Fn(&Observation) -> bool,
{
    let mut in_sum = Decimal::ZERO;
    let mut in_n = 0i64;
    let mut out_sum = Decimal::ZERO;
    let mut out_n = 0i64;
    for row in rows {
        if predicate(row) {
            in_sum += row.sales();
            in_n += 1;
        } else {
            out_sum += row.sales();
            out_n += 1;
        }
    }
    if in_n == 0 || out_n == 0 {
        return None;
    }
    let in_mean = f64_from_decimal(in_sum) / in_n as f64;
    let out_mean = f64_from_decimal(out_sum) / out_n as f64;
    if out_mean == 0.0 {
        return None;
    }
    Some((in_mean - out_mean) / out_mean * 100.0)
}

/// Build the period diagnostics over a window of rows.
pub fn period_diagnostics(
    rows: &[&Observation],
    config: &DiagnosticsConfig,
) -> PeriodDiagnostics {
    let mut diagnostics = PeriodDiagnostics::default();

    if let Some(effect) = group_effect_pct(rows, |r| r.rain_mm() >= config.heavy_rain_mm) {
        if effect.abs() > config.rain_effect_pct {
            diagnostics.rain_effect = Some(format!(
                "sales {} {:.1}% on heavy-rain days",
                direction(effect),
                effect.abs()
            ));
        }
    }

    if let Some(effect) = group_effect_pct(rows, Observation::is_holiday) {
        if effect.abs() > config.holiday_effect_pct {
            diagnostics.holiday_effect = Some(format!(
                "sales {} {:.1}% on holidays",
                direction(effect),
                effect.abs()
            ));
        }
    }

    if let Some(effect) = group_effect_pct(rows, |r| {
        matches!(r.date().weekday(), Weekday::Sat | Weekday::Sun)
    }) {
        diagnostics.weekend_effect = Some(format!(
            "weekends run {} {:.1}% vs weekdays",
            direction(effect),
            effect.abs()
        ));
    }

    diagnostics
}

/// Cross-day pattern summary rendered when several days are flagged.
#[derive(Debug, Clone)]
pub struct PeriodSummary {
    pub critical_count: usize,
    pub rainy_count: usize,
    pub holiday_count: usize,
    pub total_shortfall: Decimal,
    pub priority_line: String,
}

/// Summarize patterns across the flagged days.
pub fn summarize_period(
    critical: &[CriticalDay],
    rows: &[&Observation],
    config: &DiagnosticsConfig,
) -> PeriodSummary {
    let row_for = |date: NaiveDate| rows.iter().find(|r| r.date() == date);
    let rainy_count = critical
        .iter()
        .filter(|d| row_for(d.date).map(|r| r.rain_mm() >= config.heavy_rain_mm).unwrap_or(false))
        .count();
    let holiday_count = critical
        .iter()
        .filter(|d| row_for(d.date).map(|r| r.is_holiday()).unwrap_or(false))
        .count();
    let total_shortfall: Decimal = critical.iter().map(|d| d.shortfall).sum();

    let half = critical.len().div_ceil(2);
    let priority_line = if holiday_count >= half && holiday_count > 0 {
        "Build a holiday playbook: budget boosts and targeting for non-observing customers".to_string()
    } else if rainy_count >= half && rainy_count > 0 {
        "Build a bad-weather playbook: rain promos and courier incentives".to_string()
    } else {
        "Tighten control of advertising budgets and kitchen operations".to_string()
    };

    PeriodSummary {
        critical_count: critical.len(),
        rainy_count,
        holiday_count,
        total_shortfall,
        priority_line,
    }
}

impl PeriodSummary {
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!("Critical days in period: {}", self.critical_count));
        if self.rainy_count > 0 {
            lines.push(format!(
                "Heavy-rain days among them: {} ({:.0}%)",
                self.rainy_count,
                self.rainy_count as f64 / self.critical_count as f64 * 100.0
            ));
        }
        if self.holiday_count > 0 {
            lines.push(format!(
                "Holidays among them: {} ({:.0}%)",
                self.holiday_count,
                self.holiday_count as f64 / self.critical_count as f64 * 100.0
            ));
        }
        lines.push(format!(
            "Combined shortfall: {}",
            format_idr(self.total_shortfall)
        ));
        lines.push(format!("Priority: {}", self.priority_line));
        lines
    }
}

fn direction(effect: f64) -> &'static str {
    if effect < 0.0 {
        "drop"
    } else {
        "rise"
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
