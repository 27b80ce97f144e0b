//! Shared value types and formatting helpers.
//!
//! All IDR amounts use `rust_decimal::Decimal`. Raw model outputs and
//! Shapley values stay `f64`; conversion happens at the monetary boundary.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Delivery platforms the business sells through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Grab,
    Gojek,
}

impl Platform {
    /// Display name used in report text.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Grab => "GRAB",
            Platform::Gojek => "GOJEK",
        }
    }

    /// Column-name prefix used by the observation schema.
    pub fn column_prefix(&self) -> &'static str {
        match self {
            Platform::Grab => "grab",
            Platform::Gojek => "gojek",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Format an IDR amount in compact business notation: "13.2M IDR",
/// "450K IDR", "750 IDR". Negative amounts keep their sign.
pub fn format_idr(amount: Decimal) -> String {
    let abs = amount.abs();
    let sign = if amount.is_sign_negative() && !abs.is_zero() {
        "-"
    } else {
        ""
    };
    let million = Decimal::new(1_000_000, 0);
    let thousand = Decimal::new(1_000, 0);
    if abs >= million {
        format!("{sign}{:.1}M IDR", abs / million)
    } else if abs >= thousand {
        format!("{sign}{:.0}K IDR", abs / thousand)
    } else {
        format!("{sign}{:.0} IDR", abs)
    }
}

/// Format a ratio-free percentage with one decimal, e.g. "12.3%".
pub fn format_pct(pct: f64) -> String {
    format!("{pct:.1}%")
}

/// Format a percentage with an explicit sign, e.g. "+4.0%" / "-53.8%".
pub fn format_signed_pct(pct: f64) -> String {
    format!("{pct:+.1}%")
}

/// Parse a platform clock string ("H:MM" or "H:MM:SS") into minutes.
///
/// Plain numeric strings are passed through as minutes. Returns `None`
/// for anything unparseable.
pub fn parse_clock_minutes(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let parts: Vec<&str> = s.split(':').collect();
    match parts.len() {
        1 => s.parse::<f64>().ok(),
        2 => {
            let h: f64 = parts[0].parse().ok()?;
            let m: f64 = parts[1].parse().ok()?;
            Some(h * 60.0 + m)
        }
        3 => {
            let h: f64 = parts[0].parse().ok()?;
            let m: f64 = parts[1].parse().ok()?;
            let sec: f64 = parts[2].parse().ok()?;
            Some(h * 60.0 + m + sec / 60.0)
        }
        _ => None,
    }
}

/// Convert a raw model-domain value to a Decimal amount, guarding
/// against non-finite floats.
pub fn decimal_from_f64(value: f64) -> Decimal {
    if !value.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::from_f64_retain(value).unwrap_or(Decimal::ZERO)
}

/// Convert an IDR amount to the f64 model domain.
pub fn f64_from_decimal(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
