//! Shared types for the warung sales-insight engine.
//!
//! This crate contains:
//! - Common types (Platform, currency/percent formatting, time parsing)
//! - The observation table: per-day, per-restaurant rows loaded from a
//!   caller-supplied CSV, with daily-series and period-average views
//! - Column-name constants for the observation schema

pub mod observations;
pub mod schema;
pub mod types;

pub use observations::{
    DailyPoint, DailySeries, FieldValue, Observation, ObservationError, ObservationTable,
};
pub use types::{
    decimal_from_f64, f64_from_decimal, format_idr, format_pct, format_signed_pct,
    parse_clock_minutes, Platform,
};
