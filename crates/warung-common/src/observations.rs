//! Observation table: per-day, per-restaurant rows from the upstream
//! feature-engineering pipeline.
//!
//! The engine consumes the table read-only. Rows arrive as a flat CSV with
//! a header; every column except the (restaurant_id, date) key is either
//! numeric (possibly missing; imputation is the model pipeline's job, not
//! ours) or a categorical string. Platform clock strings ("0:25",
//! "1:05:30") are normalized to minutes at load time.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::schema;
use crate::types::{decimal_from_f64, parse_clock_minutes};

/// Errors from loading or querying the observation table.
#[derive(Debug, Error)]
pub enum ObservationError {
    #[error("failed to read observation csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("observation csv has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("row {row}: invalid {field}: {value:?}")]
    BadField {
        row: usize,
        field: &'static str,
        value: String,
    },
}

/// A single observed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Numeric(f64),
    Text(String),
}

/// One (restaurant_id, date) row. Immutable once loaded; the
/// counterfactual simulator works on explicit clones only.
#[derive(Debug, Clone)]
pub struct Observation {
    restaurant_id: i64,
    date: NaiveDate,
    fields: BTreeMap<String, FieldValue>,
}

impl Observation {
    pub fn new(restaurant_id: i64, date: NaiveDate) -> Self {
        Self {
            restaurant_id,
            date,
            fields: BTreeMap::new(),
        }
    }

    pub fn restaurant_id(&self) -> i64 {
        self.restaurant_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// All fields, keyed by column name. Ordered map so downstream
    /// iteration is deterministic.
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Numeric value of a column, if present and numeric.
    pub fn numeric(&self, column: &str) -> Option<f64> {
        match self.fields.get(column) {
            Some(FieldValue::Numeric(v)) => Some(*v),
            _ => None,
        }
    }

    /// Text value of a column, if present and categorical.
    pub fn text(&self, column: &str) -> Option<&str> {
        match self.fields.get(column) {
            Some(FieldValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Insert or overwrite a numeric field.
    pub fn set_numeric(&mut self, column: &str, value: f64) {
        self.fields
            .insert(column.to_string(), FieldValue::Numeric(value));
    }

    /// Insert or overwrite a categorical field.
    pub fn set_text(&mut self, column: &str, value: impl Into<String>) {
        self.fields
            .insert(column.to_string(), FieldValue::Text(value.into()));
    }

    /// Realized sales for the day as an IDR amount.
    pub fn sales(&self) -> Decimal {
        decimal_from_f64(self.numeric(schema::TOTAL_SALES).unwrap_or(0.0))
    }

    /// Completed orders for the day.
    pub fn orders(&self) -> f64 {
        self.numeric(schema::ORDERS_COUNT).unwrap_or(0.0)
    }

    /// Whether the calendar join marked this day as a holiday.
    pub fn is_holiday(&self) -> bool {
        self.numeric(schema::IS_HOLIDAY).unwrap_or(0.0) >= 1.0
    }

    /// Rain in millimetres, zero when missing.
    pub fn rain_mm(&self) -> f64 {
        self.numeric(schema::RAIN_MM).unwrap_or(0.0)
    }
}

/// One point of the realized daily sales series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub sales: Decimal,
}

/// Realized daily sales for a (restaurant, period) window, summed per
/// date and sorted ascending by date.
#[derive(Debug, Clone, Default)]
pub struct DailySeries {
    points: Vec<DailyPoint>,
}

impl DailySeries {
    pub fn from_points(mut points: Vec<DailyPoint>) -> Self {
        points.sort_by_key(|p| p.date);
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[DailyPoint] {
        &self.points
    }

    pub fn sales_on(&self, date: NaiveDate) -> Option<Decimal> {
        self.points
            .iter()
            .find(|p| p.date == date)
            .map(|p| p.sales)
    }

    /// Median of the daily sales values. `None` on an empty series.
    pub fn median(&self) -> Option<Decimal> {
        if self.points.is_empty() {
            return None;
        }
        let mut values: Vec<Decimal> = self.points.iter().map(|p| p.sales).collect();
        values.sort();
        let mid = values.len() / 2;
        if values.len() % 2 == 1 {
            Some(values[mid])
        } else {
            Some((values[mid - 1] + values[mid]) / Decimal::TWO)
        }
    }

    /// Arithmetic mean of the daily sales values. `None` on empty.
    pub fn mean(&self) -> Option<Decimal> {
        if self.points.is_empty() {
            return None;
        }
        let sum: Decimal = self.points.iter().map(|p| p.sales).sum();
        Some(sum / Decimal::from(self.points.len() as i64))
    }
}

/// CSV-backed observation table for one or more restaurants.
#[derive(Debug, Clone, Default)]
pub struct ObservationTable {
    rows: Vec<Observation>,
}

impl ObservationTable {
    pub fn from_rows(rows: Vec<Observation>) -> Self {
        Self { rows }
    }

    /// Load the table from a CSV file with a header row.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, ObservationError> {
        let reader = csv::Reader::from_path(path.as_ref())?;
        Self::from_csv(reader)
    }

    /// Load the table from any CSV reader.
    pub fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, ObservationError> {
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let id_idx = headers
            .iter()
            .position(|h| h == schema::RESTAURANT_ID)
            .ok_or(ObservationError::MissingColumn(schema::RESTAURANT_ID))?;
        let date_idx = headers
            .iter()
            .position(|h| h == schema::DATE)
            .ok_or(ObservationError::MissingColumn(schema::DATE))?;

        let mut rows = Vec::new();
        for (row_no, record) in reader.records().enumerate() {
            let record = record?;
            let raw_id = record.get(id_idx).unwrap_or("").trim();
            let restaurant_id: i64 =
                raw_id
                    .parse()
                    .map_err(|_| ObservationError::BadField {
                        row: row_no + 1,
                        field: schema::RESTAURANT_ID,
                        value: raw_id.to_string(),
                    })?;
            let raw_date = record.get(date_idx).unwrap_or("").trim();
            let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
                ObservationError::BadField {
                    row: row_no + 1,
                    field: schema::DATE,
                    value: raw_date.to_string(),
                }
            })?;

            let mut obs = Observation::new(restaurant_id, date);
            for (idx, header) in headers.iter().enumerate() {
                if idx == id_idx || idx == date_idx {
                    continue;
                }
                let raw = record.get(idx).unwrap_or("").trim();
                if raw.is_empty() {
                    continue; // missing cell; imputation happens in the model pipeline
                }
                obs.fields
                    .insert(header.clone(), parse_field(raw));
            }
            rows.push(obs);
        }
        debug!(rows = rows.len(), "loaded observation table");
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows for one restaurant within [start, end], sorted by date.
    pub fn window(
        &self,
        restaurant_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<&Observation> {
        let mut rows: Vec<&Observation> = self
            .rows
            .iter()
            .filter(|r| {
                r.restaurant_id == restaurant_id && r.date >= start && r.date <= end
            })
            .collect();
        rows.sort_by_key(|r| r.date);
        rows
    }

    /// The row for one (restaurant, date), if present.
    pub fn row(&self, restaurant_id: i64, date: NaiveDate) -> Option<&Observation> {
        self.rows
            .iter()
            .find(|r| r.restaurant_id == restaurant_id && r.date == date)
    }

    /// Daily realized-sales series for a window, summed per date.
    pub fn daily_series(
        &self,
        restaurant_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DailySeries {
        let mut per_date: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for row in self.window(restaurant_id, start, end) {
            *per_date.entry(row.date).or_insert(Decimal::ZERO) += row.sales();
        }
        DailySeries::from_points(
            per_date
                .into_iter()
                .map(|(date, sales)| DailyPoint { date, sales })
                .collect(),
        )
    }

    /// Mean of a numeric column over a window, optionally excluding one
    /// date (so a critical day does not drag its own baseline down).
    pub fn period_mean(
        &self,
        restaurant_id: i64,
        start: NaiveDate,
        end: NaiveDate,
        column: &str,
        exclude: Option<NaiveDate>,
    ) -> Option<f64> {
        let mut sum = 0.0;
        let mut n = 0usize;
        for row in self.window(restaurant_id, start, end) {
            if Some(row.date) == exclude {
                continue;
            }
            if let Some(v) = row.numeric(column) {
                sum += v;
                n += 1;
            }
        }
        if n == 0 {
            None
        } else {
            Some(sum / n as f64)
        }
    }
}

/// Parse one CSV cell: numeric first, then platform clock strings
/// ("0:25" means 25 minutes), otherwise categorical text.
fn parse_field(raw: &str) -> FieldValue {
    if let Ok(v) = raw.parse::<f64>() {
        return FieldValue::Numeric(v);
    }
    if raw.contains(':') {
        if let Some(minutes) = parse_clock_minutes(raw) {
            return FieldValue::Numeric(minutes);
        }
    }
    FieldValue::Text(raw.to_string())
}
