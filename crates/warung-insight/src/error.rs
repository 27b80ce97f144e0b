//! Engine-level errors.
//!
//! Per-day attribution failures are isolated: a day that cannot be
//! explained is reported as such, never silently dropped and never fatal
//! for the other days in the period.

use thiserror::Error;

use warung_model::{ExplainError, ForestError, ResolverError};

#[derive(Debug, Error)]
pub enum InsightError {
    /// The observation window is too short to compute a robust baseline.
    #[error("insufficient data: {days} distinct days in window, need at least {min_days}")]
    InsufficientData { days: usize, min_days: usize },

    /// The model artifact is missing or unloadable. Reports degrade to
    /// baseline-only analysis with an explicit label.
    #[error("model artifact unavailable: {0}")]
    ModelUnavailable(String),

    /// The resolver's column accounting failed. Fatal for attribution
    /// with this model.
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Explain(#[from] ExplainError),

    #[error(transparent)]
    Prediction(#[from] ForestError),

    /// The folded contributions do not add up to the model output minus
    /// the expected value.
    #[error("attribution sum {sum} disagrees with model delta {delta}")]
    AttributionMismatch { sum: f64, delta: f64 },
}
