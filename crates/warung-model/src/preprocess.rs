//! Fitted preprocessing transformer: the encode/impute step of the
//! trained pipeline.
//!
//! Two sub-transformer kinds cover what the training side fits:
//! median-imputed numeric passthrough and most-frequent-imputed one-hot
//! categorical expansion. Sub-transformers apply in definition order and
//! their emitted columns concatenate into the dense matrix the trees were
//! trained on. Unknown categories at transform time encode as all zeros.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use warung_common::FieldValue;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("sub-transformer '{name}': {column} has no fitted state")]
    MissingState { name: String, column: String },
}

/// What a fitted sub-transformer does to its input columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformerKind {
    /// Plain numeric passthrough: one output column per input, named
    /// after it. Missing cells stay missing (NaN) and are routed by the
    /// trees' default direction.
    Passthrough,

    /// Numeric passthrough with median imputation: one output column per
    /// input, named after it. `statistics[i]` is the fitted median for
    /// `columns[i]`.
    MedianImpute { statistics: Vec<f64> },

    /// Most-frequent imputation followed by one-hot encoding.
    /// `categories[i]` is the learned category list for `columns[i]`, in
    /// fitted order; `fill_values[i]` replaces missing cells before
    /// encoding. Output columns are named `"<column>_<category>"`.
    MostFrequentOneHot {
        fill_values: Vec<String>,
        categories: Vec<Vec<String>>,
    },
}

/// One fitted sub-transformer: a named step over a column subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTransformer {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(flatten)]
    pub kind: TransformerKind,
}

impl SubTransformer {
    /// Emitted column names, in output order.
    pub fn output_names(&self) -> Vec<String> {
        match &self.kind {
            TransformerKind::Passthrough | TransformerKind::MedianImpute { .. } => {
                self.columns.clone()
            }
            TransformerKind::MostFrequentOneHot { categories, .. } => {
                let mut names = Vec::new();
                for (column, cats) in self.columns.iter().zip(categories) {
                    for cat in cats {
                        names.push(format!("{column}_{cat}"));
                    }
                }
                names
            }
        }
    }

    /// Number of columns this sub-transformer emits.
    pub fn output_width(&self) -> usize {
        match &self.kind {
            TransformerKind::Passthrough | TransformerKind::MedianImpute { .. } => {
                self.columns.len()
            }
            TransformerKind::MostFrequentOneHot { categories, .. } => {
                categories.iter().map(Vec::len).sum()
            }
        }
    }

    fn check(&self) -> Result<(), PreprocessError> {
        let state_len = match &self.kind {
            TransformerKind::Passthrough => self.columns.len(),
            TransformerKind::MedianImpute { statistics } => statistics.len(),
            TransformerKind::MostFrequentOneHot { categories, fill_values } => {
                if fill_values.len() != self.columns.len() {
                    0
                } else {
                    categories.len()
                }
            }
        };
        if state_len != self.columns.len() {
            let missing = self
                .columns
                .get(state_len)
                .cloned()
                .unwrap_or_else(|| "<unknown>".to_string());
            return Err(PreprocessError::MissingState {
                name: self.name.clone(),
                column: missing,
            });
        }
        Ok(())
    }

    fn transform_into(&self, fields: &BTreeMap<String, FieldValue>, out: &mut Vec<f64>) {
        match &self.kind {
            TransformerKind::Passthrough => {
                for column in &self.columns {
                    let value = match fields.get(column.as_str()) {
                        Some(FieldValue::Numeric(v)) => *v,
                        _ => f64::NAN,
                    };
                    out.push(value);
                }
            }
            TransformerKind::MedianImpute { statistics } => {
                for (column, median) in self.columns.iter().zip(statistics) {
                    let value = match fields.get(column.as_str()) {
                        Some(FieldValue::Numeric(v)) if v.is_finite() => *v,
                        _ => *median,
                    };
                    out.push(value);
                }
            }
            TransformerKind::MostFrequentOneHot { fill_values, categories } => {
                for ((column, fill), cats) in
                    self.columns.iter().zip(fill_values).zip(categories)
                {
                    let observed = match fields.get(column.as_str()) {
                        Some(FieldValue::Text(s)) => s.as_str(),
                        // numeric cells in a categorical column behave as
                        // missing, like an unfitted dtype would upstream
                        _ => fill.as_str(),
                    };
                    for cat in cats {
                        out.push(if cat == observed { 1.0 } else { 0.0 });
                    }
                }
            }
        }
    }
}

/// The whole fitted transformer: ordered sub-transformers whose outputs
/// concatenate. Columns outside every sub-transformer are dropped
/// (remainder="drop") and contribute nothing to the matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    pub transformers: Vec<SubTransformer>,
}

impl FittedPreprocessor {
    /// Validate fitted state consistency.
    pub fn validate(&self) -> Result<(), PreprocessError> {
        for sub in &self.transformers {
            sub.check()?;
        }
        Ok(())
    }

    /// Total output width of the preprocessed matrix.
    pub fn output_width(&self) -> usize {
        self.transformers.iter().map(SubTransformer::output_width).sum()
    }

    /// All emitted column names in output order.
    pub fn output_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.output_width());
        for sub in &self.transformers {
            names.extend(sub.output_names());
        }
        names
    }

    /// Transform one observation's fields into a dense row.
    pub fn transform(&self, fields: &BTreeMap<String, FieldValue>) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.output_width());
        for sub in &self.transformers {
            sub.transform_into(fields, &mut out);
        }
        out
    }
}
