//! Feature-group resolver: maps original feature names back onto the
//! preprocessed-matrix columns they expand to.
//!
//! Built once per loaded model by introspecting the fitted preprocessor.
//! The invariant is a full partition: every original feature used by the
//! model appears in exactly one group, and the union of all group indices
//! covers the output column range with no gaps and no overlaps. Anything
//! else means attributions would be silently wrong, so resolution fails
//! loudly instead.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::preprocess::{FittedPreprocessor, TransformerKind};

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error(
        "column accounting mismatch: mapped {mapped} of {width} preprocessed columns"
    )]
    ColumnAccounting { mapped: usize, width: usize },

    #[error("emitted column '{column}' (index {index}) matches no input feature")]
    UnmappedColumn { column: String, index: usize },

    #[error("feature '{0}' appears in more than one sub-transformer")]
    DuplicateFeature(String),
}

/// How an original feature expands in the preprocessed matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionKind {
    /// Passed through untouched: exactly one column.
    Identity,
    /// Imputed numeric: exactly one column.
    ImputedNumeric,
    /// One-hot categorical: one column per learned category (possibly
    /// zero for a degenerate fit).
    OneHot,
}

/// One original feature and the preprocessed columns it produced.
#[derive(Debug, Clone)]
pub struct FeatureGroup {
    pub name: String,
    pub kind: ExpansionKind,
    /// Ordered indices into the preprocessed matrix. Empty for a
    /// categorical column whose fit learned zero categories.
    pub indices: Vec<usize>,
}

/// Resolved mapping for a loaded model.
#[derive(Debug, Clone)]
pub struct FeatureGroupResolver {
    column_names: Vec<String>,
    groups: Vec<FeatureGroup>,
}

impl FeatureGroupResolver {
    /// Introspect a fitted preprocessor and build the full mapping.
    ///
    /// Sub-transformers are walked in definition order with a running
    /// column offset. Within each sub-transformer, an emitted column is
    /// attributed to the input whose name it equals, or failing that the
    /// longest input name it extends as `"<input>_..."`, so an input
    /// that is a prefix of a sibling cannot steal the sibling's columns.
    pub fn from_preprocessor(pre: &FittedPreprocessor) -> Result<Self, ResolverError> {
        let width = pre.output_width();
        let mut column_names = Vec::with_capacity(width);
        let mut groups: Vec<FeatureGroup> = Vec::new();
        let mut group_index: BTreeMap<String, usize> = BTreeMap::new();
        let mut offset = 0usize;

        for sub in &pre.transformers {
            let kind = match &sub.kind {
                TransformerKind::Passthrough => ExpansionKind::Identity,
                TransformerKind::MedianImpute { .. } => ExpansionKind::ImputedNumeric,
                TransformerKind::MostFrequentOneHot { .. } => ExpansionKind::OneHot,
            };

            // Every input column owns a group, even if it ends up empty.
            for column in &sub.columns {
                if group_index.contains_key(column) {
                    return Err(ResolverError::DuplicateFeature(column.clone()));
                }
                group_index.insert(column.clone(), groups.len());
                groups.push(FeatureGroup {
                    name: column.clone(),
                    kind,
                    indices: Vec::new(),
                });
            }

            let emitted = sub.output_names();
            for (j, emitted_name) in emitted.iter().enumerate() {
                let index = offset + j;
                let owner = Self::match_owner(emitted_name, &sub.columns).ok_or_else(|| {
                    ResolverError::UnmappedColumn {
                        column: emitted_name.clone(),
                        index,
                    }
                })?;
                let slot = group_index[owner];
                groups[slot].indices.push(index);
                column_names.push(emitted_name.clone());
            }
            offset += emitted.len();
        }

        let mapped: usize = groups.iter().map(|g| g.indices.len()).sum();
        if mapped != width || column_names.len() != width {
            return Err(ResolverError::ColumnAccounting { mapped, width });
        }

        Ok(Self { column_names, groups })
    }

    /// Attribute one emitted name to an input column: exact match first,
    /// then the longest `"<input>_"` prefix.
    fn match_owner<'a>(emitted: &str, inputs: &'a [String]) -> Option<&'a String> {
        if let Some(exact) = inputs.iter().find(|c| c.as_str() == emitted) {
            return Some(exact);
        }
        inputs
            .iter()
            .filter(|c| {
                emitted.len() > c.len()
                    && emitted.starts_with(c.as_str())
                    && emitted.as_bytes()[c.len()] == b'_'
            })
            .max_by_key(|c| c.len())
    }

    /// Ordered names of every preprocessed column.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Total preprocessed width covered by the mapping.
    pub fn width(&self) -> usize {
        self.column_names.len()
    }

    /// All groups, in definition order.
    pub fn groups(&self) -> &[FeatureGroup] {
        &self.groups
    }

    pub fn group(&self, feature: &str) -> Option<&FeatureGroup> {
        self.groups.iter().find(|g| g.name == feature)
    }

    /// Fold per-column values into per-original-feature signed sums,
    /// in group definition order.
    pub fn fold(&self, per_column: &[f64]) -> Vec<(String, f64)> {
        self.groups
            .iter()
            .map(|g| {
                let sum = g.indices.iter().map(|&i| per_column[i]).sum();
                (g.name.clone(), sum)
            })
            .collect()
    }
}
