//! Tree-ensemble regressor: flat node arrays per tree plus a base score.
//!
//! The layout mirrors what gradient-boosting exporters emit: parallel
//! per-node arrays where `left[node] < 0` marks a leaf. `cover` holds the
//! training sample weight that reached each node; the path-dependent
//! explainer cannot run without it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Marker for "no child" in the children arrays.
pub const NO_CHILD: i32 = -1;

#[derive(Debug, Error)]
pub enum ForestError {
    #[error("tree {tree}: node arrays have inconsistent lengths")]
    Malformed { tree: usize },

    #[error("row has {got} columns, forest expects {expected}")]
    FeatureCount { got: usize, expected: usize },
}

/// One regression tree as parallel node arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    /// Split feature index per internal node (unused at leaves).
    pub split_feature: Vec<u32>,
    /// Split threshold per internal node; `value <= threshold` goes left.
    pub threshold: Vec<f64>,
    /// Where missing values are routed per internal node.
    pub default_left: Vec<bool>,
    /// Left/right child indices; `NO_CHILD` marks a leaf.
    pub left: Vec<i32>,
    pub right: Vec<i32>,
    /// Output value per leaf node (unused at internal nodes).
    pub value: Vec<f64>,
    /// Training sample weight per node. Required by the path-dependent
    /// explainer; optional for prediction.
    #[serde(default)]
    pub cover: Vec<f64>,
}

impl Tree {
    pub fn node_count(&self) -> usize {
        self.left.len()
    }

    pub fn is_leaf(&self, node: usize) -> bool {
        self.left[node] == NO_CHILD
    }

    pub fn has_covers(&self) -> bool {
        self.cover.len() == self.node_count() && !self.cover.is_empty()
    }

    fn check(&self, index: usize) -> Result<(), ForestError> {
        let n = self.node_count();
        let ok = self.split_feature.len() == n
            && self.threshold.len() == n
            && self.default_left.len() == n
            && self.right.len() == n
            && self.value.len() == n
            && (self.cover.is_empty() || self.cover.len() == n);
        if ok {
            Ok(())
        } else {
            Err(ForestError::Malformed { tree: index })
        }
    }

    /// Route one dense row to a leaf and return its value.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut node = 0usize;
        while !self.is_leaf(node) {
            let feature = self.split_feature[node] as usize;
            let value = row.get(feature).copied().unwrap_or(f64::NAN);
            let go_left = if value.is_nan() {
                self.default_left[node]
            } else {
                value <= self.threshold[node]
            };
            node = if go_left {
                self.left[node] as usize
            } else {
                self.right[node] as usize
            };
        }
        self.value[node]
    }

    /// Cover-weighted mean of the leaf values: the tree's output
    /// expectation under its training distribution.
    pub fn expected_value(&self, weights: &[f64]) -> f64 {
        let root_weight = weights.first().copied().unwrap_or(0.0);
        if root_weight <= 0.0 {
            return 0.0;
        }
        let mut sum = 0.0;
        for node in 0..self.node_count() {
            if self.is_leaf(node) {
                sum += weights[node] * self.value[node];
            }
        }
        sum / root_weight
    }
}

/// A trained additive ensemble: prediction = base_score + Σ tree outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forest {
    pub base_score: f64,
    /// Number of preprocessed input columns the trees were trained on.
    pub n_features: usize,
    pub trees: Vec<Tree>,
}

impl Forest {
    pub fn new(base_score: f64, n_features: usize) -> Self {
        Self {
            base_score,
            n_features,
            trees: Vec::new(),
        }
    }

    pub fn push_tree(&mut self, tree: Tree) {
        self.trees.push(tree);
    }

    /// Validate node-array consistency across all trees.
    pub fn validate(&self) -> Result<(), ForestError> {
        for (i, tree) in self.trees.iter().enumerate() {
            tree.check(i)?;
        }
        Ok(())
    }

    pub fn has_covers(&self) -> bool {
        self.trees.iter().all(Tree::has_covers)
    }

    /// Predict one dense preprocessed row.
    pub fn predict_row(&self, row: &[f64]) -> Result<f64, ForestError> {
        if row.len() != self.n_features {
            return Err(ForestError::FeatureCount {
                got: row.len(),
                expected: self.n_features,
            });
        }
        let mut out = self.base_score;
        for tree in &self.trees {
            out += tree.predict_row(row);
        }
        Ok(out)
    }
}
