//! Trained demand-forecasting model artifact and explainability.
//!
//! The training side is a black box: it produces a fitted preprocessing
//! transformer, a tree-ensemble regressor, an ordered feature-name list,
//! and an optional background sample. This crate loads that artifact and
//! provides:
//!
//! - `Forest` / `Tree`: the ensemble and its prediction path
//! - `FittedPreprocessor`: imputation + one-hot expansion into the dense
//!   matrix the trees were trained on
//! - `FeatureGroupResolver`: the mapping from original feature names back
//!   to the preprocessed column indices they expand to
//! - `TreeExplainer`: Shapley-value attribution (TreeSHAP), interventional
//!   with a path-dependent fallback
//!
//! ## Pipeline
//!
//! ```text
//! Observation ──► FittedPreprocessor ──► dense row ──► Forest ──► prediction
//!                                          │
//!                                          └──► TreeExplainer ──► per-column φ
//!                                                FeatureGroupResolver ──► per-feature φ
//! ```

pub mod artifact;
pub mod explain;
pub mod forest;
pub mod preprocess;
pub mod resolver;

pub use artifact::{ArtifactError, ModelArtifact, TrainingMetrics};
pub use explain::{ExplainError, Perturbation, TreeExplainer};
pub use forest::{Forest, ForestError, Tree};
pub use preprocess::{FittedPreprocessor, PreprocessError, SubTransformer, TransformerKind};
pub use resolver::{ExpansionKind, FeatureGroup, FeatureGroupResolver, ResolverError};
