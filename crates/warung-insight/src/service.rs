//! Model service: the explicit handle to the loaded model artifact.
//!
//! Constructed once at startup and passed by reference to every report
//! request; no hidden global state. Construction resolves the feature
//! groups, validates the column accounting, and builds the Shapley
//! explainer (including background indexing) exactly once; everything is
//! read-only afterwards and safe to share across threads.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use warung_common::FieldValue;
use warung_model::{
    FeatureGroupResolver, ModelArtifact, Perturbation, TreeExplainer,
};

use crate::error::InsightError;

pub struct ModelService {
    artifact: ModelArtifact,
    resolver: FeatureGroupResolver,
    explainer: TreeExplainer,
}

impl ModelService {
    /// Load the artifact directory and build the service.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, InsightError> {
        let artifact = ModelArtifact::load(dir)
            .map_err(|e| InsightError::ModelUnavailable(e.to_string()))?;
        Self::from_artifact(artifact)
    }

    /// Build the service from an already-loaded artifact.
    ///
    /// Fails with a resolver error when the feature-group accounting does
    /// not cover the preprocessed matrix: wrong attributions are worse
    /// than no attributions.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, InsightError> {
        let resolver = FeatureGroupResolver::from_preprocessor(artifact.preprocessor())?;

        let background = artifact.background_matrix();
        let forest = Arc::clone(artifact.forest());
        let explainer = if background.is_empty() {
            TreeExplainer::path_dependent(forest)?
        } else {
            match TreeExplainer::interventional(Arc::clone(&forest), &background) {
                Ok(explainer) => explainer,
                Err(err) => {
                    warn!(
                        error = %err,
                        "interventional explainer failed; retrying path-dependent"
                    );
                    TreeExplainer::path_dependent(forest)?
                }
            }
        };

        info!(
            mode = %explainer.mode(),
            features = resolver.groups().len(),
            columns = resolver.width(),
            "model service ready"
        );

        Ok(Self {
            artifact,
            resolver,
            explainer,
        })
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn resolver(&self) -> &FeatureGroupResolver {
        &self.resolver
    }

    pub fn explainer(&self) -> &TreeExplainer {
        &self.explainer
    }

    /// Which perturbation mode the explainer ended up in.
    pub fn explainer_mode(&self) -> Perturbation {
        self.explainer.mode()
    }

    /// Full-pipeline prediction for one observation's fields.
    pub fn predict(&self, fields: &BTreeMap<String, FieldValue>) -> Result<f64, InsightError> {
        Ok(self.artifact.predict(fields)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warung_model::{
        FittedPreprocessor, Forest, SubTransformer, TransformerKind, Tree,
    };

    fn artifact(background: Vec<BTreeMap<String, FieldValue>>) -> ModelArtifact {
        let mut forest = Forest::new(0.0, 1);
        forest.push_tree(Tree {
            split_feature: vec![0, 0, 0],
            threshold: vec![0.5, 0.0, 0.0],
            default_left: vec![true, false, false],
            left: vec![1, -1, -1],
            right: vec![2, -1, -1],
            value: vec![0.0, -1.0, 1.0],
            cover: vec![10.0, 5.0, 5.0],
        });
        let preprocessor = FittedPreprocessor {
            transformers: vec![SubTransformer {
                name: "num".to_string(),
                columns: vec!["rain_mm".to_string()],
                kind: TransformerKind::MedianImpute { statistics: vec![0.0] },
            }],
        };
        ModelArtifact::from_parts(
            forest,
            preprocessor,
            vec!["rain_mm".to_string()],
            background,
        )
        .unwrap()
    }

    fn bg_row(value: f64) -> BTreeMap<String, FieldValue> {
        let mut fields = BTreeMap::new();
        fields.insert("rain_mm".to_string(), FieldValue::Numeric(value));
        fields
    }

    #[test]
    fn test_no_background_means_path_dependent() {
        let service = ModelService::from_artifact(artifact(Vec::new())).unwrap();
        assert_eq!(service.explainer_mode(), Perturbation::PathDependent);
    }

    #[test]
    fn test_background_enables_interventional() {
        let service =
            ModelService::from_artifact(artifact(vec![bg_row(0.1), bg_row(0.9)])).unwrap();
        assert_eq!(service.explainer_mode(), Perturbation::Interventional);
    }

    #[test]
    fn test_degenerate_background_falls_back() {
        // both rows route left; the right leaf gets zero weight
        let service =
            ModelService::from_artifact(artifact(vec![bg_row(0.1), bg_row(0.2)])).unwrap();
        assert_eq!(service.explainer_mode(), Perturbation::PathDependent);
    }

    #[test]
    fn test_missing_artifact_is_model_unavailable() {
        assert!(matches!(
            ModelService::load("/nonexistent/artifacts"),
            Err(InsightError::ModelUnavailable(_))
        ));
    }
}
