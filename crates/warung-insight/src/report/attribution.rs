//! Per-day attribution: fold per-column Shapley values back into
//! per-original-feature signed contributions.
//!
//! The fold must conserve mass: the contributions sum to the model output
//! minus the explainer's expected value. A violation means the resolver
//! mapping and the explainer disagree about the matrix layout, and the
//! day's attribution is rejected rather than reported wrong.

use warung_common::Observation;

use crate::error::InsightError;
use crate::service::ModelService;

/// Relative tolerance for the local-accuracy check.
const LOCAL_ACCURACY_RTOL: f64 = 1e-6;

/// One original feature's signed contribution for a day.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureContribution {
    pub feature: String,
    pub contribution: f64,
}

/// Attribution of one flagged day's prediction.
#[derive(Debug, Clone)]
pub struct DayAttribution {
    /// Raw pipeline prediction for the day's row.
    pub prediction: f64,
    /// Explainer baseline the contributions are relative to.
    pub expected_value: f64,
    /// Signed per-feature contributions, in feature-group order.
    pub contributions: Vec<FeatureContribution>,
}

/// Explain one observation row through the loaded pipeline.
pub fn attribute_day(
    service: &ModelService,
    observation: &Observation,
) -> Result<DayAttribution, InsightError> {
    let row = service.artifact().transform(observation.fields());
    let prediction = service.artifact().forest().predict_row(&row)?;
    let phi = service.explainer().shap_values(&row)?;

    let contributions: Vec<FeatureContribution> = service
        .resolver()
        .fold(&phi)
        .into_iter()
        .map(|(feature, contribution)| FeatureContribution {
            feature,
            contribution,
        })
        .collect();

    let sum: f64 = contributions.iter().map(|c| c.contribution).sum();
    let delta = prediction - service.explainer().expected_value();
    let tolerance = LOCAL_ACCURACY_RTOL * delta.abs().max(1.0);
    if (sum - delta).abs() > tolerance {
        return Err(InsightError::AttributionMismatch { sum, delta });
    }

    Ok(DayAttribution {
        prediction,
        expected_value: service.explainer().expected_value(),
        contributions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::NaiveDate;
    use warung_model::{
        FittedPreprocessor, Forest, ModelArtifact, SubTransformer, TransformerKind, Tree,
    };

    fn service() -> ModelService {
        let mut forest = Forest::new(10.0, 2);
        forest.push_tree(Tree {
            split_feature: vec![0, 0, 0],
            threshold: vec![200_000.0, 0.0, 0.0],
            default_left: vec![true, false, false],
            left: vec![1, -1, -1],
            right: vec![2, -1, -1],
            value: vec![0.0, -3.0, 1.0],
            cover: vec![90.0, 30.0, 60.0],
        });
        forest.push_tree(Tree {
            split_feature: vec![1, 0, 0],
            threshold: vec![25.0, 0.0, 0.0],
            default_left: vec![true, false, false],
            left: vec![1, -1, -1],
            right: vec![2, -1, -1],
            value: vec![0.0, 0.5, -2.0],
            cover: vec![90.0, 70.0, 20.0],
        });
        let preprocessor = FittedPreprocessor {
            transformers: vec![SubTransformer {
                name: "num".to_string(),
                columns: vec!["ads_spend".to_string(), "preparation_time".to_string()],
                kind: TransformerKind::MedianImpute {
                    statistics: vec![300_000.0, 18.0],
                },
            }],
        };
        let artifact = ModelArtifact::from_parts(
            forest,
            preprocessor,
            vec!["ads_spend".to_string(), "preparation_time".to_string()],
            Vec::new(),
        )
        .unwrap();
        ModelService::from_artifact(artifact).unwrap()
    }

    fn observation(ads: f64, prep: f64) -> Observation {
        let mut obs = Observation::new(20, NaiveDate::from_ymd_opt(2025, 4, 15).unwrap());
        obs.set_numeric("ads_spend", ads);
        obs.set_numeric("preparation_time", prep);
        obs
    }

    #[test]
    fn test_local_accuracy_holds_through_the_fold() {
        let service = service();
        let attribution = attribute_day(&service, &observation(100_000.0, 40.0)).unwrap();
        let sum: f64 = attribution
            .contributions
            .iter()
            .map(|c| c.contribution)
            .sum();
        let delta = attribution.prediction - attribution.expected_value;
        assert!((sum - delta).abs() <= 1e-6 * delta.abs().max(1.0));
    }

    #[test]
    fn test_starved_levers_attribute_negative() {
        let service = service();
        let attribution = attribute_day(&service, &observation(100_000.0, 40.0)).unwrap();
        let by_name: BTreeMap<&str, f64> = attribution
            .contributions
            .iter()
            .map(|c| (c.feature.as_str(), c.contribution))
            .collect();
        assert!(by_name["ads_spend"] < 0.0);
        assert!(by_name["preparation_time"] < 0.0);
    }

    #[test]
    fn test_imputed_row_still_attributes() {
        let service = service();
        let obs = Observation::new(20, NaiveDate::from_ymd_opt(2025, 4, 15).unwrap());
        let attribution = attribute_day(&service, &obs).unwrap();
        assert_eq!(attribution.contributions.len(), 2);
    }
}
