//! Loaded model artifact: everything the training side hands over.
//!
//! Artifact directory layout:
//!
//! - `forest.json`: the tree ensemble
//! - `preprocessor.json`: the fitted preprocessing transformer
//! - `features.json`: ordered original feature names the pipeline consumes
//! - `background.csv`: optional background sample (same feature columns)
//! - `metrics.json`: optional training metrics, logged at load

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use warung_common::{parse_clock_minutes, FieldValue};

use crate::forest::{Forest, ForestError};
use crate::preprocess::{FittedPreprocessor, PreprocessError};

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {file}: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse background.csv: {0}")]
    Background(#[from] csv::Error),

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Forest(#[from] ForestError),

    #[error(
        "preprocessor emits {preprocessor} columns but forest was trained on {forest}"
    )]
    WidthMismatch { preprocessor: usize, forest: usize },

    #[error("feature '{0}' is consumed by the preprocessor but missing from features.json")]
    UnknownFeature(String),
}

/// Optional training metrics carried alongside the model.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingMetrics {
    pub champion: Option<String>,
    pub mae: Option<f64>,
    pub r2: Option<f64>,
}

/// The trained pipeline plus its declared inputs and background sample.
/// Read-only after loading.
#[derive(Debug)]
pub struct ModelArtifact {
    forest: Arc<Forest>,
    preprocessor: FittedPreprocessor,
    features: Vec<String>,
    background: Vec<BTreeMap<String, FieldValue>>,
}

impl ModelArtifact {
    /// Load and validate an artifact directory.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let dir = dir.as_ref();
        let forest: Forest = read_json(&dir.join("forest.json"))?;
        let preprocessor: FittedPreprocessor = read_json(&dir.join("preprocessor.json"))?;
        let features: Vec<String> = read_json(&dir.join("features.json"))?;

        forest.validate()?;
        preprocessor.validate()?;

        let width = preprocessor.output_width();
        if width != forest.n_features {
            return Err(ArtifactError::WidthMismatch {
                preprocessor: width,
                forest: forest.n_features,
            });
        }
        for sub in &preprocessor.transformers {
            for column in &sub.columns {
                if !features.contains(column) {
                    return Err(ArtifactError::UnknownFeature(column.clone()));
                }
            }
        }

        let background_path = dir.join("background.csv");
        let background = if background_path.exists() {
            load_background(&background_path)?
        } else {
            Vec::new()
        };

        if let Ok(metrics) = read_json::<TrainingMetrics>(&dir.join("metrics.json")) {
            info!(
                champion = metrics.champion.as_deref().unwrap_or("unknown"),
                mae = metrics.mae,
                r2 = metrics.r2,
                "loaded model artifact"
            );
        } else {
            info!(trees = forest.trees.len(), width, "loaded model artifact");
        }
        if background.is_empty() {
            warn!("artifact has no background sample; attribution will be path-dependent");
        }

        Ok(Self {
            forest: Arc::new(forest),
            preprocessor,
            features,
            background,
        })
    }

    /// Assemble an artifact from parts (the test/training boundary).
    pub fn from_parts(
        forest: Forest,
        preprocessor: FittedPreprocessor,
        features: Vec<String>,
        background: Vec<BTreeMap<String, FieldValue>>,
    ) -> Result<Self, ArtifactError> {
        forest.validate()?;
        preprocessor.validate()?;
        let width = preprocessor.output_width();
        if width != forest.n_features {
            return Err(ArtifactError::WidthMismatch {
                preprocessor: width,
                forest: forest.n_features,
            });
        }
        Ok(Self {
            forest: Arc::new(forest),
            preprocessor,
            features,
            background,
        })
    }

    pub fn forest(&self) -> &Arc<Forest> {
        &self.forest
    }

    pub fn preprocessor(&self) -> &FittedPreprocessor {
        &self.preprocessor
    }

    /// Ordered original feature names the pipeline consumes.
    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn background(&self) -> &[BTreeMap<String, FieldValue>] {
        &self.background
    }

    /// Preprocess one observation's fields into a dense row.
    pub fn transform(&self, fields: &BTreeMap<String, FieldValue>) -> Vec<f64> {
        self.preprocessor.transform(fields)
    }

    /// Full-pipeline prediction for one observation's fields.
    pub fn predict(&self, fields: &BTreeMap<String, FieldValue>) -> Result<f64, ForestError> {
        let row = self.transform(fields);
        self.forest.predict_row(&row)
    }

    /// Background sample pushed through the preprocessor.
    pub fn background_matrix(&self) -> Vec<Vec<f64>> {
        self.background
            .iter()
            .map(|fields| self.transform(fields))
            .collect()
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let file = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        file: file.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ArtifactError::Json { file, source })
}

fn load_background(path: &Path) -> Result<Vec<BTreeMap<String, FieldValue>>, ArtifactError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut fields = BTreeMap::new();
        for (idx, header) in headers.iter().enumerate() {
            let raw = record.get(idx).unwrap_or("").trim();
            if raw.is_empty() {
                continue;
            }
            let value = if let Ok(v) = raw.parse::<f64>() {
                FieldValue::Numeric(v)
            } else if raw.contains(':') {
                match parse_clock_minutes(raw) {
                    Some(minutes) => FieldValue::Numeric(minutes),
                    None => FieldValue::Text(raw.to_string()),
                }
            } else {
                FieldValue::Text(raw.to_string())
            };
            fields.insert(header.clone(), value);
        }
        rows.push(fields);
    }
    Ok(rows)
}
