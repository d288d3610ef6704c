use serde::Serialize;

use crate::error::{Result, RiskError};
use crate::level::RiskLevel;

use super::features::FeatureMatrix;
use super::model::{check_finite, has_both_classes, Classifier, LogisticModel, TrainingParams, TrainingStats};

/// Per-row classifier verdict.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnomalyDetection {
    pub index: usize,
    pub is_malicious: bool,
    /// P(malicious) in [0, 1].
    pub confidence: f64,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub is_trained: bool,
    pub model_type: Option<String>,
    pub n_features: usize,
    pub feature_names: Vec<String>,
    pub decision_threshold: f64,
    pub training_stats: Option<TrainingStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrainingOutcome {
    Trained(TrainingStats),
    /// Nothing changed; the scorer keeps whatever model it had.
    Skipped { reason: String },
}

/// Wraps an optional pretrained classifier and turns probabilities into detections.
pub struct AnomalyScorer {
    model: Option<Box<dyn Classifier>>,
    threshold: f64,
}

impl AnomalyScorer {
    /// An untrained scorer. `detect` fails until a model is loaded or trained.
    pub fn new(threshold: f64) -> Result<Self> {
        check_threshold(threshold)?;
        Ok(Self {
            model: None,
            threshold,
        })
    }

    pub fn with_model(model: Box<dyn Classifier>, threshold: f64) -> Result<Self> {
        check_threshold(threshold)?;
        Ok(Self {
            model: Some(model),
            threshold,
        })
    }

    /// Load a logistic model artifact from disk.
    pub fn load(path: &str, threshold: f64) -> Result<Self> {
        let model = LogisticModel::load(path)?;
        tracing::info!(
            path,
            features = model.feature_names().len(),
            "Loaded anomaly model"
        );
        Self::with_model(Box::new(model), threshold)
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Fit a logistic model in place. Single-class data is skipped, not an error.
    pub fn train(&mut self, matrix: &FeatureMatrix, labels: &[u8]) -> Result<TrainingOutcome> {
        if !has_both_classes(labels) {
            let reason = "training data contains a single class".to_string();
            tracing::warn!(rows = labels.len(), "Skipping model training: {}", reason);
            return Ok(TrainingOutcome::Skipped { reason });
        }

        let model = LogisticModel::fit(matrix, labels, &TrainingParams::default())?;
        let stats = model
            .training_stats()
            .cloned()
            .ok_or_else(|| RiskError::validation("fitted model is missing training stats"))?;
        tracing::info!(
            samples = stats.n_samples,
            malicious = stats.n_malicious,
            train_accuracy = stats.train_accuracy,
            validation_accuracy = ?stats.validation_accuracy,
            "Trained anomaly model"
        );
        self.model = Some(Box::new(model));
        Ok(TrainingOutcome::Trained(stats))
    }

    pub fn save_model(&self, path: &str) -> Result<()> {
        self.model.as_ref().ok_or(RiskError::ModelNotTrained)?.save(path)
    }

    /// P(malicious) per row.
    pub fn predict_proba(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>> {
        let model = self.model.as_ref().ok_or(RiskError::ModelNotTrained)?;
        if matrix.feature_names.as_slice() != model.feature_names() {
            return Err(RiskError::validation(format!(
                "feature columns {:?} do not match the model's {:?}",
                matrix.feature_names,
                model.feature_names()
            )));
        }
        check_finite(&matrix.rows)?;
        Ok(matrix
            .rows
            .iter()
            .map(|row| model.predict_proba(row).clamp(0.0, 1.0))
            .collect())
    }

    pub fn detect(&self, matrix: &FeatureMatrix) -> Result<Vec<AnomalyDetection>> {
        self.detect_with_threshold(matrix, self.threshold)
    }

    pub fn detect_with_threshold(&self, matrix: &FeatureMatrix, threshold: f64) -> Result<Vec<AnomalyDetection>> {
        check_threshold(threshold)?;
        let probabilities = self.predict_proba(matrix)?;
        Ok(probabilities
            .into_iter()
            .enumerate()
            .map(|(index, p)| AnomalyDetection {
                index,
                is_malicious: p >= threshold,
                confidence: p,
                risk_level: RiskLevel::from_probability(p),
            })
            .collect())
    }

    pub fn model_info(&self) -> ModelInfo {
        match &self.model {
            Some(model) => ModelInfo {
                is_trained: true,
                model_type: Some(model.model_type().to_string()),
                n_features: model.feature_names().len(),
                feature_names: model.feature_names().to_vec(),
                decision_threshold: self.threshold,
                training_stats: model.training_stats().cloned(),
            },
            None => ModelInfo {
                is_trained: false,
                model_type: None,
                n_features: 0,
                feature_names: Vec::new(),
                decision_threshold: self.threshold,
                training_stats: None,
            },
        }
    }

    /// Features sorted by descending importance.
    pub fn feature_importance(&self) -> Result<Vec<FeatureImportance>> {
        let model = self.model.as_ref().ok_or(RiskError::ModelNotTrained)?;
        let mut ranked: Vec<FeatureImportance> = model
            .feature_importance()
            .into_iter()
            .map(|(feature, importance)| FeatureImportance { feature, importance })
            .collect();
        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        Ok(ranked)
    }
}

fn check_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(RiskError::validation(format!(
            "decision threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    Ok(())
}
