use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};

use super::features::FeatureMatrix;

/// A pretrained binary classifier producing P(malicious) for one feature row.
pub trait Classifier: Send + Sync {
    fn model_type(&self) -> &str;

    /// Column names the model was fitted on, in order.
    fn feature_names(&self) -> &[String];

    /// Probability in [0, 1]. The row is already aligned with `feature_names`.
    fn predict_proba(&self, row: &[f64]) -> f64;

    /// Relative importance per feature, summing to 1 when any weight is non-zero.
    fn feature_importance(&self) -> Vec<(String, f64)>;

    fn training_stats(&self) -> Option<&TrainingStats>;

    fn to_json(&self) -> Result<String>;

    /// Write the JSON artifact to `path`.
    fn save(&self, path: &str) -> Result<()> {
        std::fs::write(path, self.to_json()?).map_err(|e| {
            RiskError::configuration(format!("Failed to write model file '{}': {}", path, e))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingStats {
    pub n_samples: usize,
    pub n_malicious: usize,
    pub n_benign: usize,
    pub train_accuracy: f64,
    /// Accuracy on the held-out rows; absent when the data was too small to split.
    pub validation_accuracy: Option<f64>,
    pub epochs: usize,
}

#[derive(Debug, Clone)]
pub struct TrainingParams {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
    /// Every n-th row is held out for validation.
    pub holdout_every: usize,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 500,
            l2: 1e-3,
            holdout_every: 5,
        }
    }
}

/// Logistic regression over z-score standardized features.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogisticModel {
    feature_names: Vec<String>,
    means: Vec<f64>,
    scales: Vec<f64>,
    weights: Vec<f64>,
    bias: f64,
    #[serde(default)]
    training_stats: Option<TrainingStats>,
}

impl LogisticModel {
    /// Fit with batch gradient descent. Deterministic for a given input.
    /// Labels are 0 (benign) or 1 (malicious); both classes must be present.
    pub fn fit(matrix: &FeatureMatrix, labels: &[u8], params: &TrainingParams) -> Result<Self> {
        if matrix.len() != labels.len() {
            return Err(RiskError::validation(format!(
                "{} feature rows but {} labels",
                matrix.len(),
                labels.len()
            )));
        }
        if labels.iter().any(|&l| l > 1) {
            return Err(RiskError::validation("labels must be 0 or 1"));
        }
        if !has_both_classes(labels) {
            return Err(RiskError::validation("training data must contain both classes"));
        }
        check_finite(&matrix.rows)?;

        // Hold out every n-th row when the remaining rows still cover both classes
        let holdout = |i: usize| params.holdout_every > 1 && i % params.holdout_every == params.holdout_every - 1;
        let train_labels: Vec<u8> = labels
            .iter()
            .enumerate()
            .filter(|(i, _)| !holdout(*i))
            .map(|(_, &l)| l)
            .collect();
        let split = train_labels.len() < labels.len() && has_both_classes(&train_labels);

        let (train_rows, train_y, valid_rows, valid_y) = if split {
            let mut tr = (Vec::new(), Vec::new());
            let mut va = (Vec::new(), Vec::new());
            for (i, (row, &y)) in matrix.rows.iter().zip(labels).enumerate() {
                let target = if holdout(i) { &mut va } else { &mut tr };
                target.0.push(row.clone());
                target.1.push(y);
            }
            (tr.0, tr.1, va.0, va.1)
        } else {
            (matrix.rows.clone(), labels.to_vec(), Vec::new(), Vec::new())
        };

        let width = matrix.feature_names.len();
        let (means, scales) = standardization(&train_rows, width);
        let x: Vec<Vec<f64>> = train_rows.iter().map(|r| standardize(r, &means, &scales)).collect();
        let n = x.len() as f64;

        let mut weights = vec![0.0; width];
        let mut bias = 0.0;
        for _ in 0..params.epochs {
            let mut grad_w = vec![0.0; width];
            let mut grad_b = 0.0;
            for (row, &y) in x.iter().zip(&train_y) {
                let err = sigmoid(dot(&weights, row) + bias) - y as f64;
                for (g, v) in grad_w.iter_mut().zip(row) {
                    *g += err * v;
                }
                grad_b += err;
            }
            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= params.learning_rate * (g / n + params.l2 * *w);
            }
            bias -= params.learning_rate * grad_b / n;
        }

        let mut model = Self {
            feature_names: matrix.feature_names.clone(),
            means,
            scales,
            weights,
            bias,
            training_stats: None,
        };

        let n_malicious = labels.iter().filter(|&&l| l == 1).count();
        model.training_stats = Some(TrainingStats {
            n_samples: labels.len(),
            n_malicious,
            n_benign: labels.len() - n_malicious,
            train_accuracy: model.accuracy(&train_rows, &train_y),
            validation_accuracy: if valid_rows.is_empty() {
                None
            } else {
                Some(model.accuracy(&valid_rows, &valid_y))
            },
            epochs: params.epochs,
        });
        Ok(model)
    }

    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RiskError::configuration(format!("Failed to read model file '{}': {}", path, e))
        })?;
        let model: Self = serde_json::from_str(&content).map_err(|e| {
            RiskError::configuration(format!("Failed to parse model file '{}': {}", path, e))
        })?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        let width = self.feature_names.len();
        if width == 0
            || self.means.len() != width
            || self.scales.len() != width
            || self.weights.len() != width
        {
            return Err(RiskError::configuration(
                "model artifact has inconsistent feature dimensions",
            ));
        }
        let mut params = self.means.iter().chain(&self.scales).chain(&self.weights);
        if !self.bias.is_finite() || params.any(|v| !v.is_finite()) {
            return Err(RiskError::configuration("model artifact contains non-finite parameters"));
        }
        if self.scales.iter().any(|&s| s <= 0.0) {
            return Err(RiskError::configuration("model artifact has non-positive scales"));
        }
        Ok(())
    }

    fn accuracy(&self, rows: &[Vec<f64>], labels: &[u8]) -> f64 {
        if rows.is_empty() {
            return 0.0;
        }
        let correct = rows
            .iter()
            .zip(labels)
            .filter(|(row, y)| u8::from(self.predict_proba(row) >= 0.5) == **y)
            .count();
        correct as f64 / rows.len() as f64
    }
}

impl Classifier for LogisticModel {
    fn model_type(&self) -> &str {
        "logistic_regression"
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, row: &[f64]) -> f64 {
        let z = dot(&self.weights, &standardize(row, &self.means, &self.scales)) + self.bias;
        sigmoid(z)
    }

    fn feature_importance(&self) -> Vec<(String, f64)> {
        let total: f64 = self.weights.iter().map(|w| w.abs()).sum();
        self.feature_names
            .iter()
            .zip(&self.weights)
            .map(|(name, w)| {
                let share = if total > 0.0 { w.abs() / total } else { 0.0 };
                (name.clone(), share)
            })
            .collect()
    }

    fn training_stats(&self) -> Option<&TrainingStats> {
        self.training_stats.as_ref()
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RiskError::configuration(format!("Failed to serialize model: {}", e)))
    }
}

pub(crate) fn has_both_classes(labels: &[u8]) -> bool {
    labels.contains(&0) && labels.contains(&1)
}

pub(crate) fn check_finite(rows: &[Vec<f64>]) -> Result<()> {
    for (i, row) in rows.iter().enumerate() {
        if row.iter().any(|v| !v.is_finite()) {
            return Err(RiskError::validation(format!("row {} contains a non-finite value", i)));
        }
    }
    Ok(())
}

fn standardization(rows: &[Vec<f64>], width: usize) -> (Vec<f64>, Vec<f64>) {
    let n = rows.len().max(1) as f64;
    let mut means = vec![0.0; width];
    for row in rows {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v / n;
        }
    }
    let mut scales = vec![0.0; width];
    for row in rows {
        for ((s, v), m) in scales.iter_mut().zip(row).zip(&means) {
            *s += (v - m).powi(2) / n;
        }
    }
    // Constant columns keep a unit scale
    let scales = scales
        .into_iter()
        .map(|var| {
            let sd = var.sqrt();
            if sd > 1e-12 {
                sd
            } else {
                1.0
            }
        })
        .collect();
    (means, scales)
}

fn standardize(row: &[f64], means: &[f64], scales: &[f64]) -> Vec<f64> {
    row.iter()
        .zip(means)
        .zip(scales)
        .map(|((v, m), s)| (v - m) / s)
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
