pub mod features;
pub mod model;
pub mod scorer;

pub use features::{FeatureEngineer, FeatureMatrix, FeatureVector, LabeledTransaction, FEATURE_NAMES};
pub use model::{Classifier, LogisticModel, TrainingStats};
pub use scorer::{AnomalyDetection, AnomalyScorer, ModelInfo, TrainingOutcome};
