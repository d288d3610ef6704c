use thiserror::Error;

/// Errors surfaced by the risk-scoring core.
#[derive(Debug, Error)]
pub enum RiskError {
    /// Malformed input: bad address, negative value, non-finite number.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The anomaly scorer was asked to predict before a model was loaded.
    #[error("Model not trained: load or train a model before calling detect")]
    ModelNotTrained,

    /// Missing or invalid registry data, thresholds or model artifacts.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Rule '{rule_id}' failed: {message}")]
    RuleEvaluation { rule_id: String, message: String },
}

pub type Result<T> = std::result::Result<T, RiskError>;

impl RiskError {
    /// Stable code for callers that map errors onto their own responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ModelNotTrained => "MODEL_NOT_TRAINED",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::RuleEvaluation { .. } => "RULE_EVALUATION_ERROR",
        }
    }

    /// Only configuration problems should stop the process; everything else
    /// degrades to a partial verdict.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
