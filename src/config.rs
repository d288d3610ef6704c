use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub rules: RuleThresholds,
    #[serde(default)]
    pub behavioral: BehavioralConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
}

// ============================================================
// Registry Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    /// Load the exploit catalogue, sanctions list and mixer/exchange sets
    /// compiled into the binary.
    #[serde(default = "default_true")]
    pub use_builtin: bool,
    /// Extra exploit catalogue (JSON array of exploit records).
    pub exploits_path: Option<String>,
    /// Extra sanctions list (CSV: sdn_id, entity_name, program, address).
    pub sanctions_csv_path: Option<String>,
    #[serde(default)]
    pub extra_mixers: Vec<String>,
    #[serde(default)]
    pub extra_exchanges: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            use_builtin: true,
            exploits_path: None,
            sanctions_csv_path: None,
            extra_mixers: Vec::new(),
            extra_exchanges: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

// ============================================================
// Signature Rule Thresholds
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct RuleThresholds {
    #[serde(default = "default_large_value_eth")]
    pub large_value_eth: f64,
    /// Values at or above `large_value_eth * large_value_high_multiplier` escalate to HIGH.
    #[serde(default = "default_large_value_high_multiplier")]
    pub large_value_high_multiplier: f64,
    #[serde(default = "default_gas_used_threshold")]
    pub gas_used_threshold: u64,
    #[serde(default = "default_gas_price_gwei_threshold")]
    pub gas_price_gwei_threshold: f64,
    #[serde(default = "default_gas_price_medium_multiplier")]
    pub gas_price_medium_multiplier: f64,
    #[serde(default = "default_flash_loan_value_eth")]
    pub flash_loan_value_eth: f64,
    #[serde(default = "default_same_block_repeat_threshold")]
    pub same_block_repeat_threshold: u32,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            large_value_eth: default_large_value_eth(),
            large_value_high_multiplier: default_large_value_high_multiplier(),
            gas_used_threshold: default_gas_used_threshold(),
            gas_price_gwei_threshold: default_gas_price_gwei_threshold(),
            gas_price_medium_multiplier: default_gas_price_medium_multiplier(),
            flash_loan_value_eth: default_flash_loan_value_eth(),
            same_block_repeat_threshold: default_same_block_repeat_threshold(),
        }
    }
}

fn default_large_value_eth() -> f64 {
    100.0
}

fn default_large_value_high_multiplier() -> f64 {
    10.0
}

fn default_gas_used_threshold() -> u64 {
    500_000
}

fn default_gas_price_gwei_threshold() -> f64 {
    50.0
}

fn default_gas_price_medium_multiplier() -> f64 {
    2.0
}

fn default_flash_loan_value_eth() -> f64 {
    10.0
}

fn default_same_block_repeat_threshold() -> u32 {
    3
}

// ============================================================
// Behavioral Analysis Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct BehavioralConfig {
    /// Transactions in one hour that count as a burst.
    #[serde(default = "default_burst_tx_threshold")]
    pub burst_tx_threshold: u32,
    /// Average transactions per day considered high velocity.
    #[serde(default = "default_high_velocity_threshold")]
    pub high_velocity_threshold: f64,
    #[serde(default = "default_min_funding_diversity")]
    pub min_funding_diversity: usize,
    #[serde(default = "default_concentration_threshold")]
    pub concentration_threshold: f64,
}

impl Default for BehavioralConfig {
    fn default() -> Self {
        Self {
            burst_tx_threshold: default_burst_tx_threshold(),
            high_velocity_threshold: default_high_velocity_threshold(),
            min_funding_diversity: default_min_funding_diversity(),
            concentration_threshold: default_concentration_threshold(),
        }
    }
}

fn default_burst_tx_threshold() -> u32 {
    10
}

fn default_high_velocity_threshold() -> f64 {
    50.0
}

fn default_min_funding_diversity() -> usize {
    3
}

fn default_concentration_threshold() -> f64 {
    0.8
}

// ============================================================
// Anomaly Model Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Pretrained model artifact (JSON). Takes precedence over training data.
    pub path: Option<String>,
    /// Labeled transaction CSV used to fit a model at startup when no artifact is given.
    pub training_data_path: Option<String>,
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: None,
            training_data_path: None,
            decision_threshold: default_decision_threshold(),
        }
    }
}

fn default_decision_threshold() -> f64 {
    0.5
}

// ============================================================
// Fusion Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct FusionConfig {
    #[serde(default = "default_suspicion_threshold")]
    pub suspicion_threshold: f64,
    /// Weight of the ML probability in `fused_score`. Zero disables the blend.
    #[serde(default)]
    pub ml_weight: f64,
    #[serde(default)]
    pub severity_weights: SeverityWeights,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            suspicion_threshold: default_suspicion_threshold(),
            ml_weight: 0.0,
            severity_weights: SeverityWeights::default(),
        }
    }
}

fn default_suspicion_threshold() -> f64 {
    0.5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeverityWeights {
    #[serde(default = "default_weight_low")]
    pub low: f64,
    #[serde(default = "default_weight_medium")]
    pub medium: f64,
    #[serde(default = "default_weight_high")]
    pub high: f64,
    #[serde(default = "default_weight_critical")]
    pub critical: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            low: default_weight_low(),
            medium: default_weight_medium(),
            high: default_weight_high(),
            critical: default_weight_critical(),
        }
    }
}

fn default_weight_low() -> f64 {
    0.1
}

fn default_weight_medium() -> f64 {
    0.25
}

fn default_weight_high() -> f64 {
    0.5
}

fn default_weight_critical() -> f64 {
    1.0
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        let rules = &self.rules;
        for (name, value) in [
            ("rules.large_value_eth", rules.large_value_eth),
            ("rules.large_value_high_multiplier", rules.large_value_high_multiplier),
            ("rules.gas_price_gwei_threshold", rules.gas_price_gwei_threshold),
            ("rules.gas_price_medium_multiplier", rules.gas_price_medium_multiplier),
            ("rules.flash_loan_value_eth", rules.flash_loan_value_eth),
            ("behavioral.high_velocity_threshold", self.behavioral.high_velocity_threshold),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(eyre::eyre!("{} must be a positive number, got {}", name, value));
            }
        }
        if rules.gas_used_threshold == 0 {
            return Err(eyre::eyre!("rules.gas_used_threshold must be greater than zero"));
        }
        if rules.same_block_repeat_threshold == 0 {
            return Err(eyre::eyre!("rules.same_block_repeat_threshold must be greater than zero"));
        }
        if self.behavioral.burst_tx_threshold == 0 {
            return Err(eyre::eyre!("behavioral.burst_tx_threshold must be greater than zero"));
        }

        let weights = &self.fusion.severity_weights;
        for (name, value) in [
            ("behavioral.concentration_threshold", self.behavioral.concentration_threshold),
            ("model.decision_threshold", self.model.decision_threshold),
            ("fusion.suspicion_threshold", self.fusion.suspicion_threshold),
            ("fusion.ml_weight", self.fusion.ml_weight),
            ("fusion.severity_weights.low", weights.low),
            ("fusion.severity_weights.medium", weights.medium),
            ("fusion.severity_weights.high", weights.high),
            ("fusion.severity_weights.critical", weights.critical),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(eyre::eyre!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if !(weights.low <= weights.medium
            && weights.medium <= weights.high
            && weights.high <= weights.critical)
        {
            return Err(eyre::eyre!(
                "fusion.severity_weights must be non-decreasing from low to critical"
            ));
        }

        for addr in self.registry.extra_mixers.iter().chain(&self.registry.extra_exchanges) {
            if !addr.starts_with("0x") || addr.len() != 42 {
                return Err(eyre::eyre!("Invalid registry address '{}'", addr));
            }
        }
        Ok(())
    }
}
