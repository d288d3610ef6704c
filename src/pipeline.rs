use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::behavior::BehavioralAnalyzer;
use crate::config::{Config, ModelConfig};
use crate::fusion::{AddressRiskReport, BatchAnalysis, RiskFusionEngine, RiskVerdict};
use crate::ingest;
use crate::ml::{AnomalyScorer, FeatureEngineer, TrainingOutcome};
use crate::registry::BlacklistRegistry;
use crate::rules::SignatureRuleEngine;
use crate::tx::{Address, TransactionRecord};

/// Everything the scoring core needs, built once at start-up:
/// 1. Blacklist registry (built-in catalogue plus configured files)
/// 2. Signature rules
/// 3. Behavioral analyzer
/// 4. Anomaly model (loaded, trained, or absent)
pub struct RiskPipeline {
    pub registry: Arc<BlacklistRegistry>,
    pub engine: RiskFusionEngine,
}

impl RiskPipeline {
    /// Validates the config first; `Config::load` does too, but hand-built configs skip it.
    pub fn init(config: &Config) -> eyre::Result<Self> {
        config.validate()?;
        let registry = Arc::new(BlacklistRegistry::load(&config.registry)?);

        let rules = SignatureRuleEngine::new(&config.rules, registry.clone())?;
        let features = FeatureEngineer::new(&config.rules);
        let behavioral = BehavioralAnalyzer::new(config.behavioral.clone(), registry.clone());
        let scorer = build_scorer(&config.model, &features)?;

        tracing::info!(
            rules = rules.rule_count(),
            model = scorer.as_ref().is_some_and(|s| s.is_trained()),
            "Risk pipeline initialized"
        );

        Ok(Self {
            engine: RiskFusionEngine::new(
                rules,
                features,
                scorer,
                behavioral,
                config.fusion.clone(),
            ),
            registry,
        })
    }

    pub fn analyze_transaction(&self, tx: &TransactionRecord, history: &[TransactionRecord]) -> RiskVerdict {
        self.engine.analyze(tx, history)
    }

    pub fn analyze_batch(&self, txs: &[TransactionRecord], history: &[TransactionRecord]) -> BatchAnalysis {
        self.engine.analyze_batch(txs, history)
    }

    pub fn assess_address(
        &self,
        address: &Address,
        history: Option<&[TransactionRecord]>,
        reference_time: Option<DateTime<Utc>>,
    ) -> AddressRiskReport {
        self.engine.assess_address(address, history, reference_time)
    }
}

/// A configured artifact wins over training data. A broken artifact is fatal;
/// single-class training data only disables the model.
fn build_scorer(config: &ModelConfig, features: &FeatureEngineer) -> eyre::Result<Option<AnomalyScorer>> {
    if let Some(path) = &config.path {
        let scorer = AnomalyScorer::load(path, config.decision_threshold)
            .map_err(|e| eyre::eyre!("Failed to load anomaly model '{}': {}", path, e))?;
        return Ok(Some(scorer));
    }

    let Some(path) = &config.training_data_path else {
        tracing::info!("No anomaly model configured, verdicts are rule-only");
        return Ok(None);
    };

    let labeled = ingest::read_labeled_csv(path)?;
    let (matrix, labels) = features.prepare_training_data(&labeled.records);
    let mut scorer = AnomalyScorer::new(config.decision_threshold)?;
    match scorer.train(&matrix, &labels)? {
        TrainingOutcome::Trained(_) => Ok(Some(scorer)),
        TrainingOutcome::Skipped { reason } => {
            tracing::warn!(path = %path, reason = %reason, "Anomaly model not trained, continuing without");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::RawTransaction;

    const ALICE: &str = "0x1111111111111111111111111111111111111111";
    const BOB: &str = "0x2222222222222222222222222222222222222222";

    fn training_csv(rows: &[(f64, u64, f64, u8)]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut body = String::from("from_address,to_address,value_eth,gas_used,gas_price_gwei,is_malicious\n");
        for (value, gas, price, label) in rows {
            body.push_str(&format!("{},{},{},{},{},{}\n", ALICE, BOB, value, gas, price, label));
        }
        std::io::Write::write_all(&mut file, body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config_is_rule_only() {
        let pipeline = RiskPipeline::init(&Config::default()).unwrap();
        assert!(pipeline.engine.scorer().is_none());
        assert_eq!(pipeline.engine.rules().rule_count(), 6);
        assert!(pipeline.registry.attacker_count() > 0);

        let tx = TransactionRecord::try_from(RawTransaction::new(ALICE, BOB, 1.0)).unwrap();
        let verdict = pipeline.analyze_transaction(&tx, &[]);
        assert_eq!(verdict.all_rules_checked, 6);
    }

    #[test]
    fn test_trains_from_labeled_csv() {
        let rows: Vec<(f64, u64, f64, u8)> = (0..12)
            .flat_map(|i| {
                let i = i as f64;
                [
                    (1.0 + i, 21_000, 20.0 + i, 0),
                    (900.0 + i * 100.0, 1_800_000, 140.0 + i, 1),
                ]
            })
            .collect();
        let file = training_csv(&rows);
        let mut config = Config::default();
        config.model.training_data_path = Some(file.path().to_str().unwrap().to_string());

        let pipeline = RiskPipeline::init(&config).unwrap();
        assert!(pipeline.engine.scorer().is_some_and(|s| s.is_trained()));
    }

    #[test]
    fn test_single_class_training_disables_model() {
        let file = training_csv(&[(1.0, 21_000, 20.0, 0), (2.0, 21_000, 22.0, 0)]);
        let mut config = Config::default();
        config.model.training_data_path = Some(file.path().to_str().unwrap().to_string());

        let pipeline = RiskPipeline::init(&config).unwrap();
        assert!(pipeline.engine.scorer().is_none());
    }

    #[test]
    fn test_invalid_thresholds_are_fatal() {
        let mut config = Config::default();
        config.behavioral.burst_tx_threshold = 0;
        let err = RiskPipeline::init(&config).err().unwrap();
        assert!(err.to_string().contains("burst_tx_threshold"));

        let mut config = Config::default();
        config.fusion.suspicion_threshold = f64::NAN;
        assert!(RiskPipeline::init(&config).is_err());
    }

    #[test]
    fn test_missing_model_artifact_is_fatal() {
        let mut config = Config::default();
        config.model.path = Some("/nonexistent/model.json".to_string());
        assert!(RiskPipeline::init(&config).is_err());
    }
}
