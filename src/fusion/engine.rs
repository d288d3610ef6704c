use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::behavior::BehavioralAnalyzer;
use crate::config::FusionConfig;
use crate::error::{Result, RiskError};
use crate::graph::{cluster, CounterpartyGraph};
use crate::level::RiskLevel;
use crate::ml::{AnomalyDetection, AnomalyScorer, FeatureEngineer};
use crate::rules::types::clamp_unit;
use crate::rules::{RuleResult, Severity, SignatureRuleEngine};
use crate::tx::{Address, TransactionRecord};

use super::verdict::{
    AddressCheck, AddressRiskReport, AnalysisSummary, BatchAnalysis, MlOnlyResult, RiskVerdict,
    RuleReport,
};

/// Combines the rule battery, the optional anomaly model and the behavioral
/// analyzer into verdicts. Rules decide the risk level; the model only advises.
pub struct RiskFusionEngine {
    rules: SignatureRuleEngine,
    features: FeatureEngineer,
    scorer: Option<AnomalyScorer>,
    behavioral: BehavioralAnalyzer,
    config: FusionConfig,
}

impl RiskFusionEngine {
    pub fn new(
        rules: SignatureRuleEngine,
        features: FeatureEngineer,
        scorer: Option<AnomalyScorer>,
        behavioral: BehavioralAnalyzer,
        config: FusionConfig,
    ) -> Self {
        Self {
            rules,
            features,
            scorer,
            behavioral,
            config,
        }
    }

    pub fn rules(&self) -> &SignatureRuleEngine {
        &self.rules
    }

    pub fn scorer(&self) -> Option<&AnomalyScorer> {
        self.scorer.as_ref()
    }

    pub fn behavioral(&self) -> &BehavioralAnalyzer {
        &self.behavioral
    }

    fn weight(&self, severity: Severity) -> f64 {
        let w = &self.config.severity_weights;
        match severity {
            Severity::Low => w.low,
            Severity::Medium => w.medium,
            Severity::High => w.high,
            Severity::Critical => w.critical,
        }
    }

    /// Noisy-OR over triggered rules: each contributes severity weight × confidence.
    /// Adding a rule or raising a confidence never lowers the score.
    pub fn fuse_score(&self, results: &[RuleResult]) -> f64 {
        let clean = results
            .iter()
            .filter(|r| r.is_triggered)
            .fold(1.0, |acc, r| acc * (1.0 - clamp_unit(self.weight(r.severity) * r.confidence)));
        clamp_unit(1.0 - clean)
    }

    /// Score band, floored by the most severe triggered rule.
    pub fn risk_level(&self, score: f64, results: &[RuleResult]) -> RiskLevel {
        let floor = results
            .iter()
            .filter(|r| r.is_triggered)
            .map(|r| RiskLevel::from(r.severity))
            .max()
            .unwrap_or(RiskLevel::Safe);
        RiskLevel::from_score(score).max(floor)
    }

    /// Full assessment: all rules, then the model if one is configured.
    pub fn analyze(&self, tx: &TransactionRecord, history: &[TransactionRecord]) -> RiskVerdict {
        let results = self.rules.detect_all(tx, history);
        let all_rules_checked = results.len();
        let risk_score = self.fuse_score(&results);
        let risk_level = self.risk_level(risk_score, &results);

        let triggered_rules: Vec<RuleResult> = results.into_iter().filter(|r| r.is_triggered).collect();
        let is_suspicious = risk_score >= self.config.suspicion_threshold
            || triggered_rules.iter().any(|r| r.severity >= Severity::High);

        let (ml_prediction, error) = match &self.scorer {
            None => (None, None),
            Some(scorer) => match self.predict(scorer, tx) {
                Ok(prediction) => (Some(prediction), None),
                Err(e) => {
                    tracing::warn!(
                        tx_hash = tx.tx_hash().unwrap_or("-"),
                        error = %e,
                        "Anomaly model failed, verdict is rule-only"
                    );
                    (None, Some(e.to_string()))
                }
            },
        };

        let fused_score = match &ml_prediction {
            Some(p) if self.config.ml_weight > 0.0 => {
                Some(clamp_unit(1.0 - (1.0 - risk_score) * (1.0 - self.config.ml_weight * p.confidence)))
            }
            _ => None,
        };

        tracing::debug!(
            tx_hash = tx.tx_hash().unwrap_or("-"),
            risk_score,
            risk_level = risk_level.as_str(),
            triggered = triggered_rules.len(),
            "Transaction analyzed"
        );

        RiskVerdict {
            tx_hash: tx.tx_hash().map(str::to_string),
            risk_score,
            risk_level,
            is_suspicious,
            triggered_rules,
            all_rules_checked,
            ml_prediction,
            fused_score,
            error,
            analysis_timestamp: Utc::now(),
        }
    }

    /// Analyze each transaction on its own against the same history.
    pub fn analyze_batch(&self, txs: &[TransactionRecord], history: &[TransactionRecord]) -> BatchAnalysis {
        let started = Instant::now();
        let results: Vec<RiskVerdict> = txs.iter().map(|tx| self.analyze(tx, history)).collect();
        let summary = AnalysisSummary::from_verdicts(&results);
        let processing_time_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            total = summary.total_analyzed,
            suspicious = summary.suspicious_count,
            critical = summary.critical_count,
            processing_time_ms,
            "Batch analysis complete"
        );

        BatchAnalysis {
            summary,
            results,
            processing_time_ms,
        }
    }

    pub fn detect_rules_only(&self, tx: &TransactionRecord, history: &[TransactionRecord]) -> RuleReport {
        let results = self.rules.detect_all(tx, history);
        RuleReport {
            tx_hash: tx.tx_hash().map(str::to_string),
            rules_checked: results.len(),
            rules_triggered: results.iter().filter(|r| r.is_triggered).count(),
            results,
        }
    }

    /// Model verdict alone. Fails when no model is configured or trained.
    pub fn detect_anomaly(&self, tx: &TransactionRecord) -> Result<MlOnlyResult> {
        let scorer = self.scorer.as_ref().ok_or(RiskError::ModelNotTrained)?;
        let prediction = self.predict(scorer, tx)?;
        let vector = self.features.transform(tx);
        let features = self
            .features
            .feature_names()
            .iter()
            .zip(vector.as_slice())
            .map(|(name, value)| (name.to_string(), *value))
            .collect();

        Ok(MlOnlyResult {
            tx_hash: tx.tx_hash().map(str::to_string),
            prediction,
            features,
        })
    }

    fn predict(&self, scorer: &AnomalyScorer, tx: &TransactionRecord) -> Result<AnomalyDetection> {
        let matrix = self.features.transform_batch(std::slice::from_ref(tx));
        scorer
            .detect(&matrix)?
            .into_iter()
            .next()
            .ok_or_else(|| RiskError::validation("model returned no prediction"))
    }

    pub fn check_address(&self, address: &Address) -> AddressCheck {
        let check = self.rules.registry().check_address(address);
        let (risk_level, message) = match &check.exploit_info {
            Some(exploit) => (
                RiskLevel::Critical,
                format!("Address is a KNOWN ATTACKER from {}", exploit.name),
            ),
            None => (
                RiskLevel::Safe,
                "Address not found in known attacker database".to_string(),
            ),
        };
        AddressCheck {
            address: *address,
            checksum_address: address.checksummed(),
            is_known_attacker: check.is_known_attacker,
            risk_level,
            exploit_info: check.exploit_info,
            message,
        }
    }

    /// Registry lookups plus, when history is supplied, behavioral analysis,
    /// activity features and the counterparty cluster.
    pub fn assess_address(
        &self,
        address: &Address,
        history: Option<&[TransactionRecord]>,
        reference_time: Option<DateTime<Utc>>,
    ) -> AddressRiskReport {
        let registry = self.rules.registry().get_comprehensive_address_risk(address);
        let mut risk_level = RiskLevel::from(registry.overall_severity);

        let (behavioral, activity, related_addresses) = match history {
            Some(history) => {
                let report = self.behavioral.analyze(address, history, reference_time);
                risk_level = risk_level.max(report.risk_level);
                let activity = self.features.extract_address_features(history, address);
                let graph = CounterpartyGraph::from_history(history);
                (Some(report), Some(activity), cluster::cluster_of(&graph, address))
            }
            None => (None, None, Vec::new()),
        };

        AddressRiskReport {
            address: *address,
            checksum_address: address.checksummed(),
            risk_level,
            is_high_risk: risk_level >= RiskLevel::High,
            registry,
            behavioral,
            activity,
            related_addresses,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{BehavioralConfig, RuleThresholds};
    use crate::ml::features::LabeledTransaction;
    use crate::registry::BlacklistRegistry;
    use crate::tx::RawTransaction;

    const EULER_ATTACKER: &str = "0xb66cd966670d962C227B3EABA30a872DbFb995db";
    const TORNADO_ROUTER: &str = "0x722122df12d4e14e13ac3b6895a86e84145b6967";
    const ALICE: &str = "0x1111111111111111111111111111111111111111";
    const BOB: &str = "0x2222222222222222222222222222222222222222";

    fn build(scorer: Option<AnomalyScorer>, config: FusionConfig) -> RiskFusionEngine {
        let registry = Arc::new(BlacklistRegistry::builtin().unwrap());
        let thresholds = RuleThresholds::default();
        RiskFusionEngine::new(
            SignatureRuleEngine::new(&thresholds, registry.clone()).unwrap(),
            FeatureEngineer::new(&thresholds),
            scorer,
            BehavioralAnalyzer::new(BehavioralConfig::default(), registry),
            config,
        )
    }

    fn engine() -> RiskFusionEngine {
        build(None, FusionConfig::default())
    }

    fn tx(raw: RawTransaction) -> TransactionRecord {
        TransactionRecord::try_from(raw).unwrap()
    }

    fn clean_tx() -> TransactionRecord {
        let mut raw = RawTransaction::new(ALICE, BOB, 1.0);
        raw.gas_used = 21_000;
        raw.gas_price_gwei = 20.0;
        tx(raw)
    }

    fn exploit_tx() -> TransactionRecord {
        let mut raw = RawTransaction::new(EULER_ATTACKER, BOB, 5000.0);
        raw.gas_used = 2_000_000;
        raw.gas_price_gwei = 150.0;
        raw.is_flash_loan = true;
        tx(raw)
    }

    fn trained_scorer() -> AnomalyScorer {
        let engineer = FeatureEngineer::new(&RuleThresholds::default());
        let labeled: Vec<LabeledTransaction> = (0..10)
            .flat_map(|i| {
                let i = i as f64;
                let mut benign = RawTransaction::new(ALICE, BOB, 0.5 + i);
                benign.gas_used = 21_000;
                benign.gas_price_gwei = 20.0 + i;
                let mut bad = RawTransaction::new(ALICE, BOB, 1000.0 + i * 100.0);
                bad.gas_used = 1_800_000;
                bad.gas_price_gwei = 140.0 + i;
                [
                    LabeledTransaction { tx: tx(benign), is_malicious: false },
                    LabeledTransaction { tx: tx(bad), is_malicious: true },
                ]
            })
            .collect();
        let (matrix, labels) = engineer.prepare_training_data(&labeled);
        let mut scorer = AnomalyScorer::new(0.5).unwrap();
        scorer.train(&matrix, &labels).unwrap();
        scorer
    }

    #[test]
    fn test_clean_transaction_is_safe() {
        let verdict = engine().analyze(&clean_tx(), &[]);
        assert_eq!(verdict.all_rules_checked, 6);
        assert!(verdict.triggered_rules.is_empty());
        assert_eq!(verdict.risk_score, 0.0);
        assert_eq!(verdict.risk_level, RiskLevel::Safe);
        assert!(!verdict.is_suspicious);
        assert!(verdict.ml_prediction.is_none());
        assert!(verdict.error.is_none());
    }

    #[test]
    fn test_known_attacker_is_critical() {
        let raw = RawTransaction::new(EULER_ATTACKER, BOB, 0.1);
        let verdict = engine().analyze(&tx(raw), &[]);
        assert!(verdict.is_suspicious);
        assert_eq!(verdict.risk_level, RiskLevel::Critical);
        assert!(verdict
            .triggered_rules
            .iter()
            .any(|r| r.severity == Severity::Critical));
        assert_eq!(verdict.risk_score, 1.0);
    }

    #[test]
    fn test_exploit_transaction() {
        let verdict = engine().analyze(&exploit_tx(), &[]);
        assert!(verdict.triggered_rules.len() >= 3);
        assert!(verdict.triggered_rules.iter().all(|r| r.is_triggered));
        assert_eq!(verdict.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_high_rule_alone_is_suspicious() {
        // Flash loan of 15 ETH: HIGH rule, score below the suspicion threshold
        let mut raw = RawTransaction::new(ALICE, BOB, 15.0);
        raw.gas_used = 21_000;
        raw.gas_price_gwei = 20.0;
        raw.is_flash_loan = true;
        let verdict = engine().analyze(&tx(raw), &[]);
        assert!(verdict.risk_score < 0.5);
        assert!(verdict.is_suspicious);
        assert_eq!(verdict.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_score_bounds_and_floor() {
        let engine = engine();
        let mut raw = RawTransaction::new(ALICE, BOB, 150.0);
        raw.gas_used = 21_000;
        raw.gas_price_gwei = 60.0;
        let verdict = engine.analyze(&tx(raw), &[]);
        assert!((0.0..=1.0).contains(&verdict.risk_score));
        // MEDIUM large-value rule floors the level
        assert!(verdict.risk_level >= RiskLevel::Medium);
        assert!(!verdict.is_suspicious);
    }

    #[test]
    fn test_idempotent() {
        let engine = engine();
        let t = exploit_tx();
        let first = engine.analyze(&t, &[]);
        let second = engine.analyze(&t, &[]);
        assert_eq!(first.risk_score, second.risk_score);
        assert_eq!(first.risk_level, second.risk_level);
        assert_eq!(first.triggered_rules, second.triggered_rules);
    }

    #[test]
    fn test_batch_summary_tiers() {
        let engine = engine();
        let txs = vec![clean_tx(), exploit_tx(), clean_tx()];
        let batch = engine.analyze_batch(&txs, &[]);
        assert_eq!(batch.results.len(), 3);
        let s = &batch.summary;
        assert_eq!(s.total_analyzed, 3);
        assert_eq!(
            s.critical_count + s.high_risk_count + s.medium_risk_count + s.low_risk_count + s.safe_count,
            3
        );
        assert_eq!(s.safe_count, 2);
        assert_eq!(s.critical_count, 1);
        assert_eq!(s.suspicious_count, 1);
    }

    #[test]
    fn test_ml_is_advisory() {
        let with_ml = build(Some(trained_scorer()), FusionConfig::default());
        let without = engine();
        let t = exploit_tx();
        let a = with_ml.analyze(&t, &[]);
        let b = without.analyze(&t, &[]);
        assert!(a.ml_prediction.is_some());
        assert_eq!(a.risk_score, b.risk_score);
        assert_eq!(a.risk_level, b.risk_level);
        assert!(a.fused_score.is_none());
    }

    #[test]
    fn test_fused_score_when_weighted() {
        let config = FusionConfig {
            ml_weight: 0.5,
            ..FusionConfig::default()
        };
        let engine = build(Some(trained_scorer()), config);
        let verdict = engine.analyze(&clean_tx(), &[]);
        let p = verdict.ml_prediction.as_ref().unwrap().confidence;
        let fused = verdict.fused_score.unwrap();
        assert!((fused - 0.5 * p).abs() < 1e-12);
        assert_eq!(verdict.risk_level, RiskLevel::Safe);
    }

    #[test]
    fn test_untrained_model_degrades_to_rule_only() {
        let engine = build(Some(AnomalyScorer::new(0.5).unwrap()), FusionConfig::default());
        let verdict = engine.analyze(&exploit_tx(), &[]);
        assert!(verdict.ml_prediction.is_none());
        assert!(verdict.error.as_deref().unwrap().contains("Model not trained"));
        assert_eq!(verdict.risk_level, RiskLevel::Critical);

        let batch = engine.analyze_batch(&[clean_tx(), exploit_tx()], &[]);
        assert!(batch.results.iter().all(|v| v.error.is_some()));
        assert_eq!(batch.summary.total_analyzed, 2);
    }

    #[test]
    fn test_detect_anomaly_paths() {
        assert!(matches!(
            engine().detect_anomaly(&clean_tx()),
            Err(RiskError::ModelNotTrained)
        ));
        let engine = build(Some(trained_scorer()), FusionConfig::default());
        let result = engine.detect_anomaly(&exploit_tx()).unwrap();
        assert_eq!(result.features.len(), 10);
        assert!(result.prediction.is_malicious);
    }

    #[test]
    fn test_rules_only_report() {
        let report = engine().detect_rules_only(&exploit_tx(), &[]);
        assert_eq!(report.rules_checked, 6);
        assert_eq!(
            report.rules_triggered,
            report.results.iter().filter(|r| r.is_triggered).count()
        );
    }

    #[test]
    fn test_check_address_messages() {
        let engine = engine();
        let hit = engine.check_address(&Address::parse(EULER_ATTACKER).unwrap());
        assert!(hit.is_known_attacker);
        assert_eq!(hit.risk_level, RiskLevel::Critical);
        assert_eq!(hit.message, "Address is a KNOWN ATTACKER from Euler Finance Exploit");
        assert_eq!(hit.checksum_address.to_lowercase(), EULER_ATTACKER.to_lowercase());

        let miss = engine.check_address(&Address::parse(ALICE).unwrap());
        assert_eq!(miss.risk_level, RiskLevel::Safe);
        assert_eq!(miss.message, "Address not found in known attacker database");
    }

    #[test]
    fn test_assess_address() {
        let engine = engine();
        let sanctioned = engine.assess_address(&Address::parse(TORNADO_ROUTER).unwrap(), None, None);
        assert_eq!(sanctioned.risk_level, RiskLevel::Critical);
        assert!(sanctioned.is_high_risk);
        assert!(sanctioned.behavioral.is_none());

        let history = vec![
            tx(RawTransaction::new(ALICE, BOB, 1.0)),
            tx(RawTransaction::new(BOB, ALICE, 1.0)),
        ];
        let alice = Address::parse(ALICE).unwrap();
        let report = engine.assess_address(&alice, Some(&history), None);
        assert!(report.behavioral.is_some());
        assert_eq!(report.related_addresses, vec![Address::parse(BOB).unwrap()]);
        assert_eq!(report.activity.unwrap().tx_count, 2);
        assert!(report.risk_level >= RiskLevel::Minimal);
    }

    #[test]
    fn test_misaligned_model_reports_error() {
        struct OneColumn;
        impl crate::ml::Classifier for OneColumn {
            fn model_type(&self) -> &str {
                "test"
            }
            fn feature_names(&self) -> &[String] {
                &[]
            }
            fn predict_proba(&self, _row: &[f64]) -> f64 {
                0.5
            }
            fn feature_importance(&self) -> Vec<(String, f64)> {
                Vec::new()
            }
            fn training_stats(&self) -> Option<&crate::ml::TrainingStats> {
                None
            }
            fn to_json(&self) -> Result<String> {
                Ok("{}".to_string())
            }
        }
        let scorer = AnomalyScorer::with_model(Box::new(OneColumn), 0.5).unwrap();
        let engine = build(Some(scorer), FusionConfig::default());
        let verdict = engine.analyze(&clean_tx(), &[]);
        assert!(verdict.error.unwrap().contains("Validation error"));
    }
}
