use std::sync::Arc;

use crate::config::RuleThresholds;
use crate::error::{Result, RiskError};
use crate::registry::BlacklistRegistry;
use crate::tx::TransactionRecord;

use super::signatures;
use super::types::{DetectionRule, RuleContext, RuleDescriptor, RuleResult};

/// Runs every registered rule against a transaction. Rules are independent:
/// one failing or triggering never stops the others.
pub struct SignatureRuleEngine {
    registry: Arc<BlacklistRegistry>,
    rules: Vec<Box<dyn DetectionRule>>,
}

impl SignatureRuleEngine {
    /// Build the engine with the built-in battery.
    /// Fails if the registry was never populated or a threshold is unusable.
    pub fn new(thresholds: &RuleThresholds, registry: Arc<BlacklistRegistry>) -> Result<Self> {
        if registry.attacker_count() == 0 {
            return Err(RiskError::configuration(
                "signature rules need a loaded registry with known attackers",
            ));
        }
        for (name, value) in [
            ("large_value_eth", thresholds.large_value_eth),
            ("large_value_high_multiplier", thresholds.large_value_high_multiplier),
            ("gas_price_gwei_threshold", thresholds.gas_price_gwei_threshold),
            ("gas_price_medium_multiplier", thresholds.gas_price_medium_multiplier),
            ("flash_loan_value_eth", thresholds.flash_loan_value_eth),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(RiskError::configuration(format!(
                    "rule threshold {} must be positive, got {}",
                    name, value
                )));
            }
        }
        if thresholds.gas_used_threshold == 0 || thresholds.same_block_repeat_threshold == 0 {
            return Err(RiskError::configuration(
                "gas_used_threshold and same_block_repeat_threshold must be greater than zero",
            ));
        }

        Ok(Self {
            registry,
            rules: signatures::default_rules(thresholds),
        })
    }

    /// Add a rule after the built-in battery. It is evaluated on every call from now on.
    pub fn register(&mut self, rule: Box<dyn DetectionRule>) {
        tracing::info!(rule_id = rule.id(), "Registered detection rule");
        self.rules.push(rule);
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn registry(&self) -> &Arc<BlacklistRegistry> {
        &self.registry
    }

    pub fn rule_catalog(&self) -> Vec<RuleDescriptor> {
        self.rules.iter().map(|r| r.descriptor()).collect()
    }

    /// Evaluate all rules, in registration order. Always returns one result per rule.
    pub fn detect_all(&self, tx: &TransactionRecord, history: &[TransactionRecord]) -> Vec<RuleResult> {
        let ctx = RuleContext {
            tx,
            registry: &self.registry,
            history,
        };

        self.rules
            .iter()
            .map(|rule| match rule.evaluate(&ctx) {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(
                        rule_id = rule.id(),
                        tx_hash = tx.tx_hash().unwrap_or("-"),
                        error = %e,
                        "Rule evaluation failed, reporting as not triggered"
                    );
                    RuleResult::clear(rule.as_ref(), format!("Rule evaluation failed: {}", e))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::types::Severity;
    use crate::tx::RawTransaction;

    const EULER_ATTACKER: &str = "0xb66cd966670d962C227B3EABA30a872DbFb995db";
    const ALICE: &str = "0x1111111111111111111111111111111111111111";
    const BOB: &str = "0x2222222222222222222222222222222222222222";

    struct FailingRule;

    impl DetectionRule for FailingRule {
        fn id(&self) -> &str {
            "always_fails"
        }

        fn name(&self) -> &str {
            "Always fails"
        }

        fn severity(&self) -> Severity {
            Severity::Low
        }

        fn description(&self) -> &str {
            "test rule"
        }

        fn evaluate(&self, _ctx: &RuleContext<'_>) -> Result<RuleResult> {
            Err(RiskError::RuleEvaluation {
                rule_id: "always_fails".to_string(),
                message: "upstream unavailable".to_string(),
            })
        }
    }

    fn engine() -> SignatureRuleEngine {
        let registry = Arc::new(BlacklistRegistry::builtin().unwrap());
        SignatureRuleEngine::new(&RuleThresholds::default(), registry).unwrap()
    }

    fn tx(raw: RawTransaction) -> TransactionRecord {
        TransactionRecord::try_from(raw).unwrap()
    }

    #[test]
    fn test_clean_transaction_triggers_nothing() {
        let engine = engine();
        let mut raw = RawTransaction::new(ALICE, BOB, 1.0);
        raw.gas_used = 21_000;
        raw.gas_price_gwei = 20.0;
        let results = engine.detect_all(&tx(raw), &[]);
        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|r| !r.is_triggered));
    }

    #[test]
    fn test_exploit_transaction_triggers_several_rules() {
        let engine = engine();
        let mut raw = RawTransaction::new(EULER_ATTACKER, BOB, 5000.0);
        raw.gas_used = 2_000_000;
        raw.gas_price_gwei = 150.0;
        raw.is_flash_loan = true;
        let results = engine.detect_all(&tx(raw), &[]);
        assert_eq!(results.len(), 6);
        let triggered: Vec<_> = results.iter().filter(|r| r.is_triggered).collect();
        assert!(triggered.len() >= 3);
        assert!(triggered
            .iter()
            .any(|r| r.rule_id == signatures::KNOWN_ATTACKER && r.severity == Severity::Critical));
    }

    #[test]
    fn test_failing_rule_is_isolated() {
        let mut engine = engine();
        engine.register(Box::new(FailingRule));
        let raw = RawTransaction::new(EULER_ATTACKER, BOB, 1.0);
        let results = engine.detect_all(&tx(raw), &[]);
        assert_eq!(results.len(), 7);
        assert_eq!(engine.rule_count(), 7);
        let failed = results.iter().find(|r| r.rule_id == "always_fails").unwrap();
        assert!(!failed.is_triggered);
        assert!(failed.details.contains("upstream unavailable"));
        // The known-attacker rule still ran
        assert!(results[0].is_triggered);
    }

    #[test]
    fn test_rejects_empty_registry() {
        let registry = Arc::new(BlacklistRegistry::default());
        let err = SignatureRuleEngine::new(&RuleThresholds::default(), registry)
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let registry = Arc::new(BlacklistRegistry::builtin().unwrap());
        let thresholds = RuleThresholds {
            large_value_eth: -1.0,
            ..RuleThresholds::default()
        };
        assert!(SignatureRuleEngine::new(&thresholds, registry).is_err());
    }

    #[test]
    fn test_rule_catalog() {
        let catalog = engine().rule_catalog();
        assert_eq!(catalog.len(), 6);
        assert_eq!(catalog[0].rule_id, "known_attacker");
        assert_eq!(catalog[0].severity, Severity::Critical);
    }
}
