use chainwatch_risk::config::Config;
use chainwatch_risk::rules::Severity;
use chainwatch_risk::tx::{RawTransaction, TransactionRecord};
use chainwatch_risk::{RiskLevel, RiskPipeline};

const ALICE: &str = "0x1111111111111111111111111111111111111111";
const BOB: &str = "0x2222222222222222222222222222222222222222";
const EULER_ATTACKER: &str = "0xb66cd966670d962C227B3EABA30a872DbFb995db";

fn tx(value: f64, gas_used: u64, gas_price: f64, flash_loan: bool) -> TransactionRecord {
    let mut raw = RawTransaction::new(ALICE, BOB, value);
    raw.gas_used = gas_used;
    raw.gas_price_gwei = gas_price;
    raw.is_flash_loan = flash_loan;
    TransactionRecord::try_from(raw).unwrap()
}

#[cfg(test)]
mod proptest_scores {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn risk_score_is_monotone_in_value(
            low in 100.0f64..5_000.0,
            delta in 0.0f64..5_000.0,
            gas_used in 21_000u64..3_000_000,
            gas_price in 1.0f64..300.0,
            flash_loan in any::<bool>(),
        ) {
            let pipeline = RiskPipeline::init(&Config::default()).unwrap();
            let smaller = pipeline.analyze_transaction(&tx(low, gas_used, gas_price, flash_loan), &[]);
            let larger = pipeline.analyze_transaction(&tx(low + delta, gas_used, gas_price, flash_loan), &[]);
            prop_assert!(larger.risk_score >= smaller.risk_score);
            prop_assert!(larger.risk_level >= smaller.risk_level);
        }

        #[test]
        fn known_attacker_is_always_critical(
            value in 0.0f64..20_000.0,
            gas_used in 0u64..5_000_000,
            gas_price in 0.0f64..1_000.0,
            flash_loan in any::<bool>(),
            as_sender in any::<bool>(),
        ) {
            let (from, to) = if as_sender { (EULER_ATTACKER, BOB) } else { (ALICE, EULER_ATTACKER) };
            let mut raw = RawTransaction::new(from, to, value);
            raw.gas_used = gas_used;
            raw.gas_price_gwei = gas_price;
            raw.is_flash_loan = flash_loan;
            let pipeline = RiskPipeline::init(&Config::default()).unwrap();
            let verdict = pipeline.analyze_transaction(&TransactionRecord::try_from(raw).unwrap(), &[]);

            prop_assert!(verdict.is_suspicious);
            prop_assert_eq!(verdict.risk_level, RiskLevel::Critical);
            prop_assert!(verdict.triggered_rules.iter().any(|r| r.severity == Severity::Critical));
        }

        #[test]
        fn verdict_is_bounded_and_consistent(
            value in 0.0f64..20_000.0,
            gas_used in 0u64..5_000_000,
            gas_price in 0.0f64..1_000.0,
            flash_loan in any::<bool>(),
        ) {
            let pipeline = RiskPipeline::init(&Config::default()).unwrap();
            let verdict = pipeline.analyze_transaction(&tx(value, gas_used, gas_price, flash_loan), &[]);

            prop_assert!((0.0..=1.0).contains(&verdict.risk_score));
            prop_assert_eq!(verdict.all_rules_checked, 6);
            prop_assert!(verdict.triggered_rules.iter().all(|r| r.is_triggered));
            prop_assert!(verdict.triggered_rules.iter().all(|r| (0.0..=1.0).contains(&r.confidence)));
            prop_assert!(verdict.risk_level >= RiskLevel::from_score(verdict.risk_score));
            if verdict.triggered_rules.is_empty() {
                prop_assert_eq!(verdict.risk_level, RiskLevel::Safe);
            }
        }
    }
}
