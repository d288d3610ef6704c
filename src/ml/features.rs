use std::collections::HashSet;

use serde::Serialize;

use crate::config::RuleThresholds;
use crate::error::{Result, RiskError};
use crate::tx::{Address, TransactionRecord};

pub const FEATURE_COUNT: usize = 10;

/// Column order of every feature vector. Models are trained and scored
/// against exactly this order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "value_eth",
    "gas_used",
    "gas_price_gwei",
    "gas_cost_eth",
    "value_to_gas_ratio",
    "is_large_value",
    "is_high_gas",
    "is_high_gas_price",
    "log_value",
    "log_gas",
];

/// Guards the value/gas ratio against zero-cost transactions.
const RATIO_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }
}

/// Rows of features with their column names.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeatureMatrix {
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Build a matrix, rejecting rows whose width differs from the column list.
    pub fn new(feature_names: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != feature_names.len())
        {
            return Err(RiskError::validation(format!(
                "row {} has {} values, expected {}",
                i,
                row.len(),
                feature_names.len()
            )));
        }
        Ok(Self { feature_names, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A transaction with its ground-truth label, for offline training.
#[derive(Debug, Clone)]
pub struct LabeledTransaction {
    pub tx: TransactionRecord,
    pub is_malicious: bool,
}

/// Aggregate activity of one address over a history window.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AddressFeatures {
    pub address: Address,
    pub tx_count: usize,
    pub sent_count: usize,
    pub received_count: usize,
    pub total_value_eth: f64,
    pub avg_value_eth: f64,
    pub max_value_eth: f64,
    pub unique_counterparties: usize,
    pub flash_loan_count: usize,
}

/// Deterministic transaction → feature vector mapping.
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    large_value_eth: f64,
    gas_used_threshold: u64,
    gas_price_gwei_threshold: f64,
}

impl FeatureEngineer {
    /// Flag features share their thresholds with the signature rules.
    pub fn new(thresholds: &RuleThresholds) -> Self {
        Self {
            large_value_eth: thresholds.large_value_eth,
            gas_used_threshold: thresholds.gas_used_threshold,
            gas_price_gwei_threshold: thresholds.gas_price_gwei_threshold,
        }
    }

    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }

    pub fn transform(&self, tx: &TransactionRecord) -> FeatureVector {
        let value = tx.value_eth();
        let gas_used = tx.gas_used() as f64;
        let gas_price = tx.gas_price_gwei();
        let gas_cost = tx.gas_cost_eth();

        FeatureVector {
            values: [
                value,
                gas_used,
                gas_price,
                gas_cost,
                value / (gas_cost + RATIO_EPSILON),
                flag(value > self.large_value_eth),
                flag(tx.gas_used() > self.gas_used_threshold),
                flag(gas_price > self.gas_price_gwei_threshold),
                value.ln_1p(),
                gas_used.ln_1p(),
            ],
        }
    }

    pub fn transform_batch(&self, txs: &[TransactionRecord]) -> FeatureMatrix {
        FeatureMatrix {
            feature_names: names(),
            rows: txs.iter().map(|t| self.transform(t).as_slice().to_vec()).collect(),
        }
    }

    /// Features and 0/1 labels (1 = malicious), row-aligned.
    pub fn prepare_training_data(&self, labeled: &[LabeledTransaction]) -> (FeatureMatrix, Vec<u8>) {
        let rows = labeled
            .iter()
            .map(|l| self.transform(&l.tx).as_slice().to_vec())
            .collect();
        let labels = labeled.iter().map(|l| u8::from(l.is_malicious)).collect();
        (
            FeatureMatrix {
                feature_names: names(),
                rows,
            },
            labels,
        )
    }

    pub fn extract_address_features(&self, history: &[TransactionRecord], address: &Address) -> AddressFeatures {
        let related: Vec<&TransactionRecord> = history.iter().filter(|t| t.involves(address)).collect();

        let mut counterparties: HashSet<Address> = HashSet::new();
        let mut sent_count = 0;
        let mut received_count = 0;
        for t in &related {
            if t.from_address() == address {
                sent_count += 1;
                counterparties.insert(*t.to_address());
            }
            if t.to_address() == address {
                received_count += 1;
                counterparties.insert(*t.from_address());
            }
        }
        counterparties.remove(address);

        let total_value_eth: f64 = related.iter().map(|t| t.value_eth()).sum();
        let tx_count = related.len();

        AddressFeatures {
            address: *address,
            tx_count,
            sent_count,
            received_count,
            total_value_eth,
            avg_value_eth: if tx_count > 0 {
                total_value_eth / tx_count as f64
            } else {
                0.0
            },
            max_value_eth: related.iter().map(|t| t.value_eth()).fold(0.0, f64::max),
            unique_counterparties: counterparties.len(),
            flash_loan_count: related.iter().filter(|t| t.is_flash_loan()).count(),
        }
    }
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|n| n.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::RawTransaction;

    const A: &str = "0x1111111111111111111111111111111111111111";
    const B: &str = "0x2222222222222222222222222222222222222222";
    const C: &str = "0x3333333333333333333333333333333333333333";

    fn engineer() -> FeatureEngineer {
        FeatureEngineer::new(&RuleThresholds::default())
    }

    fn tx(raw: RawTransaction) -> TransactionRecord {
        TransactionRecord::try_from(raw).unwrap()
    }

    #[test]
    fn test_transform_exploit_profile() {
        let mut raw = RawTransaction::new(A, B, 5000.0);
        raw.gas_used = 2_000_000;
        raw.gas_price_gwei = 150.0;
        let v = engineer().transform(&tx(raw));

        assert_eq!(v.get("value_eth"), Some(5000.0));
        assert_eq!(v.get("gas_used"), Some(2_000_000.0));
        assert!((v.get("gas_cost_eth").unwrap() - 0.3).abs() < 1e-12);
        assert!((v.get("value_to_gas_ratio").unwrap() - 5000.0 / (0.3 + 1e-9)).abs() < 1e-6);
        assert_eq!(v.get("is_large_value"), Some(1.0));
        assert_eq!(v.get("is_high_gas"), Some(1.0));
        assert_eq!(v.get("is_high_gas_price"), Some(1.0));
        assert!((v.get("log_value").unwrap() - 5001f64.ln()).abs() < 1e-12);
        assert!(v.get("unknown").is_none());
    }

    #[test]
    fn test_flags_are_strict() {
        let mut raw = RawTransaction::new(A, B, 100.0);
        raw.gas_used = 500_000;
        raw.gas_price_gwei = 50.0;
        let v = engineer().transform(&tx(raw));
        assert_eq!(v.get("is_large_value"), Some(0.0));
        assert_eq!(v.get("is_high_gas"), Some(0.0));
        assert_eq!(v.get("is_high_gas_price"), Some(0.0));
    }

    #[test]
    fn test_zero_gas_ratio_is_finite() {
        let mut raw = RawTransaction::new(A, B, 1.0);
        raw.gas_used = 0;
        let v = engineer().transform(&tx(raw));
        assert!(v.get("value_to_gas_ratio").unwrap().is_finite());
        assert_eq!(v.get("log_gas"), Some(0.0));
    }

    #[test]
    fn test_batch_column_order() {
        let m = engineer().transform_batch(&[tx(RawTransaction::new(A, B, 1.0))]);
        assert_eq!(m.feature_names, FEATURE_NAMES.iter().map(|s| s.to_string()).collect::<Vec<_>>());
        assert_eq!(m.len(), 1);
        assert_eq!(m.rows[0].len(), FEATURE_COUNT);
    }

    #[test]
    fn test_prepare_training_data() {
        let labeled = vec![
            LabeledTransaction {
                tx: tx(RawTransaction::new(A, B, 1.0)),
                is_malicious: false,
            },
            LabeledTransaction {
                tx: tx(RawTransaction::new(A, B, 900.0)),
                is_malicious: true,
            },
        ];
        let (m, labels) = engineer().prepare_training_data(&labeled);
        assert_eq!(m.len(), 2);
        assert_eq!(labels, vec![0, 1]);
    }

    #[test]
    fn test_matrix_rejects_ragged_rows() {
        assert!(FeatureMatrix::new(vec!["a".to_string()], vec![vec![1.0, 2.0]]).is_err());
        assert!(FeatureMatrix::new(vec!["a".to_string()], vec![vec![1.0]]).is_ok());
    }

    #[test]
    fn test_address_features() {
        let mut flash = RawTransaction::new(A, C, 10.0);
        flash.is_flash_loan = true;
        let history = vec![
            tx(RawTransaction::new(A, B, 2.0)),
            tx(RawTransaction::new(B, A, 4.0)),
            tx(flash),
            tx(RawTransaction::new(B, C, 100.0)),
        ];
        let f = engineer().extract_address_features(&history, &Address::parse(A).unwrap());
        assert_eq!(f.tx_count, 3);
        assert_eq!(f.sent_count, 2);
        assert_eq!(f.received_count, 1);
        assert_eq!(f.unique_counterparties, 2);
        assert_eq!(f.flash_loan_count, 1);
        assert!((f.total_value_eth - 16.0).abs() < 1e-12);
        assert_eq!(f.max_value_eth, 10.0);
    }
}
