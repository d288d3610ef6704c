use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::behavior::BehavioralReport;
use crate::level::RiskLevel;
use crate::ml::features::AddressFeatures;
use crate::ml::AnomalyDetection;
use crate::registry::blacklist::ComprehensiveAddressRisk;
use crate::registry::KnownExploit;
use crate::rules::RuleResult;
use crate::tx::Address;

/// Fused assessment of one transaction.
#[derive(Debug, Clone, Serialize)]
pub struct RiskVerdict {
    pub tx_hash: Option<String>,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub is_suspicious: bool,
    /// Only rules that fired.
    pub triggered_rules: Vec<RuleResult>,
    /// Number of rules evaluated, triggered or not.
    pub all_rules_checked: usize,
    /// Advisory only; never changes `risk_score` or `risk_level`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml_prediction: Option<AnomalyDetection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fused_score: Option<f64>,
    /// Set when the model was configured but could not score this transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub analysis_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AnalysisSummary {
    pub total_analyzed: usize,
    pub suspicious_count: usize,
    pub critical_count: usize,
    pub high_risk_count: usize,
    pub medium_risk_count: usize,
    /// LOW and MINIMAL together.
    pub low_risk_count: usize,
    pub safe_count: usize,
}

impl AnalysisSummary {
    pub fn from_verdicts(verdicts: &[RiskVerdict]) -> Self {
        let mut summary = Self {
            total_analyzed: verdicts.len(),
            ..Self::default()
        };
        for v in verdicts {
            if v.is_suspicious {
                summary.suspicious_count += 1;
            }
            match v.risk_level {
                RiskLevel::Critical => summary.critical_count += 1,
                RiskLevel::High => summary.high_risk_count += 1,
                RiskLevel::Medium => summary.medium_risk_count += 1,
                RiskLevel::Low | RiskLevel::Minimal => summary.low_risk_count += 1,
                RiskLevel::Safe => summary.safe_count += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchAnalysis {
    pub summary: AnalysisSummary,
    pub results: Vec<RiskVerdict>,
    pub processing_time_ms: u64,
}

/// Rule battery output without fusion.
#[derive(Debug, Clone, Serialize)]
pub struct RuleReport {
    pub tx_hash: Option<String>,
    pub rules_checked: usize,
    pub rules_triggered: usize,
    pub results: Vec<RuleResult>,
}

/// Classifier output for one transaction, with the features it saw.
#[derive(Debug, Clone, Serialize)]
pub struct MlOnlyResult {
    pub tx_hash: Option<String>,
    pub prediction: AnomalyDetection,
    pub features: BTreeMap<String, f64>,
}

/// Quick known-attacker lookup.
#[derive(Debug, Clone, Serialize)]
pub struct AddressCheck {
    pub address: Address,
    pub checksum_address: String,
    pub is_known_attacker: bool,
    pub risk_level: RiskLevel,
    pub exploit_info: Option<KnownExploit>,
    pub message: String,
}

/// Registry lookups, behavioral analysis and counterparty clustering for one address.
#[derive(Debug, Clone, Serialize)]
pub struct AddressRiskReport {
    pub address: Address,
    pub checksum_address: String,
    pub risk_level: RiskLevel,
    pub is_high_risk: bool,
    pub registry: ComprehensiveAddressRisk,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavioral: Option<BehavioralReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<AddressFeatures>,
    /// Addresses sharing a bidirectional-transfer cluster with this one.
    pub related_addresses: Vec<Address>,
}
