use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::BehavioralConfig;
use crate::graph::CounterpartyGraph;
use crate::level::RiskLevel;
use crate::registry::BlacklistRegistry;
use crate::tx::{Address, TransactionRecord};

use super::funding::{analyze_funding, FundingPatternScore};
use super::round_to;
use super::velocity::{analyze_velocity, VelocityScore};

const WASH_PATTERN_MIN_INDICATORS: u32 = 3;

/// Behavioral risk for one address over a caller-supplied history window.
#[derive(Debug, Clone, Serialize)]
pub struct BehavioralReport {
    pub address: Address,
    pub velocity_score: VelocityScore,
    pub funding_pattern: FundingPatternScore,
    pub overall_risk_score: f64,
    pub risk_level: RiskLevel,
    pub suspicious_patterns: Vec<String>,
    pub analysis_timestamp: DateTime<Utc>,
    pub tx_analyzed: usize,
}

/// Velocity and funding-pattern analysis. Holds no per-request state, so one
/// instance can serve concurrent callers.
pub struct BehavioralAnalyzer {
    config: BehavioralConfig,
    registry: Arc<BlacklistRegistry>,
}

impl BehavioralAnalyzer {
    pub fn new(config: BehavioralConfig, registry: Arc<BlacklistRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &BehavioralConfig {
        &self.config
    }

    /// Velocity statistics. `reference_time` defaults to now.
    pub fn analyze_velocity(
        &self,
        history: &[TransactionRecord],
        address: &Address,
        reference_time: Option<DateTime<Utc>>,
    ) -> VelocityScore {
        analyze_velocity(
            history,
            address,
            reference_time.unwrap_or_else(Utc::now),
            &self.config,
        )
    }

    pub fn analyze_funding_pattern(
        &self,
        history: &[TransactionRecord],
        address: &Address,
    ) -> FundingPatternScore {
        let graph = CounterpartyGraph::from_history(history);
        analyze_funding(&graph, address, &self.registry, &self.config)
    }

    /// Full report: 40% velocity, 60% funding.
    pub fn analyze(
        &self,
        address: &Address,
        history: &[TransactionRecord],
        reference_time: Option<DateTime<Utc>>,
    ) -> BehavioralReport {
        let velocity = self.analyze_velocity(history, address, reference_time);
        let funding = self.analyze_funding_pattern(history, address);

        let overall = round_to(
            0.4 * velocity.velocity_risk_score + 0.6 * funding.funding_risk_score,
            3,
        );
        let suspicious_patterns = self.suspicious_patterns(&velocity, &funding);
        let tx_analyzed = history.iter().filter(|t| t.involves(address)).count();

        tracing::debug!(
            address = %address,
            tx_analyzed,
            overall_risk_score = overall,
            patterns = suspicious_patterns.len(),
            "Behavioral analysis complete"
        );

        BehavioralReport {
            address: *address,
            velocity_score: velocity,
            funding_pattern: funding,
            overall_risk_score: overall,
            risk_level: RiskLevel::from_behavioral_score(overall),
            suspicious_patterns,
            analysis_timestamp: Utc::now(),
            tx_analyzed,
        }
    }

    /// Analyze each address independently against the same history, in input order.
    pub fn batch_analyze(
        &self,
        addresses: &[Address],
        history: &[TransactionRecord],
        reference_time: Option<DateTime<Utc>>,
    ) -> Vec<BehavioralReport> {
        let reference = reference_time.unwrap_or_else(Utc::now);
        let reports: Vec<BehavioralReport> = addresses
            .iter()
            .map(|addr| self.analyze(addr, history, Some(reference)))
            .collect();
        tracing::info!(addresses = reports.len(), "Batch behavioral analysis complete");
        reports
    }

    fn suspicious_patterns(&self, velocity: &VelocityScore, funding: &FundingPatternScore) -> Vec<String> {
        let mut patterns = Vec::new();
        if velocity.burst_detected {
            patterns.push("Burst transaction activity detected".to_string());
        }
        if velocity.avg_tx_per_day > self.config.high_velocity_threshold {
            patterns.push("Unusually high transaction velocity".to_string());
        }
        if funding.circular_funding_detected {
            patterns.push("Circular funding pattern detected".to_string());
        }
        if funding.funding_concentration > self.config.concentration_threshold {
            patterns.push("High funding concentration from single source".to_string());
        }
        if funding.wash_trading_indicators >= WASH_PATTERN_MIN_INDICATORS {
            patterns.push("Multiple wash trading indicators".to_string());
        }
        patterns
    }
}
