use std::collections::HashSet;

use serde::Serialize;

use crate::config::BehavioralConfig;
use crate::graph::CounterpartyGraph;
use crate::registry::BlacklistRegistry;
use crate::tx::Address;

use super::round_to;

/// Maximum wash-trading tally, used to normalize the indicator term.
const MAX_WASH_INDICATORS: f64 = 6.0;

/// Where an address's incoming value comes from.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct FundingPatternScore {
    pub unique_funding_sources: usize,
    pub primary_funding_source: Option<Address>,
    /// Share of incoming transfers from the primary source.
    pub funding_concentration: f64,
    pub circular_funding_detected: bool,
    pub wash_trading_indicators: u32,
    /// Informational: at least one source is a known exchange wallet.
    pub exchange_funded: bool,
    pub funding_risk_score: f64,
}

/// Funding pattern for `address` from the incoming edges of the counterparty graph.
pub fn analyze_funding(
    graph: &CounterpartyGraph,
    address: &Address,
    registry: &BlacklistRegistry,
    config: &BehavioralConfig,
) -> FundingPatternScore {
    let incoming = graph.incoming(address);
    let total_incoming: u64 = incoming.iter().map(|e| e.transfer_count).sum();
    if total_incoming == 0 {
        return FundingPatternScore::default();
    }

    // Ties go to the smallest address so the result is stable
    let primary = incoming
        .iter()
        .max_by(|a, b| {
            a.transfer_count
                .cmp(&b.transfer_count)
                .then_with(|| b.source.cmp(&a.source))
        })
        .map(|e| (e.source, e.transfer_count));
    let (primary_source, primary_count) = match primary {
        Some(p) => p,
        None => return FundingPatternScore::default(),
    };

    let concentration = primary_count as f64 / total_incoming as f64;
    let recipients: HashSet<Address> = graph.outgoing(address).iter().map(|e| e.dest).collect();
    let circular = incoming.iter().any(|e| recipients.contains(&e.source));
    let unique_sources = incoming.len();

    let mut indicators = 0u32;
    if concentration > config.concentration_threshold {
        indicators += 1;
    }
    if unique_sources < config.min_funding_diversity {
        indicators += 1;
    }
    if circular {
        indicators += 2;
    }
    if incoming.iter().any(|e| registry.is_mixer(&e.source)) {
        indicators += 2;
    }

    let score = 0.3 * concentration
        + if circular { 0.3 } else { 0.0 }
        + 0.4 * (indicators as f64 / MAX_WASH_INDICATORS);

    FundingPatternScore {
        unique_funding_sources: unique_sources,
        primary_funding_source: Some(primary_source),
        funding_concentration: round_to(concentration, 3),
        circular_funding_detected: circular,
        wash_trading_indicators: indicators,
        exchange_funded: incoming.iter().any(|e| registry.is_exchange(&e.source)),
        funding_risk_score: round_to(score.min(1.0), 3),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::{RawTransaction, TransactionRecord};

    const SUBJECT: &str = "0x1111111111111111111111111111111111111111";
    const FUNDER_A: &str = "0x2222222222222222222222222222222222222222";
    const FUNDER_B: &str = "0x3333333333333333333333333333333333333333";
    const FUNDER_C: &str = "0x4444444444444444444444444444444444444444";
    const SINK: &str = "0x5555555555555555555555555555555555555555";
    const MIXER: &str = "0xd90e2f925da726b50c4ed8d0fb90ad053324f31b";
    const EXCHANGE: &str = "0x28c6c06298d514db089934071355e5743bf21d60";

    fn transfer(from: &str, to: &str) -> TransactionRecord {
        TransactionRecord::try_from(RawTransaction::new(from, to, 1.0)).unwrap()
    }

    fn run(history: &[TransactionRecord]) -> FundingPatternScore {
        let registry = BlacklistRegistry::builtin().unwrap();
        let graph = CounterpartyGraph::from_history(history);
        analyze_funding(
            &graph,
            &Address::parse(SUBJECT).unwrap(),
            &registry,
            &BehavioralConfig::default(),
        )
    }

    #[test]
    fn test_no_incoming_is_zero() {
        let score = run(&[transfer(SUBJECT, SINK)]);
        assert_eq!(score, FundingPatternScore::default());
    }

    #[test]
    fn test_single_funder() {
        let score = run(&[transfer(FUNDER_A, SUBJECT), transfer(FUNDER_A, SUBJECT)]);
        assert_eq!(score.unique_funding_sources, 1);
        assert_eq!(score.funding_concentration, 1.0);
        assert_eq!(score.primary_funding_source, Some(Address::parse(FUNDER_A).unwrap()));
        assert!(!score.circular_funding_detected);
        // concentration and low diversity
        assert_eq!(score.wash_trading_indicators, 2);
        // 0.3 * 1.0 + 0.4 * 2/6
        assert!((score.funding_risk_score - 0.433).abs() < 1e-9);
    }

    #[test]
    fn test_circular_funding() {
        let score = run(&[transfer(FUNDER_A, SUBJECT), transfer(SUBJECT, FUNDER_A)]);
        assert!(score.circular_funding_detected);
        assert_eq!(score.wash_trading_indicators, 4);
        // 0.3 + 0.3 + 0.4 * 4/6
        assert!((score.funding_risk_score - 0.867).abs() < 1e-9);
    }

    #[test]
    fn test_outgoing_to_non_funder_is_not_circular() {
        let score = run(&[transfer(FUNDER_A, SUBJECT), transfer(SUBJECT, SINK)]);
        assert!(!score.circular_funding_detected);
    }

    #[test]
    fn test_diverse_funding_has_no_indicators() {
        let score = run(&[
            transfer(FUNDER_A, SUBJECT),
            transfer(FUNDER_B, SUBJECT),
            transfer(FUNDER_C, SUBJECT),
        ]);
        assert_eq!(score.unique_funding_sources, 3);
        assert_eq!(score.wash_trading_indicators, 0);
        assert!((score.funding_concentration - 0.333).abs() < 1e-9);
        assert!((score.funding_risk_score - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_tie_breaks_on_smallest_address() {
        let score = run(&[transfer(FUNDER_B, SUBJECT), transfer(FUNDER_A, SUBJECT)]);
        assert_eq!(score.primary_funding_source, Some(Address::parse(FUNDER_A).unwrap()));
        assert_eq!(score.funding_concentration, 0.5);
    }

    #[test]
    fn test_mixer_and_exchange_sources() {
        let score = run(&[transfer(MIXER, SUBJECT), transfer(EXCHANGE, SUBJECT)]);
        // low diversity + mixer
        assert_eq!(score.wash_trading_indicators, 3);
        assert!(score.exchange_funded);
    }
}
