use std::collections::HashMap;

use serde::Serialize;

use crate::tx::{Address, TransactionRecord};

/// Aggregated flow for a single (source, dest) pair.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GraphEdge {
    pub source: Address,
    pub dest: Address,
    pub transfer_count: u64,
    pub total_value_eth: f64,
    pub first_seen: Option<i64>,
    pub last_seen: Option<i64>,
}

/// Directed counterparty graph built from a history window.
#[derive(Debug, Default)]
pub struct CounterpartyGraph {
    edges: Vec<GraphEdge>,
    by_pair: HashMap<(Address, Address), usize>,
}

impl CounterpartyGraph {
    /// Group transfers by (source, dest) into aggregated edges, in first-seen order.
    pub fn from_history(history: &[TransactionRecord]) -> Self {
        let mut graph = Self::default();
        for t in history {
            let key = (*t.from_address(), *t.to_address());
            let idx = match graph.by_pair.get(&key) {
                Some(&idx) => idx,
                None => {
                    graph.edges.push(GraphEdge {
                        source: key.0,
                        dest: key.1,
                        transfer_count: 0,
                        total_value_eth: 0.0,
                        first_seen: None,
                        last_seen: None,
                    });
                    graph.by_pair.insert(key, graph.edges.len() - 1);
                    graph.edges.len() - 1
                }
            };

            let edge = &mut graph.edges[idx];
            edge.transfer_count += 1;
            edge.total_value_eth += t.value_eth();
            if let Some(ts) = t.timestamp() {
                edge.first_seen = Some(edge.first_seen.map_or(ts, |f| f.min(ts)));
                edge.last_seen = Some(edge.last_seen.map_or(ts, |l| l.max(ts)));
            }
        }
        graph
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn edge(&self, source: &Address, dest: &Address) -> Option<&GraphEdge> {
        self.by_pair.get(&(*source, *dest)).map(|&i| &self.edges[i])
    }

    /// Who sent value to this address.
    pub fn incoming(&self, address: &Address) -> Vec<&GraphEdge> {
        self.edges.iter().filter(|e| e.dest == *address).collect()
    }

    /// Who this address sent value to.
    pub fn outgoing(&self, address: &Address) -> Vec<&GraphEdge> {
        self.edges.iter().filter(|e| e.source == *address).collect()
    }

    /// Pairs with transfers in both directions, each reported once.
    pub fn bidirectional_pairs(&self) -> Vec<(Address, Address)> {
        self.edges
            .iter()
            .filter(|e| e.source < e.dest && self.by_pair.contains_key(&(e.dest, e.source)))
            .map(|e| (e.source, e.dest))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::RawTransaction;

    const A: &str = "0x1111111111111111111111111111111111111111";
    const B: &str = "0x2222222222222222222222222222222222222222";
    const C: &str = "0x3333333333333333333333333333333333333333";

    fn transfer(from: &str, to: &str, value: f64, ts: i64) -> TransactionRecord {
        let mut raw = RawTransaction::new(from, to, value);
        raw.timestamp = Some(ts);
        TransactionRecord::try_from(raw).unwrap()
    }

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    #[test]
    fn test_aggregates_by_pair() {
        let history = vec![
            transfer(A, B, 1.0, 200),
            transfer(A, B, 2.5, 100),
            transfer(B, C, 4.0, 300),
        ];
        let graph = CounterpartyGraph::from_history(&history);
        assert_eq!(graph.edges().len(), 2);

        let ab = graph.edge(&addr(A), &addr(B)).unwrap();
        assert_eq!(ab.transfer_count, 2);
        assert!((ab.total_value_eth - 3.5).abs() < 1e-12);
        assert_eq!(ab.first_seen, Some(100));
        assert_eq!(ab.last_seen, Some(200));

        assert_eq!(graph.incoming(&addr(B)).len(), 1);
        assert_eq!(graph.outgoing(&addr(B)).len(), 1);
        assert!(graph.incoming(&addr(A)).is_empty());
    }

    #[test]
    fn test_bidirectional_pairs() {
        let history = vec![
            transfer(A, B, 1.0, 1),
            transfer(B, A, 1.0, 2),
            transfer(B, C, 1.0, 3),
        ];
        let graph = CounterpartyGraph::from_history(&history);
        assert_eq!(graph.bidirectional_pairs(), vec![(addr(A), addr(B))]);
    }
}
