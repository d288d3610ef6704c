use std::collections::HashMap;

use crate::tx::Address;

use super::edges::CounterpartyGraph;

/// Union-Find data structure for counterparty clustering.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]); // path compression
        }
        self.parent[x]
    }

    fn union(&mut self, x: usize, y: usize) {
        let rx = self.find(x);
        let ry = self.find(y);
        if rx == ry {
            return;
        }
        // Union by rank
        if self.rank[rx] < self.rank[ry] {
            self.parent[rx] = ry;
        } else if self.rank[rx] > self.rank[ry] {
            self.parent[ry] = rx;
        } else {
            self.parent[ry] = rx;
            self.rank[rx] += 1;
        }
    }
}

/// Group addresses joined by bidirectional edges (A sent to B and B sent to A),
/// which suggests common control. Each cluster is sorted; clusters are ordered
/// by their smallest member. Addresses without a bidirectional edge are omitted.
pub fn clusters(graph: &CounterpartyGraph) -> Vec<Vec<Address>> {
    let pairs = graph.bidirectional_pairs();
    if pairs.is_empty() {
        return Vec::new();
    }

    let mut address_to_idx: HashMap<Address, usize> = HashMap::new();
    let mut idx_to_address: Vec<Address> = Vec::new();
    for (a, b) in &pairs {
        for addr in [a, b] {
            if !address_to_idx.contains_key(addr) {
                address_to_idx.insert(*addr, idx_to_address.len());
                idx_to_address.push(*addr);
            }
        }
    }

    let mut uf = UnionFind::new(idx_to_address.len());
    for (a, b) in &pairs {
        uf.union(address_to_idx[a], address_to_idx[b]);
    }

    let mut by_root: HashMap<usize, Vec<Address>> = HashMap::new();
    for (idx, address) in idx_to_address.iter().enumerate() {
        let root = uf.find(idx);
        by_root.entry(root).or_default().push(*address);
    }

    let mut result: Vec<Vec<Address>> = by_root
        .into_values()
        .map(|mut members| {
            members.sort();
            members
        })
        .collect();
    result.sort();
    tracing::debug!(clusters = result.len(), pairs = pairs.len(), "Clustered counterparties");
    result
}

/// The other members of the cluster containing `address`, if any.
pub fn cluster_of(graph: &CounterpartyGraph, address: &Address) -> Vec<Address> {
    clusters(graph)
        .into_iter()
        .find(|members| members.contains(address))
        .map(|members| members.into_iter().filter(|a| a != address).collect())
        .unwrap_or_default()
}
