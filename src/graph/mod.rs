pub mod cluster;
pub mod edges;

pub use edges::{CounterpartyGraph, GraphEdge};
