pub mod behavior;
pub mod config;
pub mod error;
pub mod fusion;
pub mod graph;
pub mod ingest;
pub mod level;
pub mod ml;
pub mod pipeline;
pub mod registry;
pub mod rules;
pub mod tx;

pub use error::{Result, RiskError};
pub use level::RiskLevel;
pub use pipeline::RiskPipeline;
