pub mod engine;
pub mod verdict;

pub use engine::RiskFusionEngine;
pub use verdict::{
    AddressCheck, AddressRiskReport, AnalysisSummary, BatchAnalysis, MlOnlyResult, RiskVerdict,
    RuleReport,
};
