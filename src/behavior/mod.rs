pub mod analyzer;
pub mod funding;
pub mod velocity;

pub use analyzer::{BehavioralAnalyzer, BehavioralReport};
pub use funding::FundingPatternScore;
pub use velocity::VelocityScore;

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
