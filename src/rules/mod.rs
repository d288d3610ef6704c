pub mod engine;
pub mod signatures;
pub mod types;

pub use engine::SignatureRuleEngine;
pub use types::{DetectionRule, RuleContext, RuleDescriptor, RuleResult, Severity};
