use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::registry::BlacklistRegistry;
use crate::tx::TransactionRecord;

/// Rule severity, ordered LOW < MEDIUM < HIGH < CRITICAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Outcome of one rule against one transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub rule_name: String,
    pub is_triggered: bool,
    pub severity: Severity,
    /// Always within [0, 1]; zero when the rule did not trigger.
    pub confidence: f64,
    pub details: String,
    pub indicators: Vec<String>,
}

impl RuleResult {
    pub fn triggered(
        rule: &dyn DetectionRule,
        severity: Severity,
        confidence: f64,
        details: String,
        indicators: Vec<String>,
    ) -> Self {
        Self {
            rule_id: rule.id().to_string(),
            rule_name: rule.name().to_string(),
            is_triggered: true,
            severity,
            confidence: clamp_unit(confidence),
            details,
            indicators,
        }
    }

    /// A non-triggered result carrying the rule's nominal severity.
    pub fn clear(rule: &dyn DetectionRule, details: impl Into<String>) -> Self {
        Self {
            rule_id: rule.id().to_string(),
            rule_name: rule.name().to_string(),
            is_triggered: false,
            severity: rule.severity(),
            confidence: 0.0,
            details: details.into(),
            indicators: Vec::new(),
        }
    }
}

/// Catalogue entry describing a registered rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleDescriptor {
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub description: String,
}

/// Everything a rule may look at. Rules never mutate shared state.
pub struct RuleContext<'a> {
    pub tx: &'a TransactionRecord,
    pub registry: &'a BlacklistRegistry,
    /// Caller-supplied recent transactions; may be empty.
    pub history: &'a [TransactionRecord],
}

/// A single heuristic check. Implementations must be pure functions of the context.
pub trait DetectionRule: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Severity reported when the rule does not trigger, and its usual severity when it does.
    fn severity(&self) -> Severity;

    fn description(&self) -> &str;

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleResult>;

    fn descriptor(&self) -> RuleDescriptor {
        RuleDescriptor {
            rule_id: self.id().to_string(),
            rule_name: self.name().to_string(),
            severity: self.severity(),
            description: self.description().to_string(),
        }
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
