use serde::{Deserialize, Serialize};

use crate::registry::MatchSeverity;
use crate::rules::Severity;

/// Overall risk tier, ordered SAFE < MINIMAL < LOW < MEDIUM < HIGH < CRITICAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Safe,
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Minimal => "MINIMAL",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// Bands for a fused rule score. Only an exact zero is SAFE.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::Critical
        } else if score >= 0.6 {
            Self::High
        } else if score >= 0.4 {
            Self::Medium
        } else if score >= 0.2 {
            Self::Low
        } else if score > 0.0 {
            Self::Minimal
        } else {
            Self::Safe
        }
    }

    /// Bands for a behavioral composite; never SAFE, since absence of history proves nothing.
    pub fn from_behavioral_score(score: f64) -> Self {
        match Self::from_score(score) {
            Self::Safe => Self::Minimal,
            level => level,
        }
    }

    /// Bands for a classifier probability.
    pub fn from_probability(p: f64) -> Self {
        if p >= 0.9 {
            Self::Critical
        } else if p >= 0.7 {
            Self::High
        } else if p >= 0.5 {
            Self::Medium
        } else if p >= 0.3 {
            Self::Low
        } else {
            Self::Minimal
        }
    }
}

impl From<Severity> for RiskLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Low => Self::Low,
            Severity::Medium => Self::Medium,
            Severity::High => Self::High,
            Severity::Critical => Self::Critical,
        }
    }
}

impl From<MatchSeverity> for RiskLevel {
    fn from(severity: MatchSeverity) -> Self {
        match severity {
            MatchSeverity::None => Self::Safe,
            MatchSeverity::Low => Self::Low,
            MatchSeverity::Medium => Self::Medium,
            MatchSeverity::High => Self::High,
            MatchSeverity::Critical => Self::Critical,
        }
    }
}
