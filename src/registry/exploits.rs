use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};
use crate::tx::Address;

/// A documented historical exploit and the addresses attributed to its attacker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnownExploit {
    pub id: String,
    pub name: String,
    pub date: NaiveDate,
    pub chain: String,
    pub protocol: String,
    pub loss_usd: u64,
    pub attack_type: String,
    pub attack_vector: String,
    pub attacker_addresses: Vec<Address>,
}

/// Optional filters for listing exploits. Matching is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct ExploitFilter {
    pub chain: Option<String>,
    pub attack_type: Option<String>,
}

impl ExploitFilter {
    pub fn matches(&self, exploit: &KnownExploit) -> bool {
        let chain_ok = self
            .chain
            .as_deref()
            .map_or(true, |c| exploit.chain.eq_ignore_ascii_case(c));
        let type_ok = self
            .attack_type
            .as_deref()
            .map_or(true, |t| exploit.attack_type.eq_ignore_ascii_case(t));
        chain_ok && type_ok
    }
}

/// Parse an exploit catalogue (JSON array). `source` names the input in errors.
pub fn parse_exploits_json(content: &str, source: &str) -> Result<Vec<KnownExploit>> {
    serde_json::from_str(content).map_err(|e| {
        RiskError::configuration(format!("Failed to parse exploit catalogue '{}': {}", source, e))
    })
}

/// Read and parse an exploit catalogue file.
pub fn load_exploits_file(path: &str) -> Result<Vec<KnownExploit>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RiskError::configuration(format!("Failed to read exploit catalogue '{}': {}", path, e))
    })?;
    let exploits = parse_exploits_json(&content, path)?;
    tracing::info!(exploits = exploits.len(), path, "Parsed exploit catalogue");
    Ok(exploits)
}
