use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::exploits::{self, ExploitFilter, KnownExploit};
use super::sanctions::{self, SanctionEntry};
use crate::config::RegistryConfig;
use crate::error::{Result, RiskError};
use crate::tx::Address;

const BUILTIN_EXPLOITS: &str = include_str!("../../data/known_exploits.json");
const BUILTIN_SANCTIONS: &str = include_str!("../../data/sanctions.csv");

/// Tornado Cash routers and pools.
const BUILTIN_MIXERS: &[&str] = &[
    "0xd90e2f925da726b50c4ed8d0fb90ad053324f31b",
    "0x722122df12d4e14e13ac3b6895a86e84145b6967",
];

/// Binance, Coinbase and OKX hot wallets.
const BUILTIN_EXCHANGES: &[&str] = &[
    "0x28c6c06298d514db089934071355e5743bf21d60",
    "0x21a31ee1afc51d94c2efccaa2092ad1028285549",
    "0xdfd5293d8e347dfe59e90efd55b2956a1343963d",
    "0x71660c4005ba85c37ccec55d0c4493e66fe775d3",
];

/// Severity of a blacklist match, ordered NONE < LOW < MEDIUM < HIGH < CRITICAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchSeverity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl MatchSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskCategory {
    Sanctioned,
    Mixer,
}

/// Result of looking an address up in the known-attacker set.
#[derive(Debug, Clone, Serialize)]
pub struct AttackerCheck {
    pub address: Address,
    pub is_known_attacker: bool,
    /// First exploit the address is attributed to.
    pub exploit_info: Option<KnownExploit>,
    pub matched_exploits: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct BlacklistMatches {
    pub ofac_sanctioned: bool,
    pub known_mixers: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExternalBlacklistCheck {
    pub address: Address,
    pub is_blacklisted: bool,
    pub severity: MatchSeverity,
    pub risk_category: Option<RiskCategory>,
    pub blacklist_matches: BlacklistMatches,
    pub sanction: Option<SanctionEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComprehensiveAddressRisk {
    pub address: Address,
    pub is_high_risk: bool,
    pub overall_severity: MatchSeverity,
    pub internal_check: AttackerCheck,
    pub external_check: ExternalBlacklistCheck,
}

/// Static, read-only address sets loaded once at startup and shared behind an `Arc`.
/// The sets may overlap (an exploiter can also be sanctioned).
#[derive(Debug, Default)]
pub struct BlacklistRegistry {
    exploits: Vec<KnownExploit>,
    attackers: HashMap<Address, Vec<usize>>,
    sanctions: Vec<SanctionEntry>,
    sanctioned: HashMap<Address, usize>,
    mixers: HashSet<Address>,
    exchanges: HashSet<Address>,
}

impl BlacklistRegistry {
    /// Build the registry from config: built-in data (unless disabled) plus any extra files.
    pub fn load(config: &RegistryConfig) -> Result<Self> {
        let mut registry = Self::default();

        if config.use_builtin {
            registry.add_exploits(exploits::parse_exploits_json(BUILTIN_EXPLOITS, "builtin")?);
            registry.add_sanctions(sanctions::parse_sanctions_reader(
                BUILTIN_SANCTIONS.as_bytes(),
                "builtin",
            )?);
            for addr in BUILTIN_MIXERS {
                registry.add_mixer(Address::parse(addr)?);
            }
            for addr in BUILTIN_EXCHANGES {
                registry.add_exchange(Address::parse(addr)?);
            }
        }

        if let Some(path) = &config.exploits_path {
            registry.add_exploits(exploits::load_exploits_file(path)?);
        }
        if let Some(path) = &config.sanctions_csv_path {
            registry.add_sanctions(sanctions::parse_sanctions_csv(path)?);
        }
        for addr in &config.extra_mixers {
            registry.add_mixer(Address::parse(addr).map_err(|e| {
                RiskError::configuration(format!("registry.extra_mixers: {}", e))
            })?);
        }
        for addr in &config.extra_exchanges {
            registry.add_exchange(Address::parse(addr).map_err(|e| {
                RiskError::configuration(format!("registry.extra_exchanges: {}", e))
            })?);
        }

        if registry.attacker_count() == 0 {
            return Err(RiskError::configuration(
                "blacklist registry has no known-attacker entries",
            ));
        }

        tracing::info!(
            exploits = registry.exploits.len(),
            attackers = registry.attackers.len(),
            sanctioned = registry.sanctioned.len(),
            mixers = registry.mixers.len(),
            exchanges = registry.exchanges.len(),
            "Loaded blacklist registry"
        );
        Ok(registry)
    }

    /// The data compiled into the binary, with nothing else merged in.
    pub fn builtin() -> Result<Self> {
        Self::load(&RegistryConfig::default())
    }

    pub fn add_exploits(&mut self, exploits: Vec<KnownExploit>) {
        for exploit in exploits {
            let idx = self.exploits.len();
            for addr in &exploit.attacker_addresses {
                let indexes = self.attackers.entry(*addr).or_default();
                if !indexes.contains(&idx) {
                    indexes.push(idx);
                }
            }
            self.exploits.push(exploit);
        }
    }

    pub fn add_sanctions(&mut self, entries: Vec<SanctionEntry>) {
        for entry in entries {
            let idx = self.sanctions.len();
            for addr in &entry.addresses {
                self.sanctioned.entry(*addr).or_insert(idx);
            }
            self.sanctions.push(entry);
        }
    }

    pub fn add_mixer(&mut self, address: Address) {
        self.mixers.insert(address);
    }

    pub fn add_exchange(&mut self, address: Address) {
        self.exchanges.insert(address);
    }

    pub fn attacker_count(&self) -> usize {
        self.attackers.len()
    }

    pub fn exploit_count(&self) -> usize {
        self.exploits.len()
    }

    pub fn sanctioned_count(&self) -> usize {
        self.sanctioned.len()
    }

    pub fn mixer_count(&self) -> usize {
        self.mixers.len()
    }

    pub fn is_known_attacker(&self, address: &Address) -> bool {
        self.attackers.contains_key(address)
    }

    pub fn is_sanctioned(&self, address: &Address) -> bool {
        self.sanctioned.contains_key(address)
    }

    pub fn is_mixer(&self, address: &Address) -> bool {
        self.mixers.contains(address)
    }

    pub fn is_exchange(&self, address: &Address) -> bool {
        self.exchanges.contains(address)
    }

    /// Exploits attributed to an address, in catalogue order.
    pub fn exploits_for(&self, address: &Address) -> Vec<&KnownExploit> {
        self.attackers
            .get(address)
            .map(|idxs| idxs.iter().map(|&i| &self.exploits[i]).collect())
            .unwrap_or_default()
    }

    pub fn check_address(&self, address: &Address) -> AttackerCheck {
        let matched = self.exploits_for(address);
        AttackerCheck {
            address: *address,
            is_known_attacker: !matched.is_empty(),
            exploit_info: matched.first().map(|e| (*e).clone()),
            matched_exploits: matched.iter().map(|e| e.name.clone()).collect(),
        }
    }

    /// Sanctions and mixer lookups. A sanctioned hit outranks a mixer hit.
    pub fn check_external_blacklists(&self, address: &Address) -> ExternalBlacklistCheck {
        let sanction = self.sanctioned.get(address).map(|&i| self.sanctions[i].clone());
        let matches = BlacklistMatches {
            ofac_sanctioned: sanction.is_some(),
            known_mixers: self.is_mixer(address),
        };

        let (severity, risk_category) = if matches.ofac_sanctioned {
            (MatchSeverity::Critical, Some(RiskCategory::Sanctioned))
        } else if matches.known_mixers {
            (MatchSeverity::High, Some(RiskCategory::Mixer))
        } else {
            (MatchSeverity::None, None)
        };

        ExternalBlacklistCheck {
            address: *address,
            is_blacklisted: risk_category.is_some(),
            severity,
            risk_category,
            blacklist_matches: matches,
            sanction,
        }
    }

    pub fn get_comprehensive_address_risk(&self, address: &Address) -> ComprehensiveAddressRisk {
        let internal_check = self.check_address(address);
        let external_check = self.check_external_blacklists(address);

        let internal_severity = if internal_check.is_known_attacker {
            MatchSeverity::Critical
        } else {
            MatchSeverity::None
        };
        let overall_severity = internal_severity.max(external_check.severity);

        ComprehensiveAddressRisk {
            address: *address,
            is_high_risk: overall_severity >= MatchSeverity::High,
            overall_severity,
            internal_check,
            external_check,
        }
    }

    /// String entry point for callers holding unvalidated input. Malformed
    /// addresses are rejected rather than reported as clean.
    pub fn lookup(&self, address: &str) -> Result<ComprehensiveAddressRisk> {
        let address = Address::parse(address)?;
        Ok(self.get_comprehensive_address_risk(&address))
    }

    pub fn known_exploits(&self, filter: &ExploitFilter) -> Vec<&KnownExploit> {
        self.exploits.iter().filter(|e| filter.matches(e)).collect()
    }

    pub fn exploit(&self, id: &str) -> Option<&KnownExploit> {
        self.exploits.iter().find(|e| e.id == id)
    }
}
