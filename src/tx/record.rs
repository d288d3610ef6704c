use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::Address;
use crate::error::{Result, RiskError};

/// Transaction as handed over by collectors (JSON body or CSV row).
/// Nothing here is trusted until it is converted into a [`TransactionRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub tx_hash: Option<String>,
    pub from_address: String,
    pub to_address: String,
    pub value_eth: f64,
    #[serde(default = "default_gas_used")]
    pub gas_used: u64,
    #[serde(default = "default_gas_price_gwei")]
    pub gas_price_gwei: f64,
    #[serde(default)]
    pub block_number: Option<u64>,
    /// Unix seconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub is_flash_loan: bool,
}

fn default_gas_used() -> u64 {
    500_000
}

fn default_gas_price_gwei() -> f64 {
    30.0
}

impl RawTransaction {
    /// A plain transfer with collector defaults for everything else.
    pub fn new(from_address: &str, to_address: &str, value_eth: f64) -> Self {
        Self {
            tx_hash: None,
            from_address: from_address.to_string(),
            to_address: to_address.to_string(),
            value_eth,
            gas_used: default_gas_used(),
            gas_price_gwei: default_gas_price_gwei(),
            block_number: None,
            timestamp: None,
            is_flash_loan: false,
        }
    }
}

/// A validated transaction. Addresses are normalized, numeric fields are
/// finite and non-negative, and the hash (if any) is 32 bytes of hex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTransaction")]
pub struct TransactionRecord {
    tx_hash: Option<String>,
    from_address: Address,
    to_address: Address,
    value_eth: f64,
    gas_used: u64,
    gas_price_gwei: f64,
    block_number: Option<u64>,
    timestamp: Option<i64>,
    is_flash_loan: bool,
}

impl TryFrom<RawTransaction> for TransactionRecord {
    type Error = RiskError;

    fn try_from(raw: RawTransaction) -> Result<Self> {
        let tx_hash = match raw.tx_hash.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(hash) => Some(normalize_tx_hash(hash)?),
        };
        let from_address = Address::parse(&raw.from_address)?;
        let to_address = Address::parse(&raw.to_address)?;
        check_amount("value_eth", raw.value_eth)?;
        check_amount("gas_price_gwei", raw.gas_price_gwei)?;
        if let Some(ts) = raw.timestamp {
            check_timestamp(ts)?;
        }

        Ok(Self {
            tx_hash,
            from_address,
            to_address,
            value_eth: raw.value_eth,
            gas_used: raw.gas_used,
            gas_price_gwei: raw.gas_price_gwei,
            block_number: raw.block_number,
            timestamp: raw.timestamp,
            is_flash_loan: raw.is_flash_loan,
        })
    }
}

/// Unix seconds from the epoch up to the last instant chrono can represent.
fn check_timestamp(ts: i64) -> Result<()> {
    let max = DateTime::<Utc>::MAX_UTC.timestamp();
    if !(0..=max).contains(&ts) {
        return Err(RiskError::validation(format!(
            "timestamp {} is outside 0..={}",
            ts, max
        )));
    }
    Ok(())
}

fn check_amount(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(RiskError::validation(format!("{} must be finite, got {}", field, value)));
    }
    if value < 0.0 {
        return Err(RiskError::validation(format!("{} must be non-negative, got {}", field, value)));
    }
    Ok(())
}

fn normalize_tx_hash(hash: &str) -> Result<String> {
    let body = hash
        .strip_prefix("0x")
        .ok_or_else(|| RiskError::validation(format!("tx_hash '{}' must start with 0x", hash)))?;
    let bytes = hex::decode(body)
        .map_err(|e| RiskError::validation(format!("tx_hash '{}' is not hex: {}", hash, e)))?;
    if bytes.len() != 32 {
        return Err(RiskError::validation(format!(
            "tx_hash '{}' must be 32 bytes, got {}",
            hash,
            bytes.len()
        )));
    }
    Ok(format!("0x{}", hex::encode(bytes)))
}

impl TransactionRecord {
    pub fn tx_hash(&self) -> Option<&str> {
        self.tx_hash.as_deref()
    }

    pub fn from_address(&self) -> &Address {
        &self.from_address
    }

    pub fn to_address(&self) -> &Address {
        &self.to_address
    }

    pub fn value_eth(&self) -> f64 {
        self.value_eth
    }

    pub fn gas_used(&self) -> u64 {
        self.gas_used
    }

    pub fn gas_price_gwei(&self) -> f64 {
        self.gas_price_gwei
    }

    pub fn block_number(&self) -> Option<u64> {
        self.block_number
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    pub fn is_flash_loan(&self) -> bool {
        self.is_flash_loan
    }

    /// Gas cost in ETH (gas_used × gas price in gwei ÷ 1e9).
    pub fn gas_cost_eth(&self) -> f64 {
        self.gas_used as f64 * self.gas_price_gwei / 1e9
    }

    /// True when the address is the sender or the recipient.
    pub fn involves(&self, address: &Address) -> bool {
        self.from_address == *address || self.to_address == *address
    }
}
