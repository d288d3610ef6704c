use std::fmt;
use std::str::FromStr;

use alloy::primitives::Address as RawAddress;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, RiskError};

/// A 20-byte account address. Parsed once; compares and hashes on bytes,
/// so two spellings of the same address are always equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(RawAddress);

impl Address {
    pub const ZERO: Address = Address(RawAddress::ZERO);

    /// Parse `0x` + 40 hex characters, ignoring case.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if !trimmed.starts_with("0x") || trimmed.len() != 42 {
            return Err(RiskError::validation(format!(
                "invalid address '{}': expected 0x followed by 40 hex characters",
                input
            )));
        }
        RawAddress::from_str(trimmed)
            .map(Self)
            .map_err(|e| RiskError::validation(format!("invalid address '{}': {}", input, e)))
    }

    /// Like [`Address::parse`], but a mixed-case body must carry a valid
    /// EIP-55 checksum. All-lowercase and all-uppercase bodies are accepted.
    pub fn parse_checksummed(input: &str) -> Result<Self> {
        let parsed = Self::parse(input)?;
        let body = &input.trim()[2..];
        let is_lower = body == body.to_ascii_lowercase();
        let is_upper = body == body.to_ascii_uppercase();
        if is_lower || is_upper {
            return Ok(parsed);
        }
        RawAddress::parse_checksummed(input.trim(), None)
            .map(Self)
            .map_err(|e| RiskError::validation(format!("bad checksum for '{}': {}", input, e)))
    }

    /// EIP-55 mixed-case rendering.
    pub fn checksummed(&self) -> String {
        self.0.to_checksum(None)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == RawAddress::ZERO
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_slice()))
    }
}

impl FromStr for Address {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EULER_ATTACKER: &str = "0xb66cd966670d962C227B3EABA30a872DbFb995db";

    #[test]
    fn test_parse_normalizes_to_lowercase() {
        let addr = Address::parse(EULER_ATTACKER).unwrap();
        assert_eq!(addr.to_string(), EULER_ATTACKER.to_lowercase());
        assert_eq!(addr, Address::parse(&EULER_ATTACKER.to_lowercase()).unwrap());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Address::parse("").is_err());
        assert!(Address::parse("b66cd966670d962c227b3eaba30a872dbfb995db").is_err());
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("0xzz6cd966670d962c227b3eaba30a872dbfb995db").is_err());
    }

    #[test]
    fn test_checksum_round_trip() {
        let addr = Address::parse(&EULER_ATTACKER.to_lowercase()).unwrap();
        let checksummed = addr.checksummed();
        assert_eq!(Address::parse_checksummed(&checksummed).unwrap(), addr);
    }

    #[test]
    fn test_parse_checksummed_rejects_bad_mixed_case() {
        // Flip the case of one letter in a valid checksum
        let bad = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".replace("A0b", "A0B");
        assert!(Address::parse_checksummed(&bad).is_err());
        // All-lowercase is accepted without a checksum
        assert!(Address::parse_checksummed(&bad.to_lowercase()).is_ok());
    }

    #[test]
    fn test_zero_address() {
        let zero = Address::parse("0x0000000000000000000000000000000000000000").unwrap();
        assert!(zero.is_zero());
        assert_eq!(zero, Address::ZERO);
    }

    #[test]
    fn test_serde_as_lowercase_string() {
        let addr: Address = serde_json::from_str(&format!("\"{}\"", EULER_ATTACKER)).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", EULER_ATTACKER.to_lowercase()));
    }
}
