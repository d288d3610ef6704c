use std::collections::HashMap;
use std::io::Read;

use serde::Serialize;

use crate::error::{Result, RiskError};
use crate::tx::Address;

/// A sanctioned entity with its crypto addresses.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SanctionEntry {
    pub sdn_id: String,
    pub entity_name: String,
    pub program: String,
    pub addresses: Vec<Address>,
}

/// Parse a sanctions CSV file (simplified OFAC SDN format).
/// Expected CSV columns: sdn_id, entity_name, program, address
/// Each row represents one crypto address for one SDN entry.
pub fn parse_sanctions_csv(path: &str) -> Result<Vec<SanctionEntry>> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| {
            RiskError::configuration(format!("Failed to open sanctions CSV '{}': {}", path, e))
        })?;
    read_sanctions(reader, path)
}

/// Parse sanctions rows from any reader; `source` names the input in errors.
pub fn parse_sanctions_reader<R: Read>(input: R, source: &str) -> Result<Vec<SanctionEntry>> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);
    read_sanctions(reader, source)
}

fn read_sanctions<R: Read>(mut reader: csv::Reader<R>, source: &str) -> Result<Vec<SanctionEntry>> {
    let mut entries: Vec<SanctionEntry> = Vec::new();
    let mut by_sdn: HashMap<String, usize> = HashMap::new();

    for result in reader.records() {
        let record = result.map_err(|e| {
            RiskError::configuration(format!("Failed to read sanctions CSV '{}': {}", source, e))
        })?;
        let sdn_id = record.get(0).unwrap_or("").trim().to_string();
        let entity_name = record.get(1).unwrap_or("").trim().to_string();
        let program = record.get(2).unwrap_or("").trim().to_string();
        let raw_address = record.get(3).unwrap_or("").trim();

        // Non-EVM addresses share the list; only 0x entries apply here
        if raw_address.is_empty() || !raw_address.starts_with("0x") {
            continue;
        }
        let address = match Address::parse(raw_address) {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(
                    address = raw_address,
                    error = %e,
                    "Invalid address in sanctions list, skipping"
                );
                continue;
            }
        };

        let idx = *by_sdn.entry(sdn_id.clone()).or_insert_with(|| {
            entries.push(SanctionEntry {
                sdn_id,
                entity_name,
                program,
                addresses: Vec::new(),
            });
            entries.len() - 1
        });
        entries[idx].addresses.push(address);
    }

    tracing::info!(entries = entries.len(), source, "Parsed sanctions entries");
    Ok(entries)
}
