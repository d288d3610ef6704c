use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};
use crate::ml::LabeledTransaction;
use crate::tx::{RawTransaction, TransactionRecord};

/// A row that failed validation. Its neighbours are still loaded.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedRow {
    /// Zero-based position in the input.
    pub index: usize,
    pub error: String,
}

/// Validated transactions plus the rows that were dropped.
#[derive(Debug)]
pub struct Ingested<T> {
    pub records: Vec<T>,
    pub rejected: Vec<RejectedRow>,
}

impl<T> Default for Ingested<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> Ingested<T> {
    fn push(&mut self, index: usize, row: Result<T>) {
        match row {
            Ok(record) => self.records.push(record),
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping invalid transaction row");
                self.rejected.push(RejectedRow {
                    index,
                    error: e.to_string(),
                });
            }
        }
    }
}

/// CSV columns. Blank cells fall back to the collector defaults.
#[derive(Debug, Deserialize)]
struct CsvRow {
    tx_hash: Option<String>,
    from_address: String,
    to_address: String,
    value_eth: f64,
    gas_used: Option<u64>,
    gas_price_gwei: Option<f64>,
    block_number: Option<u64>,
    timestamp: Option<i64>,
    is_flash_loan: Option<bool>,
    is_malicious: Option<u8>,
}

impl CsvRow {
    fn into_raw(self) -> RawTransaction {
        let mut raw = RawTransaction::new(&self.from_address, &self.to_address, self.value_eth);
        raw.tx_hash = self.tx_hash;
        if let Some(gas_used) = self.gas_used {
            raw.gas_used = gas_used;
        }
        if let Some(gas_price) = self.gas_price_gwei {
            raw.gas_price_gwei = gas_price;
        }
        raw.block_number = self.block_number;
        raw.timestamp = self.timestamp;
        raw.is_flash_loan = self.is_flash_loan.unwrap_or(false);
        raw
    }
}

/// A single transaction object from JSON.
pub fn read_transaction_json(path: &str) -> Result<TransactionRecord> {
    let content = read_file(path)?;
    let raw: RawTransaction = serde_json::from_str(&content)
        .map_err(|e| RiskError::validation(format!("Failed to parse transaction '{}': {}", path, e)))?;
    TransactionRecord::try_from(raw)
}

/// A JSON array of transaction objects.
pub fn read_transactions_json(path: &str) -> Result<Ingested<TransactionRecord>> {
    let content = read_file(path)?;
    let rows: Vec<serde_json::Value> = serde_json::from_str(&content).map_err(|e| {
        RiskError::validation(format!("Failed to parse transactions '{}': {}", path, e))
    })?;

    let mut ingested = Ingested::default();
    for (index, value) in rows.into_iter().enumerate() {
        let row = serde_json::from_value::<RawTransaction>(value)
            .map_err(|e| RiskError::validation(e.to_string()))
            .and_then(TransactionRecord::try_from);
        ingested.push(index, row);
    }
    tracing::info!(
        path,
        loaded = ingested.records.len(),
        rejected = ingested.rejected.len(),
        "Read transactions"
    );
    Ok(ingested)
}

/// CSV with a header row naming transaction fields. Unknown columns are ignored.
pub fn read_transactions_csv(path: &str) -> Result<Ingested<TransactionRecord>> {
    let file = open_file(path)?;
    let ingested = read_transactions_reader(file)?;
    tracing::info!(
        path,
        loaded = ingested.records.len(),
        rejected = ingested.rejected.len(),
        "Read transactions"
    );
    Ok(ingested)
}

pub fn read_transactions_reader<R: Read>(input: R) -> Result<Ingested<TransactionRecord>> {
    let mut reader = csv_reader(input);
    let mut ingested = Ingested::default();
    for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row
            .map_err(|e| RiskError::validation(e.to_string()))
            .and_then(|row| TransactionRecord::try_from(row.into_raw()));
        ingested.push(index, row);
    }
    Ok(ingested)
}

/// Training CSV: transaction columns plus `is_malicious` (0 or 1).
pub fn read_labeled_csv(path: &str) -> Result<Ingested<LabeledTransaction>> {
    let file = open_file(path)?;
    let ingested = read_labeled_reader(file)?;
    tracing::info!(
        path,
        loaded = ingested.records.len(),
        rejected = ingested.rejected.len(),
        "Read labeled transactions"
    );
    Ok(ingested)
}

pub fn read_labeled_reader<R: Read>(input: R) -> Result<Ingested<LabeledTransaction>> {
    let mut reader = csv_reader(input);
    let mut ingested = Ingested::default();
    for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row
            .map_err(|e| RiskError::validation(e.to_string()))
            .and_then(|row| {
                let is_malicious = match row.is_malicious {
                    Some(0) => false,
                    Some(1) => true,
                    other => {
                        return Err(RiskError::validation(format!(
                            "is_malicious must be 0 or 1, got {:?}",
                            other
                        )))
                    }
                };
                Ok(LabeledTransaction {
                    tx: TransactionRecord::try_from(row.into_raw())?,
                    is_malicious,
                })
            });
        ingested.push(index, row);
    }
    Ok(ingested)
}

/// Dispatch on extension: `.csv` is CSV, anything else is a JSON array.
pub fn read_transactions(path: &str) -> Result<Ingested<TransactionRecord>> {
    let is_csv = Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        read_transactions_csv(path)
    } else {
        read_transactions_json(path)
    }
}

fn csv_reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input)
}

fn open_file(path: &str) -> Result<std::fs::File> {
    std::fs::File::open(path)
        .map_err(|e| RiskError::configuration(format!("Failed to open '{}': {}", path, e)))
}

fn read_file(path: &str) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| RiskError::configuration(format!("Failed to read '{}': {}", path, e)))
}
