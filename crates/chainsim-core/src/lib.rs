use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod chain;
pub mod constants;
pub mod error;
pub mod mine;
pub mod validate;

pub use chain::{BlockView, ChainConfig, ChainStatus, ChainStore, TamperReport};
pub use error::Error;
pub use mine::MineOutcome;
pub use validate::IntegrityReport;

/// An opaque transaction record. The simulator never interprets the
/// payload beyond requiring each record to be a JSON object.
pub type TxRecord = Value;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub block_number: u64,
    pub previous_hash: String,
    pub current_hash: String,
    pub nonce: u64,
    pub transactions: Vec<TxRecord>,
    pub merkle_root: String,
    pub difficulty: u32,
    /// Unix seconds. Rendered as `YYYY-MM-DD HH:MM:SS` wherever the
    /// timestamp enters a hash or leaves the crate.
    pub timestamp: u64,
}

impl Block {
    pub fn serialized_transactions(&self) -> String {
        serialize_transactions(&self.transactions)
    }

    /// Hash of this block's fields as they stand now, which may differ
    /// from `current_hash` if the payload was altered after mining.
    pub fn recomputed_hash(&self) -> String {
        block_hash(
            self.block_number,
            &self.previous_hash,
            &self.serialized_transactions(),
            self.nonce,
            self.timestamp,
        )
    }
}

/// Canonical block digest: SHA-256 over the UTF-8 concatenation of the
/// block number, previous hash, serialized transactions, nonce and the
/// formatted timestamp. Both the miner and the validator go through this
/// one function.
pub fn block_hash(
    block_number: u64,
    previous_hash: &str,
    serialized_transactions: &str,
    nonce: u64,
    timestamp: u64,
) -> String {
    let data = format!(
        "{block_number}{previous_hash}{serialized_transactions}{nonce}{}",
        format_timestamp(timestamp)
    );
    sha256_hex(data.as_bytes())
}

/// Simplified merkle root: a single digest over the serialized
/// transaction list, not a binary hash tree.
pub fn merkle_root(serialized_transactions: &str) -> String {
    sha256_hex(serialized_transactions.as_bytes())
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Deterministic serialization of a transaction list. `serde_json::Map`
/// keeps keys sorted, so identical records always produce identical text.
pub fn serialize_transactions(txs: &[TxRecord]) -> String {
    serde_json::to_string(txs).expect("JSON values always serialize")
}

pub fn count_leading_zero_digits(hash: &str) -> u32 {
    hash.bytes().take_while(|b| *b == b'0').count() as u32
}

pub fn format_timestamp(secs: u64) -> String {
    let dt = DateTime::<Utc>::from_timestamp(secs as i64, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs()
}
