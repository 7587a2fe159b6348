//! Synthetic identifiers and merchant categories.
//!
//! Identifiers come only from stream bytes, never from names or customer records.

use uuid::Uuid;

use super::stream::{DeterministicStream, Lane};

/// Everyday merchant category codes used for normal rows.
pub const NORMAL_MCCS: [&str; 10] = [
    "5411", // grocery
    "5812", // restaurants
    "5912", // pharmacies
    "5311", // department stores
    "5734", // software
    "4814", // telecom
    "5541", // fuel
    "7011", // lodging
    "4511", // airlines
    "5999", // misc retail
];

/// High-risk codes substituted by the merchant-swap pattern.
pub const HIGH_RISK_MCCS: [&str; 5] = [
    "6051", // quasi-cash
    "7995", // gambling
    "4829", // money transfer
    "5944", // jewellery
    "5732", // electronics
];

/// Random (version 4) UUID built from the row's stream bytes.
pub fn transaction_id(stream: &DeterministicStream, index: u64) -> Uuid {
    uuid::Builder::from_random_bytes(stream.bytes(index, Lane::TransactionId)).into_uuid()
}

/// Slot in the account pool for a normal row.
pub fn account_slot(stream: &DeterministicStream, index: u64, pool_size: u64) -> u64 {
    stream.below(index, Lane::Account, pool_size)
}

/// Stable account identifier for a pool slot.
pub fn account_id(stream: &DeterministicStream, slot: u64) -> String {
    let bytes = stream.bytes(slot, Lane::AccountId);
    format!("ACC-{}", hex::encode_upper(&bytes[..6]))
}

pub fn normal_mcc(stream: &DeterministicStream, index: u64) -> &'static str {
    NORMAL_MCCS[stream.below(index, Lane::Merchant, NORMAL_MCCS.len() as u64) as usize]
}

pub fn high_risk_mcc(stream: &DeterministicStream, index: u64) -> &'static str {
    HIGH_RISK_MCCS[stream.below(index, Lane::Merchant, HIGH_RISK_MCCS.len() as u64) as usize]
}
