use chrono::{DateTime, SecondsFormat};
use serde::Serialize;

use super::difficulty::{DifficultyMetrics, SignPolicy};
use super::framer::RawBlockRecord;
use super::header::{BlockHeader, CompactTarget};
use crate::error::Result;

/// A decoded block as handed to storage or serialization.
#[derive(Debug, Clone, Serialize)]
pub struct BlockRecord {
    pub index: usize,
    pub hash: String,
    pub size: usize,
    pub transaction_count: Option<u64>,
    pub version: u32,
    pub previous_hash: String,
    pub merkle_root: String,
    pub timestamp: u32,
    pub time: Option<String>, // RFC 3339, UTC
    pub bits: CompactTarget,
    pub nbits: u32,
    pub target: String,
    pub pdifficulty: String,
    pub bdifficulty: String,
    pub nonce: u32,
}

impl BlockRecord {
    /// Decode one framed record. All-or-nothing: any failure yields no record.
    pub fn from_raw(raw: &RawBlockRecord, policy: SignPolicy) -> Result<Self> {
        let (header, payload) = BlockHeader::split(&raw.data)?;
        let metrics = DifficultyMetrics::from_bits(&header.bits, policy)?;
        Ok(Self::new(raw.index, raw.len(), &header, payload, &metrics))
    }

    pub fn new(
        index: usize,
        size: usize,
        header: &BlockHeader,
        payload: &[u8],
        metrics: &DifficultyMetrics,
    ) -> Self {
        Self {
            index,
            hash: hex::encode(header.hash()),
            size,
            transaction_count: read_compact_size(payload),
            version: header.version,
            previous_hash: hex::encode(header.previous_hash),
            merkle_root: hex::encode(header.merkle_root),
            timestamp: header.timestamp,
            time: DateTime::from_timestamp(i64::from(header.timestamp), 0)
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            bits: header.bits,
            nbits: header.bits.to_u32(),
            target: metrics.target_hex(),
            pdifficulty: metrics.pdifficulty_string(),
            bdifficulty: metrics.bdifficulty_string(),
            nonce: header.nonce,
        }
    }
}

/// Read the CompactSize integer that opens the payload (the transaction count).
/// `None` when the payload is too short to hold it.
pub fn read_compact_size(payload: &[u8]) -> Option<u64> {
    let (&prefix, rest) = payload.split_first()?;
    let width = match prefix {
        0xfd => 2,
        0xfe => 4,
        0xff => 8,
        n => return Some(u64::from(n)),
    };
    let bytes = rest.get(..width)?;
    let mut buf = [0u8; 8];
    buf[..width].copy_from_slice(bytes);
    Some(u64::from_le_bytes(buf))
}
