use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::HEADER_SIZE;
use crate::error::{ParseError, Result};

/// Compact difficulty bits exactly as they sit in the header (little-endian).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompactTarget(pub [u8; 4]);

impl CompactTarget {
    /// Most significant byte of the encoding: the base-256 exponent.
    pub fn exponent(&self) -> u8 {
        self.0[3]
    }

    /// The three low bytes as an unsigned integer. The sign bit is kept as a
    /// magnitude bit, matching `compute_target`.
    pub fn mantissa(&self) -> u32 {
        self.to_u32() & 0x00ff_ffff
    }

    /// Whether the encoding's sign bit (0x00800000) is set.
    pub fn is_negative(&self) -> bool {
        self.0[2] & 0x80 != 0
    }

    /// The bits as the usual `nBits` integer, e.g. `0x1d00ffff`.
    pub fn to_u32(&self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<u32> for CompactTarget {
    fn from(bits: u32) -> Self {
        Self(bits.to_le_bytes())
    }
}

impl Serialize for CompactTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

/// The fixed 80-byte block header. Hashes keep their wire byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u32,
    pub previous_hash: [u8; 32],
    pub merkle_root: [u8; 32],
    pub timestamp: u32, // seconds since epoch, producer's clock
    pub bits: CompactTarget,
    pub nonce: u32,
}

impl BlockHeader {
    /// Decode the header from the first 80 bytes of a raw block.
    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::split(data).map(|(header, _)| header)
    }

    /// Decode the header and return it with the payload (bytes 80..).
    pub fn split(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < HEADER_SIZE {
            return Err(ParseError::TruncatedHeader { len: data.len() });
        }
        let (raw, payload) = data.split_at(HEADER_SIZE);

        let header = Self {
            version: u32::from_le_bytes(array(&raw[0..4])),
            previous_hash: array(&raw[4..36]),
            merkle_root: array(&raw[36..68]),
            timestamp: u32::from_le_bytes(array(&raw[68..72])),
            bits: CompactTarget(array(&raw[72..76])),
            nonce: u32::from_le_bytes(array(&raw[76..80])),
        };
        Ok((header, payload))
    }

    /// Encode the header back into its 80 wire bytes.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(&self.previous_hash);
        out[36..68].copy_from_slice(&self.merkle_root);
        out[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        out[72..76].copy_from_slice(self.bits.as_bytes());
        out[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// Double SHA-256 of the encoded header, in wire byte order.
    /// Equals the `previous_hash` of the next block.
    pub fn hash(&self) -> [u8; 32] {
        let first = Sha256::digest(self.encode());
        let second = Sha256::digest(first);
        let mut out = [0u8; 32];
        out.copy_from_slice(&second);
        out
    }
}

// Callers always pass a slice of exactly N bytes.
fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // Mainnet genesis header.
    const GENESIS_HEADER: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c";

    fn genesis_bytes() -> Vec<u8> {
        hex::decode(GENESIS_HEADER).unwrap()
    }

    #[test]
    fn decodes_genesis_fields() {
        let header = BlockHeader::decode(&genesis_bytes()).unwrap();
        assert_eq!(header.version, 1);
        assert_eq!(header.previous_hash, [0u8; 32]);
        assert_eq!(
            hex::encode(header.merkle_root),
            "3ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a"
        );
        assert_eq!(header.timestamp, 1231006505);
        assert_eq!(header.bits.as_bytes(), &[0xff, 0xff, 0x00, 0x1d]);
        assert_eq!(header.bits.to_u32(), 0x1d00ffff);
        assert_eq!(header.nonce, 2083236893);
    }

    #[test]
    fn genesis_hash_matches_known_block_id() {
        let header = BlockHeader::decode(&genesis_bytes()).unwrap();
        let mut id = header.hash();
        id.reverse();
        assert_eq!(
            hex::encode(id),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
    }

    #[test]
    fn round_trip_is_byte_exact() {
        let mut raw = [0u8; HEADER_SIZE];
        for (i, byte) in raw.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(37).wrapping_add(11);
        }
        let header = BlockHeader::decode(&raw).unwrap();
        assert_eq!(header.encode(), raw);

        let genesis = genesis_bytes();
        assert_eq!(BlockHeader::decode(&genesis).unwrap().encode().as_slice(), genesis.as_slice());
    }

    #[test]
    fn hashes_keep_wire_order() {
        let mut raw = [0u8; HEADER_SIZE];
        raw[4] = 0xaa;
        raw[35] = 0xbb;
        raw[36] = 0xcc;
        raw[67] = 0xdd;
        let header = BlockHeader::decode(&raw).unwrap();
        assert_eq!(header.previous_hash[0], 0xaa);
        assert_eq!(header.previous_hash[31], 0xbb);
        assert_eq!(header.merkle_root[0], 0xcc);
        assert_eq!(header.merkle_root[31], 0xdd);
    }

    #[test]
    fn payload_starts_at_byte_80() {
        let mut raw = genesis_bytes();
        raw.extend_from_slice(&[0x01, 0x02, 0x03]);
        let (_, payload) = BlockHeader::split(&raw).unwrap();
        assert_eq!(payload, &[0x01, 0x02, 0x03]);

        let genesis = genesis_bytes();
        let (_, empty) = BlockHeader::split(&genesis).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn short_buffer_is_truncated_header() {
        let raw = [0u8; HEADER_SIZE - 1];
        match BlockHeader::decode(&raw) {
            Err(ParseError::TruncatedHeader { len }) => assert_eq!(len, 79),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            BlockHeader::decode(&[]),
            Err(ParseError::TruncatedHeader { len: 0 })
        ));
    }

    #[test]
    fn compact_target_parts() {
        let bits = CompactTarget::from(0x1d00ffff);
        assert_eq!(bits.as_bytes(), &[0xff, 0xff, 0x00, 0x1d]);
        assert_eq!(bits.exponent(), 0x1d);
        assert_eq!(bits.mantissa(), 0x00ffff);
        assert!(!bits.is_negative());

        let negative = CompactTarget::from(0x04923456);
        assert!(negative.is_negative());
        assert_eq!(negative.mantissa(), 0x923456);
    }

    #[test]
    fn mantissa_agrees_with_compute_target() {
        use crate::blockchain::compute_target;
        use num_bigint::BigUint;

        for raw in [0x04923456u32, 0x1d00ffff, 0x1b0404cb, 0x03800001] {
            let bits = CompactTarget::from(raw);
            let shift = 8 * u32::from(bits.exponent() - 3);
            let expected = BigUint::from(bits.mantissa()) << shift;
            assert_eq!(compute_target(bits.as_bytes()).unwrap(), expected);
        }
    }

    #[test]
    fn compact_target_serializes_as_wire_hex() {
        let json = serde_json::to_string(&CompactTarget::from(0x1d00ffff)).unwrap();
        assert_eq!(json, "\"ffff001d\"");
    }
}
