//! Error types for block dump parsing

use std::io;

use thiserror::Error;

use crate::blockchain::HEADER_SIZE;

/// Why a framing read came up short.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StreamFault {
    #[error("start marker cut short ({got} of 4 bytes)")]
    ShortMarker { got: usize },

    #[error("size field cut short ({got} of 4 bytes)")]
    ShortSize { got: usize },

    #[error("negative record size {size}")]
    NegativeSize { size: i32 },

    #[error("record declares {declared} bytes but only {got} remain")]
    ShortPayload { declared: usize, got: usize },
}

/// Main error type for framing, decoding and difficulty derivation.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed stream at record {record} (offset {offset}): {reason}")]
    MalformedStream {
        record: usize,
        offset: u64,
        reason: StreamFault,
    },

    #[error(
        "unexpected start marker at record {record} (offset {offset}): found {}, expected {}",
        hex::encode(.found),
        hex::encode(.expected)
    )]
    UnexpectedMagic {
        record: usize,
        offset: u64,
        found: [u8; 4],
        expected: [u8; 4],
    },

    #[error("truncated header: need {} bytes, got {len}", HEADER_SIZE)]
    TruncatedHeader { len: usize },

    #[error("invalid difficulty encoding {}: {reason}", hex::encode(.bits))]
    InvalidDifficultyEncoding { bits: [u8; 4], reason: &'static str },

    #[error("division by zero: target is zero")]
    DivisionByZero,

    #[error("io error at record {record} (offset {offset}): {source}")]
    Io {
        record: usize,
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("record {index} (offset {offset}): {source}")]
    InRecord {
        index: usize,
        offset: u64,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Attach the position of the record being decoded.
    pub fn in_record(self, index: usize, offset: u64) -> Self {
        match self {
            err @ ParseError::InRecord { .. } => err,
            err => ParseError::InRecord {
                index,
                offset,
                source: Box::new(err),
            },
        }
    }

    /// Framing failures leave the stream out of sync; decoding failures don't.
    pub fn is_fatal(&self) -> bool {
        match self {
            ParseError::MalformedStream { .. }
            | ParseError::UnexpectedMagic { .. }
            | ParseError::Io { .. } => true,
            ParseError::InRecord { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ParseError>;
